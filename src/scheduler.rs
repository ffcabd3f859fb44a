//! Scheduler driver for the poll loop
//!
//! Owns the recurring trigger and the run statistics. Cycles are strictly
//! serialized: the next trigger is computed only after the previous cycle,
//! including its cache save, has finished, so the cache keeps a single writer
//! and a slow cycle delays rather than overlaps the next one. The loop sleeps
//! in short ticks between triggers to stay responsive to shutdown, following
//! the same shape as the rest of the long-running tasks in this crate.

use crate::error::Error;
use crate::poller::PollController;
use crate::schedule::SchedulePattern;
use chrono::Local;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::time::{Duration, sleep};
use tracing::{debug, error, info, warn};

/// Longest single sleep between shutdown checks
const TICK: Duration = Duration::from_secs(1);

/// Statistics accumulated across the process lifetime
#[derive(Clone, Copy, Debug, Default)]
pub struct RunStats {
    /// Downloads initiated by the most recent cycle
    pub last_cycle: usize,

    /// Downloads initiated since the process started; never resets
    pub total: u64,
}

/// Drives the poll controller on the compiled schedule
pub struct PollScheduler {
    controller: PollController,
    pattern: SchedulePattern,
    run_at_start: bool,
    stats: RunStats,
    shutdown: Arc<AtomicBool>,
}

impl PollScheduler {
    /// Create a driver
    ///
    /// # Parameters
    /// - `controller`: the poll cycle controller; the driver becomes its
    ///   single owner
    /// - `pattern`: compiled trigger specification
    /// - `run_at_start`: run one extra cycle immediately, before the first
    ///   scheduled trigger
    /// - `shutdown`: flag checked between sleep ticks; setting it stops the
    ///   loop promptly
    pub fn new(
        controller: PollController,
        pattern: SchedulePattern,
        run_at_start: bool,
        shutdown: Arc<AtomicBool>,
    ) -> Self {
        Self {
            controller,
            pattern,
            run_at_start,
            stats: RunStats::default(),
            shutdown,
        }
    }

    /// Run until the shutdown flag is set
    ///
    /// Each trigger invokes exactly one cycle, awaited to completion. A
    /// trigger that fires while a cycle is still running is not observed
    /// until that cycle ends, preserving the cache's single-writer ordering.
    pub async fn run(mut self) -> RunStats {
        info!("Poll scheduler started");

        if self.run_at_start {
            self.cycle().await;
        }

        loop {
            let next = self.pattern.next_after(Local::now().naive_local());
            debug!(next = %next, "Next trigger");

            loop {
                if self.shutdown.load(Ordering::SeqCst) {
                    info!("Poll scheduler shutting down");
                    return self.stats;
                }
                let remaining = next - Local::now().naive_local();
                let Ok(remaining) = remaining.to_std() else {
                    break; // trigger time reached
                };
                sleep(remaining.min(TICK)).await;
            }

            info!(now = %Local::now(), "yts-watcher trigger");
            self.cycle().await;
        }
    }

    /// Run one cycle and fold its outcome into the lifetime statistics
    async fn cycle(&mut self) {
        match self.controller.run_cycle().await {
            Ok(cycle) => {
                self.stats.last_cycle = cycle.downloaded;
                self.stats.total += cycle.downloaded as u64;
                info!(movies = cycle.listed, "Movies");
                info!(downloaded = cycle.downloaded, "Downloaded");
                info!(total = self.stats.total, "Total");
            }
            Err(e @ Error::Cache(_)) => {
                // The in-memory decisions never reached disk; every future
                // cycle's idempotency is at risk until an operator intervenes
                error!(error = %e, "Cache persistence failed, downloads may repeat after restart");
            }
            Err(e) => {
                warn!(error = %e, "Cycle skipped, will retry on next trigger");
            }
        }
    }
}
