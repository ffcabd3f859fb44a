//! Schedule pattern compilation and trigger computation
//!
//! A schedule is a 6-field cron-style pattern in the fixed order
//! `seconds minutes hours day-of-month months day-of-week`. It comes from the
//! configuration either as an explicit pattern string, used verbatim, or as a
//! `(unit, value)` pair compiled by [`compile_pattern`].
//!
//! Compilation walks the unit vocabulary in field order: positions before the
//! matched unit get a literal `0`, the match gets the value, positions after
//! it get a wildcard. A unit that matches nothing in the vocabulary leaves
//! every position at `0`, producing a pattern whose day-of-month field can
//! never match a real date; such unsatisfiable patterns degenerate to an
//! every-second trigger (see [`SchedulePattern::parse`]). This reproduces the
//! upstream scheduler's observed behavior and is covered by tests rather than
//! redesigned away.

use crate::config::FrequencyConfig;
use crate::error::{Error, Result};
use chrono::{Datelike, Duration, NaiveDateTime, Timelike};
use tracing::warn;

/// Unit vocabulary in field order
const UNIT_ORDER: [&str; 6] = ["seconds", "minutes", "hours", "daymonth", "months", "dayweek"];

/// Inclusive value range per field, in field order
const FIELD_RANGES: [(u32, u32); 6] = [(0, 59), (0, 59), (0, 23), (1, 31), (1, 12), (0, 6)];

/// Bound on the next-trigger search; satisfiable patterns resolve in far
/// fewer steps (worst case is a day-of-month waiting out short months).
const MAX_SEARCH_STEPS: usize = 100_000;

/// Derive the 6-field pattern string from a frequency configuration
///
/// An explicit `cron_pattern` is returned verbatim. Otherwise the pattern is
/// built from the `(unit, value)` pair as described in the module docs.
pub fn compile_pattern(frequency: &FrequencyConfig) -> String {
    if let Some(pattern) = &frequency.cron_pattern {
        return pattern.clone();
    }

    let mut parts = Vec::with_capacity(UNIT_ORDER.len());
    let mut found = false;

    for unit in UNIT_ORDER {
        if unit == frequency.unit {
            found = true;
            parts.push(frequency.value.to_string());
        } else if found {
            parts.push("*".to_string());
        } else {
            parts.push("0".to_string());
        }
    }

    parts.join(" ")
}

/// One parsed pattern field
///
/// `None` is the wildcard; `Some` lists the allowed values (possibly empty,
/// when every requested value fell outside the field's range).
#[derive(Clone, Debug, PartialEq, Eq)]
struct Field(Option<Vec<u32>>);

impl Field {
    fn matches(&self, value: u32) -> bool {
        match &self.0 {
            None => true,
            Some(allowed) => allowed.contains(&value),
        }
    }

    fn is_restricted(&self) -> bool {
        self.0.is_some()
    }

    fn is_unsatisfiable(&self) -> bool {
        matches!(&self.0, Some(allowed) if allowed.is_empty())
    }
}

/// A compiled recurring-trigger specification
#[derive(Clone, Debug)]
pub struct SchedulePattern {
    /// Fields in order: sec, min, hour, day-of-month, month, day-of-week
    fields: [Field; 6],

    /// Set when some field can never match a real date; the pattern then
    /// fires every second
    degenerate: bool,
}

impl SchedulePattern {
    /// Parse a 6-field pattern string
    ///
    /// Each field is `*`, `*/step`, a single number, an `a-b` range, or a
    /// comma-separated list of numbers. Values outside the field's valid
    /// range are dropped; a field left with no satisfiable value at all makes
    /// the whole pattern degenerate to an every-second trigger, logged at
    /// warn level.
    ///
    /// # Errors
    /// Returns [`Error::Config`] for structural problems: wrong field count,
    /// unparsable tokens, inverted ranges, or a zero step.
    pub fn parse(pattern: &str) -> Result<Self> {
        let parts: Vec<&str> = pattern.split_whitespace().collect();
        if parts.len() != 6 {
            return Err(Error::config(
                format!(
                    "schedule pattern must have 6 fields, got {}: {:?}",
                    parts.len(),
                    pattern
                ),
                Some("frequency.cron_pattern"),
            ));
        }

        let mut fields = Vec::with_capacity(6);
        for (part, range) in parts.iter().copied().zip(FIELD_RANGES) {
            fields.push(parse_field(part, range)?);
        }
        let fields: [Field; 6] = match fields.try_into() {
            Ok(f) => f,
            Err(_) => unreachable!("length checked above"),
        };

        let degenerate = fields.iter().any(Field::is_unsatisfiable);
        if degenerate {
            warn!(
                pattern,
                "Schedule pattern can never match a calendar date, firing every second"
            );
        }

        Ok(Self { fields, degenerate })
    }

    /// Whether the pattern degenerated to an every-second trigger
    pub fn fires_every_second(&self) -> bool {
        self.degenerate
    }

    /// The next trigger instant strictly after `after`
    ///
    /// Day-of-month and day-of-week follow classic cron semantics: when both
    /// are restricted, a day matching either one qualifies.
    pub fn next_after(&self, after: NaiveDateTime) -> NaiveDateTime {
        let mut t = truncate_subsec(after) + Duration::seconds(1);

        if self.degenerate {
            return t;
        }

        let [sec, min, hour, ..] = &self.fields;

        for _ in 0..MAX_SEARCH_STEPS {
            if !self.fields[4].matches(t.month()) {
                t = start_of_next_month(t);
                continue;
            }
            if !self.day_matches(t) {
                t = start_of_next_day(t);
                continue;
            }
            if !hour.matches(t.hour()) {
                t = truncate_to_hour(t) + Duration::hours(1);
                continue;
            }
            if !min.matches(t.minute()) {
                t = truncate_to_minute(t) + Duration::minutes(1);
                continue;
            }
            if !sec.matches(t.second()) {
                t += Duration::seconds(1);
                continue;
            }
            return t;
        }

        // Unreachable for patterns that passed the degeneracy check, but a
        // bounded search must return something.
        t
    }

    fn day_matches(&self, t: NaiveDateTime) -> bool {
        let dom = &self.fields[3];
        let dow = &self.fields[5];
        let dom_ok = dom.matches(t.day());
        let dow_ok = dow.matches(t.weekday().num_days_from_sunday());

        if dom.is_restricted() && dow.is_restricted() {
            dom_ok || dow_ok
        } else {
            dom_ok && dow_ok
        }
    }
}

fn parse_field(part: &str, (min, max): (u32, u32)) -> Result<Field> {
    let invalid = |detail: &str| {
        Error::config(
            format!("invalid schedule field {:?}: {}", part, detail),
            Some("frequency.cron_pattern"),
        )
    };

    if part == "*" {
        return Ok(Field(None));
    }

    if let Some(step) = part.strip_prefix("*/") {
        let step: u32 = step.parse().map_err(|_| invalid("step is not a number"))?;
        if step == 0 {
            return Err(invalid("step must be positive"));
        }
        let allowed = (min..=max).filter(|v| (v - min) % step == 0).collect();
        return Ok(Field(Some(allowed)));
    }

    let mut allowed = Vec::new();
    for token in part.split(',') {
        if let Some((lo, hi)) = token.split_once('-') {
            let lo: u32 = lo.parse().map_err(|_| invalid("range start is not a number"))?;
            let hi: u32 = hi.parse().map_err(|_| invalid("range end is not a number"))?;
            if lo > hi {
                return Err(invalid("range start exceeds range end"));
            }
            allowed.extend((lo..=hi).filter(|v| (min..=max).contains(v)));
        } else {
            let value: u32 = token.parse().map_err(|_| invalid("not a number"))?;
            if (min..=max).contains(&value) {
                allowed.push(value);
            }
        }
    }
    allowed.sort_unstable();
    allowed.dedup();
    Ok(Field(Some(allowed)))
}

fn truncate_subsec(t: NaiveDateTime) -> NaiveDateTime {
    t.with_nanosecond(0).unwrap_or(t)
}

fn truncate_to_minute(t: NaiveDateTime) -> NaiveDateTime {
    truncate_subsec(t).with_second(0).unwrap_or(t)
}

fn truncate_to_hour(t: NaiveDateTime) -> NaiveDateTime {
    truncate_to_minute(t).with_minute(0).unwrap_or(t)
}

fn start_of_next_day(t: NaiveDateTime) -> NaiveDateTime {
    truncate_to_hour(t).with_hour(0).unwrap_or(t) + Duration::days(1)
}

fn start_of_next_month(t: NaiveDateTime) -> NaiveDateTime {
    let day_one = truncate_to_hour(t)
        .with_hour(0)
        .and_then(|d| d.with_day(1))
        .unwrap_or(t);
    // Stepping 32 days from the 1st always lands in the next month
    (day_one + Duration::days(32)).with_day(1).unwrap_or(t)
}
