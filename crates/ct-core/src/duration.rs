//! Duration arithmetic.
//!
//! Durations are stored as signed milliseconds everywhere. Formatting floors
//! non-positive values to zero; storage and aggregation never clamp.

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;

use crate::types::ValidationError;

pub const MS_PER_SECOND: i64 = 1_000;
pub const MS_PER_MINUTE: i64 = 60 * MS_PER_SECOND;
pub const MS_PER_HOUR: i64 = 60 * MS_PER_MINUTE;

// `t` is accepted as an hour unit alongside `h` ("2t 15m").
static HOURS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\d+)\s*[ht]").expect("valid hours pattern"));
static MINUTES_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\d+)\s*m").expect("valid minutes pattern"));
static SECONDS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\d+)\s*s").expect("valid seconds pattern"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Parts {
    hours: i64,
    minutes: i64,
    seconds: i64,
}

impl Parts {
    const fn from_ms(ms: i64) -> Self {
        let total_seconds = ms / MS_PER_SECOND;
        Self {
            hours: total_seconds / 3600,
            minutes: (total_seconds % 3600) / 60,
            seconds: total_seconds % 60,
        }
    }
}

/// Formats milliseconds for display.
///
/// Long form lists every non-zero unit (`"1h 5m 3s"`, `"2h"`, `"45s"`); short
/// form keeps only the largest unit (`"1h 5m"`, `"12m"`, `"40s"`).
/// Zero and negative values render as `"0m 0s"` (`"0m"` when short).
pub fn format_duration(ms: i64, short: bool) -> String {
    if ms <= 0 {
        return if short { "0m" } else { "0m 0s" }.to_string();
    }
    let Parts {
        hours,
        minutes,
        seconds,
    } = Parts::from_ms(ms);

    if short {
        return if hours > 0 {
            format!("{hours}h {minutes}m")
        } else if minutes > 0 {
            format!("{minutes}m")
        } else {
            format!("{seconds}s")
        };
    }

    let mut parts = Vec::with_capacity(3);
    if hours > 0 {
        parts.push(format!("{hours}h"));
    }
    if minutes > 0 {
        parts.push(format!("{minutes}m"));
    }
    if seconds > 0 || parts.is_empty() {
        parts.push(format!("{seconds}s"));
    }
    parts.join(" ")
}

/// Formats milliseconds as a zero-padded `HH:MM:SS` clock.
pub fn format_timer(ms: i64) -> String {
    let Parts {
        hours,
        minutes,
        seconds,
    } = Parts::from_ms(ms.max(0));
    format!("{hours:02}:{minutes:02}:{seconds:02}")
}

/// Parses a human duration such as `"1h 30m"`, `"2t"`, `"90s"` into milliseconds.
///
/// Each unit is matched at most once and independently; missing units
/// contribute zero. Returns 0 when nothing matches.
pub fn parse_duration(input: &str) -> i64 {
    parse_parts(input).unwrap_or(0)
}

/// Like [`parse_duration`] but rejects input with no recognizable unit.
pub fn try_parse_duration(input: &str) -> Result<i64, ValidationError> {
    parse_parts(input).ok_or_else(|| ValidationError::InvalidDuration {
        input: input.to_string(),
    })
}

fn parse_parts(input: &str) -> Option<i64> {
    let hours = capture_unit(&HOURS_RE, input);
    let minutes = capture_unit(&MINUTES_RE, input);
    let seconds = capture_unit(&SECONDS_RE, input);
    if hours.is_none() && minutes.is_none() && seconds.is_none() {
        return None;
    }
    Some(
        hours
            .unwrap_or(0)
            .saturating_mul(MS_PER_HOUR)
            .saturating_add(minutes.unwrap_or(0).saturating_mul(MS_PER_MINUTE))
            .saturating_add(seconds.unwrap_or(0).saturating_mul(MS_PER_SECOND)),
    )
}

fn capture_unit(re: &Regex, input: &str) -> Option<i64> {
    let caps = re.captures(input)?;
    // Digit runs too long for i64 saturate rather than fail.
    Some(caps[1].parse().unwrap_or(i64::MAX))
}

/// Completed time plus the elapsed part of an open interval, evaluated at `now`.
///
/// A start time in the future (clock skew between clients) contributes nothing.
pub fn live_total(total_ms: i64, active_start: Option<DateTime<Utc>>, now: DateTime<Utc>) -> i64 {
    let running_ms = active_start.map_or(0, |start| {
        now.signed_duration_since(start).num_milliseconds().max(0)
    });
    total_ms.saturating_add(running_ms)
}
