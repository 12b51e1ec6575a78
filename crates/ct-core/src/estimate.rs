//! Re-estimation rules.
//!
//! A change made within [`GRACE_PERIOD`] of the estimate's own last update is
//! treated as a correction and overwrites silently. Later changes are logged
//! to the estimate history before the value is replaced.

use chrono::{DateTime, Duration, Utc};

use crate::model::Estimate;
use crate::types::ValidationError;

pub const GRACE_PERIOD: Duration = Duration::minutes(2);

/// What a `set_estimate` call must do to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EstimateChange {
    /// No estimate exists yet for the pair.
    Insert,
    /// Same value as stored; nothing is written and `updated_at` is untouched.
    Unchanged,
    /// Inside the grace window; replace the value without history.
    Overwrite,
    /// Outside the grace window; log `previous_ms` then replace.
    Revise { previous_ms: i64 },
}

/// Rejects estimates that are not strictly positive.
pub const fn validate_estimate(estimated_ms: i64) -> Result<i64, ValidationError> {
    if estimated_ms <= 0 {
        return Err(ValidationError::NonPositiveEstimate {
            value_ms: estimated_ms,
        });
    }
    Ok(estimated_ms)
}

pub fn grace_window_open(updated_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    now.signed_duration_since(updated_at) < GRACE_PERIOD
}

/// Decides how a new value relates to the currently stored estimate.
pub fn classify_change(
    existing: Option<&Estimate>,
    estimated_ms: i64,
    now: DateTime<Utc>,
) -> EstimateChange {
    match existing {
        None => EstimateChange::Insert,
        Some(current) if current.estimated_ms == estimated_ms => EstimateChange::Unchanged,
        Some(current) if grace_window_open(current.updated_at, now) => EstimateChange::Overwrite,
        Some(current) => EstimateChange::Revise {
            previous_ms: current.estimated_ms,
        },
    }
}
