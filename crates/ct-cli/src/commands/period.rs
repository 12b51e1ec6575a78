//! Report periods in local calendar terms.
//!
//! Presets and `--from/--to` dates are local; they are converted to an
//! inclusive UTC [`DateRange`] over entry start times.

use chrono::{DateTime, Datelike, Duration, Local, LocalResult, NaiveDate, NaiveTime, TimeZone, Utc};
use clap::Args;

use ct_core::DateRange;

#[derive(Debug, Clone, Default, Args)]
pub struct PeriodArgs {
    /// Only today.
    #[arg(long)]
    pub day: bool,

    /// Only yesterday.
    #[arg(long)]
    pub last_day: bool,

    /// This week (Monday to Sunday).
    #[arg(long)]
    pub week: bool,

    /// Last week (Monday to Sunday).
    #[arg(long)]
    pub last_week: bool,

    /// First local date to include (YYYY-MM-DD).
    #[arg(long)]
    pub from: Option<NaiveDate>,

    /// Last local date to include (YYYY-MM-DD).
    #[arg(long)]
    pub to: Option<NaiveDate>,
}

/// A resolved report period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    AllTime,
    Day,
    LastDay,
    Week,
    LastWeek,
    Dates {
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    },
}

impl PeriodArgs {
    /// Presets win over explicit dates; nothing selected means all time.
    pub const fn period(&self) -> Period {
        if self.day {
            Period::Day
        } else if self.last_day {
            Period::LastDay
        } else if self.week {
            Period::Week
        } else if self.last_week {
            Period::LastWeek
        } else if self.from.is_some() || self.to.is_some() {
            Period::Dates {
                from: self.from,
                to: self.to,
            }
        } else {
            Period::AllTime
        }
    }
}

impl Period {
    /// Inclusive UTC bounds, using `today` as the reference local date.
    pub fn range(self, today: NaiveDate) -> DateRange {
        let (from, until) = match self {
            Self::AllTime => return DateRange::unbounded(),
            Self::Day => (today, today),
            Self::LastDay => {
                let yesterday = today - Duration::days(1);
                (yesterday, yesterday)
            }
            Self::Week => {
                let monday = monday_of(today);
                (monday, monday + Duration::days(6))
            }
            Self::LastWeek => {
                let monday = monday_of(today) - Duration::days(7);
                (monday, monday + Duration::days(6))
            }
            Self::Dates { from, to } => {
                return DateRange {
                    from: from.map(local_midnight_to_utc),
                    to: to.map(end_of_local_day),
                };
            }
        };
        DateRange {
            from: Some(local_midnight_to_utc(from)),
            to: Some(end_of_local_day(until)),
        }
    }

    /// Short human description for report headers.
    pub fn describe(self, today: NaiveDate) -> String {
        match self {
            Self::AllTime => "all time".to_string(),
            Self::Day => format!("{}", today.format("%A, %b %-d, %Y")),
            Self::LastDay => format!("{}", (today - Duration::days(1)).format("%A, %b %-d, %Y")),
            Self::Week => format!("Week of {}", monday_of(today).format("%b %-d, %Y")),
            Self::LastWeek => format!(
                "Week of {}",
                (monday_of(today) - Duration::days(7)).format("%b %-d, %Y")
            ),
            Self::Dates { from, to } => {
                let date = |d: Option<NaiveDate>| {
                    d.map_or_else(|| "...".to_string(), |d| d.format("%Y-%m-%d").to_string())
                };
                format!("{} to {}", date(from), date(to))
            }
        }
    }
}

fn monday_of(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
}

/// Converts a local date at midnight to UTC.
/// Handles DST ambiguity by picking the earlier time.
pub fn local_midnight_to_utc(local_date: NaiveDate) -> DateTime<Utc> {
    let midnight = local_date.and_time(NaiveTime::default());
    match Local.from_local_datetime(&midnight) {
        LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => dt.with_timezone(&Utc),
        LocalResult::None => {
            // Spring-forward gap at midnight; 1am local exists.
            let one_am = midnight + Duration::hours(1);
            Local
                .from_local_datetime(&one_am)
                .earliest()
                .map_or_else(|| Utc.from_utc_datetime(&one_am), |dt| dt.with_timezone(&Utc))
        }
    }
}

/// Last millisecond before the next local midnight.
fn end_of_local_day(local_date: NaiveDate) -> DateTime<Utc> {
    local_midnight_to_utc(local_date + Duration::days(1)) - Duration::milliseconds(1)
}
