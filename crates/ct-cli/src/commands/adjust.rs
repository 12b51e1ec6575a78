//! `ct adjust`: manual time corrections.

use std::io::Write;

use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use clap::Args;

use ct_core::{BoardHost, PersonId, WorkItemId, format_duration};

use crate::Tracker;
use crate::commands::util::parse_duration_arg;

#[derive(Debug, Clone, Args)]
pub struct AdjustArgs {
    /// Amount of time, e.g. "1h 30m", "45m" or "90s".
    pub duration: String,

    /// Remove the amount instead of adding it.
    #[arg(long)]
    pub subtract: bool,

    /// Local date to book the time on (YYYY-MM-DD). Defaults to now.
    #[arg(long)]
    pub date: Option<NaiveDate>,

    /// Work item to adjust (defaults to the board's current item).
    #[arg(long)]
    pub item: Option<WorkItemId>,

    /// Adjust another board member's time.
    #[arg(long)]
    pub person: Option<PersonId>,
}

pub fn run<W: Write, H: BoardHost>(
    writer: &mut W,
    args: &AdjustArgs,
    tracker: &mut Tracker<H>,
    now: DateTime<Utc>,
) -> Result<()> {
    let amount = parse_duration_arg(&args.duration)?;
    let delta_ms = if args.subtract { -amount } else { amount };
    let item = tracker.resolve_item(args.item.as_ref())?;
    tracker.adjust_time_at(&item, args.person.as_ref(), delta_ms, args.date, now)?;

    let amount = format_duration(amount, false);
    if args.subtract {
        writeln!(writer, "Subtracted {amount} from {item}")?;
    } else {
        writeln!(writer, "Added {amount} to {item}")?;
    }
    Ok(())
}
