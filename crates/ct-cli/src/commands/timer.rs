//! `ct start`, `ct stop` and `ct toggle`.

use std::io::Write;

use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::Args;

use ct_core::{BoardHost, PersonId, TimerState, WorkItemId, format_duration};

use crate::Tracker;

#[derive(Debug, Clone, Default, Args)]
pub struct TimerArgs {
    /// Work item to time (defaults to the board's current item).
    #[arg(long)]
    pub item: Option<WorkItemId>,

    /// Act for another board member.
    #[arg(long)]
    pub person: Option<PersonId>,
}

pub fn start<W: Write, H: BoardHost>(
    writer: &mut W,
    args: &TimerArgs,
    tracker: &mut Tracker<H>,
    now: DateTime<Utc>,
) -> Result<()> {
    let item = tracker.resolve_item(args.item.as_ref())?;
    if tracker.start_timer_at(&item, args.person.as_ref(), now)? {
        writeln!(writer, "Started timer on {item}")?;
    } else {
        writeln!(writer, "Timer already running on {item}")?;
    }
    Ok(())
}

pub fn stop<W: Write, H: BoardHost>(
    writer: &mut W,
    args: &TimerArgs,
    tracker: &mut Tracker<H>,
    now: DateTime<Utc>,
) -> Result<()> {
    let item = tracker.resolve_item(args.item.as_ref())?;
    match tracker.stop_timer_at(&item, args.person.as_ref(), now)? {
        Some(entry) => writeln!(
            writer,
            "Stopped timer on {item}: {}",
            format_duration(entry.duration_ms, false)
        )?,
        None => writeln!(writer, "No timer running on {item}")?,
    }
    Ok(())
}

pub fn toggle<W: Write, H: BoardHost>(
    writer: &mut W,
    args: &TimerArgs,
    tracker: &mut Tracker<H>,
    now: DateTime<Utc>,
) -> Result<()> {
    let item = tracker.resolve_item(args.item.as_ref())?;
    match tracker.toggle_timer_at(&item, args.person.as_ref(), now)? {
        TimerState::Running => writeln!(writer, "Started timer on {item}")?,
        TimerState::Stopped => writeln!(writer, "Stopped timer on {item}")?,
    }
    Ok(())
}
