//! `ct reset`: wipe all recorded time on a work item.

use std::io::Write;

use anyhow::Result;
use clap::Args;

use ct_core::{BoardHost, WorkItemId};

use crate::Tracker;
use crate::commands::util::require_confirmation;

#[derive(Debug, Clone, Args)]
pub struct ResetArgs {
    /// Work item whose time is removed for every member.
    #[arg(long)]
    pub item: WorkItemId,

    /// Confirm the reset.
    #[arg(long)]
    pub yes: bool,
}

pub fn run<W: Write, H: BoardHost>(
    writer: &mut W,
    args: &ResetArgs,
    tracker: &mut Tracker<H>,
) -> Result<()> {
    require_confirmation(args.yes, &format!("reset all time on {}", args.item))?;
    let stats = tracker.reset_item_time(&args.item)?;
    writeln!(
        writer,
        "Reset {}: removed {} {} and {} running {}",
        args.item,
        stats.entries_deleted,
        plural(stats.entries_deleted, "entry", "entries"),
        stats.timers_deleted,
        plural(stats.timers_deleted, "timer", "timers"),
    )?;
    Ok(())
}

const fn plural<'a>(count: usize, one: &'a str, many: &'a str) -> &'a str {
    if count == 1 { one } else { many }
}
