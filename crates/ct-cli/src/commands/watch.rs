//! `ct watch`: live per-member totals for one item.
//!
//! The store is read once per poll interval. Between reads the running
//! totals are advanced from the last snapshot on every tick.

use std::collections::BTreeMap;
use std::io::Write;
use std::time::{Duration, Instant};

use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::Args;

use ct_core::{BoardHost, MemberTimeView, PersonId, WorkItemId};

use crate::Tracker;
use crate::commands::util::{ItemNames, member_lines};

#[derive(Debug, Clone, Default, Args)]
pub struct WatchArgs {
    /// Work item to watch (defaults to the board's current item).
    #[arg(long)]
    pub item: Option<WorkItemId>,

    /// Stop after this many redraws.
    #[arg(long)]
    pub ticks: Option<u64>,
}

/// Renders one frame of the view.
pub fn render(
    title: &str,
    view: &BTreeMap<PersonId, MemberTimeView>,
    now: DateTime<Utc>,
) -> String {
    format!("{title}\n{}", member_lines(view, now))
}

pub fn run<W: Write, H: BoardHost>(
    writer: &mut W,
    args: &WatchArgs,
    tracker: &mut Tracker<H>,
    poll_interval: Duration,
    tick_interval: Duration,
) -> Result<()> {
    let item = tracker.resolve_item(args.item.as_ref())?;
    let metadata = tracker.metadata()?;
    let title = ItemNames::new(&metadata).get(&item).to_string();

    let mut view = tracker.member_time_view(&item);
    let mut fetched_at = Instant::now();
    let mut drawn = 0_u64;
    loop {
        if fetched_at.elapsed() >= poll_interval {
            view = tracker.member_time_view(&item);
            fetched_at = Instant::now();
            tracing::debug!(item = %item, members = view.len(), "refreshed time view");
        }
        if drawn > 0 {
            writeln!(writer)?;
        }
        write!(writer, "{}", render(&title, &view, Utc::now()))?;
        writer.flush()?;
        drawn += 1;

        if args.ticks.is_some_and(|ticks| drawn >= ticks) {
            return Ok(());
        }
        std::thread::sleep(tick_interval);
    }
}
