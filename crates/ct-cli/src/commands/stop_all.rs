//! `ct stop-all`: stop running timers on the board, including other people's.

use std::io::Write;

use anyhow::{Result, bail};
use chrono::{DateTime, Utc};
use clap::Args;

use ct_core::{BoardHost, format_duration};

use crate::Tracker;
use crate::commands::util::{ItemNames, require_confirmation};

#[derive(Debug, Clone, Default, Args)]
pub struct StopAllArgs {
    /// Timer ids to stop (as shown by `ct status`). Defaults to every running timer.
    pub ids: Vec<String>,

    /// Confirm stopping timers that belong to other members.
    #[arg(long)]
    pub yes: bool,
}

pub fn run<W: Write, H: BoardHost>(
    writer: &mut W,
    args: &StopAllArgs,
    tracker: &mut Tracker<H>,
    now: DateTime<Utc>,
) -> Result<()> {
    let running = tracker.active_timers()?;
    let selected: Vec<_> = if args.ids.is_empty() {
        running
    } else {
        for id in &args.ids {
            if !running.iter().any(|timer| &timer.id == id) {
                bail!("no running timer with id {id}");
            }
        }
        running
            .into_iter()
            .filter(|timer| args.ids.contains(&timer.id))
            .collect()
    };

    if selected.is_empty() {
        writeln!(writer, "No running timers")?;
        return Ok(());
    }

    let me = tracker.resolve_person(None)?;
    if selected.iter().any(|timer| timer.person_id != me.id) {
        require_confirmation(args.yes, "stop other members' timers")?;
    }

    let ids: Vec<String> = selected.into_iter().map(|timer| timer.id).collect();
    let entries = tracker.stop_active_timers_at(&ids, now)?;
    let metadata = tracker.metadata()?;
    let names = ItemNames::new(&metadata);
    for entry in &entries {
        writeln!(
            writer,
            "Stopped {} on {}: {}",
            entry.person_name,
            names.get(&entry.work_item_id),
            format_duration(entry.duration_ms, false)
        )?;
    }
    writeln!(writer, "Stopped {} timer(s)", entries.len())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::{t0, tracker};

    use chrono::Duration;
    use ct_core::{PersonId, WorkItemId};
    use insta::assert_snapshot;

    fn card(id: &str) -> WorkItemId {
        WorkItemId::new(id).unwrap()
    }

    #[test]
    fn own_timers_stop_without_confirmation() {
        let mut tracker = tracker();
        tracker.start_timer_at(&card("card-1"), None, t0()).unwrap();
        tracker
            .start_timer_at(&card("card-2"), None, t0() + Duration::minutes(2))
            .unwrap();

        let mut output = Vec::new();
        run(
            &mut output,
            &StopAllArgs::default(),
            &mut tracker,
            t0() + Duration::minutes(12),
        )
        .unwrap();

        assert_snapshot!(String::from_utf8(output).unwrap(), @r"
        Stopped Ada on Login page: 12m
        Stopped Ada on Billing: 10m
        Stopped 2 timer(s)
        ");
    }

    #[test]
    fn other_members_timers_need_yes() {
        let mut tracker = tracker();
        let grace = PersonId::new("grace").unwrap();
        tracker
            .start_timer_at(&card("card-1"), Some(&grace), t0())
            .unwrap();

        let err = run(&mut Vec::new(), &StopAllArgs::default(), &mut tracker, t0()).unwrap_err();
        assert!(err.to_string().contains("without --yes"));
        assert_eq!(tracker.active_timers().unwrap().len(), 1);

        let args = StopAllArgs {
            ids: Vec::new(),
            yes: true,
        };
        run(&mut Vec::new(), &args, &mut tracker, t0()).unwrap();
        assert!(tracker.active_timers().unwrap().is_empty());
    }

    #[test]
    fn selected_ids_only() {
        let mut tracker = tracker();
        tracker.start_timer_at(&card("card-1"), None, t0()).unwrap();
        tracker.start_timer_at(&card("card-2"), None, t0()).unwrap();
        let first = tracker.active_timers().unwrap()[0].id.clone();

        let args = StopAllArgs {
            ids: vec![first.clone()],
            yes: false,
        };
        run(&mut Vec::new(), &args, &mut tracker, t0()).unwrap();
        let remaining = tracker.active_timers().unwrap();
        assert_eq!(remaining.len(), 1);
        assert_ne!(remaining[0].id, first);

        let unknown = StopAllArgs {
            ids: vec!["nope".to_string()],
            yes: true,
        };
        let err = run(&mut Vec::new(), &unknown, &mut tracker, t0()).unwrap_err();
        assert!(err.to_string().contains("no running timer"));
    }

    #[test]
    fn nothing_running() {
        let mut tracker = tracker();
        let mut output = Vec::new();
        run(&mut output, &StopAllArgs::default(), &mut tracker, t0()).unwrap();
        assert_eq!(String::from_utf8(output).unwrap(), "No running timers\n");
    }
}
