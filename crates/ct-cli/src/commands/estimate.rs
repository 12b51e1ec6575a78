//! `ct estimate`: set, remove and inspect effort estimates.

use std::io::Write;

use anyhow::Result;
use chrono::{DateTime, Local, Utc};
use clap::{Args, Subcommand};

use ct_core::{BoardHost, EstimateChange, PersonId, WorkItemId, format_duration};

use crate::Tracker;
use crate::commands::util::{parse_duration_arg, require_confirmation};

#[derive(Debug, Clone, Default, Args)]
pub struct EstimateTarget {
    /// Work item (defaults to the board's current item).
    #[arg(long)]
    pub item: Option<WorkItemId>,

    /// Act for another board member.
    #[arg(long)]
    pub person: Option<PersonId>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum EstimateAction {
    /// Set your estimate. Changes after the first two minutes are logged.
    Set {
        /// Expected effort, e.g. "2h" or "1h 30m".
        duration: String,

        /// Why the estimate changed.
        #[arg(long)]
        reason: Option<String>,

        #[command(flatten)]
        target: EstimateTarget,
    },

    /// Remove your estimate and its history.
    Remove {
        #[command(flatten)]
        target: EstimateTarget,
    },

    /// Remove every member's estimate on an item.
    Clear {
        /// Work item (defaults to the board's current item).
        #[arg(long)]
        item: Option<WorkItemId>,

        /// Confirm removing other members' estimates.
        #[arg(long)]
        yes: bool,
    },

    /// Show current estimates on an item.
    List {
        /// Work item (defaults to the board's current item).
        #[arg(long)]
        item: Option<WorkItemId>,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show logged re-estimations on an item.
    History {
        /// Work item (defaults to the board's current item).
        #[arg(long)]
        item: Option<WorkItemId>,
    },
}

pub fn run<W: Write, H: BoardHost>(
    writer: &mut W,
    action: &EstimateAction,
    tracker: &mut Tracker<H>,
    now: DateTime<Utc>,
) -> Result<()> {
    match action {
        EstimateAction::Set {
            duration,
            reason,
            target,
        } => {
            let estimated_ms = parse_duration_arg(duration)?;
            let item = tracker.resolve_item(target.item.as_ref())?;
            let change = tracker.set_estimate_at(
                &item,
                target.person.as_ref(),
                estimated_ms,
                reason.as_deref(),
                now,
            )?;
            let value = format_duration(estimated_ms, true);
            match change {
                EstimateChange::Insert => writeln!(writer, "Estimated {item} at {value}")?,
                EstimateChange::Unchanged => writeln!(writer, "Estimate on {item} is already {value}")?,
                EstimateChange::Overwrite => writeln!(writer, "Corrected estimate on {item} to {value}")?,
                EstimateChange::Revise { previous_ms } => writeln!(
                    writer,
                    "Re-estimated {item}: {} -> {value}",
                    format_duration(previous_ms, true)
                )?,
            }
        }
        EstimateAction::Remove { target } => {
            let item = tracker.resolve_item(target.item.as_ref())?;
            if tracker.remove_estimate(&item, target.person.as_ref())? {
                writeln!(writer, "Removed estimate on {item}")?;
            } else {
                writeln!(writer, "No estimate on {item}")?;
            }
        }
        EstimateAction::Clear { item, yes } => {
            let item = tracker.resolve_item(item.as_ref())?;
            require_confirmation(*yes, &format!("clear all estimates on {item}"))?;
            let cleared = tracker.clear_estimates(&item)?;
            writeln!(writer, "Cleared {cleared} estimate(s) on {item}")?;
        }
        EstimateAction::List { item, json } => {
            let item = tracker.resolve_item(item.as_ref())?;
            let estimates = tracker.estimates(&item);
            if *json {
                writeln!(writer, "{}", serde_json::to_string_pretty(&estimates)?)?;
                return Ok(());
            }
            if estimates.is_empty() {
                writeln!(writer, "No estimates on {item}")?;
            }
            for estimate in estimates.values() {
                let original = estimate
                    .original_ms
                    .map(|ms| format!(" (originally {})", format_duration(ms, true)))
                    .unwrap_or_default();
                writeln!(
                    writer,
                    "{:<16} {}{original}",
                    estimate.person_name,
                    format_duration(estimate.estimated_ms, true)
                )?;
            }
        }
        EstimateAction::History { item } => {
            let item = tracker.resolve_item(item.as_ref())?;
            let history = tracker.estimate_history(&item)?;
            if history.is_empty() {
                writeln!(writer, "No re-estimations on {item}")?;
            }
            for entry in &history {
                let reason = entry
                    .reason
                    .as_deref()
                    .map(|reason| format!("  {reason}"))
                    .unwrap_or_default();
                writeln!(
                    writer,
                    "{}  {:<16} {} -> {}{reason}",
                    entry.changed_at.with_timezone(&Local).format("%Y-%m-%d %H:%M"),
                    entry.person_name,
                    format_duration(entry.previous_ms, true),
                    format_duration(entry.new_ms, true)
                )?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::{t0, tracker};

    use chrono::Duration;
    use insta::assert_snapshot;

    fn set(duration: &str, reason: Option<&str>) -> EstimateAction {
        EstimateAction::Set {
            duration: duration.to_string(),
            reason: reason.map(str::to_string),
            target: EstimateTarget::default(),
        }
    }

    #[test]
    fn set_reports_each_kind_of_change() {
        let mut tracker = tracker();
        let mut output = Vec::new();

        run(&mut output, &set("1h", None), &mut tracker, t0()).unwrap();
        run(&mut output, &set("90m", None), &mut tracker, t0() + Duration::seconds(30)).unwrap();
        run(&mut output, &set("90m", None), &mut tracker, t0() + Duration::hours(1)).unwrap();
        run(
            &mut output,
            &set("3h", Some("scope grew")),
            &mut tracker,
            t0() + Duration::hours(2),
        )
        .unwrap();

        assert_snapshot!(String::from_utf8(output).unwrap(), @r"
        Estimated card-1 at 1h 0m
        Corrected estimate on card-1 to 1h 30m
        Estimate on card-1 is already 1h 30m
        Re-estimated card-1: 1h 30m -> 3h 0m
        ");
    }

    #[test]
    fn list_shows_original_value() {
        let mut tracker = tracker();
        run(&mut Vec::new(), &set("1h", None), &mut tracker, t0()).unwrap();
        run(&mut Vec::new(), &set("2h", None), &mut tracker, t0() + Duration::hours(1)).unwrap();

        let mut output = Vec::new();
        let list = EstimateAction::List {
            item: None,
            json: false,
        };
        run(&mut output, &list, &mut tracker, t0()).unwrap();
        assert_eq!(
            String::from_utf8(output).unwrap(),
            "Ada              2h 0m (originally 1h 0m)\n"
        );

        let mut output = Vec::new();
        let json = EstimateAction::List {
            item: None,
            json: true,
        };
        run(&mut output, &json, &mut tracker, t0()).unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&output).unwrap();
        assert_eq!(parsed["ada"]["estimated_ms"], 7_200_000);
        assert_eq!(parsed["ada"]["original_ms"], 3_600_000);
    }

    #[test]
    fn history_lists_revisions_with_reason() {
        let mut tracker = tracker();
        run(&mut Vec::new(), &set("1h", None), &mut tracker, t0()).unwrap();
        run(
            &mut Vec::new(),
            &set("2h", Some("more screens")),
            &mut tracker,
            t0() + Duration::hours(1),
        )
        .unwrap();

        let mut output = Vec::new();
        run(
            &mut output,
            &EstimateAction::History { item: None },
            &mut tracker,
            t0(),
        )
        .unwrap();
        let output = String::from_utf8(output).unwrap();
        assert_eq!(output.lines().count(), 1);
        assert!(output.contains("Ada"));
        assert!(output.ends_with("1h 0m -> 2h 0m  more screens\n"));
    }

    #[test]
    fn remove_and_clear() {
        let mut tracker = tracker();
        let grace = EstimateTarget {
            item: None,
            person: Some(PersonId::new("grace").unwrap()),
        };
        run(&mut Vec::new(), &set("1h", None), &mut tracker, t0()).unwrap();
        run(
            &mut Vec::new(),
            &EstimateAction::Set {
                duration: "2h".to_string(),
                reason: None,
                target: grace,
            },
            &mut tracker,
            t0(),
        )
        .unwrap();

        let mut output = Vec::new();
        let remove = EstimateAction::Remove {
            target: EstimateTarget::default(),
        };
        run(&mut output, &remove, &mut tracker, t0()).unwrap();
        run(&mut output, &remove, &mut tracker, t0()).unwrap();

        let unconfirmed = EstimateAction::Clear {
            item: None,
            yes: false,
        };
        assert!(run(&mut output, &unconfirmed, &mut tracker, t0()).is_err());
        let clear = EstimateAction::Clear {
            item: None,
            yes: true,
        };
        run(&mut output, &clear, &mut tracker, t0()).unwrap();

        assert_snapshot!(String::from_utf8(output).unwrap(), @r"
        Removed estimate on card-1
        No estimate on card-1
        Cleared 1 estimate(s) on card-1
        ");
    }

    #[test]
    fn zero_estimate_is_rejected() {
        let mut tracker = tracker();
        let err = run(&mut Vec::new(), &set("0h", None), &mut tracker, t0()).unwrap_err();
        assert!(err.to_string().contains("greater than zero"));
    }
}
