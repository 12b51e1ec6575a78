//! Shared utilities for CLI commands.

use std::collections::{BTreeMap, HashMap};
use std::fmt::Write as _;

use anyhow::{Result, bail};
use chrono::{DateTime, Utc};

use ct_core::{
    BoardMetadata, MemberTimeView, PersonId, WorkItemId, format_timer, try_parse_duration,
};

/// Parses a duration argument such as "1h 30m" into milliseconds.
pub fn parse_duration_arg(input: &str) -> Result<i64> {
    let ms = try_parse_duration(input)?;
    if ms == 0 {
        bail!("duration must be greater than zero: {input:?}");
    }
    Ok(ms)
}

/// Refuses a destructive action unless `--yes` was given.
pub fn require_confirmation(yes: bool, action: &str) -> Result<()> {
    if !yes {
        bail!("refusing to {action} without --yes");
    }
    Ok(())
}

/// Display names for work items, falling back to the raw id for items the
/// board no longer lists.
pub struct ItemNames<'a> {
    names: HashMap<&'a WorkItemId, &'a str>,
}

impl<'a> ItemNames<'a> {
    pub fn new(metadata: &'a BoardMetadata) -> Self {
        Self {
            names: metadata
                .items
                .iter()
                .map(|item| (&item.id, item.name.as_str()))
                .collect(),
        }
    }

    pub fn get<'b>(&self, id: &'b WorkItemId) -> &'b str
    where
        'a: 'b,
    {
        self.names.get(id).copied().unwrap_or_else(|| id.as_str())
    }
}

/// One indented line per member with their live total at `now`.
pub fn member_lines(view: &BTreeMap<PersonId, MemberTimeView>, now: DateTime<Utc>) -> String {
    let mut output = String::new();
    if view.is_empty() {
        writeln!(output, "  No time recorded").unwrap();
    }
    for member in view.values() {
        let state = if member.state().is_running() {
            "  running"
        } else {
            ""
        };
        writeln!(
            output,
            "  {:<16} {}{state}",
            member.name,
            format_timer(member.live_total(now))
        )
        .unwrap();
    }
    output
}
