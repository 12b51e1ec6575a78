//! `ct export`: report rows or raw time rows as CSV or JSON on stdout.

use std::io::Write;

use anyhow::Result;
use chrono::{DateTime, Local, Utc};
use clap::{Args, ValueEnum};

use ct_core::{BoardHost, ExportRecord, export_delimited, export_structured};

use crate::Tracker;
use crate::commands::report::ReportOptionsArgs;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum ExportFormat {
    #[default]
    Csv,
    Json,
}

#[derive(Debug, Clone, Default, Args)]
pub struct ExportArgs {
    /// Output format.
    #[arg(long, value_enum, default_value_t)]
    pub format: ExportFormat,

    /// Export one row per item and person instead of report rows.
    #[arg(long)]
    pub raw: bool,

    #[command(flatten)]
    pub options: ReportOptionsArgs,
}

fn render<R: ExportRecord>(rows: &[R], format: ExportFormat, delimiter: char) -> Result<String> {
    match format {
        ExportFormat::Csv => Ok(export_delimited(rows, delimiter)),
        ExportFormat::Json => {
            let mut json = export_structured(rows)?;
            json.push('\n');
            Ok(json)
        }
    }
}

pub fn run<W: Write, H: BoardHost>(
    writer: &mut W,
    args: &ExportArgs,
    tracker: &mut Tracker<H>,
    delimiter: char,
    now: DateTime<Utc>,
) -> Result<()> {
    let options = args.options.options(now.with_timezone(&Local).date_naive());
    let output = if args.raw {
        let rows = tracker.time_rows_at(&options.range, now)?;
        render(&rows, args.format, delimiter)?
    } else {
        let report = tracker.report_at(&options, now)?;
        render(&report.rows, args.format, delimiter)?
    };
    write!(writer, "{output}")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::{t0, tracker};

    use chrono::Duration;
    use ct_core::{PersonId, WorkItemId};
    use insta::assert_snapshot;

    fn seeded() -> crate::Tracker<crate::BoardFile> {
        let mut tracker = tracker();
        let card = WorkItemId::new("card-1").unwrap();
        let grace = PersonId::new("grace").unwrap();
        tracker
            .set_estimate_at(&card, None, 3_600_000, None, t0())
            .unwrap();
        tracker
            .adjust_time_at(&card, None, 4_500_000, None, t0())
            .unwrap();
        tracker
            .adjust_time_at(&card, Some(&grace), 90_000, None, t0())
            .unwrap();
        tracker
            .start_timer_at(&card, Some(&grace), t0() + Duration::minutes(1))
            .unwrap();
        tracker
    }

    #[test]
    fn raw_csv_has_one_row_per_member() {
        let mut tracker = seeded();
        let args = ExportArgs {
            raw: true,
            ..ExportArgs::default()
        };
        let mut output = Vec::new();
        run(&mut output, &args, &mut tracker, ',', t0() + Duration::minutes(2)).unwrap();

        assert_snapshot!(String::from_utf8(output).unwrap(), @r"
        item_id,item,category,person_id,person,total_ms,total,running
        card-1,Login page,Doing,ada,Ada,4500000,1h 15m,false
        card-1,Login page,Doing,grace,Grace,150000,2m 30s,true
        ");
    }

    #[test]
    fn report_csv_honours_delimiter() {
        let mut tracker = seeded();
        let mut output = Vec::new();
        run(&mut output, &ExportArgs::default(), &mut tracker, ';', t0() + Duration::minutes(2))
            .unwrap();

        let output = String::from_utf8(output).unwrap();
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("key;label;category;color;items;running;"));
        assert!(lines[1].starts_with("card-1;Login page;Doing;;1;true;3600000;1h;"));
    }

    #[test]
    fn report_json_is_an_array_of_rows() {
        let mut tracker = seeded();
        let args = ExportArgs {
            format: ExportFormat::Json,
            ..ExportArgs::default()
        };
        let mut output = Vec::new();
        run(&mut output, &args, &mut tracker, ',', t0() + Duration::minutes(2)).unwrap();

        let parsed: serde_json::Value = serde_json::from_slice(&output).unwrap();
        let rows = parsed.as_array().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["actual_ms"], 4_650_000);
        assert_eq!(rows[0]["deviation"], "17m 30s");
    }

    #[test]
    fn empty_export_keeps_header() {
        let mut tracker = tracker();
        let mut output = Vec::new();
        run(
            &mut output,
            &ExportArgs {
                raw: true,
                ..ExportArgs::default()
            },
            &mut tracker,
            ',',
            t0(),
        )
        .unwrap();
        assert_eq!(
            String::from_utf8(output).unwrap(),
            "item_id,item,category,person_id,person,total_ms,total,running\n"
        );
    }
}
