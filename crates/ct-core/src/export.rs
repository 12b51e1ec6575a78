//! Export of report rows as delimited text or JSON.
//!
//! Every duration is written twice: raw milliseconds (`*_ms`) for arithmetic
//! and a formatted string for people reading the sheet.

use serde_json::{Map, Number, Value};

use crate::duration::format_duration;
use crate::report::{ReportRow, TimeRow};

/// One exported cell.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Int(i64),
    Float(f64),
    Text(String),
    Bool(bool),
    Null,
}

impl FieldValue {
    fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    fn optional_text(value: Option<&str>) -> Self {
        value.map_or(Self::Null, Self::text)
    }

    fn to_cell(&self) -> String {
        match self {
            Self::Int(value) => value.to_string(),
            Self::Float(value) => format!("{value:.2}"),
            Self::Text(value) => value.clone(),
            Self::Bool(value) => value.to_string(),
            Self::Null => String::new(),
        }
    }

    fn to_json(&self) -> Value {
        match self {
            Self::Int(value) => Value::from(*value),
            Self::Float(value) => Number::from_f64(*value).map_or(Value::Null, Value::Number),
            Self::Text(value) => Value::String(value.clone()),
            Self::Bool(value) => Value::Bool(*value),
            Self::Null => Value::Null,
        }
    }
}

/// A row type that can be flattened into named cells.
pub trait ExportRecord {
    /// Column names, in output order.
    const COLUMNS: &'static [&'static str];

    /// Cell values, one per entry in [`Self::COLUMNS`].
    fn values(&self) -> Vec<FieldValue>;
}

/// Formats a signed duration, keeping the sign that display formatting drops.
fn format_signed(ms: i64) -> String {
    if ms < 0 {
        format!("-{}", format_duration(-ms, false))
    } else {
        format_duration(ms, false)
    }
}

fn duration_cells(ms: i64) -> [FieldValue; 2] {
    [FieldValue::Int(ms), FieldValue::text(format_duration(ms, false))]
}

impl ExportRecord for ReportRow {
    const COLUMNS: &'static [&'static str] = &[
        "key",
        "label",
        "category",
        "color",
        "items",
        "running",
        "estimated_ms",
        "estimated",
        "original_ms",
        "original",
        "actual_ms",
        "actual",
        "remaining_ms",
        "remaining",
        "deviation_ms",
        "deviation",
        "deviation_pct",
        "accuracy",
    ];

    fn values(&self) -> Vec<FieldValue> {
        let mut values = vec![
            FieldValue::text(self.key.as_str()),
            FieldValue::text(self.label.as_str()),
            FieldValue::optional_text(self.category.as_deref()),
            FieldValue::optional_text(self.color.as_deref()),
            FieldValue::Int(i64::try_from(self.item_count).unwrap_or(i64::MAX)),
            FieldValue::Bool(self.running),
        ];
        values.extend(duration_cells(self.estimated_ms));
        match self.original_ms {
            Some(ms) => values.extend(duration_cells(ms)),
            None => values.extend([FieldValue::Null, FieldValue::Null]),
        }
        values.extend(duration_cells(self.actual_ms));
        values.extend(duration_cells(self.remaining_ms));
        values.push(FieldValue::Int(self.deviation_ms));
        values.push(FieldValue::text(format_signed(self.deviation_ms)));
        values.push(self.deviation_pct.map_or(FieldValue::Null, FieldValue::Float));
        values.push(self.accuracy.map_or(FieldValue::Null, FieldValue::Float));
        values
    }
}

impl ExportRecord for TimeRow {
    const COLUMNS: &'static [&'static str] = &[
        "item_id",
        "item",
        "category",
        "person_id",
        "person",
        "total_ms",
        "total",
        "running",
    ];

    fn values(&self) -> Vec<FieldValue> {
        let mut values = vec![
            FieldValue::text(self.item_id.as_str()),
            FieldValue::text(self.item_name.as_str()),
            FieldValue::optional_text(self.category.as_deref()),
            FieldValue::text(self.person_id.as_str()),
            FieldValue::text(self.person_name.as_str()),
        ];
        values.extend(duration_cells(self.total_ms));
        values.push(FieldValue::Bool(self.running));
        values
    }
}

/// Quotes a cell when it contains the delimiter, a quote or a line break.
fn escape_cell(cell: &str, delimiter: char) -> String {
    if cell.contains(delimiter) || cell.contains(['"', '\n', '\r']) {
        format!("\"{}\"", cell.replace('"', "\"\""))
    } else {
        cell.to_string()
    }
}

fn write_line(out: &mut String, cells: impl Iterator<Item = String>, delimiter: char) {
    let mut first = true;
    for cell in cells {
        if !first {
            out.push(delimiter);
        }
        first = false;
        out.push_str(&escape_cell(&cell, delimiter));
    }
    out.push('\n');
}

/// Renders rows as delimited text with a header line.
pub fn export_delimited<R: ExportRecord>(rows: &[R], delimiter: char) -> String {
    let mut out = String::new();
    write_line(
        &mut out,
        R::COLUMNS.iter().map(|column| (*column).to_string()),
        delimiter,
    );
    for row in rows {
        write_line(
            &mut out,
            row.values().iter().map(FieldValue::to_cell),
            delimiter,
        );
    }
    out
}

/// Renders rows as a pretty-printed JSON array of objects.
pub fn export_structured<R: ExportRecord>(rows: &[R]) -> Result<String, serde_json::Error> {
    let records: Vec<Value> = rows
        .iter()
        .map(|row| {
            let object: Map<String, Value> = R::COLUMNS
                .iter()
                .zip(row.values())
                .map(|(column, value)| ((*column).to_string(), value.to_json()))
                .collect();
            Value::Object(object)
        })
        .collect();
    serde_json::to_string_pretty(&records)
}
