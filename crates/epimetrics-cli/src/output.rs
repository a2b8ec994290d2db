use std::io::{self, Write};

use serde_json::{json, Map, Value};

use crate::cli::OutputFormat;
use crate::commands::ReportEnvelope;
use crate::error::CliError;

pub fn render(
    envelope: &ReportEnvelope,
    format: OutputFormat,
    pretty: bool,
) -> Result<(), CliError> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    match format {
        OutputFormat::Json => {
            let payload = if pretty {
                serde_json::to_string_pretty(envelope)?
            } else {
                serde_json::to_string(envelope)?
            };
            writeln!(out, "{payload}")?;
        }
        OutputFormat::Ndjson => write_ndjson(&mut out, envelope)?,
        OutputFormat::Table => write_table(&mut out, envelope)?,
    }
    Ok(())
}

/// One `meta` line, then one line per row.
fn write_ndjson(out: &mut impl Write, envelope: &ReportEnvelope) -> Result<(), CliError> {
    let meta = serde_json::to_value(&envelope.meta)?;
    writeln!(out, "{}", json!({ "meta": meta }))?;
    match &envelope.data {
        Value::Array(rows) => {
            for row in rows {
                writeln!(out, "{}", serde_json::to_string(row)?)?;
            }
        }
        other => writeln!(out, "{}", serde_json::to_string(other)?)?,
    }
    Ok(())
}

fn write_table(out: &mut impl Write, envelope: &ReportEnvelope) -> Result<(), CliError> {
    writeln!(out, "request_id  : {}", envelope.meta.request_id)?;
    writeln!(out, "command     : {}", envelope.meta.command)?;
    writeln!(out, "generated_at: {}", envelope.meta.generated_at)?;
    writeln!(out, "warehouse   : {}", envelope.meta.db_path)?;
    let aggregates = if envelope.meta.exclude_aggregates {
        "excluded"
    } else {
        "included"
    };
    writeln!(out, "aggregates  : {aggregates}")?;
    writeln!(out, "latency_ms  : {}", envelope.meta.latency_ms)?;

    if !envelope.meta.warnings.is_empty() {
        writeln!(out, "warnings:")?;
        for warning in &envelope.meta.warnings {
            writeln!(out, "  - {warning}")?;
        }
    }

    match tabulate(&envelope.data) {
        Some((header, rows)) => {
            for line in format_table(&header, &rows) {
                writeln!(out, "{line}")?;
            }
        }
        None => {
            writeln!(out, "data:")?;
            for line in serde_json::to_string_pretty(&envelope.data)?.lines() {
                writeln!(out, "  {line}")?;
            }
        }
    }
    Ok(())
}

/// Header and cells for report rows or a SQL result; `None` for anything else.
fn tabulate(data: &Value) -> Option<(Vec<String>, Vec<Vec<String>>)> {
    if let Some(rows) = data.as_array() {
        let first = rows.first()?.as_object()?;
        let header: Vec<String> = first.keys().cloned().collect();
        let cells = rows
            .iter()
            .filter_map(Value::as_object)
            .map(|row| header.iter().map(|key| cell(row.get(key))).collect())
            .collect();
        return Some((header, cells));
    }

    let object = data.as_object()?;
    let header = sql_columns(object)?;
    let cells = object
        .get("rows")?
        .as_array()?
        .iter()
        .filter_map(Value::as_array)
        .map(|row| row.iter().map(|value| cell(Some(value))).collect())
        .collect();
    Some((header, cells))
}

fn sql_columns(object: &Map<String, Value>) -> Option<Vec<String>> {
    object
        .get("columns")?
        .as_array()?
        .iter()
        .map(|column| column.get("name")?.as_str().map(ToString::to_string))
        .collect()
}

fn cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::from("null"),
        Some(Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
    }
}

fn format_table(header: &[String], rows: &[Vec<String>]) -> Vec<String> {
    let mut widths: Vec<usize> = header.iter().map(|name| name.chars().count()).collect();
    for row in rows {
        for (width, value) in widths.iter_mut().zip(row) {
            *width = (*width).max(value.chars().count());
        }
    }

    let line = |values: &[String]| {
        values
            .iter()
            .zip(&widths)
            .map(|(value, &width)| format!("{value:<width$}"))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let mut lines = Vec::with_capacity(rows.len() + 2);
    lines.push(line(header));
    lines.push(
        widths
            .iter()
            .map(|width| "-".repeat(*width))
            .collect::<Vec<_>>()
            .join("  "),
    );
    lines.extend(rows.iter().map(|row| line(row)));
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_rows_become_aligned_columns() {
        let data = json!([
            { "location": "Chile", "death_percentage": 2.5 },
            { "location": "Peru", "death_percentage": null },
        ]);

        let (header, rows) = tabulate(&data).expect("table");
        let lines = format_table(&header, &rows);

        assert_eq!(header, vec!["death_percentage", "location"]);
        assert_eq!(lines[2], "2.5               Chile");
        assert_eq!(lines[3], "null              Peru");
    }

    #[test]
    fn sql_results_use_their_column_names() {
        let data = json!({
            "columns": [{ "name": "n", "type": "BIGINT" }],
            "rows": [[1], [2]],
            "row_count": 2,
            "truncated": false,
        });

        let (header, rows) = tabulate(&data).expect("table");
        assert_eq!(header, vec!["n"]);
        assert_eq!(rows, vec![vec!["1"], vec!["2"]]);
    }

    #[test]
    fn nested_summaries_fall_back_to_json() {
        assert!(tabulate(&json!({ "daily": [], "overall": {} })).is_none());
        assert!(tabulate(&json!([])).is_none());
    }
}
