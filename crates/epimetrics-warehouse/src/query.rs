//! Ad-hoc SQL over the warehouse tables and rolling artifacts.
//!
//! Without `allow_write` the text must hold exactly one statement, and that
//! statement must open with a read keyword. Rows are converted to JSON as they
//! stream, up to `max_rows`, and the run fails once `timeout_ms` has passed.

use std::time::{Duration, Instant};

use ::duckdb::types::{TimeUnit, Value as DuckValue};
use ::duckdb::{Connection, Statement};
use serde::Serialize;
use serde_json::{Number, Value};
use time::format_description::well_known::Rfc3339;
use time::{Date, Duration as Days, OffsetDateTime};
use tracing::debug;

use crate::WarehouseError;

/// Keywords that open a statement allowed in read-only mode.
const READ_KEYWORDS: &[&str] = &[
    "SELECT", "WITH", "FROM", "VALUES", "TABLE", "DESCRIBE", "SUMMARIZE", "SHOW", "EXPLAIN",
];

/// Bounds on one ad-hoc query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SqlLimits {
    pub max_rows: usize,
    pub timeout_ms: u64,
}

impl Default for SqlLimits {
    fn default() -> Self {
        Self {
            max_rows: 10_000,
            timeout_ms: 5_000,
        }
    }
}

/// Column name and `DuckDB` type of a result column.
#[derive(Debug, Clone, Serialize)]
pub struct SqlColumn {
    pub name: String,
    #[serde(rename = "type")]
    pub r#type: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryResult {
    pub columns: Vec<SqlColumn>,
    pub rows: Vec<Vec<Value>>,
    pub row_count: usize,
    /// More rows were available than `max_rows`.
    pub truncated: bool,
}

/// Validate, classify, and run `sql`.
pub(crate) fn execute(
    connection: &Connection,
    sql: &str,
    limits: SqlLimits,
    allow_write: bool,
) -> Result<QueryResult, WarehouseError> {
    if limits.max_rows == 0 || limits.timeout_ms == 0 {
        return Err(rejected("max_rows and timeout_ms must be greater than zero"));
    }

    let statements = split_statements(sql);
    let [single] = statements.as_slice() else {
        if statements.is_empty() {
            return Err(rejected("query must not be empty"));
        }
        if !allow_write {
            return Err(rejected(
                "read-only mode runs one statement at a time; use --write for scripts",
            ));
        }
        return run_batch(connection, &statements.join(";\n"), limits);
    };

    if opens_with_read_keyword(single) {
        run_read(connection, single, limits)
    } else if allow_write {
        run_batch(connection, single, limits)
    } else {
        Err(rejected(
            "read-only mode accepts SELECT-style queries only; use --write to modify the warehouse",
        ))
    }
}

fn rejected(reason: &str) -> WarehouseError {
    WarehouseError::QueryRejected(reason.to_string())
}

/// Statements of `sql`, split on `;` outside quoted text, blanks dropped.
fn split_statements(sql: &str) -> Vec<&str> {
    let mut statements = Vec::new();
    let mut quote = None;
    let mut start = 0;
    for (index, character) in sql.char_indices() {
        match (quote, character) {
            (Some(open), _) if character == open => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => quote = Some(character),
            (None, ';') => {
                statements.push(&sql[start..index]);
                start = index + 1;
            }
            (None, _) => {}
        }
    }
    statements.push(&sql[start..]);
    statements
        .into_iter()
        .map(str::trim)
        .filter(|statement| !statement.is_empty())
        .collect()
}

fn opens_with_read_keyword(statement: &str) -> bool {
    let keyword: String = statement
        .trim_start_matches(|c: char| c == '(' || c.is_whitespace())
        .chars()
        .take_while(char::is_ascii_alphabetic)
        .collect::<String>()
        .to_ascii_uppercase();
    READ_KEYWORDS.contains(&keyword.as_str())
}

/// Wall-clock budget for one query.
struct Deadline {
    started: Instant,
    budget: Duration,
}

impl Deadline {
    fn start(limits: SqlLimits) -> Self {
        Self {
            started: Instant::now(),
            budget: Duration::from_millis(limits.timeout_ms),
        }
    }

    fn check(&self) -> Result<(), WarehouseError> {
        if self.started.elapsed() <= self.budget {
            return Ok(());
        }
        Err(WarehouseError::QueryTimeout {
            timeout_ms: u64::try_from(self.budget.as_millis()).unwrap_or(u64::MAX),
        })
    }
}

fn run_batch(
    connection: &Connection,
    sql: &str,
    limits: SqlLimits,
) -> Result<QueryResult, WarehouseError> {
    let deadline = Deadline::start(limits);
    connection.execute_batch(sql)?;
    deadline.check()?;
    debug!("write statement applied");
    Ok(QueryResult {
        columns: Vec::new(),
        rows: Vec::new(),
        row_count: 0,
        truncated: false,
    })
}

fn run_read(
    connection: &Connection,
    sql: &str,
    limits: SqlLimits,
) -> Result<QueryResult, WarehouseError> {
    let deadline = Deadline::start(limits);
    let mut statement = connection.prepare(sql)?;
    let mut cursor = statement.query([])?;
    let columns = cursor.as_ref().map(describe_columns).unwrap_or_default();

    let mut rows = Vec::new();
    let mut truncated = false;
    while let Some(row) = cursor.next()? {
        deadline.check()?;
        if rows.len() == limits.max_rows {
            truncated = true;
            break;
        }
        let cells = (0..columns.len())
            .map(|index| row.get::<_, DuckValue>(index).map(json_cell))
            .collect::<Result<Vec<_>, _>>()?;
        rows.push(cells);
    }
    deadline.check()?;

    debug!(rows = rows.len(), truncated, "read query finished");
    Ok(QueryResult {
        columns,
        row_count: rows.len(),
        rows,
        truncated,
    })
}

fn describe_columns(statement: &Statement<'_>) -> Vec<SqlColumn> {
    (0..statement.column_count())
        .map(|index| SqlColumn {
            name: statement
                .column_name(index)
                .map_or_else(|_| format!("column_{index}"), ToString::to_string),
            r#type: statement.column_type(index).to_string(),
        })
        .collect()
}

/// JSON form of a cell. Counts stay numbers, dates and timestamps become ISO
/// text, and anything unexpected falls back to its debug form.
fn json_cell(value: DuckValue) -> Value {
    match value {
        DuckValue::Null => Value::Null,
        DuckValue::Boolean(flag) => Value::Bool(flag),
        DuckValue::TinyInt(count) => Value::from(count),
        DuckValue::SmallInt(count) => Value::from(count),
        DuckValue::Int(count) => Value::from(count),
        DuckValue::BigInt(count) => Value::from(count),
        DuckValue::UTinyInt(count) => Value::from(count),
        DuckValue::USmallInt(count) => Value::from(count),
        DuckValue::UInt(count) => Value::from(count),
        DuckValue::UBigInt(count) => Value::from(count),
        // `SUM` over BIGINT widens to HUGEINT.
        DuckValue::HugeInt(count) => {
            i64::try_from(count).map_or_else(|_| Value::String(count.to_string()), Value::from)
        }
        DuckValue::Float(rate) => finite(f64::from(rate)),
        DuckValue::Double(rate) => finite(rate),
        DuckValue::Text(text) => Value::String(text),
        DuckValue::Date32(days) => epoch_date(days)
            .map_or(Value::Null, |date| Value::String(date.to_string())),
        DuckValue::Timestamp(unit, ticks) => timestamp(unit, ticks)
            .map_or(Value::Null, Value::String),
        other => Value::String(format!("{other:?}")),
    }
}

/// NaN and infinities have no JSON form.
fn finite(rate: f64) -> Value {
    Number::from_f64(rate).map_or(Value::Null, Value::Number)
}

fn epoch_date(days: i32) -> Option<Date> {
    Date::from_ordinal_date(1970, 1)
        .ok()?
        .checked_add(Days::days(i64::from(days)))
}

fn timestamp(unit: TimeUnit, ticks: i64) -> Option<String> {
    let nanos = i128::from(ticks)
        * match unit {
            TimeUnit::Second => 1_000_000_000,
            TimeUnit::Millisecond => 1_000_000,
            TimeUnit::Microsecond => 1_000,
            TimeUnit::Nanosecond => 1,
        };
    OffsetDateTime::from_unix_timestamp_nanos(nanos)
        .ok()?
        .format(&Rfc3339)
        .ok()
}
