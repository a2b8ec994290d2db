mod global;
mod overview;
mod rank;
mod rates;
mod refresh;
mod rolling;
mod sql;

use std::time::Instant;

use epimetrics_core::ReportOptions;
use epimetrics_warehouse::{Warehouse, WarehouseConfig};
use serde::Serialize;
use serde_json::Value;
use time::OffsetDateTime;
use tracing::debug;
use uuid::Uuid;

use crate::cli::{Cli, Command};
use crate::error::CliError;

pub struct CommandResult {
    pub data: Value,
    pub warnings: Vec<String>,
    /// Aggregate-row policy the data was built with, when it differs from
    /// this invocation's flag (a stored snapshot).
    pub exclude_aggregates: Option<bool>,
}

impl CommandResult {
    pub fn ok(data: Value) -> Self {
        Self {
            data,
            warnings: Vec::new(),
            exclude_aggregates: None,
        }
    }

    pub fn built_with(mut self, exclude_aggregates: bool) -> Self {
        self.exclude_aggregates = Some(exclude_aggregates);
        self
    }

    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }
}

/// Metadata printed alongside every report.
#[derive(Debug, Serialize)]
pub struct ReportMeta {
    pub request_id: String,
    pub command: &'static str,
    #[serde(with = "time::serde::rfc3339")]
    pub generated_at: OffsetDateTime,
    pub db_path: String,
    pub exclude_aggregates: bool,
    pub latency_ms: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ReportEnvelope {
    pub meta: ReportMeta,
    pub data: Value,
}

pub fn run(cli: &Cli) -> Result<ReportEnvelope, CliError> {
    let warehouse = open_warehouse(cli)?;
    let base = warehouse.report_options();
    let exclude_aggregates = base.exclude_aggregates;
    let started = Instant::now();

    let command_result = match &cli.command {
        Command::Overview(args) => overview::run(&warehouse, args, base)?,
        Command::DeathRate(args) => rates::run_death_rate(&warehouse, args, base)?,
        Command::InfectionRate(args) => rates::run_infection_rate(&warehouse, args, base)?,
        Command::Rank(args) => rank::run(&warehouse, args, &base)?,
        Command::Global(args) => global::run(&warehouse, args, &base)?,
        Command::Rolling(args) => rolling::run(&warehouse, args)?,
        Command::Refresh => refresh::run(&warehouse)?,
        Command::Sql(args) => sql::run(&warehouse, args)?,
    };

    let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
    let CommandResult {
        data,
        warnings,
        exclude_aggregates: built_with,
    } = command_result;
    debug!(
        command = command_name(&cli.command),
        latency_ms,
        warnings = warnings.len(),
        "command finished"
    );

    Ok(ReportEnvelope {
        meta: ReportMeta {
            request_id: Uuid::new_v4().to_string(),
            command: command_name(&cli.command),
            generated_at: OffsetDateTime::now_utc(),
            db_path: warehouse.db_path().display().to_string(),
            exclude_aggregates: built_with.unwrap_or(exclude_aggregates),
            latency_ms,
            warnings,
        },
        data,
    })
}

fn open_warehouse(cli: &Cli) -> Result<Warehouse, CliError> {
    let mut config = match &cli.db_path {
        Some(path) => WarehouseConfig::for_db_path(path.clone()),
        None => WarehouseConfig::default(),
    };
    config.exclude_aggregates = !cli.include_aggregates;
    Ok(Warehouse::open(config)?)
}

const fn command_name(command: &Command) -> &'static str {
    match command {
        Command::Overview(_) => "overview",
        Command::DeathRate(_) => "death-rate",
        Command::InfectionRate(_) => "infection-rate",
        Command::Rank(_) => "rank",
        Command::Global(_) => "global",
        Command::Rolling(_) => "rolling",
        Command::Refresh => "refresh",
        Command::Sql(_) => "sql",
    }
}

/// Apply the location filter from the command line, if any.
fn filtered(base: ReportOptions, location: Option<&str>) -> ReportOptions {
    match location {
        Some(pattern) => base.with_location_filter(pattern),
        None => base,
    }
}

/// Serialize report rows, keeping at most `limit` of them.
fn rows_result<T: Serialize>(
    mut rows: Vec<T>,
    limit: Option<usize>,
) -> Result<CommandResult, CliError> {
    let total = rows.len();
    if let Some(limit) = limit {
        rows.truncate(limit);
    }

    let mut result = CommandResult::ok(serde_json::to_value(&rows)?);
    if total == 0 {
        result = result.with_warning("no rows matched");
    } else if rows.len() < total {
        result = result.with_warning(format!(
            "showing {} of {total} rows (use --limit to change)",
            rows.len()
        ));
    }
    Ok(result)
}

/// Warn about rows whose percentage fell on a zero denominator.
fn null_rate_warning(null_rows: usize, denominator: &str) -> Option<String> {
    (null_rows > 0)
        .then(|| format!("{null_rows} rows have zero {denominator}; their percentage is null"))
}
