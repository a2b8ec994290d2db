//! CLI argument definitions for epimetrics.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `overview` | Case overview per location and date |
//! | `death-rate` | Deaths as a percentage of cases |
//! | `infection-rate` | Cases as a percentage of population |
//! | `rank` | Rank locations or continents by infections or deaths |
//! | `global` | Daily and overall global numbers |
//! | `rolling` | Read a rolling vaccination artifact |
//! | `refresh` | Rebuild the eager rolling vaccination snapshot |
//! | `sql` | Query the DuckDB warehouse |
//!
//! # Global Options
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `--db-path` | `$EPIMETRICS_HOME/warehouse.duckdb` | Warehouse file |
//! | `--include-aggregates` | `false` | Keep World/continent aggregate rows |
//! | `--format` | `json` | Output format (json, ndjson, table) |
//! | `--pretty` | `false` | Pretty-print JSON output |
//! | `--strict` | `false` | Treat warnings as errors |
//! | `-v` | off | Debug logging on stderr |
//!
//! # Examples
//!
//! ```bash
//! epimetrics death-rate --location states --pretty
//! epimetrics rank deaths --limit 10 --format table
//! epimetrics refresh
//! epimetrics rolling --source snapshot --location Canada
//! epimetrics sql "SELECT * FROM vw_percent_population_vaccinated LIMIT 5"
//! ```

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use epimetrics_warehouse::RollingSource;

/// Epimetrics - case, death and vaccination analytics over a DuckDB warehouse
#[derive(Debug, Parser)]
#[command(
    name = "epimetrics",
    author,
    version,
    about = "Case, death and vaccination analytics",
    long_about = "Epimetrics computes death and infection rates, rankings, global numbers and \
rolling vaccination totals from the covid_deaths and covid_vaccinations tables of a local \
DuckDB warehouse.\n\
\n\
Use 'epimetrics <command> --help' for command-specific help."
)]
pub struct Cli {
    /// Path to the warehouse database file.
    #[arg(long, global = true)]
    pub db_path: Option<PathBuf>,

    /// Keep rows with no continent (World, European Union, ...) in every report.
    #[arg(long, global = true, default_value_t = false)]
    pub include_aggregates: bool,

    /// Output format for results.
    ///
    /// - json: Single JSON object (default)
    /// - ndjson: Metadata line, then one JSON object per row
    /// - table: Aligned text columns
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Json)]
    pub format: OutputFormat,

    /// Pretty-print JSON output with indentation.
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    /// Treat warnings as failures (exit code 5).
    #[arg(long, global = true, default_value_t = false)]
    pub strict: bool,

    /// Log debug events to stderr. Overrides RUST_LOG.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Aligned text columns for terminal display.
    Table,
    /// Single JSON object output.
    Json,
    /// Newline-delimited JSON.
    Ndjson,
}

/// Available CLI commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Case overview: cases, deaths and population per location and date.
    Overview(FilterArgs),

    /// Deaths as a percentage of total cases, per location and date.
    ///
    /// Days with zero cases report a null percentage.
    ///
    /// # Examples
    ///
    ///   epimetrics death-rate
    ///   epimetrics death-rate --location states
    DeathRate(FilterArgs),

    /// Total cases as a percentage of population, per location and date.
    InfectionRate(FilterArgs),

    /// Rank locations or continents.
    Rank(RankArgs),

    /// Daily and overall sums of new cases and new deaths.
    Global(GlobalArgs),

    /// Read a rolling vaccination artifact.
    ///
    /// # Examples
    ///
    ///   epimetrics rolling
    ///   epimetrics rolling --source view --location Albania
    Rolling(RollingArgs),

    /// Rebuild the eager rolling vaccination snapshot.
    Refresh,

    /// Run SQL queries against the DuckDB warehouse.
    ///
    /// Only SELECT and CTE queries are allowed unless --write is given.
    Sql(SqlArgs),
}

/// Arguments shared by the per-row reports.
#[derive(Debug, Args)]
pub struct FilterArgs {
    /// Keep locations containing this text (case-insensitive).
    #[arg(long)]
    pub location: Option<String>,

    /// Return at most this many rows.
    #[arg(long)]
    pub limit: Option<usize>,
}

/// Arguments for the `rank` command.
#[derive(Debug, Args)]
pub struct RankArgs {
    /// What to rank.
    #[arg(value_enum)]
    pub by: RankBy,

    /// Return at most this many rows.
    #[arg(long)]
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RankBy {
    /// Locations by highest infection count relative to population.
    Infection,
    /// Locations by highest total deaths.
    Deaths,
    /// Continents by highest total deaths.
    Continents,
}

/// Arguments for the `global` command.
#[derive(Debug, Args)]
pub struct GlobalArgs {
    /// Only print the overall totals.
    #[arg(long, default_value_t = false)]
    pub overall: bool,
}

/// Arguments for the `rolling` command.
#[derive(Debug, Args)]
pub struct RollingArgs {
    /// Which artifact to read.
    #[arg(long, value_enum, default_value_t = RollingSourceArg::Snapshot)]
    pub source: RollingSourceArg,

    /// Exact location to read.
    #[arg(long)]
    pub location: Option<String>,

    /// Return at most this many rows.
    #[arg(long)]
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RollingSourceArg {
    /// Stored table, current as of the last `refresh`.
    Snapshot,
    /// SQL view, recomputed on every read.
    View,
    /// In-process engine over freshly loaded series.
    Engine,
}

impl From<RollingSourceArg> for RollingSource {
    fn from(value: RollingSourceArg) -> Self {
        match value {
            RollingSourceArg::Snapshot => Self::Snapshot,
            RollingSourceArg::View => Self::View,
            RollingSourceArg::Engine => Self::Engine,
        }
    }
}

/// Arguments for the `sql` command.
#[derive(Debug, Args)]
pub struct SqlArgs {
    /// SQL query to execute.
    pub query: String,

    /// Allow write operations (INSERT, UPDATE, DELETE, CREATE, etc.).
    #[arg(long, default_value_t = false)]
    pub write: bool,

    /// Maximum number of rows to return.
    #[arg(long, default_value_t = 10_000)]
    pub max_rows: usize,

    /// Query timeout in milliseconds.
    #[arg(long, default_value_t = 5_000)]
    pub query_timeout_ms: u64,
}
