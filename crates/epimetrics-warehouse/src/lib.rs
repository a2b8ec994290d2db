//! # Epimetrics Warehouse
//!
//! DuckDB-backed home for the case/death and vaccination series, and the two
//! named rolling vaccination artifacts built from them.
//!
//! ## Tables
//!
//! | Table | Description |
//! |-------|-------------|
//! | `covid_deaths` | Case/death series, one row per (location, date) |
//! | `covid_vaccinations` | Vaccination series, one row per (location, date) |
//! | `percent_population_vaccinated` | Eager rolling artifact, rebuilt by [`Warehouse::refresh_rolling_snapshot`] |
//! | `materialization_log` | One row per snapshot refresh |
//!
//! ## Views
//!
//! | View | Description |
//! |------|-------------|
//! | `vw_percent_population_vaccinated` | Lazy rolling artifact, recomputed on every read |
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use epimetrics_warehouse::{RollingSource, Warehouse};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let warehouse = Warehouse::open_default()?;
//!     warehouse.refresh_rolling_snapshot()?;
//!
//!     let rows = warehouse.read_rolling(RollingSource::Snapshot, Some("Canada"))?;
//!     println!("{} rows for Canada", rows.len());
//!     Ok(())
//! }
//! ```
//!
//! Reports (rates, rankings, global numbers) load the typed series and run the
//! `epimetrics-core` engine, so the zero-denominator and null policies are the
//! same everywhere.

pub mod error;
pub mod load;
pub mod pool;
pub mod query;
pub mod schema;
pub mod snapshot;
pub mod views;

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use ::duckdb::types::Value as DuckValue;
use ::duckdb::{params, Connection};
use epimetrics_core::{
    case_overview, continent_death_ranking, death_ranking, death_rates, global_numbers,
    infection_ranking, infection_rates, parse_date, CaseOverviewRow, CaseRecord,
    ContinentDeathRow, DeathRankingRow, DeathRateRow, GlobalNumbers, InfectionRankingRow,
    InfectionRateRow, LazyArtifact, LocationDate, Materialization, ReportOptions,
    RollingArtifact, RollingVaccinationRow, SeriesSource, VaccinationRecord,
};
use serde::Serialize;
use tracing::info;

pub use error::WarehouseError;
pub use load::count_from_value;
pub use pool::{ConnectionPool, PooledConnection};
pub use query::{QueryResult, SqlColumn, SqlLimits};
pub use snapshot::{SnapshotStatus, SNAPSHOT_TABLE};
pub use views::ROLLING_VIEW;

/// Name of the in-process artifact that runs the engine on every read.
pub const ENGINE_ARTIFACT: &str = "engine_percent_population_vaccinated";

/// Configuration for the warehouse database.
#[derive(Debug, Clone)]
pub struct WarehouseConfig {
    /// Root directory for epimetrics data.
    pub home: PathBuf,
    /// Path to the `DuckDB` database file.
    pub db_path: PathBuf,
    /// Maximum number of idle connections kept in the pool.
    pub max_pool_size: usize,
    /// Drop rows with a null continent from every report and artifact.
    pub exclude_aggregates: bool,
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        let home = resolve_epimetrics_home();
        let db_path = home.join("warehouse.duckdb");
        Self {
            home,
            db_path,
            max_pool_size: 4,
            exclude_aggregates: true,
        }
    }
}

impl WarehouseConfig {
    /// Default settings pointed at an explicit database file.
    pub fn for_db_path(db_path: impl Into<PathBuf>) -> Self {
        let db_path = db_path.into();
        let home = db_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Self {
            home,
            db_path,
            ..Self::default()
        }
    }
}

/// Which rolling vaccination artifact to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RollingSource {
    /// The stored `percent_population_vaccinated` table.
    Snapshot,
    /// The `vw_percent_population_vaccinated` view.
    View,
    /// The Rust engine over freshly loaded series.
    Engine,
}

impl RollingSource {
    pub const fn artifact_name(self) -> &'static str {
        match self {
            Self::Snapshot => SNAPSHOT_TABLE,
            Self::View => ROLLING_VIEW,
            Self::Engine => ENGINE_ARTIFACT,
        }
    }
}

/// The warehouse holding the source series and rolling artifacts.
#[derive(Clone)]
pub struct Warehouse {
    config: WarehouseConfig,
    pool: ConnectionPool,
}

impl Warehouse {
    /// Open a warehouse with default configuration.
    pub fn open_default() -> Result<Self, WarehouseError> {
        Self::open(WarehouseConfig::default())
    }

    /// Open a warehouse with the specified configuration.
    pub fn open(config: WarehouseConfig) -> Result<Self, WarehouseError> {
        if let Some(parent) = config.db_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let pool = ConnectionPool::open(config.db_path.clone(), config.max_pool_size)?;
        let warehouse = Self { config, pool };
        warehouse.initialize()?;
        info!(
            path = %warehouse.db_path().display(),
            exclude_aggregates = warehouse.config.exclude_aggregates,
            "warehouse ready"
        );
        Ok(warehouse)
    }

    /// Declare missing tables and (re)create the lazy view.
    pub fn initialize(&self) -> Result<(), WarehouseError> {
        let connection = self.pool.acquire()?;
        schema::ensure_tables(&connection)?;
        views::create_views(&connection, self.config.exclude_aggregates)?;
        Ok(())
    }

    pub fn db_path(&self) -> &Path {
        self.pool.db_path()
    }

    pub fn config(&self) -> &WarehouseConfig {
        &self.config
    }

    /// Report options matching this warehouse's aggregate-row policy.
    pub fn report_options(&self) -> ReportOptions {
        ReportOptions {
            exclude_aggregates: self.config.exclude_aggregates,
            location_filter: None,
        }
    }

    /// Run ad-hoc SQL within `limits`.
    ///
    /// # Security
    /// Only one read statement runs unless `allow_write` is true.
    pub fn execute_query(
        &self,
        sql: &str,
        limits: SqlLimits,
        allow_write: bool,
    ) -> Result<QueryResult, WarehouseError> {
        let connection = self.pool.acquire()?;
        query::execute(&connection, sql, limits, allow_write)
    }

    pub fn load_case_records(&self) -> Result<Vec<CaseRecord>, WarehouseError> {
        let connection = self.pool.acquire()?;
        load::load_case_records(&connection)
    }

    pub fn load_vaccination_records(&self) -> Result<Vec<VaccinationRecord>, WarehouseError> {
        let connection = self.pool.acquire()?;
        load::load_vaccination_records(&connection)
    }

    pub fn case_overview(
        &self,
        options: &ReportOptions,
    ) -> Result<Vec<CaseOverviewRow>, WarehouseError> {
        Ok(case_overview(&self.load_case_records()?, options))
    }

    pub fn death_rates(
        &self,
        options: &ReportOptions,
    ) -> Result<Vec<DeathRateRow>, WarehouseError> {
        Ok(death_rates(&self.load_case_records()?, options))
    }

    pub fn infection_rates(
        &self,
        options: &ReportOptions,
    ) -> Result<Vec<InfectionRateRow>, WarehouseError> {
        Ok(infection_rates(&self.load_case_records()?, options))
    }

    pub fn infection_ranking(
        &self,
        options: &ReportOptions,
    ) -> Result<Vec<InfectionRankingRow>, WarehouseError> {
        Ok(infection_ranking(&self.load_case_records()?, options))
    }

    pub fn death_ranking(
        &self,
        options: &ReportOptions,
    ) -> Result<Vec<DeathRankingRow>, WarehouseError> {
        Ok(death_ranking(&self.load_case_records()?, options))
    }

    pub fn continent_death_ranking(
        &self,
        options: &ReportOptions,
    ) -> Result<Vec<ContinentDeathRow>, WarehouseError> {
        Ok(continent_death_ranking(&self.load_case_records()?, options))
    }

    pub fn global_numbers(&self, options: &ReportOptions) -> Result<GlobalNumbers, WarehouseError> {
        Ok(global_numbers(&self.load_case_records()?, options)?)
    }

    /// Rebuild the eager rolling artifact.
    pub fn refresh_rolling_snapshot(&self) -> Result<SnapshotStatus, WarehouseError> {
        let connection = self.pool.acquire()?;
        snapshot::refresh(&connection, self.config.exclude_aggregates)
    }

    /// Latest refresh of the eager artifact, if any.
    pub fn snapshot_status(&self) -> Result<Option<SnapshotStatus>, WarehouseError> {
        let connection = self.pool.acquire()?;
        snapshot::status(&connection)
    }

    /// Handle on one rolling vaccination artifact.
    pub fn rolling_artifact(&self, source: RollingSource) -> WarehouseArtifact<'_> {
        WarehouseArtifact {
            warehouse: self,
            source,
        }
    }

    /// Rows of a rolling artifact, ordered by location then date.
    pub fn read_rolling(
        &self,
        source: RollingSource,
        location: Option<&str>,
    ) -> Result<Vec<RollingVaccinationRow>, WarehouseError> {
        let artifact = self.rolling_artifact(source);
        match location {
            Some(location) => artifact.read_location(location),
            None => artifact.read_all(),
        }
    }

    fn read_stored_rolling(
        &self,
        relation: &'static str,
        location: Option<&str>,
    ) -> Result<Vec<RollingVaccinationRow>, WarehouseError> {
        let connection = self.pool.acquire()?;
        if relation == SNAPSHOT_TABLE && !schema::table_exists(&connection, SNAPSHOT_TABLE)? {
            return Err(WarehouseError::SnapshotMissing {
                artifact: SNAPSHOT_TABLE,
            });
        }
        // The view recomputes from the sources, so it rejects what the engine rejects.
        if relation == ROLLING_VIEW {
            load::validate_sources(&connection)?;
        }
        read_rolling_rows(&connection, relation, location)
    }
}

impl SeriesSource for Warehouse {
    type Error = WarehouseError;

    fn case_records(&self) -> Result<Vec<CaseRecord>, WarehouseError> {
        self.load_case_records()
    }

    fn vaccination_records(&self) -> Result<Vec<VaccinationRecord>, WarehouseError> {
        self.load_vaccination_records()
    }
}

/// A rolling vaccination artifact living in, or computed from, the warehouse.
pub struct WarehouseArtifact<'a> {
    warehouse: &'a Warehouse,
    source: RollingSource,
}

impl RollingArtifact for WarehouseArtifact<'_> {
    type Error = WarehouseError;

    fn name(&self) -> &str {
        self.source.artifact_name()
    }

    fn materialization(&self) -> Materialization {
        match self.source {
            RollingSource::Snapshot => Materialization::Eager,
            RollingSource::View | RollingSource::Engine => Materialization::Lazy,
        }
    }

    fn read_all(&self) -> Result<Vec<RollingVaccinationRow>, WarehouseError> {
        match self.source {
            RollingSource::Snapshot | RollingSource::View => self
                .warehouse
                .read_stored_rolling(self.source.artifact_name(), None),
            RollingSource::Engine => self.engine().read_all(),
        }
    }

    fn read_location(&self, location: &str) -> Result<Vec<RollingVaccinationRow>, WarehouseError> {
        match self.source {
            RollingSource::Snapshot | RollingSource::View => self
                .warehouse
                .read_stored_rolling(self.source.artifact_name(), Some(location)),
            RollingSource::Engine => self.engine().read_location(location),
        }
    }
}

impl<'a> WarehouseArtifact<'a> {
    fn engine(&self) -> LazyArtifact<&'a Warehouse> {
        LazyArtifact::new(
            ENGINE_ARTIFACT,
            self.warehouse,
            self.warehouse.report_options(),
        )
    }
}

/// Read rolling rows from the snapshot table or the lazy view.
///
/// `relation` is one of the two artifact names defined by this crate, never
/// caller input.
fn read_rolling_rows(
    connection: &Connection,
    relation: &'static str,
    location: Option<&str>,
) -> Result<Vec<RollingVaccinationRow>, WarehouseError> {
    let filter = if location.is_some() {
        "WHERE location = ?"
    } else {
        ""
    };
    let sql = format!(
        "SELECT continent, location, CAST(date AS VARCHAR), population, new_vaccinations, \
                rolling_people_vaccinated, vaccination_percentage \
         FROM {relation} \
         {filter} \
         ORDER BY location, date"
    );

    let mut statement = connection.prepare(sql.as_str())?;
    let mut rows = match location {
        Some(location) => statement.query(params![location])?,
        None => statement.query([])?,
    };

    let mut output = Vec::new();
    while let Some(row) = rows.next()? {
        let location: String = row.get(1)?;
        let date: String = row.get(2)?;
        let key = LocationDate::new(location, parse_date(&date)?);
        let new_vaccinations: DuckValue = row.get(4)?;

        output.push(RollingVaccinationRow {
            continent: row.get(0)?,
            population: row.get(3)?,
            new_vaccinations: count_from_value(new_vaccinations, "new_vaccinations", &key)?,
            rolling_people_vaccinated: row.get(5)?,
            vaccination_percentage: row.get(6)?,
            location: key.location,
            date: key.date,
        });
    }
    Ok(output)
}

/// Finalize a transaction, committing on success or rolling back on failure.
pub(crate) fn finalize_transaction<T>(
    connection: &Connection,
    result: Result<T, WarehouseError>,
) -> Result<T, WarehouseError> {
    match result {
        Ok(value) => {
            connection.execute_batch("COMMIT")?;
            Ok(value)
        }
        Err(error) => {
            let _ = connection.execute_batch("ROLLBACK");
            Err(error)
        }
    }
}

/// Resolve the epimetrics home directory from environment or default.
fn resolve_epimetrics_home() -> PathBuf {
    if let Some(path) = env::var_os("EPIMETRICS_HOME") {
        let path = PathBuf::from(path);
        if !path.as_os_str().is_empty() {
            return path;
        }
    }

    if let Some(home) = env::var_os("HOME") {
        return PathBuf::from(home).join(".epimetrics");
    }

    PathBuf::from(".epimetrics")
}
