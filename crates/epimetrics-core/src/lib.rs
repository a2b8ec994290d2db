//! Metrics engine for case/death and vaccination time series.
//!
//! This crate contains:
//! - Source records keyed by (location, date) and report options
//! - Rate calculators (death rate, infection rate) with a null sentinel for
//!   zero denominators
//! - Grouped aggregates (per-location and per-continent maxima, global sums)
//! - The rolling vaccination accumulator and its eager/lazy artifacts
//!
//! Nothing here touches storage; `epimetrics-warehouse` feeds these functions
//! from `DuckDB`.

pub mod aggregate;
pub mod coerce;
pub mod domain;
pub mod error;
pub mod materialize;
pub mod rate;
pub mod rolling;

pub use aggregate::{
    continent_death_ranking, death_ranking, global_numbers, infection_ranking, max_by_group,
    ContinentDeathRow, DeathRankingRow, GlobalDailyRow, GlobalNumbers, GlobalTotals,
    InfectionRankingRow,
};
pub use coerce::parse_count;
pub use domain::{
    parse_date, CaseRecord, LocationDate, ReportOptions, RollingVaccinationRow, VaccinationRecord,
};
pub use error::MetricsError;
pub use materialize::{
    InMemorySeries, LazyArtifact, Materialization, RollingArtifact, SeriesSource,
    SnapshotArtifact,
};
pub use rate::{
    case_overview, death_rates, infection_rates, percentage, percentage_of, CaseOverviewRow,
    DeathRateRow, InfectionRateRow,
};
pub use rolling::{accumulate, join_series, rolling_vaccinations, JoinedRow};
