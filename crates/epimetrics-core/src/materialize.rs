//! Named, re-readable artifacts over the rolling accumulator.
//!
//! An artifact is the accumulator applied to a [`SeriesSource`] plus a caching
//! decision. [`SnapshotArtifact`] computes eagerly and serves the stored
//! result until [`SnapshotArtifact::refresh`] runs again; [`LazyArtifact`]
//! recomputes on every read.

use std::sync::{Arc, PoisonError, RwLock};

use serde::Serialize;
use tracing::info;

use crate::rolling::rolling_vaccinations;
use crate::{CaseRecord, MetricsError, ReportOptions, RollingVaccinationRow, VaccinationRecord};

/// Where the two input series are read from.
pub trait SeriesSource {
    type Error: From<MetricsError>;

    fn case_records(&self) -> Result<Vec<CaseRecord>, Self::Error>;

    fn vaccination_records(&self) -> Result<Vec<VaccinationRecord>, Self::Error>;
}

impl<S: SeriesSource + ?Sized> SeriesSource for &S {
    type Error = S::Error;

    fn case_records(&self) -> Result<Vec<CaseRecord>, Self::Error> {
        (**self).case_records()
    }

    fn vaccination_records(&self) -> Result<Vec<VaccinationRecord>, Self::Error> {
        (**self).vaccination_records()
    }
}

/// Both series held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemorySeries {
    pub cases: Vec<CaseRecord>,
    pub vaccinations: Vec<VaccinationRecord>,
}

impl SeriesSource for InMemorySeries {
    type Error = MetricsError;

    fn case_records(&self) -> Result<Vec<CaseRecord>, MetricsError> {
        Ok(self.cases.clone())
    }

    fn vaccination_records(&self) -> Result<Vec<VaccinationRecord>, MetricsError> {
        Ok(self.vaccinations.clone())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Materialization {
    /// Stored result, recomputed only on explicit refresh.
    Eager,
    /// Recomputed on every read.
    Lazy,
}

/// Read access shared by every rolling vaccination artifact.
pub trait RollingArtifact {
    type Error;

    fn name(&self) -> &str;

    fn materialization(&self) -> Materialization;

    fn read_all(&self) -> Result<Vec<RollingVaccinationRow>, Self::Error>;

    fn read_location(&self, location: &str) -> Result<Vec<RollingVaccinationRow>, Self::Error> {
        let mut rows = self.read_all()?;
        rows.retain(|row| row.location == location);
        Ok(rows)
    }
}

fn compute<S: SeriesSource>(
    source: &S,
    options: &ReportOptions,
) -> Result<Vec<RollingVaccinationRow>, S::Error> {
    let cases = source.case_records()?;
    let vaccinations = source.vaccination_records()?;
    Ok(rolling_vaccinations(&cases, &vaccinations, options)?)
}

pub struct LazyArtifact<S> {
    name: String,
    source: S,
    options: ReportOptions,
}

impl<S: SeriesSource> LazyArtifact<S> {
    pub fn new(name: impl Into<String>, source: S, options: ReportOptions) -> Self {
        Self {
            name: name.into(),
            source,
            options,
        }
    }
}

impl<S: SeriesSource> RollingArtifact for LazyArtifact<S> {
    type Error = S::Error;

    fn name(&self) -> &str {
        &self.name
    }

    fn materialization(&self) -> Materialization {
        Materialization::Lazy
    }

    fn read_all(&self) -> Result<Vec<RollingVaccinationRow>, S::Error> {
        compute(&self.source, &self.options)
    }
}

pub struct SnapshotArtifact<S> {
    name: String,
    source: S,
    options: ReportOptions,
    snapshot: RwLock<Arc<Vec<RollingVaccinationRow>>>,
}

impl<S: SeriesSource> SnapshotArtifact<S> {
    /// Compute the first snapshot immediately.
    pub fn materialize(
        name: impl Into<String>,
        source: S,
        options: ReportOptions,
    ) -> Result<Self, S::Error> {
        let rows = compute(&source, &options)?;
        Ok(Self {
            name: name.into(),
            source,
            options,
            snapshot: RwLock::new(Arc::new(rows)),
        })
    }

    /// Recompute from the source and swap the stored snapshot.
    ///
    /// Readers holding the previous snapshot keep it; a failed recompute
    /// leaves the stored snapshot untouched.
    pub fn refresh(&self) -> Result<usize, S::Error> {
        let rows = Arc::new(compute(&self.source, &self.options)?);
        let row_count = rows.len();
        *self
            .snapshot
            .write()
            .unwrap_or_else(PoisonError::into_inner) = rows;
        info!(artifact = %self.name, rows = row_count, "snapshot refreshed");
        Ok(row_count)
    }

    /// The stored rows, shared without copying.
    pub fn snapshot(&self) -> Arc<Vec<RollingVaccinationRow>> {
        let guard = self.snapshot.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&*guard)
    }
}

impl<S: SeriesSource> RollingArtifact for SnapshotArtifact<S> {
    type Error = S::Error;

    fn name(&self) -> &str {
        &self.name
    }

    fn materialization(&self) -> Materialization {
        Materialization::Eager
    }

    fn read_all(&self) -> Result<Vec<RollingVaccinationRow>, S::Error> {
        Ok(self.snapshot().as_ref().clone())
    }

    fn read_location(&self, location: &str) -> Result<Vec<RollingVaccinationRow>, S::Error> {
        Ok(self
            .snapshot()
            .iter()
            .filter(|row| row.location == location)
            .cloned()
            .collect())
    }
}
