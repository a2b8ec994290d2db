//! Rolling vaccination accumulator.
//!
//! The two series are inner-joined on (location, date), partitioned by
//! location, sorted by date inside each partition, and folded into a running
//! total. A null daily figure adds zero. Negative daily figures (upstream
//! corrections) are summed as-is, so the running total only stays
//! non-decreasing when the inputs are non-negative.

use std::collections::{BTreeMap, HashMap, HashSet};

use time::Date;
use tracing::debug;

use crate::rate::percentage;
use crate::{
    CaseRecord, LocationDate, MetricsError, ReportOptions, RollingVaccinationRow,
    VaccinationRecord,
};

/// A case row matched with its vaccination row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinedRow {
    pub continent: Option<String>,
    pub location: String,
    pub date: Date,
    pub population: i64,
    pub new_vaccinations: Option<i64>,
}

/// Inner join on (location, date).
///
/// Case rows the options do not admit are dropped before the join. A key that
/// appears twice in either series is rejected.
pub fn join_series(
    cases: &[CaseRecord],
    vaccinations: &[VaccinationRecord],
    options: &ReportOptions,
) -> Result<Vec<JoinedRow>, MetricsError> {
    let mut daily: HashMap<LocationDate, Option<i64>> =
        HashMap::with_capacity(vaccinations.len());
    for record in vaccinations {
        let key = record.key();
        if daily.contains_key(&key) {
            return Err(duplicate("covid_vaccinations", key));
        }
        daily.insert(key, record.new_vaccinations);
    }

    let mut seen: HashSet<LocationDate> = HashSet::with_capacity(cases.len());
    let mut joined = Vec::new();
    for record in cases {
        let key = record.key();
        if !seen.insert(key.clone()) {
            return Err(duplicate("covid_deaths", key));
        }
        if !options.admits(record) {
            continue;
        }
        if let Some(new_vaccinations) = daily.get(&key) {
            joined.push(JoinedRow {
                continent: record.continent.clone(),
                location: record.location.clone(),
                date: record.date,
                population: record.population,
                new_vaccinations: *new_vaccinations,
            });
        }
    }

    Ok(joined)
}

/// Running total of `new_vaccinations` per location, ordered by date.
///
/// Output is ordered by location, then date, whatever the input order. A
/// running total past `i64::MAX` fails with `MetricsError::Overflow`.
pub fn accumulate(rows: Vec<JoinedRow>) -> Result<Vec<RollingVaccinationRow>, MetricsError> {
    let total_rows = rows.len();
    let mut partitions: BTreeMap<String, Vec<JoinedRow>> = BTreeMap::new();
    for row in rows {
        partitions.entry(row.location.clone()).or_default().push(row);
    }
    debug!(
        partitions = partitions.len(),
        rows = total_rows,
        "accumulating rolling vaccinations"
    );

    let mut output = Vec::with_capacity(total_rows);
    for (_, mut partition) in partitions {
        partition.sort_by_key(|row| row.date);

        let mut running = 0_i64;
        for row in partition {
            running = running
                .checked_add(row.new_vaccinations.unwrap_or(0))
                .ok_or_else(|| MetricsError::Overflow {
                    column: "rolling_people_vaccinated",
                    scope: format!("{} on {}", row.location, row.date),
                })?;
            output.push(RollingVaccinationRow {
                vaccination_percentage: percentage(running, row.population),
                continent: row.continent,
                location: row.location,
                date: row.date,
                population: row.population,
                new_vaccinations: row.new_vaccinations,
                rolling_people_vaccinated: running,
            });
        }
    }

    Ok(output)
}

/// Join, partition, and accumulate in one pass.
pub fn rolling_vaccinations(
    cases: &[CaseRecord],
    vaccinations: &[VaccinationRecord],
    options: &ReportOptions,
) -> Result<Vec<RollingVaccinationRow>, MetricsError> {
    let joined = join_series(cases, vaccinations, options)?;
    accumulate(joined)
}

fn duplicate(series: &'static str, key: LocationDate) -> MetricsError {
    MetricsError::DuplicateKey {
        series,
        location: key.location,
        date: key.date.to_string(),
    }
}
