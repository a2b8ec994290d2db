//! Grouped reductions: per-group maxima and global sums.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use time::Date;

use crate::domain::iso_date;
use crate::rate::{percentage, percentage_of};
use crate::{CaseRecord, MetricsError, ReportOptions};

/// Maximum of `value` per `key`, ignoring rows where `value` is `None`.
///
/// A group whose values are all `None` is still present, with `None`.
pub fn max_by_group<T, K, FK, FV>(rows: &[T], key: FK, value: FV) -> BTreeMap<K, Option<i64>>
where
    K: Ord,
    FK: Fn(&T) -> K,
    FV: Fn(&T) -> Option<i64>,
{
    let mut groups: BTreeMap<K, Option<i64>> = BTreeMap::new();
    for row in rows {
        let slot = groups.entry(key(row)).or_insert(None);
        if let Some(candidate) = value(row) {
            *slot = Some(slot.map_or(candidate, |current| current.max(candidate)));
        }
    }
    groups
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InfectionRankingRow {
    pub location: String,
    pub population: i64,
    pub highest_infection_count: i64,
    pub percent_population_infected: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeathRankingRow {
    pub location: String,
    pub total_death_count: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContinentDeathRow {
    pub continent: String,
    pub total_death_count: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalDailyRow {
    #[serde(with = "iso_date")]
    pub date: Date,
    pub total_cases: i64,
    pub total_deaths: Option<i64>,
    pub death_percentage: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalTotals {
    pub total_cases: i64,
    pub total_deaths: Option<i64>,
    pub death_percentage: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalNumbers {
    pub daily: Vec<GlobalDailyRow>,
    pub overall: GlobalTotals,
}

/// Locations with the highest infection count relative to population.
pub fn infection_ranking(
    records: &[CaseRecord],
    options: &ReportOptions,
) -> Vec<InfectionRankingRow> {
    let selected = admitted(records, options);
    let maxima = max_by_group(
        &selected,
        |record| (record.location.clone(), record.population),
        |record| Some(record.total_cases),
    );

    let mut rows: Vec<_> = maxima
        .into_iter()
        .filter_map(|((location, population), highest)| {
            let highest = highest?;
            Some(InfectionRankingRow {
                location,
                population,
                highest_infection_count: highest,
                percent_population_infected: percentage(highest, population),
            })
        })
        .collect();
    rows.sort_by(|left, right| {
        descending_nulls_last(
            left.percent_population_infected,
            right.percent_population_infected,
        )
        .then_with(|| left.location.cmp(&right.location))
    });
    rows
}

/// Locations ordered by their highest reported death count.
pub fn death_ranking(records: &[CaseRecord], options: &ReportOptions) -> Vec<DeathRankingRow> {
    let selected = admitted(records, options);
    let maxima = max_by_group(
        &selected,
        |record| record.location.clone(),
        |record| record.total_deaths,
    );

    let mut rows: Vec<_> = maxima
        .into_iter()
        .map(|(location, total_death_count)| DeathRankingRow {
            location,
            total_death_count,
        })
        .collect();
    rows.sort_by(|left, right| {
        descending_nulls_last(left.total_death_count, right.total_death_count)
            .then_with(|| left.location.cmp(&right.location))
    });
    rows
}

/// Continents ordered by the highest death count among their rows.
///
/// Rows without a continent have no group here, whatever the options say.
pub fn continent_death_ranking(
    records: &[CaseRecord],
    options: &ReportOptions,
) -> Vec<ContinentDeathRow> {
    let selected: Vec<&CaseRecord> = admitted(records, options)
        .into_iter()
        .filter(|record| record.continent.is_some())
        .collect();
    let maxima = max_by_group(
        &selected,
        |record| record.continent.clone().unwrap_or_default(),
        |record| record.total_deaths,
    );

    let mut rows: Vec<_> = maxima
        .into_iter()
        .map(|(continent, total_death_count)| ContinentDeathRow {
            continent,
            total_death_count,
        })
        .collect();
    rows.sort_by(|left, right| {
        descending_nulls_last(left.total_death_count, right.total_death_count)
            .then_with(|| left.continent.cmp(&right.continent))
    });
    rows
}

/// New cases and new deaths summed across locations, per date and overall.
///
/// A sum past `i64::MAX` fails with `MetricsError::Overflow`.
pub fn global_numbers(
    records: &[CaseRecord],
    options: &ReportOptions,
) -> Result<GlobalNumbers, MetricsError> {
    let mut by_date: BTreeMap<Date, (i64, Option<i64>)> = BTreeMap::new();
    let mut overall = (0_i64, None::<i64>);

    for record in admitted(records, options) {
        let day = record.date.to_string();
        let daily = by_date.entry(record.date).or_insert((0, None));
        daily.0 = add_count(daily.0, record.new_cases, "new_cases", &day)?;
        daily.1 = add_nullable(daily.1, record.new_deaths, "new_deaths", &day)?;
        overall.0 = add_count(overall.0, record.new_cases, "new_cases", "all dates")?;
        overall.1 = add_nullable(overall.1, record.new_deaths, "new_deaths", "all dates")?;
    }

    let daily = by_date
        .into_iter()
        .map(|(date, (total_cases, total_deaths))| GlobalDailyRow {
            date,
            total_cases,
            total_deaths,
            death_percentage: percentage_of(total_deaths, total_cases),
        })
        .collect();

    Ok(GlobalNumbers {
        daily,
        overall: GlobalTotals {
            total_cases: overall.0,
            total_deaths: overall.1,
            death_percentage: percentage_of(overall.1, overall.0),
        },
    })
}

fn admitted<'a>(records: &'a [CaseRecord], options: &ReportOptions) -> Vec<&'a CaseRecord> {
    records.iter().filter(|record| options.admits(record)).collect()
}

fn add_count(
    acc: i64,
    value: i64,
    column: &'static str,
    scope: &str,
) -> Result<i64, MetricsError> {
    acc.checked_add(value).ok_or_else(|| MetricsError::Overflow {
        column,
        scope: scope.to_string(),
    })
}

// SQL SUM semantics: nulls are skipped, an all-null sum stays null.
fn add_nullable(
    acc: Option<i64>,
    value: Option<i64>,
    column: &'static str,
    scope: &str,
) -> Result<Option<i64>, MetricsError> {
    match (acc, value) {
        (Some(acc), Some(value)) => add_count(acc, value, column, scope).map(Some),
        (None, value) => Ok(value),
        (acc, None) => Ok(acc),
    }
}

fn descending_nulls_last<T: PartialOrd>(left: Option<T>, right: Option<T>) -> Ordering {
    match (left, right) {
        (Some(left), Some(right)) => right.partial_cmp(&left).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
