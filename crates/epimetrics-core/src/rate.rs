//! Per-row rate calculators.
//!
//! Every rate in the crate goes through [`percentage`], so a zero denominator
//! yields `None` at every call site instead of a division error or infinity.

use serde::{Deserialize, Serialize};
use time::Date;

use crate::domain::iso_date;
use crate::{CaseRecord, ReportOptions};

/// `numerator / denominator * 100`, or `None` when the denominator is zero.
pub fn percentage(numerator: i64, denominator: i64) -> Option<f64> {
    if denominator == 0 {
        return None;
    }
    // Multiply first so whole-number percentages come out exact.
    Some(numerator as f64 * 100.0 / denominator as f64)
}

/// [`percentage`] for a numerator that may be missing.
pub fn percentage_of(numerator: Option<i64>, denominator: i64) -> Option<f64> {
    numerator.and_then(|numerator| percentage(numerator, denominator))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseOverviewRow {
    pub location: String,
    #[serde(with = "iso_date")]
    pub date: Date,
    pub total_cases: i64,
    pub new_cases: i64,
    pub total_deaths: Option<i64>,
    pub population: i64,
}

/// Likelihood of dying once infected, as of each row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeathRateRow {
    pub location: String,
    #[serde(with = "iso_date")]
    pub date: Date,
    pub total_cases: i64,
    pub total_deaths: Option<i64>,
    pub death_percentage: Option<f64>,
}

/// Share of the population infected so far, as of each row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InfectionRateRow {
    pub location: String,
    #[serde(with = "iso_date")]
    pub date: Date,
    pub population: i64,
    pub total_cases: i64,
    pub percent_population_infected: Option<f64>,
}

pub fn case_overview(records: &[CaseRecord], options: &ReportOptions) -> Vec<CaseOverviewRow> {
    let mut rows: Vec<_> = selected(records, options)
        .map(|record| CaseOverviewRow {
            location: record.location.clone(),
            date: record.date,
            total_cases: record.total_cases,
            new_cases: record.new_cases,
            total_deaths: record.total_deaths,
            population: record.population,
        })
        .collect();
    rows.sort_by(|left, right| (&left.location, left.date).cmp(&(&right.location, right.date)));
    rows
}

pub fn death_rates(records: &[CaseRecord], options: &ReportOptions) -> Vec<DeathRateRow> {
    let mut rows: Vec<_> = selected(records, options)
        .map(|record| DeathRateRow {
            location: record.location.clone(),
            date: record.date,
            total_cases: record.total_cases,
            total_deaths: record.total_deaths,
            death_percentage: percentage_of(record.total_deaths, record.total_cases),
        })
        .collect();
    rows.sort_by(|left, right| (&left.location, left.date).cmp(&(&right.location, right.date)));
    rows
}

pub fn infection_rates(records: &[CaseRecord], options: &ReportOptions) -> Vec<InfectionRateRow> {
    let mut rows: Vec<_> = selected(records, options)
        .map(|record| InfectionRateRow {
            location: record.location.clone(),
            date: record.date,
            population: record.population,
            total_cases: record.total_cases,
            percent_population_infected: percentage(record.total_cases, record.population),
        })
        .collect();
    rows.sort_by(|left, right| (&left.location, left.date).cmp(&(&right.location, right.date)));
    rows
}

fn selected<'a>(
    records: &'a [CaseRecord],
    options: &'a ReportOptions,
) -> impl Iterator<Item = &'a CaseRecord> + 'a {
    records.iter().filter(move |record| options.admits(record))
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    fn record(
        location: &str,
        total_cases: i64,
        total_deaths: Option<i64>,
        population: i64,
    ) -> CaseRecord {
        CaseRecord {
            location: location.to_string(),
            date: date!(2020 - 12 - 31),
            continent: Some("Europe".to_string()),
            population,
            total_cases,
            new_cases: 0,
            total_deaths,
            new_deaths: None,
        }
    }

    #[test]
    fn percentage_scales_to_hundred() {
        assert_eq!(percentage(1, 4), Some(25.0));
        assert_eq!(percentage(150, 1000), Some(15.0));
    }

    #[test]
    fn zero_denominator_yields_null_at_every_rate_site() {
        assert_eq!(percentage(10, 0), None);
        assert_eq!(percentage_of(Some(10), 0), None);

        let records = vec![record("Vatican", 0, Some(0), 0)];
        let options = ReportOptions::default();
        assert_eq!(death_rates(&records, &options)[0].death_percentage, None);
        assert_eq!(
            infection_rates(&records, &options)[0].percent_population_infected,
            None
        );
    }

    #[test]
    fn missing_deaths_give_missing_death_rate() {
        let rows = death_rates(&[record("Malta", 200, None, 500_000)], &ReportOptions::default());
        assert_eq!(rows[0].death_percentage, None);
    }

    #[test]
    fn location_filter_narrows_rate_rows() {
        let records = vec![
            record("United States", 1_000, Some(20), 330_000_000),
            record("United Kingdom", 500, Some(5), 67_000_000),
            record("Germany", 800, Some(8), 83_000_000),
        ];
        let options = ReportOptions::default().with_location_filter("states");
        let rows = death_rates(&records, &options);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].location, "United States");
        assert_eq!(rows[0].death_percentage, Some(2.0));
    }

    #[test]
    fn overview_is_ordered_by_location_then_date() {
        let mut later = record("Austria", 10, None, 9_000_000);
        later.date = date!(2021 - 01 - 02);
        let records = vec![
            later,
            record("Belgium", 5, None, 11_000_000),
            record("Austria", 3, None, 9_000_000),
        ];
        let rows = case_overview(&records, &ReportOptions::default());
        let keys: Vec<_> = rows
            .iter()
            .map(|row| (row.location.as_str(), row.total_cases))
            .collect();
        assert_eq!(keys, vec![("Austria", 3), ("Austria", 10), ("Belgium", 5)]);
    }
}
