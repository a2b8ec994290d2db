//! Typed reads of the two source series.
//!
//! Every numeric column goes through [`count_from_value`], so a malformed cell
//! aborts the read with `MetricsError::TypeCoercion` instead of surfacing as
//! zero or null. [`validate_sources`] runs the same pass ahead of the SQL
//! artifacts, so all three rolling paths reject the same rows.

use ::duckdb::types::Value as DuckValue;
use ::duckdb::Connection;
use epimetrics_core::{
    parse_count, parse_date, CaseRecord, LocationDate, MetricsError, VaccinationRecord,
};
use tracing::debug;

use crate::WarehouseError;

pub fn load_case_records(connection: &Connection) -> Result<Vec<CaseRecord>, WarehouseError> {
    let mut statement = connection.prepare(
        "SELECT location, CAST(date AS VARCHAR), continent, population, total_cases, \
                new_cases, total_deaths, new_deaths \
         FROM covid_deaths \
         ORDER BY location, date",
    )?;
    let mut rows = statement.query([])?;

    let mut records = Vec::new();
    while let Some(row) = rows.next()? {
        let location: String = row.get(0)?;
        let date: String = row.get(1)?;
        let key = LocationDate::new(location, parse_date(&date)?);

        records.push(CaseRecord {
            continent: row.get(2)?,
            population: required_count(row.get(3)?, "population", &key)?,
            total_cases: required_count(row.get(4)?, "total_cases", &key)?,
            new_cases: required_count(row.get(5)?, "new_cases", &key)?,
            total_deaths: count_from_value(row.get(6)?, "total_deaths", &key)?,
            new_deaths: count_from_value(row.get(7)?, "new_deaths", &key)?,
            location: key.location,
            date: key.date,
        });
    }

    debug!(rows = records.len(), "loaded case records");
    Ok(records)
}

pub fn load_vaccination_records(
    connection: &Connection,
) -> Result<Vec<VaccinationRecord>, WarehouseError> {
    let mut statement = connection.prepare(
        "SELECT location, CAST(date AS VARCHAR), new_vaccinations \
         FROM covid_vaccinations \
         ORDER BY location, date",
    )?;
    let mut rows = statement.query([])?;

    let mut records = Vec::new();
    while let Some(row) = rows.next()? {
        let location: String = row.get(0)?;
        let date: String = row.get(1)?;
        let key = LocationDate::new(location, parse_date(&date)?);

        records.push(VaccinationRecord {
            new_vaccinations: count_from_value(row.get(2)?, "new_vaccinations", &key)?,
            location: key.location,
            date: key.date,
        });
    }

    debug!(rows = records.len(), "loaded vaccination records");
    Ok(records)
}

/// Coerce every row of both source series, discarding the records.
pub fn validate_sources(connection: &Connection) -> Result<(), WarehouseError> {
    let cases = load_case_records(connection)?.len();
    let vaccinations = load_vaccination_records(connection)?.len();
    debug!(cases, vaccinations, "source series validated");
    Ok(())
}

/// Convert a stored cell into an integer count.
///
/// Integers pass through, text is parsed, and whole-valued floats are accepted
/// for warehouses that imported counts as doubles.
pub fn count_from_value(
    value: DuckValue,
    column: &'static str,
    key: &LocationDate,
) -> Result<Option<i64>, MetricsError> {
    let coerced = match value {
        DuckValue::Null => None,
        DuckValue::TinyInt(value) => Some(i64::from(value)),
        DuckValue::SmallInt(value) => Some(i64::from(value)),
        DuckValue::Int(value) => Some(i64::from(value)),
        DuckValue::BigInt(value) => Some(value),
        DuckValue::UTinyInt(value) => Some(i64::from(value)),
        DuckValue::USmallInt(value) => Some(i64::from(value)),
        DuckValue::UInt(value) => Some(i64::from(value)),
        DuckValue::UBigInt(value) => Some(narrow(i64::try_from(value).ok(), value, column, key)?),
        DuckValue::HugeInt(value) => Some(narrow(i64::try_from(value).ok(), value, column, key)?),
        DuckValue::Double(value) => Some(narrow(whole(value), value, column, key)?),
        DuckValue::Float(value) => Some(narrow(whole(f64::from(value)), value, column, key)?),
        DuckValue::Text(text) => parse_count(Some(text.as_str()), column, key)?,
        other => return Err(coercion_error(format!("{other:?}"), column, key)),
    };
    Ok(coerced)
}

fn required_count(
    value: DuckValue,
    column: &'static str,
    key: &LocationDate,
) -> Result<i64, MetricsError> {
    count_from_value(value, column, key)?
        .ok_or_else(|| coercion_error(String::from("NULL"), column, key))
}

fn whole(value: f64) -> Option<i64> {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        Some(value as i64)
    } else {
        None
    }
}

fn narrow<T: ToString>(
    narrowed: Option<i64>,
    original: T,
    column: &'static str,
    key: &LocationDate,
) -> Result<i64, MetricsError> {
    narrowed.ok_or_else(|| coercion_error(original.to_string(), column, key))
}

fn coercion_error(value: String, column: &'static str, key: &LocationDate) -> MetricsError {
    MetricsError::TypeCoercion {
        column,
        location: key.location.clone(),
        date: key.date.to_string(),
        value,
    }
}
