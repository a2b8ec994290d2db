//! Source records, derived rows, and report options.

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use time::macros::format_description;
use time::Date;

use crate::MetricsError;

/// Parse an ISO `YYYY-MM-DD` calendar date.
pub fn parse_date(input: &str) -> Result<Date, MetricsError> {
    Date::parse(input.trim(), format_description!("[year]-[month]-[day]")).map_err(|_| {
        MetricsError::InvalidDate {
            value: input.to_owned(),
        }
    })
}

/// Serde adapter writing [`Date`] as `YYYY-MM-DD`.
pub mod iso_date {
    use serde::de::Error as DeError;
    use serde::{Deserialize, Deserializer, Serializer};
    use time::Date;

    pub fn serialize<S>(date: &Date, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(date)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Date, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        super::parse_date(&value).map_err(D::Error::custom)
    }
}

/// Natural key shared by both input series.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LocationDate {
    pub location: String,
    pub date: Date,
}

impl LocationDate {
    pub fn new(location: impl Into<String>, date: Date) -> Self {
        Self {
            location: location.into(),
            date,
        }
    }
}

impl Display for LocationDate {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} on {}", self.location, self.date)
    }
}

/// One row of the case/death series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseRecord {
    pub location: String,
    #[serde(with = "iso_date")]
    pub date: Date,
    /// `None` marks an aggregate row such as "World" or "European Union".
    pub continent: Option<String>,
    pub population: i64,
    pub total_cases: i64,
    pub new_cases: i64,
    pub total_deaths: Option<i64>,
    #[serde(default)]
    pub new_deaths: Option<i64>,
}

impl CaseRecord {
    pub fn key(&self) -> LocationDate {
        LocationDate::new(self.location.clone(), self.date)
    }

    pub fn is_aggregate(&self) -> bool {
        self.continent.is_none()
    }
}

/// One row of the vaccination series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaccinationRecord {
    pub location: String,
    #[serde(with = "iso_date")]
    pub date: Date,
    /// `None` means nothing was reported that day.
    pub new_vaccinations: Option<i64>,
}

impl VaccinationRecord {
    pub fn key(&self) -> LocationDate {
        LocationDate::new(self.location.clone(), self.date)
    }
}

/// Cumulative vaccinations for one location as of one date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollingVaccinationRow {
    pub continent: Option<String>,
    pub location: String,
    #[serde(with = "iso_date")]
    pub date: Date,
    pub population: i64,
    pub new_vaccinations: Option<i64>,
    pub rolling_people_vaccinated: i64,
    /// `None` when the population is zero.
    pub vaccination_percentage: Option<f64>,
}

/// Row selection shared by every report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportOptions {
    /// Drop rows whose continent is null (region and world totals).
    pub exclude_aggregates: bool,
    /// Case-insensitive substring the location must contain.
    pub location_filter: Option<String>,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            exclude_aggregates: true,
            location_filter: None,
        }
    }
}

impl ReportOptions {
    pub fn including_aggregates() -> Self {
        Self {
            exclude_aggregates: false,
            location_filter: None,
        }
    }

    #[must_use]
    pub fn with_location_filter(mut self, pattern: impl Into<String>) -> Self {
        let pattern = pattern.into();
        self.location_filter = if pattern.trim().is_empty() {
            None
        } else {
            Some(pattern)
        };
        self
    }

    pub fn admits(&self, record: &CaseRecord) -> bool {
        if self.exclude_aggregates && record.is_aggregate() {
            return false;
        }
        match &self.location_filter {
            Some(pattern) => record
                .location
                .to_lowercase()
                .contains(pattern.trim().to_lowercase().as_str()),
            None => true,
        }
    }
}
