//! Numeric coercion for counters stored as text.
//!
//! Some source columns (deaths, vaccinations) arrive as text. A blank cell is
//! the loader's encoding of "no value" and becomes `None`; anything else that
//! is not an integer fails the whole run.

use crate::{LocationDate, MetricsError};

pub fn parse_count(
    raw: Option<&str>,
    column: &'static str,
    key: &LocationDate,
) -> Result<Option<i64>, MetricsError> {
    let Some(raw) = raw else {
        return Ok(None);
    };

    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    trimmed
        .parse::<i64>()
        .map(Some)
        .map_err(|_| MetricsError::TypeCoercion {
            column,
            location: key.location.clone(),
            date: key.date.to_string(),
            value: raw.to_owned(),
        })
}
