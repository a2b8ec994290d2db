use thiserror::Error;

/// Failures that abort a whole metrics computation.
///
/// Missing join partners, null daily figures, and zero denominators are not
/// errors: they are resolved where they occur (dropped, coalesced to zero, or
/// reported as a null rate).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MetricsError {
    #[error("column '{column}' for {location} on {date} holds non-numeric value '{value}'")]
    TypeCoercion {
        column: &'static str,
        location: String,
        date: String,
        value: String,
    },

    #[error("duplicate {series} row for {location} on {date}")]
    DuplicateKey {
        series: &'static str,
        location: String,
        date: String,
    },

    #[error("{column} does not fit in a 64-bit count at {scope}")]
    Overflow { column: &'static str, scope: String },

    #[error("invalid date '{value}', expected YYYY-MM-DD")]
    InvalidDate { value: String },
}
