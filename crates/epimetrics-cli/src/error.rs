use epimetrics_core::MetricsError;
use epimetrics_warehouse::WarehouseError;
use thiserror::Error;

/// CLI-level error categories mapped to exit codes.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("command error: {0}")]
    Command(String),

    #[error(transparent)]
    Warehouse(#[from] WarehouseError),

    #[error("strict mode failed: warnings={warning_count}")]
    StrictModeViolation { warning_count: usize },

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Command(_) => 2,
            Self::Warehouse(WarehouseError::Metrics(_)) => 3,
            Self::Warehouse(WarehouseError::QueryRejected(_)) => 2,
            Self::Warehouse(WarehouseError::QueryTimeout { .. }) => 6,
            Self::Warehouse(WarehouseError::SnapshotMissing { .. }) => 7,
            Self::Warehouse(_) => 10,
            Self::Serialization(_) => 4,
            Self::StrictModeViolation { .. } => 5,
            Self::Io(_) => 10,
        }
    }
}
