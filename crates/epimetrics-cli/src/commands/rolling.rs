use epimetrics_warehouse::{RollingSource, Warehouse};
use tracing::debug;

use crate::cli::RollingArgs;
use crate::error::CliError;

use super::{rows_result, CommandResult};

pub fn run(warehouse: &Warehouse, args: &RollingArgs) -> Result<CommandResult, CliError> {
    let source = RollingSource::from(args.source);
    let status = match source {
        RollingSource::Snapshot => warehouse.snapshot_status()?,
        RollingSource::View | RollingSource::Engine => None,
    };

    let rows = warehouse.read_rolling(source, args.location.as_deref())?;
    let mut result = rows_result(rows, args.limit)?;

    if let Some(status) = status {
        debug!(
            refreshed_at = %status.refreshed_at,
            rows = status.row_count,
            exclude_aggregates = status.exclude_aggregates,
            "read snapshot"
        );
        if status.exclude_aggregates != warehouse.config().exclude_aggregates {
            result = result.with_warning(snapshot_policy_warning(status.exclude_aggregates));
        }
        result = result.built_with(status.exclude_aggregates);
    }
    Ok(result)
}

fn snapshot_policy_warning(built_excluding: bool) -> String {
    let policy = if built_excluding { "excluded" } else { "included" };
    format!(
        "snapshot was refreshed with aggregate rows {policy}; \
         run refresh to apply the current flag"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_warning_names_the_stored_flag() {
        assert!(snapshot_policy_warning(true).contains("aggregate rows excluded"));
        assert!(snapshot_policy_warning(false).contains("aggregate rows included"));
    }
}
