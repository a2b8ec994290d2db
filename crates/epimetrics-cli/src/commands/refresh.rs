use epimetrics_warehouse::Warehouse;

use crate::error::CliError;

use super::CommandResult;

pub fn run(warehouse: &Warehouse) -> Result<CommandResult, CliError> {
    let status = warehouse.refresh_rolling_snapshot()?;
    let empty = status.row_count == 0;

    let mut result = CommandResult::ok(serde_json::to_value(&status)?);
    if empty {
        result = result.with_warning(
            "snapshot is empty: no (location, date) key appears in both series",
        );
    }
    Ok(result)
}
