use epimetrics_warehouse::{SqlLimits, Warehouse};

use crate::cli::SqlArgs;
use crate::error::CliError;

use super::CommandResult;

pub fn run(warehouse: &Warehouse, args: &SqlArgs) -> Result<CommandResult, CliError> {
    let query = args.query.trim();
    if query.is_empty() {
        return Err(CliError::Command(String::from("query must not be empty")));
    }

    let limits = SqlLimits {
        max_rows: args.max_rows,
        timeout_ms: args.query_timeout_ms,
    };
    let result = warehouse.execute_query(query, limits, args.write)?;

    let truncated = result.truncated;
    let row_count = result.row_count;
    let mut command_result = CommandResult::ok(serde_json::to_value(&result)?);
    if truncated {
        command_result = command_result.with_warning(format!(
            "result truncated at {row_count} rows (use --max-rows to increase limit)"
        ));
    }

    if args.write {
        // DDL may have replaced a source table the view depends on.
        warehouse.initialize()?;
    }

    Ok(command_result)
}
