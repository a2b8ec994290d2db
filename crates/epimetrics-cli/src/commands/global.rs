use epimetrics_core::ReportOptions;
use epimetrics_warehouse::Warehouse;

use crate::cli::GlobalArgs;
use crate::error::CliError;

use super::CommandResult;

pub fn run(
    warehouse: &Warehouse,
    args: &GlobalArgs,
    options: &ReportOptions,
) -> Result<CommandResult, CliError> {
    let numbers = warehouse.global_numbers(options)?;

    let mut result = if args.overall {
        CommandResult::ok(serde_json::to_value(&numbers.overall)?)
    } else {
        CommandResult::ok(serde_json::to_value(&numbers)?)
    };
    if !options.exclude_aggregates {
        result = result.with_warning(
            "aggregate rows are included; world totals count each case more than once",
        );
    }
    Ok(result)
}
