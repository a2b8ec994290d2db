use epimetrics_core::ReportOptions;
use epimetrics_warehouse::Warehouse;

use crate::cli::FilterArgs;
use crate::error::CliError;

use super::{filtered, rows_result, CommandResult};

pub fn run(
    warehouse: &Warehouse,
    args: &FilterArgs,
    base: ReportOptions,
) -> Result<CommandResult, CliError> {
    let options = filtered(base, args.location.as_deref());
    let rows = warehouse.case_overview(&options)?;
    rows_result(rows, args.limit)
}
