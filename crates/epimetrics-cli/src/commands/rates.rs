use epimetrics_core::ReportOptions;
use epimetrics_warehouse::Warehouse;

use crate::cli::FilterArgs;
use crate::error::CliError;

use super::{filtered, null_rate_warning, rows_result, CommandResult};

pub fn run_death_rate(
    warehouse: &Warehouse,
    args: &FilterArgs,
    base: ReportOptions,
) -> Result<CommandResult, CliError> {
    let options = filtered(base, args.location.as_deref());
    let rows = warehouse.death_rates(&options)?;
    let zero_cases = rows.iter().filter(|row| row.total_cases == 0).count();

    let mut result = rows_result(rows, args.limit)?;
    if let Some(warning) = null_rate_warning(zero_cases, "total_cases") {
        result = result.with_warning(warning);
    }
    Ok(result)
}

pub fn run_infection_rate(
    warehouse: &Warehouse,
    args: &FilterArgs,
    base: ReportOptions,
) -> Result<CommandResult, CliError> {
    let options = filtered(base, args.location.as_deref());
    let rows = warehouse.infection_rates(&options)?;
    let zero_population = rows.iter().filter(|row| row.population == 0).count();

    let mut result = rows_result(rows, args.limit)?;
    if let Some(warning) = null_rate_warning(zero_population, "population") {
        result = result.with_warning(warning);
    }
    Ok(result)
}
