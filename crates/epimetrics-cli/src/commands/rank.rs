use epimetrics_core::ReportOptions;
use epimetrics_warehouse::Warehouse;

use crate::cli::{RankArgs, RankBy};
use crate::error::CliError;

use super::{rows_result, CommandResult};

pub fn run(
    warehouse: &Warehouse,
    args: &RankArgs,
    options: &ReportOptions,
) -> Result<CommandResult, CliError> {
    match args.by {
        RankBy::Infection => rows_result(warehouse.infection_ranking(options)?, args.limit),
        RankBy::Deaths => rows_result(warehouse.death_ranking(options)?, args.limit),
        RankBy::Continents => {
            let mut result =
                rows_result(warehouse.continent_death_ranking(options)?, args.limit)?;
            if !options.exclude_aggregates {
                result = result.with_warning(
                    "aggregate rows have no continent and are never part of the continent ranking",
                );
            }
            Ok(result)
        }
    }
}
