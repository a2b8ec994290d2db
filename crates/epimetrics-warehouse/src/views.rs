//! SQL form of the rolling vaccination accumulator.
//!
//! The same `SELECT` backs the lazy view and the eager snapshot table, so both
//! artifacts agree row for row. Vaccination text follows `parse_count`:
//! blank is null, an optionally signed run of digits is an integer, and
//! anything else (`1.5`, `1e3`, `1_000`) raises an error where a plain
//! `CAST` would round it. Null adds zero to the running sum.

use ::duckdb::Connection;

/// Lazy artifact: recomputed by `DuckDB` on every read.
pub const ROLLING_VIEW: &str = "vw_percent_population_vaccinated";

/// Strict integer coercion of `{alias}.{column}`, keyed for the error text.
fn count_sql(alias: &str, column: &str) -> String {
    let value = format!("{alias}.{column}");
    format!(
        r"CASE
            WHEN {value} IS NULL OR regexp_full_match({value}, '\s*') THEN NULL
            WHEN regexp_full_match({value}, '\s*[+-]?[0-9]+\s*')
                THEN CAST(ltrim(regexp_extract({value}, '[+-]?[0-9]+'), '+') AS BIGINT)
            ELSE error('column ''{column}'' for ' || {alias}.location
                || ' on ' || CAST({alias}.date AS VARCHAR)
                || ' holds non-numeric value ''' || {value} || '''')
        END"
    )
}

/// Build the rolling vaccination query.
///
/// With `exclude_aggregates`, case rows without a continent are filtered out
/// before the join.
pub fn rolling_select_sql(exclude_aggregates: bool) -> String {
    let filter = if exclude_aggregates {
        "WHERE dea.continent IS NOT NULL"
    } else {
        ""
    };

    let new_vaccinations = count_sql("vac", "new_vaccinations");

    format!(
        r"
WITH joined AS (
    SELECT
        dea.continent,
        dea.location,
        dea.date,
        dea.population,
        {new_vaccinations} AS new_vaccinations
    FROM covid_deaths dea
    JOIN covid_vaccinations vac
        ON dea.location = vac.location
       AND dea.date = vac.date
    {filter}
),
rolling AS (
    SELECT
        continent,
        location,
        date,
        population,
        new_vaccinations,
        CAST(SUM(COALESCE(new_vaccinations, 0)) OVER (
            PARTITION BY location
            ORDER BY date
            ROWS BETWEEN UNBOUNDED PRECEDING AND CURRENT ROW
        ) AS BIGINT) AS rolling_people_vaccinated
    FROM joined
)
SELECT
    continent,
    location,
    date,
    population,
    new_vaccinations,
    rolling_people_vaccinated,
    CASE
        WHEN population = 0 THEN NULL
        ELSE CAST(rolling_people_vaccinated AS DOUBLE) * 100 / CAST(population AS DOUBLE)
    END AS vaccination_percentage
FROM rolling
"
    )
}

/// Create or replace the lazy rolling view.
///
/// # Errors
/// Returns an error if the view creation SQL fails to execute.
pub fn create_views(
    connection: &Connection,
    exclude_aggregates: bool,
) -> Result<(), ::duckdb::Error> {
    let sql = format!(
        "CREATE OR REPLACE VIEW {ROLLING_VIEW} AS {}",
        rolling_select_sql(exclude_aggregates)
    );
    connection.execute_batch(sql.as_str())
}
