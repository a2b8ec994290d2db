//! Eager rolling vaccination artifact.
//!
//! The snapshot table is rebuilt inside one transaction, so a concurrent
//! reader sees either the previous table or the new one. Every source row is
//! coerced before the rebuild, matching the rows the engine would reject.

use ::duckdb::{params, Connection};
use serde::Serialize;
use tracing::info;

use crate::load::validate_sources;
use crate::schema::table_exists;
use crate::views::rolling_select_sql;
use crate::{finalize_transaction, WarehouseError};

/// Eager artifact: stored until the next refresh.
pub const SNAPSHOT_TABLE: &str = "percent_population_vaccinated";

/// Outcome of the most recent refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SnapshotStatus {
    pub artifact: String,
    pub row_count: i64,
    /// Aggregate-row policy the stored rows were built with.
    pub exclude_aggregates: bool,
    pub refreshed_at: String,
}

/// Rebuild the snapshot table from the source series.
pub fn refresh(
    connection: &Connection,
    exclude_aggregates: bool,
) -> Result<SnapshotStatus, WarehouseError> {
    validate_sources(connection)?;

    connection.execute_batch("BEGIN TRANSACTION")?;
    let result = (|| -> Result<(), WarehouseError> {
        let rebuild = format!(
            "CREATE OR REPLACE TABLE {SNAPSHOT_TABLE} AS {}",
            rolling_select_sql(exclude_aggregates)
        );
        connection.execute_batch(rebuild.as_str())?;

        let record = format!(
            "INSERT INTO materialization_log \
                 (artifact, row_count, exclude_aggregates, refreshed_at) \
             SELECT ?, COUNT(*), ?, CURRENT_TIMESTAMP FROM {SNAPSHOT_TABLE}"
        );
        connection.execute(record.as_str(), params![SNAPSHOT_TABLE, exclude_aggregates])?;
        Ok(())
    })();
    finalize_transaction(connection, result)?;

    let status = status(connection)?.ok_or(WarehouseError::SnapshotMissing {
        artifact: SNAPSHOT_TABLE,
    })?;
    info!(
        artifact = SNAPSHOT_TABLE,
        rows = status.row_count,
        "snapshot refreshed"
    );
    Ok(status)
}

/// Latest refresh of the snapshot, or `None` if it was never built.
pub fn status(connection: &Connection) -> Result<Option<SnapshotStatus>, WarehouseError> {
    if !table_exists(connection, SNAPSHOT_TABLE)? {
        return Ok(None);
    }

    let mut statement = connection.prepare(
        "SELECT artifact, row_count, exclude_aggregates, CAST(refreshed_at AS VARCHAR) \
         FROM materialization_log \
         WHERE artifact = ? \
         ORDER BY rowid DESC \
         LIMIT 1",
    )?;
    let mut rows = statement.query(params![SNAPSHOT_TABLE])?;
    let Some(row) = rows.next()? else {
        return Ok(None);
    };

    Ok(Some(SnapshotStatus {
        artifact: row.get(0)?,
        row_count: row.get(1)?,
        exclude_aggregates: row.get(2)?,
        refreshed_at: row.get(3)?,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ensure_tables;

    #[test]
    fn refresh_records_row_count_and_replaces_previous_table() {
        let connection = Connection::open_in_memory().expect("connection");
        ensure_tables(&connection).expect("tables");
        assert_eq!(status(&connection).expect("status"), None);

        connection
            .execute_batch(
                r"
INSERT INTO covid_deaths VALUES ('Chile', DATE '2021-02-01', 'South America', 100, 1, 1, NULL, NULL);
INSERT INTO covid_vaccinations VALUES ('Chile', DATE '2021-02-01', '4');
",
            )
            .expect("seed");
        let first = refresh(&connection, true).expect("first refresh");
        assert_eq!(first.row_count, 1);
        assert!(first.exclude_aggregates);

        connection
            .execute_batch(
                r"
INSERT INTO covid_deaths VALUES ('Chile', DATE '2021-02-02', 'South America', 100, 1, 1, NULL, NULL);
INSERT INTO covid_vaccinations VALUES ('Chile', DATE '2021-02-02', '6');
",
            )
            .expect("seed more");
        let second = refresh(&connection, false).expect("second refresh");
        assert_eq!(second.row_count, 2);
        assert!(!second.exclude_aggregates);
        assert_eq!(status(&connection).expect("status"), Some(second.clone()));

        let total: i64 = connection
            .query_row(
                "SELECT MAX(rolling_people_vaccinated) FROM percent_population_vaccinated",
                [],
                |row| row.get(0),
            )
            .expect("max");
        assert_eq!(total, 10);
    }

    #[test]
    fn failed_refresh_rolls_back_to_previous_snapshot() {
        let connection = Connection::open_in_memory().expect("connection");
        ensure_tables(&connection).expect("tables");
        connection
            .execute_batch(
                r"
INSERT INTO covid_deaths VALUES ('Chile', DATE '2021-02-01', 'South America', 100, 1, 1, NULL, NULL);
INSERT INTO covid_vaccinations VALUES ('Chile', DATE '2021-02-01', '4');
",
            )
            .expect("seed");
        refresh(&connection, true).expect("refresh");

        connection
            .execute_batch(
                r"
INSERT INTO covid_deaths VALUES ('Chile', DATE '2021-02-02', 'South America', 100, 1, 1, NULL, NULL);
INSERT INTO covid_vaccinations VALUES ('Chile', DATE '2021-02-02', 'lots');
",
            )
            .expect("seed malformed");
        assert!(refresh(&connection, true).is_err());

        let rows: i64 = connection
            .query_row("SELECT COUNT(*) FROM percent_population_vaccinated", [], |row| row.get(0))
            .expect("count");
        assert_eq!(rows, 1);
    }

    #[test]
    fn malformed_row_without_a_join_partner_blocks_the_refresh() {
        let connection = Connection::open_in_memory().expect("connection");
        ensure_tables(&connection).expect("tables");
        connection
            .execute_batch(
                r"
INSERT INTO covid_deaths VALUES ('Chile', DATE '2021-02-01', 'South America', 100, 1, 1, NULL, NULL);
INSERT INTO covid_vaccinations VALUES
    ('Chile', DATE '2021-02-01', '4'),
    ('Nowhere', DATE '2021-02-01', '1.5');
",
            )
            .expect("seed");

        let error = refresh(&connection, true).expect_err("coercion");
        assert!(matches!(error, WarehouseError::Metrics(_)));
        assert_eq!(status(&connection).expect("status"), None);
    }
}
