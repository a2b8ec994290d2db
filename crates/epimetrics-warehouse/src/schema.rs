//! Table declarations the warehouse expects.
//!
//! The source series are owned by whatever loads the warehouse. They are
//! declared here with `CREATE TABLE IF NOT EXISTS` only so an empty database
//! is queryable; an existing table is never altered.
//!
//! Deaths and vaccinations are stored as text, the shape they arrive in from
//! spreadsheet exports, and are coerced to integers when read.

use ::duckdb::{params, Connection};
use tracing::debug;

struct TableDeclaration {
    name: &'static str,
    sql: &'static str,
}

pub const CASES_TABLE: &str = "covid_deaths";
pub const VACCINATIONS_TABLE: &str = "covid_vaccinations";
pub const MATERIALIZATION_LOG_TABLE: &str = "materialization_log";

const TABLES: &[TableDeclaration] = &[
    TableDeclaration {
        name: CASES_TABLE,
        sql: r"
CREATE TABLE IF NOT EXISTS covid_deaths (
    location TEXT NOT NULL,
    date DATE NOT NULL,
    continent TEXT,
    population BIGINT NOT NULL,
    total_cases BIGINT NOT NULL,
    new_cases BIGINT NOT NULL,
    total_deaths TEXT,
    new_deaths TEXT,
    PRIMARY KEY(location, date)
);
",
    },
    TableDeclaration {
        name: VACCINATIONS_TABLE,
        sql: r"
CREATE TABLE IF NOT EXISTS covid_vaccinations (
    location TEXT NOT NULL,
    date DATE NOT NULL,
    new_vaccinations TEXT,
    PRIMARY KEY(location, date)
);
",
    },
    TableDeclaration {
        name: MATERIALIZATION_LOG_TABLE,
        sql: r"
CREATE TABLE IF NOT EXISTS materialization_log (
    artifact TEXT NOT NULL,
    row_count BIGINT NOT NULL,
    exclude_aggregates BOOLEAN NOT NULL,
    refreshed_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);
",
    },
];

/// Create any expected table that does not exist yet.
pub fn ensure_tables(connection: &Connection) -> Result<(), ::duckdb::Error> {
    for table in TABLES {
        if !table_exists(connection, table.name)? {
            connection.execute_batch(table.sql)?;
            debug!(table = table.name, "declared missing table");
        }
    }
    Ok(())
}

pub fn table_exists(connection: &Connection, name: &str) -> Result<bool, ::duckdb::Error> {
    let count: i64 = connection.query_row(
        "SELECT COUNT(*) FROM information_schema.tables WHERE table_name = ?",
        params![name],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}
