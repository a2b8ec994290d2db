//! Behavior-driven tests for the warehouse
//!
//! These tests verify what a user sees when the source series live in
//! `DuckDB`: reports, the two rolling artifacts, refresh, and guarded SQL.

use epimetrics_tests::{
    open_warehouse, rolling_sums, seed, MetricsError, ReportOptions, RollingSource, SqlLimits,
    Warehouse, WarehouseError, TESTLAND,
};
use tempfile::tempdir;

// =============================================================================
// Rolling artifacts
// =============================================================================

#[test]
fn when_user_reads_any_rolling_artifact_null_days_carry_the_running_total() {
    // Given: Testland with a null vaccination day
    let temp = tempdir().expect("tempdir");
    let warehouse = open_warehouse(temp.path(), true);
    seed(&warehouse, TESTLAND);
    warehouse.refresh_rolling_snapshot().expect("refresh");

    // When: Each artifact is read
    for source in [RollingSource::Engine, RollingSource::View, RollingSource::Snapshot] {
        let rows = warehouse.read_rolling(source, None).expect("read");

        // Then: The sums and percentages match the worked example
        assert_eq!(rolling_sums(&rows), vec![100, 100, 150], "{source:?}");
        let percentages: Vec<_> = rows.iter().map(|row| row.vaccination_percentage).collect();
        assert_eq!(percentages, vec![Some(10.0), Some(10.0), Some(15.0)], "{source:?}");
        assert_eq!(rows[1].new_vaccinations, None);
    }
}

#[test]
fn when_engine_view_and_snapshot_are_compared_they_agree_row_for_row() {
    // Given: Several locations with interleaved dates and an aggregate row
    let temp = tempdir().expect("tempdir");
    let warehouse = open_warehouse(temp.path(), true);
    seed(
        &warehouse,
        r"
INSERT INTO covid_deaths VALUES
    ('A', DATE '2021-01-02', 'Asia', 500, 2, 1, NULL, NULL),
    ('B', DATE '2021-01-01', 'Europe', 1000, 1, 1, NULL, NULL),
    ('A', DATE '2021-01-01', 'Asia', 500, 1, 1, NULL, NULL),
    ('C', DATE '2021-01-01', 'Africa', 3, 1, 1, NULL, NULL),
    ('World', DATE '2021-01-01', NULL, 8000, 5, 5, NULL, NULL);
INSERT INTO covid_vaccinations VALUES
    ('B', DATE '2021-01-01', '5'),
    ('A', DATE '2021-01-02', '10'),
    ('A', DATE '2021-01-01', '10'),
    ('C', DATE '2021-01-01', '1'),
    ('World', DATE '2021-01-01', '16');
",
    );
    warehouse.refresh_rolling_snapshot().expect("refresh");

    // When: All three artifacts are read
    let engine = warehouse.read_rolling(RollingSource::Engine, None).expect("engine");
    let view = warehouse.read_rolling(RollingSource::View, None).expect("view");
    let snapshot = warehouse.read_rolling(RollingSource::Snapshot, None).expect("snapshot");

    // Then: Keys and sums are identical and percentages agree within rounding
    assert_eq!(engine.len(), 4);
    for (left, right) in engine.iter().zip(view.iter()).chain(engine.iter().zip(snapshot.iter())) {
        assert_eq!(left.location, right.location);
        assert_eq!(left.date, right.date);
        assert_eq!(left.continent, right.continent);
        assert_eq!(left.rolling_people_vaccinated, right.rolling_people_vaccinated);
        let (Some(a), Some(b)) = (left.vaccination_percentage, right.vaccination_percentage) else {
            panic!("percentages should be present");
        };
        assert!((a - b).abs() < 1e-9, "{a} vs {b}");
    }
    assert_eq!(view.len(), snapshot.len());
    assert_eq!(rolling_sums(&engine[..2]), vec![10, 20]);
}

#[test]
fn when_source_rows_change_the_view_follows_but_the_snapshot_waits_for_refresh() {
    // Given: A refreshed snapshot over two days
    let temp = tempdir().expect("tempdir");
    let warehouse = open_warehouse(temp.path(), true);
    seed(
        &warehouse,
        r"
INSERT INTO covid_deaths VALUES
    ('Chile', DATE '2021-02-01', 'South America', 100, 1, 1, NULL, NULL),
    ('Chile', DATE '2021-02-02', 'South America', 100, 1, 1, NULL, NULL);
INSERT INTO covid_vaccinations VALUES ('Chile', DATE '2021-02-01', '4');
",
    );
    let first = warehouse.refresh_rolling_snapshot().expect("refresh");
    assert_eq!(first.row_count, 1);

    // When: A vaccination row arrives for the second day
    seed(
        &warehouse,
        "INSERT INTO covid_vaccinations VALUES ('Chile', DATE '2021-02-02', '6')",
    );

    // Then: The lazy view sees it immediately, the eager snapshot does not
    let view = warehouse.read_rolling(RollingSource::View, None).expect("view");
    let stale = warehouse.read_rolling(RollingSource::Snapshot, None).expect("snapshot");
    assert_eq!(rolling_sums(&view), vec![4, 10]);
    assert_eq!(rolling_sums(&stale), vec![4]);

    // And: After a refresh the snapshot catches up
    let second = warehouse.refresh_rolling_snapshot().expect("refresh");
    assert_eq!(second.row_count, 2);
    let fresh = warehouse.read_rolling(RollingSource::Snapshot, None).expect("snapshot");
    assert_eq!(fresh, view);
    assert_eq!(
        warehouse.snapshot_status().expect("status").map(|status| status.row_count),
        Some(2)
    );
}

#[test]
fn when_keys_exist_in_only_one_series_they_never_reach_the_artifacts() {
    // Given: Case-only and vaccination-only keys
    let temp = tempdir().expect("tempdir");
    let warehouse = open_warehouse(temp.path(), true);
    seed(
        &warehouse,
        r"
INSERT INTO covid_deaths VALUES
    ('Peru', DATE '2021-03-01', 'South America', 100, 1, 1, NULL, NULL),
    ('Peru', DATE '2021-03-02', 'South America', 100, 1, 1, NULL, NULL);
INSERT INTO covid_vaccinations VALUES
    ('Peru', DATE '2021-03-01', '3'),
    ('Peru', DATE '2021-03-03', '7'),
    ('Bolivia', DATE '2021-03-01', '9');
",
    );
    warehouse.refresh_rolling_snapshot().expect("refresh");

    // When/Then: Only the shared key appears, whichever artifact is read
    for source in [RollingSource::Engine, RollingSource::View, RollingSource::Snapshot] {
        let rows = warehouse.read_rolling(source, None).expect("read");
        assert_eq!(rows.len(), 1, "{source:?}");
        assert_eq!(rows[0].location, "Peru");
        assert_eq!(rows[0].rolling_people_vaccinated, 3);
    }
}

#[test]
fn when_aggregates_are_included_world_rows_join_the_rolling_output() {
    // Given: A warehouse that keeps aggregate rows
    let temp = tempdir().expect("tempdir");
    let warehouse = open_warehouse(temp.path(), false);
    seed(
        &warehouse,
        r"
INSERT INTO covid_deaths VALUES ('World', DATE '2021-01-01', NULL, 8000, 5, 5, '1', '1');
INSERT INTO covid_vaccinations VALUES ('World', DATE '2021-01-01', '80');
",
    );
    warehouse.refresh_rolling_snapshot().expect("refresh");

    // When/Then: The aggregate row is present in every artifact
    for source in [RollingSource::Engine, RollingSource::View, RollingSource::Snapshot] {
        let rows = warehouse.read_rolling(source, Some("World")).expect("read");
        assert_eq!(rows.len(), 1, "{source:?}");
        assert_eq!(rows[0].continent, None);
        assert_eq!(rows[0].vaccination_percentage, Some(1.0));
    }
}

fn assert_every_rolling_path_rejects(warehouse: &Warehouse, raw: &str) {
    let engine = warehouse.read_rolling(RollingSource::Engine, None);
    let view = warehouse.read_rolling(RollingSource::View, None);
    let refresh = warehouse.refresh_rolling_snapshot();

    let outcomes = [
        ("engine", engine.err()),
        ("view", view.err()),
        ("snapshot", refresh.err()),
    ];
    for (path, outcome) in outcomes {
        assert!(
            matches!(
                outcome,
                Some(WarehouseError::Metrics(MetricsError::TypeCoercion {
                    column: "new_vaccinations",
                    ref value,
                    ..
                })) if value == raw
            ),
            "{path} accepted '{raw}': {outcome:?}"
        );
    }
    assert_eq!(warehouse.snapshot_status().expect("status"), None);
}

#[test]
fn when_a_vaccination_cell_is_malformed_every_rolling_path_fails() {
    // Given: A non-numeric vaccination figure on a joined key
    let temp = tempdir().expect("tempdir");
    let warehouse = open_warehouse(temp.path(), true);
    seed(
        &warehouse,
        r"
INSERT INTO covid_deaths VALUES ('Laos', DATE '2021-03-01', 'Asia', 100, 1, 1, NULL, NULL);
INSERT INTO covid_vaccinations VALUES ('Laos', DATE '2021-03-01', 'n/a');
",
    );

    // When/Then: Engine, view and snapshot refresh all fail with the same error
    assert_every_rolling_path_rejects(&warehouse, "n/a");
}

#[test]
fn when_a_vaccination_cell_is_fractional_no_path_rounds_it() {
    // Given: Text that a plain SQL cast would round to 2
    let temp = tempdir().expect("tempdir");
    let warehouse = open_warehouse(temp.path(), true);
    seed(
        &warehouse,
        r"
INSERT INTO covid_deaths VALUES ('Laos', DATE '2021-03-01', 'Asia', 100, 1, 1, NULL, NULL);
INSERT INTO covid_vaccinations VALUES ('Laos', DATE '2021-03-01', '1.5');
",
    );

    // When/Then: Every path rejects it instead of summing a rounded figure
    assert_every_rolling_path_rejects(&warehouse, "1.5");
}

#[test]
fn when_a_malformed_cell_has_no_join_partner_every_path_still_fails() {
    // Given: A valid joined key plus a malformed row for a location without cases
    let temp = tempdir().expect("tempdir");
    let warehouse = open_warehouse(temp.path(), true);
    seed(
        &warehouse,
        r"
INSERT INTO covid_deaths VALUES ('Laos', DATE '2021-03-01', 'Asia', 100, 1, 1, NULL, NULL);
INSERT INTO covid_vaccinations VALUES
    ('Laos', DATE '2021-03-01', '5'),
    ('Atlantis', DATE '2021-03-01', '1e3');
",
    );

    // When/Then: The coercion scope is every source row, on every path
    assert_every_rolling_path_rejects(&warehouse, "1e3");
}

#[test]
fn when_the_flag_changes_the_snapshot_reports_the_policy_it_was_built_with() {
    // Given: A snapshot refreshed with aggregates included
    let temp = tempdir().expect("tempdir");
    let including = open_warehouse(temp.path(), false);
    seed(&including, TESTLAND);
    let refreshed = including.refresh_rolling_snapshot().expect("refresh");
    assert!(!refreshed.exclude_aggregates);
    drop(including);

    // When: The warehouse is reopened with the default flag
    let excluding = open_warehouse(temp.path(), true);
    let status = excluding.snapshot_status().expect("status").expect("refreshed");

    // Then: The stored policy is still the one used at refresh
    assert!(!status.exclude_aggregates);
    assert_eq!(status.row_count, 3);
}

// =============================================================================
// Reports
// =============================================================================

#[test]
fn when_user_asks_for_death_rates_zero_case_days_report_null() {
    // Given: A day with no cases yet
    let temp = tempdir().expect("tempdir");
    let warehouse = open_warehouse(temp.path(), true);
    seed(
        &warehouse,
        r"
INSERT INTO covid_deaths VALUES
    ('Fiji', DATE '2020-03-01', 'Oceania', 0, 0, 0, NULL, NULL),
    ('Fiji', DATE '2020-03-02', 'Oceania', 900000, 20, 20, '1', '1');
",
    );

    // When: Death and infection rates are computed
    let options = warehouse.report_options();
    let deaths = warehouse.death_rates(&options).expect("death rates");
    let infections = warehouse.infection_rates(&options).expect("infection rates");

    // Then: Zero denominators yield null, the rest are percentages
    assert_eq!(deaths[0].death_percentage, None);
    assert_eq!(deaths[1].death_percentage, Some(5.0));
    assert_eq!(infections[0].percent_population_infected, None);
    assert!(infections[1].percent_population_infected.is_some());
}

#[test]
fn when_user_ranks_locations_aggregates_follow_the_configured_flag() {
    // Given: Two countries and a World aggregate
    let temp = tempdir().expect("tempdir");
    let warehouse = open_warehouse(temp.path(), true);
    seed(
        &warehouse,
        r"
INSERT INTO covid_deaths VALUES
    ('United States', DATE '2021-01-01', 'North America', 330, 10, 10, NULL, NULL),
    ('United States', DATE '2021-01-02', 'North America', 330, 20, 10, '5', '5'),
    ('United States', DATE '2021-01-03', 'North America', 330, 30, 10, '10', '5'),
    ('France', DATE '2021-01-01', 'Europe', 67, 4, 4, '1', '1'),
    ('France', DATE '2021-01-02', 'Europe', 67, 5, 1, '2', '1'),
    ('World', DATE '2021-01-03', NULL, 8000, 90, 90, '50', '50');
",
    );

    // When: Deaths are ranked with and without aggregates
    let excluded = warehouse
        .death_ranking(&warehouse.report_options())
        .expect("ranking");
    let included = warehouse
        .death_ranking(&ReportOptions::including_aggregates())
        .expect("ranking");

    // Then: Nulls never win a max and the flag decides whether World appears
    let excluded: Vec<_> = excluded
        .iter()
        .map(|row| (row.location.as_str(), row.total_death_count))
        .collect();
    assert_eq!(excluded, vec![("United States", Some(10)), ("France", Some(2))]);
    assert_eq!(included[0].location, "World");

    let continents = warehouse
        .continent_death_ranking(&warehouse.report_options())
        .expect("continents");
    assert_eq!(continents[0].continent, "North America");
    assert_eq!(continents[0].total_death_count, Some(10));
}

#[test]
fn when_user_requests_global_numbers_they_sum_across_locations() {
    // Given: Two locations on the same day
    let temp = tempdir().expect("tempdir");
    let warehouse = open_warehouse(temp.path(), true);
    seed(
        &warehouse,
        r"
INSERT INTO covid_deaths VALUES
    ('Oman', DATE '2021-06-01', 'Asia', 5000, 100, 60, '3', '2'),
    ('Peru', DATE '2021-06-01', 'South America', 9000, 300, 40, '9', ''),
    ('World', DATE '2021-06-01', NULL, 80000, 999, 999, '999', '999');
",
    );

    // When: Global numbers are computed
    let numbers = warehouse
        .global_numbers(&warehouse.report_options())
        .expect("global");

    // Then: Blank deaths are skipped and World is excluded
    assert_eq!(numbers.daily.len(), 1);
    assert_eq!(numbers.daily[0].total_cases, 100);
    assert_eq!(numbers.daily[0].total_deaths, Some(2));
    assert_eq!(numbers.daily[0].death_percentage, Some(2.0));
}

// =============================================================================
// Guarded SQL
// =============================================================================

#[test]
fn when_user_runs_write_sql_without_opting_in_it_is_rejected() {
    // Given: A warehouse with a snapshot
    let temp = tempdir().expect("tempdir");
    let warehouse = open_warehouse(temp.path(), true);
    seed(&warehouse, TESTLAND);
    warehouse.refresh_rolling_snapshot().expect("refresh");

    // When: A destructive statement is sent in read-only mode
    let error = warehouse
        .execute_query(
            "DROP TABLE percent_population_vaccinated",
            SqlLimits::default(),
            false,
        )
        .expect_err("should reject");

    // Then: It is rejected and the artifact is untouched
    assert!(matches!(error, WarehouseError::QueryRejected(_)));
    assert_eq!(
        warehouse
            .read_rolling(RollingSource::Snapshot, None)
            .expect("read")
            .len(),
        3
    );
}

#[test]
fn when_user_queries_the_view_dates_come_back_as_iso_strings() {
    // Given: Testland
    let temp = tempdir().expect("tempdir");
    let warehouse = open_warehouse(temp.path(), true);
    seed(&warehouse, TESTLAND);

    // When: The view is queried through guarded SQL
    let result = warehouse
        .execute_query(
            "SELECT date, rolling_people_vaccinated FROM vw_percent_population_vaccinated ORDER BY date",
            SqlLimits::default(),
            false,
        )
        .expect("query");

    // Then: Dates are readable and sums are plain integers
    assert_eq!(result.row_count, 3);
    assert_eq!(result.rows[0][0], serde_json::json!("2021-01-01"));
    assert_eq!(result.rows[2][1], serde_json::json!(150));
}
