use cinemart::models::RatingRecord;
use cinemart::report::ReportError;
use cinemart::report::plan;
use cinemart::sqlite::{SqliteWriterConfig, ensure_schema, write_title_ratings};
use rusqlite::Connection;

fn seeded_connection(rows: usize) -> Connection {
    let mut connection = Connection::open_in_memory().expect("in-memory sqlite should open");
    ensure_schema(&connection).expect("schema should create");

    let ratings = (0..rows)
        .map(|index| RatingRecord {
            tconst: format!("tt{index:07}"),
            average_rating: Some(5.0 + (index % 50) as f64 / 10.0),
            num_votes: Some(10 + (index as i64) * 37),
        })
        .collect::<Vec<_>>();
    write_title_ratings(&mut connection, &ratings, SqliteWriterConfig::default())
        .expect("ratings should write");
    connection
}

#[test]
fn indexed_variant_uses_the_votes_index() {
    let connection = seeded_connection(500);
    let report = plan::run(&connection, 1_000).expect("experiment should run");

    assert_eq!(report.index_name, "idx_title_ratings_votes");
    assert!(
        report.indexed.uses_votes_index,
        "default plan should search via the votes index: {:?}",
        report.indexed.plan_details
    );
    assert!(
        report
            .indexed
            .plan_details
            .iter()
            .any(|detail| detail.contains("idx_title_ratings_votes"))
    );
}

#[test]
fn unindexed_variant_scans_the_table() {
    let connection = seeded_connection(500);
    let report = plan::run(&connection, 1_000).expect("experiment should run");

    assert!(!report.unindexed.uses_votes_index);
    assert!(
        report
            .unindexed
            .plan_details
            .iter()
            .any(|detail| detail.contains("SCAN")),
        "suppressed-index plan should be a scan: {:?}",
        report.unindexed.plan_details
    );
}

#[test]
fn both_variants_return_the_same_rows() {
    let connection = seeded_connection(500);
    let report = plan::run(&connection, 1_000).expect("experiment should run");

    assert_eq!(report.indexed.row_count, report.unindexed.row_count);
    assert!(report.indexed.row_count <= 25, "the probe query is capped");
    assert!(report.indexed.row_count > 0, "the fixture exceeds the floor");
}

#[test]
fn negative_floor_is_invalid_configuration() {
    let connection = seeded_connection(10);
    let err = plan::run(&connection, -1).expect_err("negative floor must fail");
    assert_eq!(
        err.downcast_ref::<ReportError>().map(ReportError::code),
        Some("invalid_configuration")
    );
}
