use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use cinemart::ingest::{CatalogLoadPlan, LoadRunStatus, run_load};
use cinemart::sqlite::open_connection;

fn unique_temp_dir(prefix: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system time should be after unix epoch")
        .as_nanos();
    let dir = std::env::temp_dir().join(format!("{prefix}-{nanos}"));
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    dir
}

fn write_fixture(path: &Path, lines: &[&str]) {
    std::fs::write(path, lines.join("\n")).expect("fixture should be writable");
}

fn write_standard_fixtures(dir: &Path) -> (PathBuf, PathBuf, PathBuf) {
    let titles = dir.join("title.basics.tsv");
    write_fixture(
        &titles,
        &[
            "tconst\ttitleType\tprimaryTitle\toriginalTitle\tisAdult\tstartYear\tendYear\truntimeMinutes\tgenres",
            "tt0000001\tmovie\tFirst Movie\tFirst Movie\t0\t1994\t\\N\t120\tDrama,Crime",
            "tt0000002\tmovie\tSecond Movie\tSecond Movie\t0\t1999\t\\N\t95\t\\N",
            "tt0000003\ttvSeries\tSome Show\tSome Show\t0\t2004\t2009\t45\tComedy",
        ],
    );

    let ratings = dir.join("title.ratings.tsv");
    write_fixture(
        &ratings,
        &[
            "tconst\taverageRating\tnumVotes",
            "tt0000001\t9.2\t2500000",
            "tt0000002\t7.4\t120000",
            "tt0000003\t8.1\t64000",
        ],
    );

    let names = dir.join("name.basics.tsv");
    write_fixture(
        &names,
        &[
            "nconst\tprimaryName\tbirthYear\tdeathYear\tprimaryProfession\tknownForTitles",
            "nm0000001\tPat Example\t1960\t\\N\tactor,producer\ttt0000001,tt0000002",
        ],
    );

    (titles, ratings, names)
}

fn plan_for(dir: &Path) -> CatalogLoadPlan {
    let (titles, ratings, names) = write_standard_fixtures(dir);
    CatalogLoadPlan {
        title_basics_path: titles,
        title_ratings_path: ratings,
        name_basics_path: names,
        sqlite_path: dir.join("catalog.sqlite"),
        truncate: false,
        fail_fast: false,
    }
}

#[test]
fn load_writes_all_tables_and_reports_counts() {
    let dir = unique_temp_dir("cinemart-load-counts");
    let plan = plan_for(&dir);

    let report = run_load(&plan).expect("load should succeed");
    assert_eq!(report.status, LoadRunStatus::Success);
    assert_eq!(report.title_basics.rows_read, 3);
    assert_eq!(report.title_basics.rows_written, 3);
    assert_eq!(report.title_ratings.rows_written, 3);
    assert_eq!(report.name_basics.rows_written, 1);
    assert!(report.warnings.is_empty());

    let connection = open_connection(&plan.sqlite_path).expect("mart should reopen");
    let title_count: i64 = connection
        .query_row("SELECT COUNT(*) FROM title_basics", [], |row| row.get(0))
        .expect("count query should succeed");
    assert_eq!(title_count, 3);

    let null_genres: i64 = connection
        .query_row(
            "SELECT COUNT(*) FROM title_basics WHERE tconst = 'tt0000002' AND genres IS NULL",
            [],
            |row| row.get(0),
        )
        .expect("null genre query should succeed");
    assert_eq!(null_genres, 1, "the \\N genre column must load as NULL");

    let run_status: String = connection
        .query_row(
            "SELECT status FROM load_runs ORDER BY started_at_utc DESC LIMIT 1",
            [],
            |row| row.get(0),
        )
        .expect("load run row should exist");
    assert_eq!(run_status, "success");
}

#[test]
fn malformed_rows_are_skipped_with_warnings() {
    let dir = unique_temp_dir("cinemart-load-skip");
    let mut plan = plan_for(&dir);

    let ratings = dir.join("title.ratings.broken.tsv");
    write_fixture(
        &ratings,
        &[
            "tconst\taverageRating\tnumVotes",
            "tt0000001\t9.2\t2500000",
            "tt0000009\tnot-a-number\t100",
            "tt0000010\t12.5\t100",
            "tt0000002\t7.4\t120000",
        ],
    );
    plan.title_ratings_path = ratings;

    let report = run_load(&plan).expect("load should succeed despite bad rows");
    assert_eq!(report.title_ratings.rows_written, 2);
    assert_eq!(report.title_ratings.rows_skipped, 2);
    assert_eq!(report.warnings.len(), 2);
    assert!(report.warnings.iter().any(|warning| warning.contains("row 3")));
}

#[test]
fn fail_fast_aborts_on_the_first_malformed_row() {
    let dir = unique_temp_dir("cinemart-load-failfast");
    let mut plan = plan_for(&dir);
    plan.fail_fast = true;

    let ratings = dir.join("title.ratings.broken.tsv");
    write_fixture(
        &ratings,
        &[
            "tconst\taverageRating\tnumVotes",
            "tt0000009\tbroken\t100",
        ],
    );
    plan.title_ratings_path = ratings;

    let err = run_load(&plan).expect_err("fail-fast load must abort");
    assert!(format!("{err:#}").contains("invalid tsv row"));
}

#[test]
fn header_mismatch_warns_but_load_continues() {
    let dir = unique_temp_dir("cinemart-load-header");
    let mut plan = plan_for(&dir);

    let names = dir.join("name.renamed.tsv");
    write_fixture(
        &names,
        &[
            "id\tname\tborn\tdied\tjobs\ttitles",
            "nm0000002\tSam Example\t1975\t\\N\tactress\ttt0000003",
        ],
    );
    plan.name_basics_path = names;

    let report = run_load(&plan).expect("load should succeed");
    assert_eq!(report.name_basics.rows_written, 1);
    assert!(
        report
            .warnings
            .iter()
            .any(|warning| warning.contains("header mismatch")),
        "expected a header mismatch warning"
    );
}

#[test]
fn reloading_upserts_instead_of_duplicating() {
    let dir = unique_temp_dir("cinemart-load-upsert");
    let plan = plan_for(&dir);

    run_load(&plan).expect("first load should succeed");

    // Overwrite one rating and load again without truncate.
    write_fixture(
        &plan.title_ratings_path,
        &[
            "tconst\taverageRating\tnumVotes",
            "tt0000001\t9.3\t2600000",
            "tt0000002\t7.4\t120000",
            "tt0000003\t8.1\t64000",
        ],
    );
    run_load(&plan).expect("second load should succeed");

    let connection = open_connection(&plan.sqlite_path).expect("mart should reopen");
    let rating_count: i64 = connection
        .query_row("SELECT COUNT(*) FROM title_ratings", [], |row| row.get(0))
        .expect("count query should succeed");
    assert_eq!(rating_count, 3, "reload must not duplicate rows");

    let updated: f64 = connection
        .query_row(
            "SELECT average_rating FROM title_ratings WHERE tconst = 'tt0000001'",
            [],
            |row| row.get(0),
        )
        .expect("updated rating should read back");
    assert!((updated - 9.3).abs() < f64::EPSILON);
}

#[test]
fn truncate_clears_previous_rows_before_loading() {
    let dir = unique_temp_dir("cinemart-load-truncate");
    let mut plan = plan_for(&dir);

    run_load(&plan).expect("first load should succeed");

    // Second load sees a single title and truncates the rest away.
    write_fixture(
        &plan.title_basics_path,
        &[
            "tconst\ttitleType\tprimaryTitle\toriginalTitle\tisAdult\tstartYear\tendYear\truntimeMinutes\tgenres",
            "tt0000001\tmovie\tFirst Movie\tFirst Movie\t0\t1994\t\\N\t120\tDrama,Crime",
        ],
    );
    write_fixture(
        &plan.title_ratings_path,
        &["tconst\taverageRating\tnumVotes", "tt0000001\t9.2\t2500000"],
    );
    write_fixture(
        &plan.name_basics_path,
        &["nconst\tprimaryName\tbirthYear\tdeathYear\tprimaryProfession\tknownForTitles"],
    );
    plan.truncate = true;
    let report = run_load(&plan).expect("truncating load should succeed");
    assert!(report.truncated_before_load);

    let connection = open_connection(&plan.sqlite_path).expect("mart should reopen");
    let title_count: i64 = connection
        .query_row("SELECT COUNT(*) FROM title_basics", [], |row| row.get(0))
        .expect("count query should succeed");
    assert_eq!(title_count, 1);

    let name_count: i64 = connection
        .query_row("SELECT COUNT(*) FROM name_basics", [], |row| row.get(0))
        .expect("count query should succeed");
    assert_eq!(name_count, 0);
}
