use cinemart::models::{RatingRecord, TitleRecord};
use cinemart::sqlite::{
    SqliteWriterConfig, ensure_schema, write_title_basics, write_title_ratings,
};
use rusqlite::Connection;

fn title(index: usize) -> TitleRecord {
    TitleRecord {
        tconst: format!("tt{index:05}"),
        title_type: Some("movie".to_string()),
        primary_title: Some(format!("Title {index}")),
        original_title: None,
        is_adult: Some(false),
        start_year: Some(1950 + index as i64),
        end_year: None,
        runtime_minutes: None,
        genres: Some("Drama".to_string()),
    }
}

#[test]
fn writer_commits_in_batches_and_counts_them() {
    let mut connection = Connection::open_in_memory().expect("in-memory sqlite should open");
    ensure_schema(&connection).expect("schema should create");

    let titles = (0..7).map(title).collect::<Vec<_>>();
    let stats = write_title_basics(&mut connection, &titles, SqliteWriterConfig { batch_size: 3 })
        .expect("batched write should succeed");

    assert_eq!(stats.input_records, 7);
    assert_eq!(stats.records_written, 7);
    assert_eq!(stats.batches_committed, 3);

    let count: i64 = connection
        .query_row("SELECT COUNT(*) FROM title_basics", [], |row| row.get(0))
        .expect("count query should succeed");
    assert_eq!(count, 7);
}

#[test]
fn conflicting_keys_update_in_place() {
    let mut connection = Connection::open_in_memory().expect("in-memory sqlite should open");
    ensure_schema(&connection).expect("schema should create");

    let first = RatingRecord {
        tconst: "tt00001".to_string(),
        average_rating: Some(7.0),
        num_votes: Some(10),
    };
    let second = RatingRecord {
        tconst: "tt00001".to_string(),
        average_rating: Some(7.5),
        num_votes: Some(25),
    };

    write_title_ratings(&mut connection, &[first], SqliteWriterConfig::default())
        .expect("first write should succeed");
    write_title_ratings(&mut connection, &[second], SqliteWriterConfig::default())
        .expect("second write should succeed");

    let (rating, votes): (f64, i64) = connection
        .query_row(
            "SELECT average_rating, num_votes FROM title_ratings WHERE tconst = 'tt00001'",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .expect("row should read back");
    assert!((rating - 7.5).abs() < f64::EPSILON);
    assert_eq!(votes, 25);

    let count: i64 = connection
        .query_row("SELECT COUNT(*) FROM title_ratings", [], |row| row.get(0))
        .expect("count query should succeed");
    assert_eq!(count, 1);
}

#[test]
fn zero_batch_size_is_clamped_to_one() {
    let mut connection = Connection::open_in_memory().expect("in-memory sqlite should open");
    ensure_schema(&connection).expect("schema should create");

    let titles = (0..2).map(title).collect::<Vec<_>>();
    let stats = write_title_basics(&mut connection, &titles, SqliteWriterConfig { batch_size: 0 })
        .expect("clamped write should succeed");
    assert_eq!(stats.records_written, 2);
    assert_eq!(stats.batches_committed, 2);
}
