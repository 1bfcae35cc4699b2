use std::path::Path;

use anyhow::{Context, Result, anyhow};
use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, params, params_from_iter};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::models::{NameRecord, RatingRecord, TitleRecord};

pub const SQLITE_SCHEMA_VERSION: &str = "catalog.v1.sqlite.v1";
pub const TITLE_BASICS_TABLE: &str = "title_basics";
pub const TITLE_RATINGS_TABLE: &str = "title_ratings";
pub const NAME_BASICS_TABLE: &str = "name_basics";
pub const LOAD_RUNS_TABLE: &str = "load_runs";
pub const SCHEMA_META_TABLE: &str = "catalog_schema_meta";
pub const RATED_TITLES_VIEW: &str = "v_rated_titles";
pub const VOTES_INDEX: &str = "idx_title_ratings_votes";
pub const DEFAULT_INSERT_BATCH_SIZE: usize = 5_000;

pub const TITLE_BASICS_COLUMNS: &[&str] = &[
    "tconst",
    "title_type",
    "primary_title",
    "original_title",
    "is_adult",
    "start_year",
    "end_year",
    "runtime_minutes",
    "genres",
];
pub const TITLE_RATINGS_COLUMNS: &[&str] = &["tconst", "average_rating", "num_votes"];
pub const NAME_BASICS_COLUMNS: &[&str] = &[
    "nconst",
    "primary_name",
    "birth_year",
    "death_year",
    "primary_profession",
    "known_for_titles",
];

const CREATE_TITLE_BASICS_TABLE_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS title_basics (
    tconst TEXT NOT NULL PRIMARY KEY,
    title_type TEXT,
    primary_title TEXT,
    original_title TEXT,
    is_adult INTEGER,
    start_year INTEGER,
    end_year INTEGER,
    runtime_minutes INTEGER,
    genres TEXT,
    CHECK (is_adult IN (0, 1) OR is_adult IS NULL),
    CHECK (runtime_minutes IS NULL OR runtime_minutes >= 0)
);
"#;

const CREATE_TITLE_RATINGS_TABLE_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS title_ratings (
    tconst TEXT NOT NULL PRIMARY KEY,
    average_rating REAL,
    num_votes INTEGER,
    CHECK (average_rating IS NULL OR (average_rating >= 0.0 AND average_rating <= 10.0)),
    CHECK (num_votes IS NULL OR num_votes >= 0)
);
"#;

const CREATE_NAME_BASICS_TABLE_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS name_basics (
    nconst TEXT NOT NULL PRIMARY KEY,
    primary_name TEXT,
    birth_year INTEGER,
    death_year INTEGER,
    primary_profession TEXT,
    known_for_titles TEXT
);
"#;

const CREATE_INDEX_TITLE_TYPE_SQL: &str = r#"
CREATE INDEX IF NOT EXISTS idx_title_basics_type
ON title_basics (title_type);
"#;

const CREATE_INDEX_TITLE_TYPE_YEAR_SQL: &str = r#"
CREATE INDEX IF NOT EXISTS idx_title_basics_type_year
ON title_basics (title_type, start_year);
"#;

const CREATE_INDEX_RATINGS_VOTES_SQL: &str = r#"
CREATE INDEX IF NOT EXISTS idx_title_ratings_votes
ON title_ratings (num_votes DESC);
"#;

const CREATE_INDEX_NAME_PRIMARY_SQL: &str = r#"
CREATE INDEX IF NOT EXISTS idx_name_basics_primary_name
ON name_basics (primary_name);
"#;

const CREATE_VIEW_RATED_TITLES_SQL: &str = r#"
CREATE VIEW IF NOT EXISTS v_rated_titles AS
SELECT
    title_basics.tconst,
    title_basics.title_type,
    title_basics.primary_title,
    title_basics.start_year,
    title_basics.genres,
    title_ratings.average_rating,
    title_ratings.num_votes
FROM title_basics
JOIN title_ratings ON title_ratings.tconst = title_basics.tconst
WHERE title_ratings.average_rating IS NOT NULL
  AND title_ratings.num_votes IS NOT NULL;
"#;

const CREATE_LOAD_RUNS_TABLE_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS load_runs (
    load_run_id TEXT NOT NULL PRIMARY KEY,
    started_at_utc TEXT NOT NULL,
    finished_at_utc TEXT,
    status TEXT NOT NULL,
    titles_read INTEGER NOT NULL DEFAULT 0,
    titles_written INTEGER NOT NULL DEFAULT 0,
    ratings_read INTEGER NOT NULL DEFAULT 0,
    ratings_written INTEGER NOT NULL DEFAULT 0,
    names_read INTEGER NOT NULL DEFAULT 0,
    names_written INTEGER NOT NULL DEFAULT 0,
    warnings_count INTEGER NOT NULL DEFAULT 0,
    error_summary_json TEXT NOT NULL DEFAULT '{}',
    CHECK (status IN ('running', 'success', 'failed')),
    CHECK (titles_read >= 0),
    CHECK (ratings_read >= 0),
    CHECK (names_read >= 0),
    CHECK (warnings_count >= 0)
);
"#;

const CREATE_INDEX_LOAD_RUNS_STATUS_SQL: &str = r#"
CREATE INDEX IF NOT EXISTS idx_load_runs_status_time
ON load_runs (status, started_at_utc);
"#;

const CREATE_META_TABLE_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS catalog_schema_meta (
    schema_version TEXT NOT NULL,
    applied_at_utc TEXT NOT NULL
);
"#;

#[must_use]
pub fn schema_statements() -> &'static [&'static str] {
    &[
        CREATE_TITLE_BASICS_TABLE_SQL,
        CREATE_TITLE_RATINGS_TABLE_SQL,
        CREATE_NAME_BASICS_TABLE_SQL,
        CREATE_INDEX_TITLE_TYPE_SQL,
        CREATE_INDEX_TITLE_TYPE_YEAR_SQL,
        CREATE_INDEX_RATINGS_VOTES_SQL,
        CREATE_INDEX_NAME_PRIMARY_SQL,
        CREATE_VIEW_RATED_TITLES_SQL,
        CREATE_LOAD_RUNS_TABLE_SQL,
        CREATE_INDEX_LOAD_RUNS_STATUS_SQL,
        CREATE_META_TABLE_SQL,
    ]
}

#[must_use]
pub fn create_schema_sql() -> String {
    schema_statements().join("\n")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SqliteWriterConfig {
    pub batch_size: usize,
}

impl Default for SqliteWriterConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_INSERT_BATCH_SIZE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SqliteWriteStats {
    pub input_records: usize,
    pub records_written: usize,
    pub batches_committed: usize,
}

pub fn open_connection(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).with_context(|| {
            format!(
                "failed to create sqlite parent directory: {}",
                parent.display()
            )
        })?;
    }

    Connection::open(path)
        .with_context(|| format!("failed to open sqlite mart: {}", path.display()))
}

pub fn ensure_schema(connection: &Connection) -> Result<()> {
    connection
        .execute_batch(&create_schema_sql())
        .context("failed to create sqlite mart schema")?;

    if schema_meta_has_version(connection, SQLITE_SCHEMA_VERSION)? {
        return Ok(());
    }

    let applied_at_utc = OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .context("failed to format schema applied timestamp")?;
    connection
        .execute(
            &format!(
                "INSERT INTO {SCHEMA_META_TABLE} (schema_version, applied_at_utc) VALUES (?1, ?2)"
            ),
            params![SQLITE_SCHEMA_VERSION, applied_at_utc],
        )
        .context("failed to write schema meta row")?;

    Ok(())
}

fn schema_meta_has_version(connection: &Connection, schema_version: &str) -> Result<bool> {
    let query = format!(
        "SELECT EXISTS(SELECT 1 FROM {SCHEMA_META_TABLE} WHERE schema_version = ?1 LIMIT 1)"
    );
    let exists = connection
        .query_row(&query, [schema_version], |row| row.get::<usize, i64>(0))
        .context("failed to query schema version metadata")?;
    Ok(exists != 0)
}

/// Delete all catalog rows so a re-load starts clean. Load-run history stays.
pub fn truncate_catalog_tables(connection: &Connection) -> Result<()> {
    for table in [TITLE_BASICS_TABLE, TITLE_RATINGS_TABLE, NAME_BASICS_TABLE] {
        connection
            .execute(&format!("DELETE FROM {table}"), [])
            .with_context(|| format!("failed to truncate table: {table}"))?;
    }
    Ok(())
}

pub fn write_title_basics(
    connection: &mut Connection,
    records: &[TitleRecord],
    config: SqliteWriterConfig,
) -> Result<SqliteWriteStats> {
    let insert_sql = upsert_sql(TITLE_BASICS_TABLE, TITLE_BASICS_COLUMNS, "tconst");
    write_batched(connection, &insert_sql, records, config, title_values)
}

pub fn write_title_ratings(
    connection: &mut Connection,
    records: &[RatingRecord],
    config: SqliteWriterConfig,
) -> Result<SqliteWriteStats> {
    let insert_sql = upsert_sql(TITLE_RATINGS_TABLE, TITLE_RATINGS_COLUMNS, "tconst");
    write_batched(connection, &insert_sql, records, config, rating_values)
}

pub fn write_name_basics(
    connection: &mut Connection,
    records: &[NameRecord],
    config: SqliteWriterConfig,
) -> Result<SqliteWriteStats> {
    let insert_sql = upsert_sql(NAME_BASICS_TABLE, NAME_BASICS_COLUMNS, "nconst");
    write_batched(connection, &insert_sql, records, config, name_values)
}

fn write_batched<T>(
    connection: &mut Connection,
    insert_sql: &str,
    records: &[T],
    config: SqliteWriterConfig,
    to_values: impl Fn(&T) -> Vec<SqlValue>,
) -> Result<SqliteWriteStats> {
    let batch_size = config.batch_size.max(1);
    let mut records_written = 0usize;
    let mut batches_committed = 0usize;

    for batch in records.chunks(batch_size) {
        let tx = connection
            .transaction()
            .context("failed to open sqlite transaction")?;
        {
            let mut statement = tx
                .prepare_cached(insert_sql)
                .context("failed to prepare sqlite upsert statement")?;

            for record in batch {
                statement
                    .execute(params_from_iter(to_values(record)))
                    .context("failed to upsert catalog row")?;
                records_written += 1;
            }
        }
        tx.commit()
            .context("failed to commit sqlite batch transaction")?;
        batches_committed += 1;
    }

    Ok(SqliteWriteStats {
        input_records: records.len(),
        records_written,
        batches_committed,
    })
}

fn upsert_sql(table: &str, columns: &[&str], key: &str) -> String {
    let placeholders = (1..=columns.len())
        .map(|index| format!("?{index}"))
        .collect::<Vec<_>>()
        .join(", ");
    let assignments = columns
        .iter()
        .filter(|column| **column != key)
        .map(|column| format!("{column} = excluded.{column}"))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "INSERT INTO {table} ({}) VALUES ({placeholders})
         ON CONFLICT({key}) DO UPDATE SET {assignments}",
        columns.join(", "),
    )
}

fn title_values(record: &TitleRecord) -> Vec<SqlValue> {
    vec![
        text_value(&record.tconst),
        opt_text_value(record.title_type.as_deref()),
        opt_text_value(record.primary_title.as_deref()),
        opt_text_value(record.original_title.as_deref()),
        opt_bool_int_value(record.is_adult),
        opt_int_value(record.start_year),
        opt_int_value(record.end_year),
        opt_int_value(record.runtime_minutes),
        opt_text_value(record.genres.as_deref()),
    ]
}

fn rating_values(record: &RatingRecord) -> Vec<SqlValue> {
    vec![
        text_value(&record.tconst),
        opt_real_value(record.average_rating),
        opt_int_value(record.num_votes),
    ]
}

fn name_values(record: &NameRecord) -> Vec<SqlValue> {
    vec![
        text_value(&record.nconst),
        opt_text_value(record.primary_name.as_deref()),
        opt_int_value(record.birth_year),
        opt_int_value(record.death_year),
        opt_text_value(record.primary_profession.as_deref()),
        opt_text_value(record.known_for_titles.as_deref()),
    ]
}

fn text_value(value: &str) -> SqlValue {
    SqlValue::Text(value.to_string())
}

fn opt_text_value(value: Option<&str>) -> SqlValue {
    value.map_or(SqlValue::Null, text_value)
}

fn opt_int_value(value: Option<i64>) -> SqlValue {
    value.map_or(SqlValue::Null, SqlValue::Integer)
}

fn opt_real_value(value: Option<f64>) -> SqlValue {
    value.map_or(SqlValue::Null, SqlValue::Real)
}

fn opt_bool_int_value(value: Option<bool>) -> SqlValue {
    match value {
        Some(true) => SqlValue::Integer(1),
        Some(false) => SqlValue::Integer(0),
        None => SqlValue::Null,
    }
}

pub fn to_i64(value: usize, field: &str) -> Result<i64> {
    i64::try_from(value).map_err(|_| anyhow!("{field} exceeds sqlite INTEGER range"))
}
