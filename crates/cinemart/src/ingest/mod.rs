use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use rusqlite::params;
use serde::Serialize;
use serde_json::json;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::sqlite::{
    LOAD_RUNS_TABLE, SqliteWriterConfig, ensure_schema, open_connection, to_i64,
    truncate_catalog_tables, write_name_basics, write_title_basics, write_title_ratings,
};
use crate::tsv;

pub const LOAD_REPORT_SCHEMA_VERSION: &str = "cinemart.load-report.v1";
const LOAD_REPORT_ARTIFACT_PATH: &str = "reports/load_report_v1.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadRunStatus {
    Success,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogLoadPlan {
    pub title_basics_path: PathBuf,
    pub title_ratings_path: PathBuf,
    pub name_basics_path: PathBuf,
    pub sqlite_path: PathBuf,
    pub truncate: bool,
    pub fail_fast: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
pub struct TableLoadCounts {
    pub rows_read: usize,
    pub rows_written: usize,
    pub rows_skipped: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogLoadReport {
    pub schema_version: String,
    pub load_run_id: String,
    pub status: LoadRunStatus,
    pub started_at_utc: String,
    pub finished_at_utc: String,
    pub duration_ms: u64,
    pub truncated_before_load: bool,
    pub title_basics: TableLoadCounts,
    pub title_ratings: TableLoadCounts,
    pub name_basics: TableLoadCounts,
    pub warnings: Vec<String>,
}

pub fn run_load(plan: &CatalogLoadPlan) -> Result<CatalogLoadReport> {
    let started_at_utc = now_utc_rfc3339()?;
    let started_at = std::time::Instant::now();
    let load_run_id = build_load_run_id();

    let titles = tsv::read_title_basics(&plan.title_basics_path, plan.fail_fast)?;
    let ratings = tsv::read_title_ratings(&plan.title_ratings_path, plan.fail_fast)?;
    let names = tsv::read_name_basics(&plan.name_basics_path, plan.fail_fast)?;

    let mut warnings = Vec::new();
    warnings.extend(titles.warnings.iter().cloned());
    warnings.extend(ratings.warnings.iter().cloned());
    warnings.extend(names.warnings.iter().cloned());

    let mut connection = open_connection(&plan.sqlite_path)?;
    ensure_schema(&connection)?;
    insert_load_run_started(&connection, &load_run_id, &started_at_utc, warnings.len())?;

    if plan.truncate {
        truncate_catalog_tables(&connection)?;
    }

    let writer_config = SqliteWriterConfig::default();
    let write_result = write_title_basics(&mut connection, &titles.records, writer_config)
        .and_then(|title_stats| {
            let rating_stats =
                write_title_ratings(&mut connection, &ratings.records, writer_config)?;
            let name_stats = write_name_basics(&mut connection, &names.records, writer_config)?;
            Ok((title_stats, rating_stats, name_stats))
        });

    let (title_stats, rating_stats, name_stats) = match write_result {
        Ok(stats) => stats,
        Err(error) => {
            let finished_at_utc = now_utc_rfc3339()?;
            let error_summary = json!({ "message": format!("{error:#}") }).to_string();
            let _ = finalize_load_run(
                &connection,
                &load_run_id,
                LoadRunStatus::Failed,
                &finished_at_utc,
                &TableLoadCounts::default(),
                &TableLoadCounts::default(),
                &TableLoadCounts::default(),
                warnings.len(),
                &error_summary,
            );
            return Err(error).context("failed to write catalog rows to sqlite mart");
        }
    };

    let title_counts = TableLoadCounts {
        rows_read: titles.records.len() + titles.rows_skipped,
        rows_written: title_stats.records_written,
        rows_skipped: titles.rows_skipped,
    };
    let rating_counts = TableLoadCounts {
        rows_read: ratings.records.len() + ratings.rows_skipped,
        rows_written: rating_stats.records_written,
        rows_skipped: ratings.rows_skipped,
    };
    let name_counts = TableLoadCounts {
        rows_read: names.records.len() + names.rows_skipped,
        rows_written: name_stats.records_written,
        rows_skipped: names.rows_skipped,
    };

    let finished_at_utc = now_utc_rfc3339()?;
    finalize_load_run(
        &connection,
        &load_run_id,
        LoadRunStatus::Success,
        &finished_at_utc,
        &title_counts,
        &rating_counts,
        &name_counts,
        warnings.len(),
        "{}",
    )?;

    Ok(CatalogLoadReport {
        schema_version: LOAD_REPORT_SCHEMA_VERSION.to_string(),
        load_run_id,
        status: LoadRunStatus::Success,
        started_at_utc,
        finished_at_utc,
        duration_ms: started_at.elapsed().as_millis() as u64,
        truncated_before_load: plan.truncate,
        title_basics: title_counts,
        title_ratings: rating_counts,
        name_basics: name_counts,
        warnings,
    })
}

#[must_use]
pub fn load_report_artifact_path(out_dir: &Path) -> PathBuf {
    out_dir.join(LOAD_REPORT_ARTIFACT_PATH)
}

pub fn write_load_report_artifact(path: &Path, report: &CatalogLoadReport) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).with_context(|| {
            format!("failed to create load report dir: {}", parent.display())
        })?;
    }
    let encoded =
        serde_json::to_string_pretty(report).context("failed to encode load report artifact")?;
    std::fs::write(path, encoded)
        .with_context(|| format!("failed to write load report artifact: {}", path.display()))?;
    Ok(())
}

fn insert_load_run_started(
    connection: &rusqlite::Connection,
    load_run_id: &str,
    started_at_utc: &str,
    warnings_count: usize,
) -> Result<()> {
    connection
        .execute(
            &format!(
                "INSERT INTO {LOAD_RUNS_TABLE} (load_run_id, started_at_utc, status, warnings_count)
                 VALUES (?1, ?2, 'running', ?3)"
            ),
            params![
                load_run_id,
                started_at_utc,
                to_i64(warnings_count, "warnings_count")?
            ],
        )
        .with_context(|| format!("failed to insert load run start row: {load_run_id}"))?;
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn finalize_load_run(
    connection: &rusqlite::Connection,
    load_run_id: &str,
    status: LoadRunStatus,
    finished_at_utc: &str,
    title_counts: &TableLoadCounts,
    rating_counts: &TableLoadCounts,
    name_counts: &TableLoadCounts,
    warnings_count: usize,
    error_summary_json: &str,
) -> Result<()> {
    let status_key = match status {
        LoadRunStatus::Success => "success",
        LoadRunStatus::Failed => "failed",
    };
    connection
        .execute(
            &format!(
                "UPDATE {LOAD_RUNS_TABLE}
                 SET status = ?2,
                     finished_at_utc = ?3,
                     titles_read = ?4,
                     titles_written = ?5,
                     ratings_read = ?6,
                     ratings_written = ?7,
                     names_read = ?8,
                     names_written = ?9,
                     warnings_count = ?10,
                     error_summary_json = ?11
                 WHERE load_run_id = ?1"
            ),
            params![
                load_run_id,
                status_key,
                finished_at_utc,
                to_i64(title_counts.rows_read, "titles_read")?,
                to_i64(title_counts.rows_written, "titles_written")?,
                to_i64(rating_counts.rows_read, "ratings_read")?,
                to_i64(rating_counts.rows_written, "ratings_written")?,
                to_i64(name_counts.rows_read, "names_read")?,
                to_i64(name_counts.rows_written, "names_written")?,
                to_i64(warnings_count, "warnings_count")?,
                error_summary_json
            ],
        )
        .with_context(|| format!("failed to finalize load run row: {load_run_id}"))?;
    Ok(())
}

fn build_load_run_id() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |duration| duration.as_nanos());
    format!("load-{nanos}")
}

fn now_utc_rfc3339() -> Result<String> {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .context("failed to format load run timestamp")
}
