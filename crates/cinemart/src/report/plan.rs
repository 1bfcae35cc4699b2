use anyhow::{Context, Result};
use rusqlite::Connection;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::error::ReportError;
use crate::sqlite::VOTES_INDEX;

/// The probe query of the index experiment: the vote-threshold ranking the
/// mart's vote-count index exists for.
pub const PLAN_PROBE_SQL: &str = r#"
SELECT tconst, average_rating, num_votes
FROM title_ratings
WHERE num_votes >= ?1
ORDER BY num_votes DESC
LIMIT 25
"#;

/// Same probe with index access suppressed so both plans can be compared.
pub const PLAN_PROBE_NO_INDEX_SQL: &str = r#"
SELECT tconst, average_rating, num_votes
FROM title_ratings NOT INDEXED
WHERE num_votes >= ?1
ORDER BY num_votes DESC
LIMIT 25
"#;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PlanVariantReport {
    pub label: String,
    pub sql: String,
    pub plan_details: Vec<String>,
    pub row_count: usize,
    pub duration_ms: u64,
    pub uses_votes_index: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanExperimentReport {
    pub vote_floor: i64,
    pub index_name: String,
    pub indexed: PlanVariantReport,
    pub unindexed: PlanVariantReport,
}

/// Run the probe twice, once letting the planner pick an index and once
/// with `NOT INDEXED`, capturing plans and wall-clock timings.
pub fn run(connection: &Connection, vote_floor: i64) -> Result<PlanExperimentReport> {
    if vote_floor < 0 {
        return Err(ReportError::invalid_configuration(format!(
            "vote floor must be non-negative, got {vote_floor}"
        ))
        .into());
    }

    let indexed = run_variant(connection, "indexed", PLAN_PROBE_SQL, vote_floor)?;
    let unindexed = run_variant(connection, "unindexed", PLAN_PROBE_NO_INDEX_SQL, vote_floor)?;

    Ok(PlanExperimentReport {
        vote_floor,
        index_name: VOTES_INDEX.to_string(),
        indexed,
        unindexed,
    })
}

fn run_variant(
    connection: &Connection,
    label: &str,
    sql: &str,
    vote_floor: i64,
) -> Result<PlanVariantReport> {
    let plan_details = explain_plan_details(connection, sql, vote_floor)?;
    let uses_votes_index = plan_details
        .iter()
        .any(|detail| detail.contains(VOTES_INDEX));

    let started = std::time::Instant::now();
    let row_count = execute_probe(connection, sql, vote_floor)?;
    let duration_ms = started.elapsed().as_millis() as u64;

    Ok(PlanVariantReport {
        label: label.to_string(),
        sql: sql.trim().to_string(),
        plan_details,
        row_count,
        duration_ms,
        uses_votes_index,
    })
}

fn explain_plan_details(
    connection: &Connection,
    sql: &str,
    vote_floor: i64,
) -> Result<Vec<String>> {
    let explain_sql = format!("EXPLAIN QUERY PLAN {sql}");
    let mut statement = connection
        .prepare(&explain_sql)
        .context("failed to prepare plan explanation")?;
    let details = statement
        .query_map([vote_floor], |row| row.get::<usize, String>(3))
        .context("failed to execute plan explanation")?;

    let mut collected = Vec::new();
    for detail in details {
        collected.push(detail.context("failed to decode plan detail row")?);
    }
    Ok(collected)
}

fn execute_probe(connection: &Connection, sql: &str, vote_floor: i64) -> Result<usize> {
    let mut statement = connection
        .prepare(sql)
        .context("failed to prepare probe query")?;
    let mut rows = statement
        .query([vote_floor])
        .context("failed to execute probe query")?;

    let mut row_count = 0usize;
    while rows
        .next()
        .context("failed to fetch probe row")?
        .is_some()
    {
        row_count += 1;
    }
    Ok(row_count)
}
