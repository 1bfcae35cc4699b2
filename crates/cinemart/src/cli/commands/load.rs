use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use serde_json::json;

use crate::config::RuntimePaths;
use crate::ingest::{
    CatalogLoadPlan, load_report_artifact_path, run_load, write_load_report_artifact,
};
use crate::models::ReportEnvelope;

#[derive(Debug, Clone, Args)]
pub struct LoadArgs {
    /// Path to title.basics.tsv
    #[arg(long, value_name = "PATH")]
    pub title_basics: PathBuf,

    /// Path to title.ratings.tsv
    #[arg(long, value_name = "PATH")]
    pub title_ratings: PathBuf,

    /// Path to name.basics.tsv
    #[arg(long, value_name = "PATH")]
    pub name_basics: PathBuf,

    /// Delete existing catalog rows before loading (safe for re-loads).
    #[arg(long, default_value_t = false)]
    pub truncate: bool,

    /// Abort on the first malformed row instead of skipping it.
    #[arg(long, default_value_t = false)]
    pub fail_fast: bool,
}

pub fn run(args: &LoadArgs, runtime_paths: &RuntimePaths) -> Result<()> {
    let plan = CatalogLoadPlan {
        title_basics_path: args.title_basics.clone(),
        title_ratings_path: args.title_ratings.clone(),
        name_basics_path: args.name_basics.clone(),
        sqlite_path: runtime_paths.mart_path(),
        truncate: args.truncate,
        fail_fast: args.fail_fast,
    };

    let report = match run_load(&plan) {
        Ok(report) => report,
        Err(error) => {
            let code = classify_load_error_code(&error);
            let envelope = ReportEnvelope::error("load", code, "catalog load failed")
                .with_meta("truncate", json!(args.truncate))
                .with_meta("fail_fast", json!(args.fail_fast))
                .with_meta("sqlite_path", json!(plan.sqlite_path.display().to_string()))
                .with_error_details(json!({ "cause": format!("{error:#}") }));
            return Err(envelope.into_failure());
        }
    };

    let artifact_path = load_report_artifact_path(&runtime_paths.out_dir);
    if let Err(error) = write_load_report_artifact(&artifact_path, &report) {
        let envelope = ReportEnvelope::error(
            "load",
            "load_report_artifact_write_failed",
            "failed to write load report artifact",
        )
        .with_meta("artifact_path", json!(artifact_path.display().to_string()))
        .with_error_details(json!({ "cause": format!("{error:#}") }));
        return Err(envelope.into_failure());
    }

    let warnings_count = report.warnings.len();
    let data = serde_json::to_value(&report).map_err(|error| {
        ReportEnvelope::error(
            "load",
            "load_report_encode_failed",
            "failed to encode load report",
        )
        .with_error_details(json!({ "cause": format!("{error:#}") }))
        .into_failure()
    })?;

    let mut envelope = ReportEnvelope::ok("load", data)
        .with_meta("artifact_path", json!(artifact_path.display().to_string()))
        .with_meta("sqlite_path", json!(plan.sqlite_path.display().to_string()))
        .with_meta("truncate", json!(args.truncate))
        .with_meta("fail_fast", json!(args.fail_fast))
        .with_meta("warnings_count", json!(warnings_count));
    if warnings_count > 0 {
        envelope = envelope.with_warning(
            "load_rows_skipped",
            "some input rows were skipped or a header differed",
            Some(json!({ "warnings_count": warnings_count })),
        );
    }
    envelope.emit()
}

fn classify_load_error_code(error: &anyhow::Error) -> &'static str {
    let message = format!("{error:#}");
    if message.contains("failed to open tsv file") || message.contains("tsv file is empty") {
        "load_input_missing"
    } else if message.contains("invalid tsv row") {
        "load_input_invalid"
    } else if message.contains("sqlite") {
        "load_sqlite_failure"
    } else {
        "load_failed"
    }
}
