use anyhow::Result;
use clap::{Args, Subcommand, ValueEnum};
use rusqlite::Connection;
use serde_json::json;

use crate::config::RuntimePaths;
use crate::models::ReportEnvelope;
use crate::report::actor_rating::{
    self, ActorRatingParams, DEFAULT_LIMIT, DEFAULT_MIN_VOTES,
};
use crate::report::genre_top::{self, DEFAULT_TITLE_TYPE};
use crate::report::weighted::{DEFAULT_TOP_PER_GENRE, WeightedRankParams};
use crate::report::{ReportError, filmography, plan, table};
use crate::sqlite::{ensure_schema, open_connection};

#[derive(Debug, Clone, Args)]
pub struct ReportArgs {
    #[command(subcommand)]
    pub command: ReportCommand,
}

#[derive(Debug, Clone, Subcommand)]
pub enum ReportCommand {
    /// Top titles per genre ranked by shrinkage-weighted rating.
    GenreTop(GenreTopArgs),
    /// Known-for filmography of one person.
    Filmography(FilmographyArgs),
    /// Vote-weighted average rating per person above a votes threshold.
    ActorRatings(ActorRatingsArgs),
    /// Query-plan experiment for the vote-threshold probe query.
    Plan(PlanArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Json => f.write_str("json"),
            Self::Table => f.write_str("table"),
        }
    }
}

#[derive(Debug, Clone, Args)]
pub struct GenreTopArgs {
    /// Title category the report is restricted to.
    #[arg(long, default_value = DEFAULT_TITLE_TYPE)]
    pub title_type: String,

    /// Prior strength `m`: vote floor for both the global mean and the
    /// report filter.
    #[arg(long, default_value_t = 1_000)]
    pub vote_floor: i64,

    #[arg(long, value_name = "YEAR")]
    pub year_from: Option<i64>,

    #[arg(long, value_name = "YEAR")]
    pub year_to: Option<i64>,

    #[arg(long, default_value_t = DEFAULT_TOP_PER_GENRE)]
    pub top_per_genre: usize,

    #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
    pub format: OutputFormat,
}

#[derive(Debug, Clone, Args)]
pub struct FilmographyArgs {
    /// Person to look up, by nconst or exact primary name.
    #[arg(value_name = "PERSON")]
    pub person: String,

    #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
    pub format: OutputFormat,
}

#[derive(Debug, Clone, Args)]
pub struct ActorRatingsArgs {
    /// Minimum votes a known-for title needs to count.
    #[arg(long, default_value_t = DEFAULT_MIN_VOTES)]
    pub min_votes: i64,

    #[arg(long, default_value_t = DEFAULT_LIMIT)]
    pub limit: usize,

    /// Substring filter on primary_profession (e.g. `actor`).
    #[arg(long)]
    pub profession: Option<String>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
    pub format: OutputFormat,
}

#[derive(Debug, Clone, Args)]
pub struct PlanArgs {
    #[arg(long, default_value_t = 1_000)]
    pub vote_floor: i64,
}

pub fn run(args: &ReportArgs, runtime_paths: &RuntimePaths) -> Result<()> {
    match &args.command {
        ReportCommand::GenreTop(genre_args) => run_genre_top(genre_args, runtime_paths),
        ReportCommand::Filmography(filmography_args) => {
            run_filmography(filmography_args, runtime_paths)
        }
        ReportCommand::ActorRatings(actor_args) => run_actor_ratings(actor_args, runtime_paths),
        ReportCommand::Plan(plan_args) => run_plan(plan_args, runtime_paths),
    }
}

fn run_genre_top(args: &GenreTopArgs, runtime_paths: &RuntimePaths) -> Result<()> {
    const COMMAND: &str = "report.genre-top";

    let params = WeightedRankParams {
        vote_floor: args.vote_floor,
        year_from: args.year_from,
        year_to: args.year_to,
        top_per_genre: args.top_per_genre,
    };
    // Configuration is rejected before the mart is even opened.
    if let Err(error) = params.validate() {
        return Err(report_error_envelope(COMMAND, &error.into()).into_failure());
    }

    let connection = open_mart(COMMAND, runtime_paths)?;
    let started = std::time::Instant::now();
    let report = genre_top::run(&connection, &args.title_type, &params)
        .map_err(|error| report_error_envelope(COMMAND, &error).into_failure())?;
    let duration_ms = started.elapsed().as_millis() as u64;

    if args.format == OutputFormat::Table {
        let rows = report
            .rows
            .iter()
            .map(|row| {
                vec![
                    row.genre.clone(),
                    row.rank.to_string(),
                    row.tconst.clone(),
                    row.primary_title.clone(),
                    table::cell_opt_i64(row.start_year),
                    format!("{:.1}", row.average_rating),
                    row.num_votes.to_string(),
                    table::cell_score(row.weighted_score),
                ]
            })
            .collect::<Vec<_>>();
        print!(
            "{}",
            table::render_table(
                &["genre", "rank", "tconst", "title", "year", "rating", "votes", "score"],
                &rows,
            )
        );
        return Ok(());
    }

    let row_count = report.rows.len();
    let data = serde_json::to_value(&report)
        .map_err(|error| encode_failure(COMMAND, &error).into_failure())?;
    ReportEnvelope::ok(COMMAND, data)
        .with_meta("title_type", json!(args.title_type))
        .with_meta("vote_floor", json!(args.vote_floor))
        .with_meta("top_per_genre", json!(args.top_per_genre))
        .with_meta("genre_count", json!(report.genre_count))
        .with_meta("row_count", json!(row_count))
        .with_meta("duration_ms", json!(duration_ms))
        .emit()
}

fn run_filmography(args: &FilmographyArgs, runtime_paths: &RuntimePaths) -> Result<()> {
    const COMMAND: &str = "report.filmography";

    let connection = open_mart(COMMAND, runtime_paths)?;
    let started = std::time::Instant::now();
    let report = filmography::run(&connection, &args.person)
        .map_err(|error| report_error_envelope(COMMAND, &error).into_failure())?;
    let duration_ms = started.elapsed().as_millis() as u64;

    if args.format == OutputFormat::Table {
        let rows = report
            .titles
            .iter()
            .map(|row| {
                vec![
                    row.tconst.clone(),
                    table::cell_opt_str(row.primary_title.as_deref()),
                    table::cell_opt_str(row.title_type.as_deref()),
                    table::cell_opt_i64(row.start_year),
                    row.average_rating
                        .map_or_else(|| "-".to_string(), |rating| format!("{rating:.1}")),
                    table::cell_opt_i64(row.num_votes),
                ]
            })
            .collect::<Vec<_>>();
        print!(
            "{}",
            table::render_table(&["tconst", "title", "type", "year", "rating", "votes"], &rows)
        );
        return Ok(());
    }

    let matched_people = report.matched_people;
    let title_count = report.titles.len();
    let missing_count = report.missing_titles.len();
    let data = serde_json::to_value(&report)
        .map_err(|error| encode_failure(COMMAND, &error).into_failure())?;
    let mut envelope = ReportEnvelope::ok(COMMAND, data)
        .with_meta("person", json!(args.person))
        .with_meta("matched_people", json!(matched_people))
        .with_meta("title_count", json!(title_count))
        .with_meta("duration_ms", json!(duration_ms));
    if matched_people > 1 {
        envelope = envelope.with_warning(
            "ambiguous_person_name",
            "multiple people share this name; reporting the lowest nconst",
            Some(json!({ "matched_people": matched_people })),
        );
    }
    if missing_count > 0 {
        envelope = envelope.with_warning(
            "known_for_titles_missing",
            "some known-for titles are absent from the catalog",
            Some(json!({ "missing_count": missing_count })),
        );
    }
    envelope.emit()
}

fn run_actor_ratings(args: &ActorRatingsArgs, runtime_paths: &RuntimePaths) -> Result<()> {
    const COMMAND: &str = "report.actor-ratings";

    let params = ActorRatingParams {
        min_votes: args.min_votes,
        limit: args.limit,
        profession: args.profession.clone(),
    };
    if let Err(error) = params.validate() {
        return Err(report_error_envelope(COMMAND, &error.into()).into_failure());
    }

    let connection = open_mart(COMMAND, runtime_paths)?;
    let started = std::time::Instant::now();
    let report = actor_rating::run(&connection, &params)
        .map_err(|error| report_error_envelope(COMMAND, &error).into_failure())?;
    let duration_ms = started.elapsed().as_millis() as u64;

    if args.format == OutputFormat::Table {
        let rows = report
            .rows
            .iter()
            .map(|row| {
                vec![
                    row.rank.to_string(),
                    row.nconst.clone(),
                    table::cell_opt_str(row.primary_name.as_deref()),
                    row.rated_titles.to_string(),
                    row.total_votes.to_string(),
                    table::cell_score(row.weighted_rating),
                ]
            })
            .collect::<Vec<_>>();
        print!(
            "{}",
            table::render_table(
                &["rank", "nconst", "name", "titles", "votes", "rating"],
                &rows,
            )
        );
        return Ok(());
    }

    let row_count = report.rows.len();
    let data = serde_json::to_value(&report)
        .map_err(|error| encode_failure(COMMAND, &error).into_failure())?;
    ReportEnvelope::ok(COMMAND, data)
        .with_meta("min_votes", json!(args.min_votes))
        .with_meta("limit", json!(args.limit))
        .with_meta("profession", json!(args.profession))
        .with_meta("row_count", json!(row_count))
        .with_meta("duration_ms", json!(duration_ms))
        .emit()
}

fn run_plan(args: &PlanArgs, runtime_paths: &RuntimePaths) -> Result<()> {
    const COMMAND: &str = "report.plan";

    if args.vote_floor < 0 {
        let error = ReportError::invalid_configuration(format!(
            "vote floor must be non-negative, got {}",
            args.vote_floor
        ));
        return Err(report_error_envelope(COMMAND, &error.into()).into_failure());
    }

    let connection = open_mart(COMMAND, runtime_paths)?;
    let report = plan::run(&connection, args.vote_floor)
        .map_err(|error| report_error_envelope(COMMAND, &error).into_failure())?;

    let indexed_uses_index = report.indexed.uses_votes_index;
    let data = serde_json::to_value(&report)
        .map_err(|error| encode_failure(COMMAND, &error).into_failure())?;
    ReportEnvelope::ok(COMMAND, data)
        .with_meta("vote_floor", json!(args.vote_floor))
        .with_meta("indexed_uses_votes_index", json!(indexed_uses_index))
        .emit()
}

fn open_mart(command: &str, runtime_paths: &RuntimePaths) -> Result<Connection> {
    let sqlite_path = runtime_paths.mart_path();
    let connection = open_connection(&sqlite_path).map_err(|error| {
        ReportEnvelope::error(command, "report_mart_unavailable", "unable to open sqlite mart")
            .with_meta("sqlite_path", json!(sqlite_path.display().to_string()))
            .with_error_details(json!({ "cause": format!("{error:#}") }))
            .into_failure()
    })?;
    ensure_schema(&connection).map_err(|error| {
        ReportEnvelope::error(
            command,
            "report_schema_unavailable",
            "failed to ensure mart schema",
        )
        .with_meta("sqlite_path", json!(sqlite_path.display().to_string()))
        .with_error_details(json!({ "cause": format!("{error:#}") }))
        .into_failure()
    })?;
    Ok(connection)
}

/// Map a report failure onto a stable envelope code: the typed taxonomy
/// keeps its own codes, everything else is a generic execution failure.
fn report_error_envelope(command: &str, error: &anyhow::Error) -> ReportEnvelope {
    if let Some(report_error) = error.downcast_ref::<ReportError>() {
        ReportEnvelope::error(command, report_error.code(), report_error.to_string())
    } else {
        ReportEnvelope::error(command, "report_execution_failed", "report execution failed")
            .with_error_details(json!({ "cause": format!("{error:#}") }))
    }
}

fn encode_failure(command: &str, error: &serde_json::Error) -> ReportEnvelope {
    ReportEnvelope::error(
        command,
        "report_response_encode_failed",
        "failed to encode report response",
    )
    .with_error_details(json!({ "cause": format!("{error}") }))
}
