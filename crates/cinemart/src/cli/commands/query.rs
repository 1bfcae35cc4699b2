use anyhow::{Context, Error, Result};
use clap::{Args, Subcommand};
use rusqlite::Connection;
use rusqlite::types::Value as SqlValue;
use serde::Serialize;
use serde_json::{Value, json};

use crate::config::RuntimePaths;
use crate::models::ReportEnvelope;
use crate::report::actor_rating::ActorRatingRow;
use crate::report::filmography::FilmographyRow;
use crate::report::genre_top::GenreTopRow;
use crate::report::plan::PlanVariantReport;
use crate::sqlite::{SCHEMA_META_TABLE, ensure_schema, open_connection};

pub const DEFAULT_ROW_CAP: usize = 1_000;

#[derive(Debug, Clone, Args)]
pub struct QueryArgs {
    #[command(subcommand)]
    pub command: QueryCommand,
}

#[derive(Debug, Clone, Subcommand)]
pub enum QueryCommand {
    /// Run one read-only SQL statement against the mart.
    Sql(QuerySqlArgs),
    /// List mart tables, views, and their columns.
    Schema(QuerySchemaArgs),
    /// Print the JSON Schemas of the report row types.
    Contract,
}

#[derive(Debug, Clone, Args)]
pub struct QuerySqlArgs {
    #[arg(value_name = "SQL")]
    pub sql: String,

    /// Positional statement parameters as a JSON scalar or array.
    #[arg(long, value_name = "JSON")]
    pub params: Option<String>,

    #[arg(long, default_value_t = DEFAULT_ROW_CAP)]
    pub row_cap: usize,
}

#[derive(Debug, Clone, Args)]
pub struct QuerySchemaArgs {
    #[arg(long, default_value_t = false)]
    pub include_internal: bool,
}

pub fn run(args: &QueryArgs, runtime_paths: &RuntimePaths) -> Result<()> {
    match &args.command {
        QueryCommand::Sql(sql_args) => run_sql(sql_args, runtime_paths),
        QueryCommand::Schema(schema_args) => run_schema(schema_args, runtime_paths),
        QueryCommand::Contract => run_contract(),
    }
}

fn run_sql(args: &QuerySqlArgs, runtime_paths: &RuntimePaths) -> Result<()> {
    const COMMAND: &str = "query.sql";

    if args.row_cap == 0 {
        let envelope = ReportEnvelope::error(
            COMMAND,
            "invalid_configuration",
            "row cap must be greater than zero",
        )
        .with_error_details(json!({ "row_cap": args.row_cap }));
        return Err(envelope.into_failure());
    }

    if let Err(violation) = validate_read_only_sql(&args.sql) {
        let envelope =
            ReportEnvelope::error(COMMAND, "sql_guardrail_violation", violation.message)
                .with_error_details(json!({
                    "reason": violation.reason,
                    "allowed_forms": [
                        "SELECT ...",
                        "WITH ... SELECT ...",
                        "EXPLAIN SELECT ...",
                        "EXPLAIN QUERY PLAN SELECT ..."
                    ]
                }));
        return Err(envelope.into_failure());
    }

    let params = parse_query_params(args.params.as_deref()).map_err(|error| {
        ReportEnvelope::error(COMMAND, "query_params_invalid", "invalid query params")
            .with_error_details(json!({ "cause": format!("{error:#}") }))
            .into_failure()
    })?;

    let connection = open_mart(COMMAND, runtime_paths)?;
    let started = std::time::Instant::now();
    let result =
        execute_read_only_query(&connection, &args.sql, &params, args.row_cap).map_err(
            |error| {
                ReportEnvelope::error(COMMAND, "query_execution_failed", "query execution failed")
                    .with_error_details(json!({ "cause": format!("{error:#}") }))
                    .into_failure()
            },
        )?;
    let duration_ms = started.elapsed().as_millis() as u64;

    ReportEnvelope::ok(COMMAND, json!({ "rows": result.rows }))
        .with_meta("column_names", json!(result.column_names))
        .with_meta("row_count", json!(result.row_count))
        .with_meta("truncated", json!(result.truncated))
        .with_meta("row_cap", json!(args.row_cap))
        .with_meta("params_count", json!(params.len()))
        .with_meta("duration_ms", json!(duration_ms))
        .emit()
}

#[derive(Debug, Clone, Serialize)]
struct SchemaColumnDescriptor {
    ordinal: i64,
    name: String,
    declared_type: Option<String>,
    nullable: bool,
    primary_key_position: i64,
}

#[derive(Debug, Clone, Serialize)]
struct SchemaObjectDescriptor {
    name: String,
    kind: String,
    internal: bool,
    columns: Vec<SchemaColumnDescriptor>,
}

fn run_schema(args: &QuerySchemaArgs, runtime_paths: &RuntimePaths) -> Result<()> {
    const COMMAND: &str = "query.schema";

    let connection = open_mart(COMMAND, runtime_paths)?;
    let objects =
        load_schema_descriptors(&connection, args.include_internal).map_err(|error| {
            ReportEnvelope::error(
                COMMAND,
                "query_schema_introspection_failed",
                "failed to introspect mart schema",
            )
            .with_error_details(json!({ "cause": format!("{error:#}") }))
            .into_failure()
        })?;

    let (tables, views): (Vec<_>, Vec<_>) = objects
        .into_iter()
        .partition(|object| object.kind == "table");
    let table_count = tables.len();
    let view_count = views.len();

    ReportEnvelope::ok(COMMAND, json!({ "tables": tables, "views": views }))
        .with_meta("include_internal", json!(args.include_internal))
        .with_meta("table_count", json!(table_count))
        .with_meta("view_count", json!(view_count))
        .emit()
}

fn run_contract() -> Result<()> {
    const COMMAND: &str = "query.contract";

    let contract = json!({
        "genre_top_row": schema_value::<GenreTopRow>(),
        "filmography_row": schema_value::<FilmographyRow>(),
        "actor_rating_row": schema_value::<ActorRatingRow>(),
        "plan_variant": schema_value::<PlanVariantReport>(),
    });

    ReportEnvelope::ok(COMMAND, contract)
        .with_meta("row_type_count", json!(4))
        .emit()
}

fn schema_value<T: schemars::JsonSchema>() -> Value {
    serde_json::to_value(schemars::schema_for!(T)).unwrap_or(Value::Null)
}

fn open_mart(command: &str, runtime_paths: &RuntimePaths) -> Result<Connection> {
    let sqlite_path = runtime_paths.mart_path();
    let connection = open_connection(&sqlite_path).map_err(|error| {
        ReportEnvelope::error(command, "query_mart_unavailable", "unable to open sqlite mart")
            .with_meta("sqlite_path", json!(sqlite_path.display().to_string()))
            .with_error_details(json!({ "cause": format!("{error:#}") }))
            .into_failure()
    })?;
    ensure_schema(&connection).map_err(|error| {
        ReportEnvelope::error(
            command,
            "query_schema_unavailable",
            "failed to ensure mart schema",
        )
        .with_meta("sqlite_path", json!(sqlite_path.display().to_string()))
        .with_error_details(json!({ "cause": format!("{error:#}") }))
        .into_failure()
    })?;
    Ok(connection)
}

#[derive(Debug, Clone)]
pub struct SqlGuardrailViolation {
    pub reason: &'static str,
    pub message: String,
}

/// Accept exactly one `SELECT`-shaped statement; everything that could
/// write, reconfigure, or chain statements is refused up front.
pub fn validate_read_only_sql(raw_sql: &str) -> std::result::Result<(), SqlGuardrailViolation> {
    const MUTATING_KEYWORDS: &[&str] = &[
        "insert", "update", "delete", "create", "alter", "drop", "replace", "truncate", "attach",
        "detach", "pragma", "vacuum", "reindex", "analyze", "begin", "commit", "rollback",
    ];

    let mut candidate = raw_sql.trim();
    while let Some(stripped) = candidate.strip_suffix(';') {
        candidate = stripped.trim_end();
    }

    if candidate.is_empty() {
        return Err(SqlGuardrailViolation {
            reason: "empty_statement",
            message: "SQL query is empty; provide a SELECT/CTE/EXPLAIN-SELECT statement"
                .to_string(),
        });
    }
    if candidate.contains(';') {
        return Err(SqlGuardrailViolation {
            reason: "multi_statement",
            message: "multi-statement SQL is not allowed; submit exactly one read-only statement"
                .to_string(),
        });
    }

    let normalized = candidate.to_ascii_lowercase();
    let mutating = normalized
        .split(|ch: char| !ch.is_ascii_alphanumeric() && ch != '_')
        .find(|token| MUTATING_KEYWORDS.contains(token));
    if let Some(keyword) = mutating {
        return Err(SqlGuardrailViolation {
            reason: "mutating_statement",
            message: format!("mutating SQL keyword `{keyword}` is not allowed in query.sql"),
        });
    }

    let allowed = normalized.starts_with("select")
        || normalized.starts_with("with")
        || normalized.starts_with("explain select")
        || normalized.starts_with("explain query plan select");
    if !allowed {
        return Err(SqlGuardrailViolation {
            reason: "unsupported_statement",
            message: "only SELECT, WITH ... SELECT, and EXPLAIN ... SELECT statements are allowed"
                .to_string(),
        });
    }

    Ok(())
}

#[derive(Debug)]
pub struct QueryExecutionResult {
    pub column_names: Vec<String>,
    pub rows: Vec<Value>,
    pub row_count: usize,
    pub truncated: bool,
}

pub fn execute_read_only_query(
    connection: &Connection,
    sql: &str,
    params: &[SqlValue],
    row_cap: usize,
) -> Result<QueryExecutionResult> {
    let mut statement = connection.prepare(sql).context("failed to prepare query")?;
    let column_names = statement
        .column_names()
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>();

    let mut rows = statement
        .query(rusqlite::params_from_iter(params.iter()))
        .context("failed to execute query")?;
    let mut result_rows = Vec::new();
    let mut truncated = false;
    while let Some(row) = rows.next().context("failed to fetch query row")? {
        if result_rows.len() >= row_cap {
            truncated = true;
            break;
        }

        let mut record = serde_json::Map::new();
        for (index, column_name) in column_names.iter().enumerate() {
            let value = row
                .get::<usize, SqlValue>(index)
                .context("failed to decode query column")?;
            record.insert(column_name.clone(), json_value_from_sql(value));
        }
        result_rows.push(Value::Object(record));
    }

    Ok(QueryExecutionResult {
        column_names,
        row_count: result_rows.len(),
        rows: result_rows,
        truncated,
    })
}

fn parse_query_params(params_json: Option<&str>) -> Result<Vec<SqlValue>> {
    let Some(raw) = params_json else {
        return Ok(Vec::new());
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    let parsed =
        serde_json::from_str::<Value>(trimmed).context("params must be valid JSON if provided")?;
    match parsed {
        Value::Null => Ok(Vec::new()),
        Value::Array(values) => values
            .into_iter()
            .map(sql_value_from_json)
            .collect::<Result<Vec<_>>>(),
        value => Ok(vec![sql_value_from_json(value)?]),
    }
}

fn sql_value_from_json(value: Value) -> Result<SqlValue> {
    match value {
        Value::Null => Ok(SqlValue::Null),
        Value::Bool(flag) => Ok(SqlValue::Integer(i64::from(flag))),
        Value::Number(number) => {
            if let Some(integer) = number.as_i64() {
                Ok(SqlValue::Integer(integer))
            } else if let Some(real) = number.as_f64() {
                Ok(SqlValue::Real(real))
            } else {
                Err(Error::msg("unsupported numeric param value"))
            }
        }
        Value::String(text) => Ok(SqlValue::Text(text)),
        Value::Array(_) | Value::Object(_) => {
            Err(Error::msg("params entries must be scalar JSON values"))
        }
    }
}

fn json_value_from_sql(value: SqlValue) -> Value {
    match value {
        SqlValue::Null => Value::Null,
        SqlValue::Integer(value) => json!(value),
        SqlValue::Real(value) => json!(value),
        SqlValue::Text(value) => json!(value),
        SqlValue::Blob(value) => json!(format!("blob:{} bytes", value.len())),
    }
}

fn load_schema_descriptors(
    connection: &Connection,
    include_internal: bool,
) -> Result<Vec<SchemaObjectDescriptor>> {
    let mut statement = connection
        .prepare(
            "SELECT name, type
             FROM sqlite_schema
             WHERE type IN ('table', 'view')
             ORDER BY CASE type WHEN 'table' THEN 0 ELSE 1 END, name ASC",
        )
        .context("failed to prepare schema introspection query")?;

    let object_rows = statement
        .query_map([], |row| {
            Ok((row.get::<usize, String>(0)?, row.get::<usize, String>(1)?))
        })
        .context("failed to execute schema introspection query")?;

    let mut objects = Vec::new();
    for row in object_rows {
        let (name, kind) = row.context("failed to decode schema object row")?;
        let internal = name.starts_with("sqlite_") || name == SCHEMA_META_TABLE;
        if !include_internal && internal {
            continue;
        }
        let columns = load_schema_columns(connection, &name)?;
        objects.push(SchemaObjectDescriptor {
            name,
            kind,
            internal,
            columns,
        });
    }

    Ok(objects)
}

fn load_schema_columns(
    connection: &Connection,
    object_name: &str,
) -> Result<Vec<SchemaColumnDescriptor>> {
    let pragma_sql = format!(
        "PRAGMA table_info('{}')",
        object_name.replace('\'', "''")
    );
    let mut statement = connection
        .prepare(&pragma_sql)
        .with_context(|| format!("failed to prepare column introspection for `{object_name}`"))?;

    let column_rows = statement
        .query_map([], |row| {
            Ok(SchemaColumnDescriptor {
                ordinal: row.get::<usize, i64>(0)?,
                name: row.get::<usize, String>(1)?,
                declared_type: row.get::<usize, Option<String>>(2)?,
                nullable: row.get::<usize, i64>(3)? == 0,
                primary_key_position: row.get::<usize, i64>(5)?,
            })
        })
        .with_context(|| format!("failed to execute column introspection for `{object_name}`"))?;

    column_rows
        .map(|row| row.context("failed to decode schema column row"))
        .collect()
}
