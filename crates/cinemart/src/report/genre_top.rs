use anyhow::{Context, Result};
use rusqlite::Connection;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::weighted::{self, RatedTitle, WeightedRankParams};
use crate::models::split_genre_tags;

pub const DEFAULT_TITLE_TYPE: &str = "movie";

const RATED_TITLES_BY_TYPE_SQL: &str = r#"
SELECT tconst, primary_title, start_year, genres, average_rating, num_votes
FROM v_rated_titles
WHERE title_type = ?1
"#;

/// One displayed ranking entry. `weighted_score` is the 3-decimal display
/// value; the ordering was decided on the unrounded score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GenreTopRow {
    pub genre: String,
    pub rank: usize,
    pub tconst: String,
    pub primary_title: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_year: Option<i64>,

    pub average_rating: f64,
    pub num_votes: i64,
    pub weighted_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenreTopReport {
    pub title_type: String,
    pub vote_floor: i64,
    pub global_mean: f64,
    pub titles_scanned: usize,
    pub records_exploded: usize,
    pub genre_count: usize,
    pub rows: Vec<GenreTopRow>,
}

pub fn fetch_rated_titles(connection: &Connection, title_type: &str) -> Result<Vec<RatedTitle>> {
    let mut statement = connection
        .prepare(RATED_TITLES_BY_TYPE_SQL)
        .context("failed to prepare rated-titles query")?;
    let rows = statement
        .query_map([title_type], |row| {
            Ok(RatedTitle {
                tconst: row.get(0)?,
                primary_title: row
                    .get::<usize, Option<String>>(1)?
                    .unwrap_or_default(),
                start_year: row.get(2)?,
                genres: split_genre_tags(row.get::<usize, Option<String>>(3)?.as_deref()),
                average_rating: row.get(4)?,
                num_votes: row.get(5)?,
            })
        })
        .context("failed to execute rated-titles query")?;

    let mut titles = Vec::new();
    for row in rows {
        titles.push(row.context("failed to decode rated-title row")?);
    }
    Ok(titles)
}

/// Fetch the restricted category and run the ranking pipeline over it.
pub fn run(
    connection: &Connection,
    title_type: &str,
    params: &WeightedRankParams,
) -> Result<GenreTopReport> {
    params.validate()?;
    let titles = fetch_rated_titles(connection, title_type)?;
    let report = weighted::rank_by_genre(&titles, params)?;

    let genre_count = report.genres.len();
    let mut rows = Vec::new();
    for (genre, entries) in &report.genres {
        for (index, entry) in entries.iter().enumerate() {
            rows.push(GenreTopRow {
                genre: genre.clone(),
                rank: index + 1,
                tconst: entry.tconst.clone(),
                primary_title: entry.primary_title.clone(),
                start_year: entry.start_year,
                average_rating: entry.average_rating,
                num_votes: entry.num_votes,
                weighted_score: entry.display_score(),
            });
        }
    }

    Ok(GenreTopReport {
        title_type: title_type.to_string(),
        vote_floor: report.vote_floor,
        global_mean: report.global_mean,
        titles_scanned: report.titles_scanned,
        records_exploded: report.records_exploded,
        genre_count,
        rows,
    })
}
