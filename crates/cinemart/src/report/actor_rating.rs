use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::error::ReportError;
use super::weighted::round_display;
use crate::models::split_title_ids;

pub const DEFAULT_MIN_VOTES: i64 = 1_000;
pub const DEFAULT_LIMIT: usize = 50;

const PEOPLE_WITH_KNOWN_FOR_SQL: &str = r#"
SELECT nconst, primary_name, primary_profession, known_for_titles
FROM name_basics
WHERE known_for_titles IS NOT NULL AND known_for_titles != ''
"#;

const RATING_BY_TITLE_SQL: &str = r#"
SELECT average_rating, num_votes
FROM title_ratings
WHERE tconst = ?1
  AND average_rating IS NOT NULL
  AND num_votes IS NOT NULL
"#;

#[derive(Debug, Clone, PartialEq)]
pub struct ActorRatingParams {
    pub min_votes: i64,
    pub limit: usize,
    pub profession: Option<String>,
}

impl ActorRatingParams {
    pub fn validate(&self) -> Result<(), ReportError> {
        if self.min_votes < 0 {
            return Err(ReportError::invalid_configuration(format!(
                "minimum vote count must be non-negative, got {}",
                self.min_votes
            )));
        }
        if self.limit == 0 {
            return Err(ReportError::invalid_configuration(
                "limit must be greater than zero",
            ));
        }
        Ok(())
    }
}

/// One ranked person. `weighted_rating` is the vote-weighted mean of the
/// qualifying known-for titles, displayed at 3 decimals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ActorRatingRow {
    pub rank: usize,
    pub nconst: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_name: Option<String>,

    pub rated_titles: usize,
    pub total_votes: i64,
    pub weighted_rating: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActorRatingReport {
    pub min_votes: i64,
    pub people_scanned: usize,
    pub people_ranked: usize,
    pub rows: Vec<ActorRatingRow>,
}

struct RankedPerson {
    nconst: String,
    primary_name: Option<String>,
    rated_titles: usize,
    total_votes: i64,
    weighted_rating: f64,
}

/// Vote-weighted average rating per person over their known-for titles with
/// at least `min_votes` votes.
pub fn run(connection: &Connection, params: &ActorRatingParams) -> Result<ActorRatingReport> {
    params.validate()?;

    let profession_filter = params
        .profession
        .as_deref()
        .map(str::to_ascii_lowercase);

    let mut people_statement = connection
        .prepare(PEOPLE_WITH_KNOWN_FOR_SQL)
        .context("failed to prepare people scan")?;
    let mut rating_statement = connection
        .prepare_cached(RATING_BY_TITLE_SQL)
        .context("failed to prepare rating lookup")?;

    let people = people_statement
        .query_map([], |row| {
            Ok((
                row.get::<usize, String>(0)?,
                row.get::<usize, Option<String>>(1)?,
                row.get::<usize, Option<String>>(2)?,
                row.get::<usize, Option<String>>(3)?,
            ))
        })
        .context("failed to execute people scan")?;

    let mut people_scanned = 0usize;
    let mut ranked = Vec::new();

    for person in people {
        let (nconst, primary_name, primary_profession, known_for_titles) =
            person.context("failed to decode person row")?;
        people_scanned += 1;

        if let Some(filter) = &profession_filter {
            let matches = primary_profession
                .as_deref()
                .is_some_and(|professions| professions.to_ascii_lowercase().contains(filter));
            if !matches {
                continue;
            }
        }

        let mut weighted_sum = 0.0f64;
        let mut total_votes = 0i64;
        let mut rated_titles = 0usize;
        for tconst in split_title_ids(known_for_titles.as_deref()) {
            let rating = rating_statement
                .query_row([tconst.as_str()], |row| {
                    Ok((row.get::<usize, f64>(0)?, row.get::<usize, i64>(1)?))
                })
                .optional()
                .with_context(|| format!("failed to look up rating for title: {tconst}"))?;

            if let Some((average_rating, num_votes)) = rating
                && num_votes >= params.min_votes
            {
                weighted_sum += average_rating * num_votes as f64;
                total_votes += num_votes;
                rated_titles += 1;
            }
        }

        if rated_titles == 0 || total_votes == 0 {
            continue;
        }
        ranked.push(RankedPerson {
            nconst,
            primary_name,
            rated_titles,
            total_votes,
            weighted_rating: weighted_sum / total_votes as f64,
        });
    }

    let people_ranked = ranked.len();
    ranked.sort_by(|left, right| {
        right
            .weighted_rating
            .total_cmp(&left.weighted_rating)
            .then_with(|| right.total_votes.cmp(&left.total_votes))
            .then_with(|| left.nconst.cmp(&right.nconst))
    });
    ranked.truncate(params.limit);

    let rows = ranked
        .into_iter()
        .enumerate()
        .map(|(index, person)| ActorRatingRow {
            rank: index + 1,
            nconst: person.nconst,
            primary_name: person.primary_name,
            rated_titles: person.rated_titles,
            total_votes: person.total_votes,
            weighted_rating: round_display(person.weighted_rating),
        })
        .collect();

    Ok(ActorRatingReport {
        min_votes: params.min_votes,
        people_scanned,
        people_ranked,
        rows,
    })
}
