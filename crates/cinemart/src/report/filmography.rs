use anyhow::{Context, Result, bail};
use rusqlite::{Connection, OptionalExtension};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::models::{split_genre_tags, split_title_ids};

const PERSON_BY_ID_OR_NAME_SQL: &str = r#"
SELECT nconst, primary_name, birth_year, death_year, primary_profession, known_for_titles
FROM name_basics
WHERE nconst = ?1 OR primary_name = ?1
ORDER BY nconst ASC
"#;

const TITLE_WITH_RATING_SQL: &str = r#"
SELECT
    title_basics.tconst,
    title_basics.primary_title,
    title_basics.title_type,
    title_basics.start_year,
    title_basics.runtime_minutes,
    title_basics.genres,
    title_ratings.average_rating,
    title_ratings.num_votes
FROM title_basics
LEFT JOIN title_ratings ON title_ratings.tconst = title_basics.tconst
WHERE title_basics.tconst = ?1
"#;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FilmographyRow {
    pub tconst: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_title: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub title_type: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_year: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub runtime_minutes: Option<i64>,

    pub genres: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_rating: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_votes: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilmographyReport {
    pub nconst: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub birth_year: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub death_year: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_profession: Option<String>,

    /// People matched by the lookup argument; when more than one shares a
    /// name, the lowest `nconst` is reported.
    pub matched_people: usize,
    pub titles: Vec<FilmographyRow>,

    /// `known_for` identifiers absent from `title_basics`.
    pub missing_titles: Vec<String>,
}

struct PersonRow {
    nconst: String,
    primary_name: Option<String>,
    birth_year: Option<i64>,
    death_year: Option<i64>,
    primary_profession: Option<String>,
    known_for_titles: Option<String>,
}

/// Look up one person by `nconst` or exact primary name and resolve the
/// titles they are known for.
pub fn run(connection: &Connection, person: &str) -> Result<FilmographyReport> {
    let people = fetch_people(connection, person)?;
    let matched_people = people.len();
    let Some(subject) = people.into_iter().next() else {
        bail!("no person matches `{person}` by nconst or primary name");
    };

    let known_for = split_title_ids(subject.known_for_titles.as_deref());
    let mut titles = Vec::new();
    let mut missing_titles = Vec::new();
    let mut statement = connection
        .prepare_cached(TITLE_WITH_RATING_SQL)
        .context("failed to prepare filmography title lookup")?;

    for tconst in known_for {
        let row = statement
            .query_row([tconst.as_str()], |row| {
                Ok(FilmographyRow {
                    tconst: row.get(0)?,
                    primary_title: row.get(1)?,
                    title_type: row.get(2)?,
                    start_year: row.get(3)?,
                    runtime_minutes: row.get(4)?,
                    genres: split_genre_tags(row.get::<usize, Option<String>>(5)?.as_deref()),
                    average_rating: row.get(6)?,
                    num_votes: row.get(7)?,
                })
            })
            .optional()
            .with_context(|| format!("failed to look up known-for title: {tconst}"))?;

        match row {
            Some(row) => titles.push(row),
            None => missing_titles.push(tconst),
        }
    }

    // Unknown release years sort last so the early career leads.
    titles.sort_by(|left, right| {
        let left_key = (left.start_year.is_none(), left.start_year, &left.tconst);
        let right_key = (right.start_year.is_none(), right.start_year, &right.tconst);
        left_key.cmp(&right_key)
    });

    Ok(FilmographyReport {
        nconst: subject.nconst,
        primary_name: subject.primary_name,
        birth_year: subject.birth_year,
        death_year: subject.death_year,
        primary_profession: subject.primary_profession,
        matched_people,
        titles,
        missing_titles,
    })
}

fn fetch_people(connection: &Connection, person: &str) -> Result<Vec<PersonRow>> {
    let mut statement = connection
        .prepare(PERSON_BY_ID_OR_NAME_SQL)
        .context("failed to prepare person lookup")?;
    let rows = statement
        .query_map([person], |row| {
            Ok(PersonRow {
                nconst: row.get(0)?,
                primary_name: row.get(1)?,
                birth_year: row.get(2)?,
                death_year: row.get(3)?,
                primary_profession: row.get(4)?,
                known_for_titles: row.get(5)?,
            })
        })
        .context("failed to execute person lookup")?;

    let mut people = Vec::new();
    for row in rows {
        people.push(row.context("failed to decode person row")?);
    }
    Ok(people)
}
