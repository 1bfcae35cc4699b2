use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{Context, Result, bail};

use crate::models::{NameRecord, RatingRecord, TitleRecord};

pub const TITLE_BASICS_HEADER: &[&str] = &[
    "tconst",
    "titleType",
    "primaryTitle",
    "originalTitle",
    "isAdult",
    "startYear",
    "endYear",
    "runtimeMinutes",
    "genres",
];
pub const TITLE_RATINGS_HEADER: &[&str] = &["tconst", "averageRating", "numVotes"];
pub const NAME_BASICS_HEADER: &[&str] = &[
    "nconst",
    "primaryName",
    "birthYear",
    "deathYear",
    "primaryProfession",
    "knownForTitles",
];

/// The source files encode NULL as a literal backslash-N.
const NULL_MARKER: &str = "\\N";

#[derive(Debug, Clone, PartialEq)]
pub struct TsvBatch<T> {
    pub records: Vec<T>,
    pub rows_skipped: usize,
    pub warnings: Vec<String>,
}

pub fn read_title_basics(path: &Path, fail_fast: bool) -> Result<TsvBatch<TitleRecord>> {
    read_table(path, TITLE_BASICS_HEADER, fail_fast, parse_title_row)
}

pub fn read_title_ratings(path: &Path, fail_fast: bool) -> Result<TsvBatch<RatingRecord>> {
    read_table(path, TITLE_RATINGS_HEADER, fail_fast, parse_rating_row)
}

pub fn read_name_basics(path: &Path, fail_fast: bool) -> Result<TsvBatch<NameRecord>> {
    read_table(path, NAME_BASICS_HEADER, fail_fast, parse_name_row)
}

fn read_table<T>(
    path: &Path,
    expected_header: &[&str],
    fail_fast: bool,
    parse_row: impl Fn(&str) -> Result<T>,
) -> Result<TsvBatch<T>> {
    let file =
        File::open(path).with_context(|| format!("failed to open tsv file: {}", path.display()))?;
    let mut lines = BufReader::new(file).lines();

    let header = match lines.next() {
        Some(line) => {
            line.with_context(|| format!("failed to read tsv header: {}", path.display()))?
        }
        None => bail!("tsv file is empty: {}", path.display()),
    };

    let mut warnings = Vec::new();
    if !header_matches(&header, expected_header) {
        warnings.push(format!(
            "header mismatch in {}; continuing load",
            path.display()
        ));
    }

    let mut records = Vec::new();
    let mut rows_skipped = 0usize;
    for (index, line) in lines.enumerate() {
        let line_number = index + 2;
        let line = line.with_context(|| {
            format!("failed to read tsv row {line_number}: {}", path.display())
        })?;
        if line.trim().is_empty() {
            continue;
        }

        match parse_row(&line) {
            Ok(record) => records.push(record),
            Err(error) => {
                if fail_fast {
                    return Err(error).with_context(|| {
                        format!("invalid tsv row at {}:{line_number}", path.display())
                    });
                }
                rows_skipped += 1;
                warnings.push(format!(
                    "skipped row {line_number} in {}: {error:#}",
                    path.display()
                ));
            }
        }
    }

    Ok(TsvBatch {
        records,
        rows_skipped,
        warnings,
    })
}

fn header_matches(header: &str, expected: &[&str]) -> bool {
    header.trim_end_matches(['\r', '\n']).split('\t').eq(expected.iter().copied())
}

pub fn parse_title_row(line: &str) -> Result<TitleRecord> {
    let fields = split_fields(line, TITLE_BASICS_HEADER.len())?;
    Ok(TitleRecord {
        tconst: required_field(fields[0], "tconst")?,
        title_type: optional_field(fields[1]).map(ToString::to_string),
        primary_title: optional_field(fields[2]).map(ToString::to_string),
        original_title: optional_field(fields[3]).map(ToString::to_string),
        is_adult: optional_bool(fields[4], "isAdult")?,
        start_year: optional_i64(fields[5], "startYear")?,
        end_year: optional_i64(fields[6], "endYear")?,
        runtime_minutes: optional_i64(fields[7], "runtimeMinutes")?,
        genres: optional_field(fields[8]).map(ToString::to_string),
    })
}

pub fn parse_rating_row(line: &str) -> Result<RatingRecord> {
    let fields = split_fields(line, TITLE_RATINGS_HEADER.len())?;
    let average_rating = optional_f64(fields[1], "averageRating")?;
    if let Some(rating) = average_rating
        && !(0.0..=10.0).contains(&rating)
    {
        bail!("averageRating out of range 0.0..=10.0: {rating}");
    }
    let num_votes = optional_i64(fields[2], "numVotes")?;
    if let Some(votes) = num_votes
        && votes < 0
    {
        bail!("numVotes must be non-negative: {votes}");
    }

    Ok(RatingRecord {
        tconst: required_field(fields[0], "tconst")?,
        average_rating,
        num_votes,
    })
}

pub fn parse_name_row(line: &str) -> Result<NameRecord> {
    let fields = split_fields(line, NAME_BASICS_HEADER.len())?;
    Ok(NameRecord {
        nconst: required_field(fields[0], "nconst")?,
        primary_name: optional_field(fields[1]).map(ToString::to_string),
        birth_year: optional_i64(fields[2], "birthYear")?,
        death_year: optional_i64(fields[3], "deathYear")?,
        primary_profession: optional_field(fields[4]).map(ToString::to_string),
        known_for_titles: optional_field(fields[5]).map(ToString::to_string),
    })
}

fn split_fields(line: &str, expected: usize) -> Result<Vec<&str>> {
    let fields = line
        .trim_end_matches(['\r', '\n'])
        .split('\t')
        .collect::<Vec<_>>();
    if fields.len() != expected {
        bail!(
            "expected {expected} tab-separated fields, found {}",
            fields.len()
        );
    }
    Ok(fields)
}

fn required_field(field: &str, column: &str) -> Result<String> {
    match optional_field(field) {
        Some(value) => Ok(value.to_string()),
        None => bail!("required column `{column}` is null or empty"),
    }
}

/// `\N` and empty cells both mean NULL.
#[must_use]
pub fn optional_field(field: &str) -> Option<&str> {
    let trimmed = field.trim();
    if trimmed.is_empty() || trimmed == NULL_MARKER {
        None
    } else {
        Some(trimmed)
    }
}

fn optional_i64(field: &str, column: &str) -> Result<Option<i64>> {
    optional_field(field)
        .map(|value| {
            value
                .parse::<i64>()
                .with_context(|| format!("column `{column}` is not an integer: {value}"))
        })
        .transpose()
}

fn optional_f64(field: &str, column: &str) -> Result<Option<f64>> {
    optional_field(field)
        .map(|value| {
            value
                .parse::<f64>()
                .with_context(|| format!("column `{column}` is not a number: {value}"))
        })
        .transpose()
}

fn optional_bool(field: &str, column: &str) -> Result<Option<bool>> {
    match optional_field(field) {
        None => Ok(None),
        Some("0") => Ok(Some(false)),
        Some("1") => Ok(Some(true)),
        Some(other) => bail!("column `{column}` must be 0 or 1: {other}"),
    }
}
