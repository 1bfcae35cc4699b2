use std::cmp::{Ordering, Reverse};
use std::collections::{BTreeMap, BinaryHeap};

use super::error::ReportError;

pub const DEFAULT_TOP_PER_GENRE: usize = 20;

/// Fixed constants for one ranking run. The vote floor is the prior
/// strength `m` of the shrinkage estimator and doubles as the report's own
/// vote-count filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeightedRankParams {
    pub vote_floor: i64,
    pub year_from: Option<i64>,
    pub year_to: Option<i64>,
    pub top_per_genre: usize,
}

impl WeightedRankParams {
    pub fn validate(&self) -> Result<(), ReportError> {
        if self.vote_floor < 0 {
            return Err(ReportError::invalid_configuration(format!(
                "vote floor must be non-negative, got {}",
                self.vote_floor
            )));
        }
        if let (Some(from), Some(to)) = (self.year_from, self.year_to)
            && from > to
        {
            return Err(ReportError::invalid_configuration(format!(
                "year range is inverted: {from} > {to}"
            )));
        }
        if self.top_per_genre == 0 {
            return Err(ReportError::invalid_configuration(
                "top-per-genre must be greater than zero",
            ));
        }
        Ok(())
    }

    /// Titles with an unknown year only pass an unbounded range.
    fn year_in_range(&self, start_year: Option<i64>) -> bool {
        match (self.year_from, self.year_to) {
            (None, None) => true,
            (from, to) => start_year.is_some_and(|year| {
                from.is_none_or(|bound| year >= bound) && to.is_none_or(|bound| year <= bound)
            }),
        }
    }
}

/// One rated title of the restricted category, the reporter's input grain.
#[derive(Debug, Clone, PartialEq)]
pub struct RatedTitle {
    pub tconst: String,
    pub primary_title: String,
    pub start_year: Option<i64>,
    pub genres: Vec<String>,
    pub average_rating: f64,
    pub num_votes: i64,
}

/// One exploded (genre, title) record with its weighted score. `score` is
/// the unrounded ranking key; presentation layers round it.
#[derive(Debug, Clone, PartialEq)]
pub struct GenreScore {
    pub genre: String,
    pub tconst: String,
    pub primary_title: String,
    pub start_year: Option<i64>,
    pub average_rating: f64,
    pub num_votes: i64,
    pub score: f64,
}

impl GenreScore {
    #[must_use]
    pub fn display_score(&self) -> f64 {
        round_display(self.score)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WeightedRankReport {
    pub global_mean: f64,
    pub vote_floor: i64,
    pub titles_scanned: usize,
    pub records_exploded: usize,
    pub genres: BTreeMap<String, Vec<GenreScore>>,
}

/// Arithmetic mean of `average_rating` over titles meeting the vote floor.
pub fn global_mean(titles: &[RatedTitle], vote_floor: i64) -> Result<f64, ReportError> {
    let mut sum = 0.0f64;
    let mut count = 0usize;
    for title in titles {
        if title.num_votes >= vote_floor {
            sum += title.average_rating;
            count += 1;
        }
    }
    if count == 0 {
        return Err(ReportError::EmptyPopulation { vote_floor });
    }
    Ok(sum / count as f64)
}

/// Convex combination of the title's rating and the global mean, weighted
/// by vote count against the prior strength. `v + m = 0` degenerates to the
/// global mean, the limit of the combination as the title weight vanishes.
#[must_use]
pub fn weighted_score(rating: f64, votes: i64, vote_floor: i64, global_mean: f64) -> f64 {
    let v = votes as f64;
    let m = vote_floor as f64;
    let total = v + m;
    if total == 0.0 {
        return global_mean;
    }
    (v / total) * rating + (m / total) * global_mean
}

/// Displayed scores round to 3 decimals; ranking never does.
#[must_use]
pub fn round_display(score: f64) -> f64 {
    (score * 1000.0).round() / 1000.0
}

/// The full ranking pipeline: global mean, filter and explode by genre,
/// score, then per-genre bounded top-K selection.
pub fn rank_by_genre(
    titles: &[RatedTitle],
    params: &WeightedRankParams,
) -> Result<WeightedRankReport, ReportError> {
    params.validate()?;
    let mean = global_mean(titles, params.vote_floor)?;

    let mut selections: BTreeMap<String, BinaryHeap<Reverse<RankedEntry>>> = BTreeMap::new();
    let mut records_exploded = 0usize;

    for title in titles {
        if title.num_votes < params.vote_floor || !params.year_in_range(title.start_year) {
            continue;
        }
        let score = weighted_score(title.average_rating, title.num_votes, params.vote_floor, mean);

        // A title with no genre tags explodes to nothing and vanishes from
        // every ranking.
        for genre in &title.genres {
            records_exploded += 1;
            let entry = GenreScore {
                genre: genre.clone(),
                tconst: title.tconst.clone(),
                primary_title: title.primary_title.clone(),
                start_year: title.start_year,
                average_rating: title.average_rating,
                num_votes: title.num_votes,
                score,
            };
            push_bounded(
                selections.entry(genre.clone()).or_default(),
                entry,
                params.top_per_genre,
            );
        }
    }

    let genres = selections
        .into_iter()
        .map(|(genre, heap)| {
            let mut kept = heap
                .into_iter()
                .map(|Reverse(entry)| entry.0)
                .collect::<Vec<_>>();
            kept.sort_by(|left, right| rank_ordering(right, left));
            (genre, kept)
        })
        .collect();

    Ok(WeightedRankReport {
        global_mean: mean,
        vote_floor: params.vote_floor,
        titles_scanned: titles.len(),
        records_exploded,
        genres,
    })
}

/// Keep the best `capacity` entries in a min-heap whose root is the worst
/// kept entry, so a full per-genre sort is never materialized.
fn push_bounded(heap: &mut BinaryHeap<Reverse<RankedEntry>>, entry: GenreScore, capacity: usize) {
    if heap.len() < capacity {
        heap.push(Reverse(RankedEntry(entry)));
        return;
    }
    let beats_worst = heap
        .peek()
        .is_some_and(|Reverse(worst)| rank_ordering(&entry, &worst.0) == Ordering::Greater);
    if beats_worst {
        heap.pop();
        heap.push(Reverse(RankedEntry(entry)));
    }
}

/// Greater means ranked better: unrounded score, then vote count, then the
/// reversed identifier so equal (score, votes) pairs order by ascending
/// tconst in the final descending sort.
fn rank_ordering(left: &GenreScore, right: &GenreScore) -> Ordering {
    left.score
        .total_cmp(&right.score)
        .then_with(|| left.num_votes.cmp(&right.num_votes))
        .then_with(|| right.tconst.cmp(&left.tconst))
}

#[derive(Debug)]
struct RankedEntry(GenreScore);

impl PartialEq for RankedEntry {
    fn eq(&self, other: &Self) -> bool {
        rank_ordering(&self.0, &other.0) == Ordering::Equal
    }
}

impl Eq for RankedEntry {}

impl PartialOrd for RankedEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for RankedEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        rank_ordering(&self.0, &other.0)
    }
}
