use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// One row of `title.basics`. Optional fields were `\N` in the source TSV.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TitleRecord {
    pub tconst: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub title_type: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_title: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_title: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_adult: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_year: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_year: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub runtime_minutes: Option<i64>,

    /// Comma-separated genre tags, kept raw so the mart mirrors the source
    /// column; split on demand with [`split_genre_tags`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub genres: Option<String>,
}

impl TitleRecord {
    #[must_use]
    pub fn genre_tags(&self) -> Vec<String> {
        split_genre_tags(self.genres.as_deref())
    }
}

/// One row of `title.ratings`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RatingRecord {
    pub tconst: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_rating: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_votes: Option<i64>,
}

/// One row of `name.basics`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct NameRecord {
    pub nconst: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub birth_year: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub death_year: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_profession: Option<String>,

    /// Comma-separated `tconst` list of the titles the person is known for.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub known_for_titles: Option<String>,
}

impl NameRecord {
    #[must_use]
    pub fn known_for_ids(&self) -> Vec<String> {
        split_title_ids(self.known_for_titles.as_deref())
    }
}

/// Split a raw comma-separated genre column into tags. `None` and empty
/// strings yield an empty list, so genre-less titles explode to nothing.
#[must_use]
pub fn split_genre_tags(raw: Option<&str>) -> Vec<String> {
    split_comma_list(raw)
}

#[must_use]
pub fn split_title_ids(raw: Option<&str>) -> Vec<String> {
    split_comma_list(raw)
}

fn split_comma_list(raw: Option<&str>) -> Vec<String> {
    raw.map_or_else(Vec::new, |list| {
        list.split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(ToString::to_string)
            .collect()
    })
}
