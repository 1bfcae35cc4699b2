pub mod actor_rating;
pub mod error;
pub mod filmography;
pub mod genre_top;
pub mod plan;
pub mod table;
pub mod weighted;

pub use error::ReportError;
pub use weighted::{
    DEFAULT_TOP_PER_GENRE, GenreScore, RatedTitle, WeightedRankParams, WeightedRankReport,
    global_mean, rank_by_genre, round_display, weighted_score,
};
