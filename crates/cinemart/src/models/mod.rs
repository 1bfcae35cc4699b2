pub mod catalog;
pub mod envelope;

pub use catalog::{NameRecord, RatingRecord, TitleRecord, split_genre_tags, split_title_ids};
pub use envelope::{
    ENVELOPE_SCHEMA_VERSION, EnvelopeNotice, ReportEnvelope, ReportEnvelopeCommandFailure,
};
