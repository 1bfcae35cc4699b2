use std::fmt::{Display, Formatter};

/// Failures a report computation can raise before or during its run. Data
/// conditions (missing genres, null ratings) are handled by exclusion and
/// never surface here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportError {
    /// The global-mean step found no title meeting the vote floor. Fatal:
    /// every score depends on the mean, so no partial report is produced.
    EmptyPopulation { vote_floor: i64 },

    /// Rejected before any data access.
    InvalidConfiguration { message: String },
}

impl ReportError {
    #[must_use]
    pub fn invalid_configuration(message: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            message: message.into(),
        }
    }

    /// Stable machine-readable code used in envelopes and exit-code
    /// classification.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::EmptyPopulation { .. } => "empty_population",
            Self::InvalidConfiguration { .. } => "invalid_configuration",
        }
    }
}

impl Display for ReportError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyPopulation { vote_floor } => write!(
                f,
                "no title meets the vote floor {vote_floor}; the global mean is undefined"
            ),
            Self::InvalidConfiguration { message } => write!(f, "{message}"),
        }
    }
}

impl std::error::Error for ReportError {}

#[cfg(test)]
mod tests {
    use super::ReportError;

    #[test]
    fn codes_are_stable() {
        assert_eq!(
            ReportError::EmptyPopulation { vote_floor: 50 }.code(),
            "empty_population"
        );
        assert_eq!(
            ReportError::invalid_configuration("vote floor must be non-negative").code(),
            "invalid_configuration"
        );
    }

    #[test]
    fn messages_name_the_constraint() {
        let error = ReportError::EmptyPopulation { vote_floor: 100 };
        assert!(error.to_string().contains("vote floor 100"));
    }
}
