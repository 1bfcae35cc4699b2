use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use anyhow::{Context, Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

pub const ENVELOPE_SCHEMA_VERSION: &str = "cinemart.envelope.v1";

pub type EnvelopeMeta = BTreeMap<String, Value>;

/// A warning or error entry attached to an envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvelopeNotice {
    pub code: String,
    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

/// The single JSON document every command prints to stdout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportEnvelope {
    pub ok: bool,
    pub command: String,
    pub generated_at_utc: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,

    pub meta: EnvelopeMeta,
    pub warnings: Vec<EnvelopeNotice>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<EnvelopeNotice>,
}

impl ReportEnvelope {
    #[must_use]
    pub fn ok(command: impl Into<String>, data: Value) -> Self {
        let mut envelope = Self::base(command, true);
        envelope.data = Some(data);
        envelope
    }

    #[must_use]
    pub fn error(
        command: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        let mut envelope = Self::base(command, false);
        envelope.error = Some(EnvelopeNotice {
            code: code.into(),
            message: message.into(),
            details: None,
        });
        envelope
    }

    fn base(command: impl Into<String>, ok: bool) -> Self {
        let mut meta = EnvelopeMeta::new();
        meta.insert("schema_version".to_string(), json!(ENVELOPE_SCHEMA_VERSION));

        Self {
            ok,
            command: command.into(),
            generated_at_utc: generated_at_utc_now(),
            data: None,
            meta,
            warnings: Vec::new(),
            error: None,
        }
    }

    #[must_use]
    pub fn with_meta(mut self, key: impl Into<String>, value: Value) -> Self {
        self.meta.insert(key.into(), value);
        self
    }

    #[must_use]
    pub fn with_warning(
        mut self,
        code: impl Into<String>,
        message: impl Into<String>,
        details: Option<Value>,
    ) -> Self {
        self.warnings.push(EnvelopeNotice {
            code: code.into(),
            message: message.into(),
            details,
        });
        self
    }

    #[must_use]
    pub fn with_error_details(mut self, details: Value) -> Self {
        if let Some(error) = self.error.as_mut() {
            error.details = Some(details);
        }
        self
    }

    /// Print the envelope as a single JSON line on stdout.
    pub fn emit(&self) -> Result<()> {
        let encoded =
            serde_json::to_string(self).context("failed to encode report envelope")?;
        println!("{encoded}");
        Ok(())
    }

    /// Wrap a failure envelope into the error type `main` classifies on.
    #[must_use]
    pub fn into_failure(self) -> Error {
        Error::new(ReportEnvelopeCommandFailure::new(self))
    }
}

#[derive(Debug, Clone)]
pub struct ReportEnvelopeCommandFailure {
    envelope: ReportEnvelope,
}

impl ReportEnvelopeCommandFailure {
    #[must_use]
    pub fn new(envelope: ReportEnvelope) -> Self {
        Self { envelope }
    }

    #[must_use]
    pub fn envelope(&self) -> &ReportEnvelope {
        &self.envelope
    }
}

impl Display for ReportEnvelopeCommandFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match serde_json::to_string(&self.envelope) {
            Ok(encoded) => f.write_str(&encoded),
            Err(_) => f.write_str("report envelope serialization failure"),
        }
    }
}

impl std::error::Error for ReportEnvelopeCommandFailure {}

fn generated_at_utc_now() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}

#[cfg(test)]
mod tests {
    use super::{ENVELOPE_SCHEMA_VERSION, ReportEnvelope, ReportEnvelopeCommandFailure};
    use serde_json::json;

    #[test]
    fn ok_envelope_carries_schema_version_and_data() {
        let envelope = ReportEnvelope::ok("report.genre-top", json!({ "rows": [] }))
            .with_meta("row_count", json!(0));

        assert!(envelope.ok);
        assert_eq!(envelope.command, "report.genre-top");
        assert_eq!(
            envelope.meta.get("schema_version"),
            Some(&json!(ENVELOPE_SCHEMA_VERSION))
        );
        assert_eq!(envelope.meta.get("row_count"), Some(&json!(0)));
        assert!(envelope.error.is_none());
    }

    #[test]
    fn error_envelope_keeps_code_and_details() {
        let envelope = ReportEnvelope::error(
            "report.genre-top",
            "invalid_configuration",
            "year range is inverted",
        )
        .with_error_details(json!({ "year_from": 2010, "year_to": 2001 }));

        assert!(!envelope.ok);
        let error = envelope.error.as_ref().expect("error notice should exist");
        assert_eq!(error.code, "invalid_configuration");
        assert_eq!(
            error.details,
            Some(json!({ "year_from": 2010, "year_to": 2001 }))
        );
    }

    #[test]
    fn failure_wrapper_round_trips_through_anyhow() {
        let failure = ReportEnvelope::error("load", "load_failed", "boom").into_failure();
        let recovered = failure
            .downcast_ref::<ReportEnvelopeCommandFailure>()
            .expect("downcast should succeed");
        assert_eq!(
            recovered
                .envelope()
                .error
                .as_ref()
                .map(|notice| notice.code.as_str()),
            Some("load_failed")
        );
    }

    #[test]
    fn warnings_accumulate_in_order() {
        let envelope = ReportEnvelope::ok("load", json!({}))
            .with_warning("header_mismatch", "header differs", None)
            .with_warning("row_skipped", "row 7 skipped", Some(json!({ "line": 7 })));

        assert_eq!(envelope.warnings.len(), 2);
        assert_eq!(envelope.warnings[0].code, "header_mismatch");
        assert_eq!(envelope.warnings[1].details, Some(json!({ "line": 7 })));
    }
}
