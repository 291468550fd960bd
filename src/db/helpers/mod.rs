use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};

use crate::models::{ActivityKind, Candidate};

/// Store representation of an instant: RFC 3339, UTC, whole seconds.
///
/// The fixed shape keeps lexical order equal to chronological order, which
/// the `ORDER BY start_time` queries rely on.
pub fn format_datetime(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub fn parse_datetime(value: &str, field: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("failed to parse {field}"))
}

pub fn parse_optional_datetime(
    value: Option<String>,
    field: &str,
) -> Result<Option<DateTime<Utc>>> {
    match value {
        Some(raw) => parse_datetime(&raw, field).map(Some),
        None => Ok(None),
    }
}

/// Rebuilds a guess from its label and confidence columns.
pub fn guess_from_columns(label: Option<String>, confidence: Option<f64>) -> Option<Candidate> {
    match (label, confidence) {
        (Some(label), Some(confidence)) => {
            Some(Candidate::new(ActivityKind::from_label(&label), confidence))
        }
        _ => None,
    }
}
