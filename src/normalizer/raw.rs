//! Serde shapes for location-history exports.
//!
//! Everything is optional: the reduced (redacted) export drops or replaces
//! fields, and which parsing path applies is decided by what is present.

use serde::{de::DeserializeOwned, Deserialize, Deserializer};
use serde_json::Value;

/// File level: the full export wraps records in `timelineObjects`, the
/// reduced export is a bare list.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum RawExport {
    Full {
        #[serde(rename = "timelineObjects")]
        timeline_objects: Vec<Value>,
    },
    Reduced(Vec<Value>),
}

impl RawExport {
    pub fn into_records(self) -> Vec<Value> {
        match self {
            RawExport::Full { timeline_objects } => timeline_objects,
            RawExport::Reduced(records) => records,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawRecord {
    pub activity_segment: Option<RawActivitySegment>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawActivitySegment {
    #[serde(default, deserialize_with = "lenient")]
    pub start_location: Option<RawLocation>,
    #[serde(default, deserialize_with = "lenient")]
    pub end_location: Option<RawLocation>,
    #[serde(default, deserialize_with = "lenient")]
    pub duration: Option<RawDuration>,
    /// Entries are decoded one by one so a redacted entry only drops itself.
    #[serde(default, deserialize_with = "lenient")]
    pub activities: Option<Vec<Value>>,
}

/// Coordinates keep their `E7` key names in both schemas; the reduced schema
/// stores plain degrees under them.
#[derive(Debug, Deserialize)]
pub struct RawLocation {
    #[serde(rename = "latitudeE7")]
    pub latitude: Option<Value>,
    #[serde(rename = "longitudeE7")]
    pub longitude: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawDuration {
    pub start_timestamp: Option<String>,
    pub end_timestamp: Option<String>,
    /// Older exports: epoch milliseconds, as a string or a number.
    pub start_timestamp_ms: Option<Value>,
    pub end_timestamp_ms: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawActivity {
    pub activity_type: Option<String>,
    pub probability: Option<Value>,
}

impl RawActivity {
    pub fn from_value(value: &Value) -> Option<Self> {
        serde_json::from_value(value.clone()).ok()
    }
}

/// Treats a field of the wrong shape (typically a `"REDACTED"` string) as absent.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}
