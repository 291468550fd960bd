use chrono::{DateTime, Timelike, Utc};
use serde_json::Value;

use crate::models::{ActivityKind, Candidate, Coordinate, MovementSegment};

use super::raw::{RawActivity, RawActivitySegment, RawDuration, RawLocation, RawRecord};

/// What became of one raw record.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordOutcome {
    Segment(MovementSegment),
    /// Not a movement record (`placeVisit` and friends).
    Ignored,
    Malformed(String),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedBatch {
    pub segments: Vec<MovementSegment>,
    pub ignored: usize,
    pub malformed: usize,
}

impl NormalizedBatch {
    /// Appends another file's batch, keeping input order.
    pub fn absorb(&mut self, other: NormalizedBatch) {
        self.segments.extend(other.segments);
        self.ignored += other.ignored;
        self.malformed += other.malformed;
    }
}

/// Turns raw history records into movement segments.
#[derive(Debug, Clone)]
pub struct Normalizer {
    public_transit_modes: Vec<ActivityKind>,
}

impl Normalizer {
    pub fn new(public_transit_modes: Vec<ActivityKind>) -> Self {
        Self {
            public_transit_modes,
        }
    }

    pub fn is_public_transit(&self, kind: &ActivityKind) -> bool {
        self.public_transit_modes.contains(kind)
    }

    pub fn normalize_all(&self, records: &[Value]) -> NormalizedBatch {
        let mut batch = NormalizedBatch::default();
        for record in records {
            match self.normalize(record) {
                RecordOutcome::Segment(segment) => batch.segments.push(segment),
                RecordOutcome::Ignored => batch.ignored += 1,
                RecordOutcome::Malformed(reason) => {
                    log::debug!("Skipping malformed record: {reason}");
                    batch.malformed += 1;
                }
            }
        }
        batch
    }

    pub fn normalize(&self, record: &Value) -> RecordOutcome {
        let record: RawRecord = match serde_json::from_value(record.clone()) {
            Ok(record) => record,
            Err(err) => return RecordOutcome::Malformed(format!("unreadable record: {err}")),
        };
        match record.activity_segment {
            Some(segment) => match self.segment_from_raw(segment) {
                Ok(segment) => RecordOutcome::Segment(segment),
                Err(reason) => RecordOutcome::Malformed(reason),
            },
            None => RecordOutcome::Ignored,
        }
    }

    fn segment_from_raw(&self, raw: RawActivitySegment) -> Result<MovementSegment, String> {
        let duration = raw.duration.ok_or("activity segment has no duration")?;
        let (start_time, end_time) = parse_duration(&duration)?;
        if end_time < start_time {
            return Err(format!("segment ends ({end_time}) before it starts ({start_time})"));
        }

        let activity_candidates: Vec<Candidate> = raw
            .activities
            .unwrap_or_default()
            .iter()
            .filter_map(RawActivity::from_value)
            .filter_map(|raw| candidate_from_raw(&raw))
            .collect();
        let transit_candidates = activity_candidates
            .iter()
            .filter(|candidate| self.is_public_transit(&candidate.kind))
            .cloned()
            .collect();

        Ok(MovementSegment {
            start_time,
            end_time,
            start_coord: raw.start_location.as_ref().and_then(coordinate_from_raw),
            end_coord: raw.end_location.as_ref().and_then(coordinate_from_raw),
            activity_candidates,
            transit_candidates,
        })
    }
}

fn parse_duration(duration: &RawDuration) -> Result<(DateTime<Utc>, DateTime<Utc>), String> {
    let start = timestamp(duration.start_timestamp.as_deref(), duration.start_timestamp_ms.as_ref())
        .ok_or("missing or unreadable start timestamp")?;
    let end = timestamp(duration.end_timestamp.as_deref(), duration.end_timestamp_ms.as_ref())
        .ok_or("missing or unreadable end timestamp")?;
    Ok((start, end))
}

/// RFC 3339 wins when present; epoch milliseconds are the fallback.
/// Sub-second precision is dropped so the store key is stable.
fn timestamp(rfc3339: Option<&str>, millis: Option<&Value>) -> Option<DateTime<Utc>> {
    let parsed = match rfc3339 {
        Some(text) => DateTime::parse_from_rfc3339(text.trim())
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        None => {
            let millis = match millis? {
                Value::String(text) => text.trim().parse::<i64>().ok()?,
                Value::Number(number) => number.as_i64()?,
                _ => return None,
            };
            DateTime::from_timestamp_millis(millis)
        }
    }?;
    parsed.with_nanosecond(0)
}

fn coordinate_from_raw(location: &RawLocation) -> Option<Coordinate> {
    let lat = location.latitude.as_ref()?.as_f64()?;
    let lon = location.longitude.as_ref()?.as_f64()?;
    // Full exports hold integers scaled by 1e7; anything past 180 can only be that.
    let coordinate = if lat.abs() > 180.0 || lon.abs() > 180.0 {
        Coordinate::new(lat / 1e7, lon / 1e7)
    } else {
        Coordinate::new(lat, lon)
    };
    coordinate.is_valid().then_some(coordinate)
}

fn candidate_from_raw(raw: &RawActivity) -> Option<Candidate> {
    let label = raw.activity_type.as_deref()?.trim();
    if label.is_empty() || label == "REDACTED" {
        return None;
    }
    let confidence = raw.probability.as_ref()?.as_f64()?;
    Some(Candidate::new(ActivityKind::from_label(label), confidence))
}
