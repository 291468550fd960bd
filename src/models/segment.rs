//! Movement segment model.
//!
//! A `MovementSegment` is the uniform in-memory shape of one `activitySegment`
//! record from a location-history export. It is produced by the normalizer and
//! consumed by the ingestor; it is never persisted directly.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// WGS84 position in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Position as integers scaled by 10^7, used as a hashable cache key.
    pub fn e7_key(&self) -> (i64, i64) {
        (
            (self.lat * 1e7).round() as i64,
            (self.lon * 1e7).round() as i64,
        )
    }

    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lon)
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.lat, self.lon)
    }
}

/// Activity categories reported by the location-history classifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ActivityKind {
    Walking,
    Running,
    OnFoot,
    Cycling,
    Driving,
    Motorcycling,
    Bus,
    Subway,
    Tram,
    Train,
    Ferry,
    Flying,
    Still,
    Unknown,
    Other(String),
}

impl ActivityKind {
    pub fn from_label(label: &str) -> Self {
        match label.trim() {
            "WALKING" => ActivityKind::Walking,
            "RUNNING" => ActivityKind::Running,
            "ON_FOOT" => ActivityKind::OnFoot,
            "CYCLING" => ActivityKind::Cycling,
            "IN_PASSENGER_VEHICLE" => ActivityKind::Driving,
            "MOTORCYCLING" => ActivityKind::Motorcycling,
            "IN_BUS" => ActivityKind::Bus,
            "IN_SUBWAY" => ActivityKind::Subway,
            "IN_TRAM" => ActivityKind::Tram,
            "IN_TRAIN" => ActivityKind::Train,
            "IN_FERRY" => ActivityKind::Ferry,
            "FLYING" => ActivityKind::Flying,
            "STILL" => ActivityKind::Still,
            "UNKNOWN_ACTIVITY_TYPE" => ActivityKind::Unknown,
            other => ActivityKind::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ActivityKind::Walking => "WALKING",
            ActivityKind::Running => "RUNNING",
            ActivityKind::OnFoot => "ON_FOOT",
            ActivityKind::Cycling => "CYCLING",
            ActivityKind::Driving => "IN_PASSENGER_VEHICLE",
            ActivityKind::Motorcycling => "MOTORCYCLING",
            ActivityKind::Bus => "IN_BUS",
            ActivityKind::Subway => "IN_SUBWAY",
            ActivityKind::Tram => "IN_TRAM",
            ActivityKind::Train => "IN_TRAIN",
            ActivityKind::Ferry => "IN_FERRY",
            ActivityKind::Flying => "FLYING",
            ActivityKind::Still => "STILL",
            ActivityKind::Unknown => "UNKNOWN_ACTIVITY_TYPE",
            ActivityKind::Other(label) => label.as_str(),
        }
    }

    /// Human-facing label: underscores become spaces.
    pub fn display_label(&self) -> String {
        self.as_str().replace('_', " ")
    }
}

impl fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ActivityKind {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ActivityKind {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let label = String::deserialize(deserializer)?;
        Ok(ActivityKind::from_label(&label))
    }
}

/// One classifier guess with its self-reported confidence in percent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub kind: ActivityKind,
    pub confidence: f64,
}

impl Candidate {
    pub fn new(kind: ActivityKind, confidence: f64) -> Self {
        Self { kind, confidence }
    }
}

/// Minimum confidence (percent) a guess needs before it is recorded.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceThreshold(pub f64);

impl Default for ConfidenceThreshold {
    fn default() -> Self {
        Self(30.0)
    }
}

impl ConfidenceThreshold {
    /// Returns the candidate only if its confidence reaches the threshold.
    pub fn admit(&self, candidate: Option<&Candidate>) -> Option<Candidate> {
        candidate
            .filter(|c| c.confidence.is_finite() && c.confidence >= self.0)
            .cloned()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MovementSegment {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub start_coord: Option<Coordinate>,
    pub end_coord: Option<Coordinate>,
    /// Source order, no re-ranking.
    pub activity_candidates: Vec<Candidate>,
    /// Candidates whose kind is a configured public-transit mode, source order.
    pub transit_candidates: Vec<Candidate>,
}

impl MovementSegment {
    /// First activity candidate, kept only when it clears the threshold.
    pub fn activity_guess(&self, threshold: ConfidenceThreshold) -> Option<Candidate> {
        threshold.admit(self.activity_candidates.first())
    }

    /// First public-transit candidate, kept only when it clears the threshold.
    pub fn transit_guess(&self, threshold: ConfidenceThreshold) -> Option<Candidate> {
        threshold.admit(self.transit_candidates.first())
    }
}
