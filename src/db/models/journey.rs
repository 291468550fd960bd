//! Journey row model.
//!
//! A journey is one classified movement segment as stored in the `journeys`
//! table. `completed_at` is the completeness marker: a row without it was
//! written before every derivable field was resolved and may be revisited.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::Candidate;

/// Row from the `cities` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct City {
    pub id: i64,
    pub name: String,
    pub country: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Journey {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub start_city: Option<City>,
    pub end_city: Option<City>,
    pub activity_guess: Option<Candidate>,
    pub transit_guess: Option<Candidate>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Journey {
    pub fn is_complete(&self) -> bool {
        self.completed_at.is_some()
    }
}

/// Persisted state of a journey keyed by its start time.
///
/// `Complete` is terminal: the store never rewrites such a row.
#[derive(Debug, Clone, PartialEq)]
pub enum JourneyState {
    Absent,
    Partial(Journey),
    Complete(Journey),
}

impl JourneyState {
    pub fn from_row(row: Option<Journey>) -> Self {
        match row {
            None => JourneyState::Absent,
            Some(journey) if journey.is_complete() => JourneyState::Complete(journey),
            Some(journey) => JourneyState::Partial(journey),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JourneyState::Absent => "absent",
            JourneyState::Partial(_) => "partial",
            JourneyState::Complete(_) => "complete",
        }
    }
}

/// Fields written when a partial row is completed.
#[derive(Debug, Clone, PartialEq)]
pub struct JourneyResolution {
    pub end_time: DateTime<Utc>,
    pub start_city_id: Option<i64>,
    pub end_city_id: Option<i64>,
    pub activity_guess: Option<Candidate>,
    pub transit_guess: Option<Candidate>,
}
