use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::models::{City, Journey};
use crate::models::ActivityKind;

/// Consecutive journeys merged into one ticket-worthy excursion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trip {
    pub journeys: Vec<Journey>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub start_city: Option<City>,
    pub end_city: Option<City>,
    pub dominant_mode: Option<ActivityKind>,
    pub within_home_city: bool,
}

impl Trip {
    pub fn journey_count(&self) -> usize {
        self.journeys.len()
    }

    pub fn uses_public_transit(&self) -> bool {
        self.journeys.iter().any(|j| j.transit_guess.is_some())
    }

    /// One single-ride fare is owed for every qualifying trip.
    pub fn qualifies_for_fare(&self) -> bool {
        self.within_home_city && self.uses_public_transit()
    }
}
