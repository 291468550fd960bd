use chrono::Duration;

use crate::db::City;
use crate::models::ActivityKind;

/// Tunables for grouping journeys into trips.
#[derive(Debug, Clone, PartialEq)]
pub struct ConsolidationConfig {
    /// Longest pause between two journeys of the same trip
    pub gap_threshold: Duration,

    /// Activities that may sit between two transit legs of one trip
    pub connector_modes: Vec<ActivityKind>,

    /// City (and optionally country) the yearly pass is valid in
    pub home_city: String,
    pub home_country: Option<String>,
}

impl Default for ConsolidationConfig {
    fn default() -> Self {
        Self {
            gap_threshold: Duration::minutes(15),
            connector_modes: vec![
                ActivityKind::Walking,
                ActivityKind::Running,
                ActivityKind::OnFoot,
                ActivityKind::Still,
            ],
            home_city: "Vienna".into(),
            home_country: Some("Austria".into()),
        }
    }
}

impl ConsolidationConfig {
    pub fn is_connector(&self, kind: &ActivityKind) -> bool {
        self.connector_modes.contains(kind)
    }

    /// Name match ignores case; country only matters when one is configured.
    pub fn is_home(&self, city: &City) -> bool {
        if !city.name.trim().eq_ignore_ascii_case(self.home_city.trim()) {
            return false;
        }
        match &self.home_country {
            Some(country) => city.country.trim().eq_ignore_ascii_case(country.trim()),
            None => true,
        }
    }
}
