use chrono::Duration;

use crate::consolidation::config::ConsolidationConfig;
use crate::db::Journey;
use crate::models::Trip;

/// How a journey takes part in a trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Leg {
    Transit,
    /// Walking or waiting; may sit between any two legs.
    Connector,
    /// Driving, cycling, or no usable guess at all.
    Other,
}

fn leg_of(journey: &Journey, config: &ConsolidationConfig) -> Leg {
    if journey.transit_guess.is_some() {
        Leg::Transit
    } else if journey
        .activity_guess
        .as_ref()
        .is_some_and(|guess| config.is_connector(&guess.kind))
    {
        Leg::Connector
    } else {
        Leg::Other
    }
}

/// Decides whether `next` may directly follow `prev` in one trip.
///
/// The gap must not exceed the threshold (overlap counts as no gap), and the
/// transit guesses on both sides must tell a consistent story:
/// - no transit guess on either side
/// - both sides on public transit, possibly different lines
/// - one side on public transit, the other walking or waiting in between
///
/// This only looks at the pair; [`consolidate`] also keeps transit legs and
/// non-connector legs out of the same trip when a connector sits between them.
pub fn should_merge(prev: &Journey, next: &Journey, config: &ConsolidationConfig) -> bool {
    let gap = (next.start_time - prev.end_time).max(Duration::zero());
    if gap > config.gap_threshold {
        return false;
    }

    !matches!(
        (leg_of(prev, config), leg_of(next, config)),
        (Leg::Transit, Leg::Other) | (Leg::Other, Leg::Transit)
    )
}

/// Journeys collected for the trip being built.
#[derive(Default)]
struct OpenTrip {
    journeys: Vec<Journey>,
    has_transit: bool,
    has_other: bool,
}

impl OpenTrip {
    fn accepts(&self, next: &Journey, config: &ConsolidationConfig) -> bool {
        let Some(last) = self.journeys.last() else {
            return true;
        };
        if !should_merge(last, next, config) {
            return false;
        }
        match leg_of(next, config) {
            Leg::Transit => !self.has_other,
            Leg::Other => !self.has_transit,
            Leg::Connector => true,
        }
    }

    fn push(&mut self, journey: Journey, config: &ConsolidationConfig) {
        match leg_of(&journey, config) {
            Leg::Transit => self.has_transit = true,
            Leg::Other => self.has_other = true,
            Leg::Connector => {}
        }
        self.journeys.push(journey);
    }
}

/// Groups complete journeys into trips.
///
/// Journeys are ordered by start time first; every trip is then a contiguous
/// run of that order, so no journey lands in two trips. A trip never mixes
/// public transit with another means of travel, even through a walk.
pub fn consolidate(mut journeys: Vec<Journey>, config: &ConsolidationConfig) -> Vec<Trip> {
    journeys.sort_by_key(|journey| journey.start_time);

    let mut trips = Vec::new();
    let mut current = OpenTrip::default();

    for journey in journeys {
        if !current.accepts(&journey, config) {
            let done = std::mem::take(&mut current);
            trips.push(build_trip(done.journeys, config));
        }
        current.push(journey, config);
    }
    if !current.journeys.is_empty() {
        trips.push(build_trip(current.journeys, config));
    }

    trips
}

/// `journeys` must be non-empty and ordered.
fn build_trip(journeys: Vec<Journey>, config: &ConsolidationConfig) -> Trip {
    let first = &journeys[0];
    let last = &journeys[journeys.len() - 1];

    let start_city = first.start_city.clone();
    let end_city = last.end_city.clone();
    let within_home_city = matches!(
        (&start_city, &end_city),
        (Some(start), Some(end)) if config.is_home(start) && config.is_home(end)
    );

    // Strict comparison keeps the earliest guess on ties.
    let mut dominant: Option<&crate::models::Candidate> = None;
    for guess in journeys.iter().filter_map(|j| j.transit_guess.as_ref()) {
        if dominant.map_or(true, |best| guess.confidence > best.confidence) {
            dominant = Some(guess);
        }
    }
    let dominant_mode = dominant.map(|guess| guess.kind.clone());

    Trip {
        start_time: first.start_time,
        end_time: journeys
            .iter()
            .map(|j| j.end_time)
            .max()
            .unwrap_or(last.end_time),
        start_city,
        end_city,
        dominant_mode,
        within_home_city,
        journeys,
    }
}
