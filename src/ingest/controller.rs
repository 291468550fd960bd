use std::time::{Duration as StdDuration, Instant};

use anyhow::Result;
use chrono::Utc;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::db::{Database, Journey, JourneyResolution, JourneyState, NewJourney, RunLock};
use crate::geocode::{GeocodeError, GeocodeResolver};
use crate::models::{ActivityKind, Candidate, ConfidenceThreshold, Coordinate, MovementSegment};
use crate::normalizer::NormalizedBatch;
use crate::{log_debug, log_info, log_warn};

use super::progress::{IngestProgress, ProgressObserver};

const ENABLE_LOGS: bool = true;

const HEARTBEAT_EVERY: StdDuration = StdDuration::from_secs(30);

#[derive(Debug, Clone, PartialEq)]
pub struct IngestConfig {
    pub threshold: ConfidenceThreshold,
    pub public_transit_modes: Vec<ActivityKind>,
    /// A run lock whose heartbeat is older than this is considered abandoned.
    pub lock_stale_after: chrono::Duration,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            threshold: ConfidenceThreshold::default(),
            public_transit_modes: vec![
                ActivityKind::Bus,
                ActivityKind::Subway,
                ActivityKind::Train,
                ActivityKind::Tram,
            ],
            lock_stale_after: chrono::Duration::minutes(10),
        }
    }
}

/// What one `upsert_journey` call did to the store.
#[derive(Debug, Clone, PartialEq)]
pub enum UpsertOutcome {
    /// Row is now complete; `inserted` when it did not exist before.
    Completed { inserted: bool },
    /// Row was already complete and left alone.
    Skipped { conflict: bool },
    /// Row exists but a city lookup failed; a later run picks it up again.
    Incomplete { inserted: bool, reason: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestSummary {
    pub records_seen: usize,
    pub ignored: usize,
    pub malformed: usize,
    pub inserted: usize,
    pub completed: usize,
    pub skipped: usize,
    pub conflicts: usize,
    pub geocode_failures: usize,
    pub cancelled: bool,
    /// Complete rows in the store once the run ended.
    pub total_complete: u64,
}

impl IngestSummary {
    fn progress(&self, processed: usize, total: usize) -> IngestProgress {
        IngestProgress {
            processed,
            remaining: total.saturating_sub(processed),
            inserted: self.inserted,
            completed: self.completed,
            skipped: self.skipped,
            failed: self.geocode_failures,
        }
    }
}

/// Moves movement segments into the journey store.
///
/// Each segment goes through the row state machine keyed by its start time:
///
/// ```text
/// Absent ──insert──▶ Partial ──geocode + write──▶ Complete
///                       ▲            │
///                       └──failure───┘
/// ```
///
/// Every transition is its own transaction, so killing the process between
/// two segments (or inside a lookup) leaves a store the next run can resume
/// from. Complete rows are never looked up or rewritten again.
pub struct Ingestor<R> {
    db: Database,
    resolver: R,
    config: IngestConfig,
}

impl<R: GeocodeResolver> Ingestor<R> {
    pub fn new(db: Database, resolver: R, config: IngestConfig) -> Self {
        Self {
            db,
            resolver,
            config,
        }
    }

    /// Ingests a normalized batch under the store's run lock.
    pub async fn ingest(
        &self,
        batch: &NormalizedBatch,
        observer: &dyn ProgressObserver,
        cancel: &CancellationToken,
    ) -> Result<IngestSummary> {
        let lock = self.db.acquire_run_lock(self.config.lock_stale_after).await?;
        log_debug!("Acquired run lock {}", lock.owner());

        let mut summary = IngestSummary {
            records_seen: batch.segments.len() + batch.ignored + batch.malformed,
            ignored: batch.ignored,
            malformed: batch.malformed,
            ..IngestSummary::default()
        };

        let outcome = self
            .ingest_segments(&batch.segments, &mut summary, observer, cancel, &lock)
            .await;
        let released = lock.release().await;
        outcome?;
        released?;

        summary.total_complete = self.db.journey_counts().await?.complete;
        log_info!(
            "{} new journeys, {} completed, {} already complete; store now holds {} valid journeys",
            summary.inserted,
            summary.completed,
            summary.skipped,
            summary.total_complete
        );
        Ok(summary)
    }

    async fn ingest_segments(
        &self,
        segments: &[MovementSegment],
        summary: &mut IngestSummary,
        observer: &dyn ProgressObserver,
        cancel: &CancellationToken,
        lock: &RunLock,
    ) -> Result<()> {
        let total = segments.len();
        observer.on_start(total);
        let mut last_heartbeat = Instant::now();
        let mut processed = 0;

        for (index, segment) in segments.iter().enumerate() {
            if cancel.is_cancelled() {
                log_warn!("Ingest interrupted after {index} of {total} segments");
                summary.cancelled = true;
                break;
            }
            if last_heartbeat.elapsed() >= HEARTBEAT_EVERY {
                lock.heartbeat().await?;
                last_heartbeat = Instant::now();
            }

            match self.upsert_journey(segment).await? {
                UpsertOutcome::Completed { inserted } => {
                    summary.inserted += usize::from(inserted);
                    summary.completed += 1;
                }
                UpsertOutcome::Skipped { conflict } => {
                    summary.skipped += 1;
                    summary.conflicts += usize::from(conflict);
                }
                UpsertOutcome::Incomplete { inserted, reason } => {
                    summary.inserted += usize::from(inserted);
                    summary.geocode_failures += 1;
                    log_warn!(
                        "Journey starting {} left incomplete: {reason}",
                        segment.start_time
                    );
                }
            }
            processed = index + 1;
            observer.on_segment(&summary.progress(processed, total));
        }

        observer.on_finish(&summary.progress(processed, total));
        Ok(())
    }

    /// Applies one segment to the store. Idempotent: repeating a call for a
    /// segment whose row is complete performs no lookup and no write.
    pub async fn upsert_journey(&self, segment: &MovementSegment) -> Result<UpsertOutcome> {
        let threshold = self.config.threshold;
        let activity_guess = segment.activity_guess(threshold);
        let transit_guess = segment.transit_guess(threshold);

        let inserted = match self.db.find_journey(segment.start_time).await? {
            JourneyState::Complete(stored) => {
                let conflict = !same_local_data(&stored, segment);
                if conflict {
                    log_warn!(
                        "Journey starting {} is already complete with different data; keeping the stored row",
                        segment.start_time
                    );
                }
                return Ok(UpsertOutcome::Skipped { conflict });
            }
            JourneyState::Partial(_) => false,
            JourneyState::Absent => {
                self.db
                    .insert_partial_journey(&NewJourney {
                        start_time: segment.start_time,
                        end_time: segment.end_time,
                        activity_guess: activity_guess.clone(),
                        transit_guess: transit_guess.clone(),
                    })
                    .await?
            }
        };

        let start_city_id = match self.resolve_city_id(segment.start_coord).await? {
            Ok(id) => id,
            Err(err) => return Ok(incomplete(inserted, err)),
        };
        let end_city_id = match self.resolve_city_id(segment.end_coord).await? {
            Ok(id) => id,
            Err(err) => return Ok(incomplete(inserted, err)),
        };

        let resolution = JourneyResolution {
            end_time: segment.end_time,
            start_city_id,
            end_city_id,
            activity_guess,
            transit_guess,
        };
        let completed = self
            .db
            .complete_journey(segment.start_time, &resolution, Utc::now())
            .await?;
        if !completed {
            // Only reachable if another writer finished the row in between.
            return Ok(UpsertOutcome::Skipped { conflict: false });
        }
        Ok(UpsertOutcome::Completed { inserted })
    }

    /// Inner `Ok(None)` for a segment without that coordinate: nothing to
    /// look up. Lookup failures are the inner error; store failures the outer.
    async fn resolve_city_id(
        &self,
        coord: Option<Coordinate>,
    ) -> Result<std::result::Result<Option<i64>, GeocodeError>> {
        let Some(coord) = coord else {
            return Ok(Ok(None));
        };
        let city = match self.resolver.resolve_city(coord).await {
            Ok(city) => city,
            Err(err) => return Ok(Err(err)),
        };
        let stored = self.db.ensure_city(&city.name, &city.country).await?;
        Ok(Ok(Some(stored.id)))
    }
}

fn incomplete(inserted: bool, err: GeocodeError) -> UpsertOutcome {
    UpsertOutcome::Incomplete {
        inserted,
        reason: err.to_string(),
    }
}

/// Journeys are compared by their locally derivable fields only.
///
/// Guesses are compared against the segment's raw first candidates, not the
/// thresholded ones, so re-running with another threshold reports nothing.
fn same_local_data(journey: &Journey, segment: &MovementSegment) -> bool {
    journey.end_time == segment.end_time
        && guess_matches(
            journey.activity_guess.as_ref(),
            segment.activity_candidates.first(),
        )
        && guess_matches(
            journey.transit_guess.as_ref(),
            segment.transit_candidates.first(),
        )
}

/// A stored guess must be the first candidate itself. A missing one may have
/// been dropped by whatever threshold was in effect, so it matches anything.
fn guess_matches(stored: Option<&Candidate>, first: Option<&Candidate>) -> bool {
    match stored {
        Some(stored) => first == Some(stored),
        None => true,
    }
}
