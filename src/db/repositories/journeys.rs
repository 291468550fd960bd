use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};

use crate::db::{
    helpers::{format_datetime, guess_from_columns, parse_datetime, parse_optional_datetime},
    models::{City, Journey, JourneyResolution, JourneyState},
    repositories::activities::ActivityRepository,
    Database,
};
use crate::models::Candidate;

/// Fields known without any network lookup, written when a row is first seen.
#[derive(Debug, Clone, PartialEq)]
pub struct NewJourney {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub activity_guess: Option<Candidate>,
    pub transit_guess: Option<Candidate>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JourneyCounts {
    pub total: u64,
    pub complete: u64,
}

const JOURNEY_SELECT: &str = "SELECT
        j.start_time,
        j.end_time,
        sc.id AS start_city_id,
        sc.name AS start_city_name,
        sc.country AS start_city_country,
        ec.id AS end_city_id,
        ec.name AS end_city_name,
        ec.country AS end_city_country,
        a.label AS activity_label,
        j.activity_confidence,
        t.label AS transit_label,
        j.transit_confidence,
        j.completed_at
    FROM journeys j
    LEFT JOIN cities sc ON sc.id = j.start_city_id
    LEFT JOIN cities ec ON ec.id = j.end_city_id
    LEFT JOIN activities a ON a.id = j.activity_guess_id
    LEFT JOIN activities t ON t.id = j.transit_guess_id";

fn city_from_columns(row: &Row, prefix: &str) -> Result<Option<City>> {
    let id: Option<i64> = row.get(format!("{prefix}_id").as_str())?;
    let name: Option<String> = row.get(format!("{prefix}_name").as_str())?;
    let country: Option<String> = row.get(format!("{prefix}_country").as_str())?;
    Ok(match (id, name, country) {
        (Some(id), Some(name), Some(country)) => Some(City { id, name, country }),
        _ => None,
    })
}

fn row_to_journey(row: &Row) -> Result<Journey> {
    let start_time: String = row.get("start_time")?;
    let end_time: String = row.get("end_time")?;
    let completed_at: Option<String> = row.get("completed_at")?;

    Ok(Journey {
        start_time: parse_datetime(&start_time, "start_time")?,
        end_time: parse_datetime(&end_time, "end_time")?,
        start_city: city_from_columns(row, "start_city")?,
        end_city: city_from_columns(row, "end_city")?,
        activity_guess: guess_from_columns(
            row.get("activity_label")?,
            row.get("activity_confidence")?,
        ),
        transit_guess: guess_from_columns(
            row.get("transit_label")?,
            row.get("transit_confidence")?,
        ),
        completed_at: parse_optional_datetime(completed_at, "completed_at")?,
    })
}

impl Database {
    /// Current persisted state of the journey starting at `start_time`.
    pub async fn find_journey(&self, start_time: DateTime<Utc>) -> Result<JourneyState> {
        let key = format_datetime(&start_time);
        self.execute(move |conn| {
            let query = format!("{JOURNEY_SELECT} WHERE j.start_time = ?1");
            let mut stmt = conn.prepare(&query)?;
            let mut rows = stmt.query(params![key])?;
            let journey = match rows.next()? {
                Some(row) => Some(row_to_journey(row)?),
                None => None,
            };
            Ok(JourneyState::from_row(journey))
        })
        .await
    }

    /// Inserts a partial row. Returns `false` when a row with the same start
    /// time already exists; the existing row is left untouched.
    pub async fn insert_partial_journey(&self, journey: &NewJourney) -> Result<bool> {
        let record = journey.clone();
        self.execute(move |conn| {
            let tx = conn.transaction()?;
            let inserted = {
                let activities = ActivityRepository::new(&tx);
                let activity_id = record
                    .activity_guess
                    .as_ref()
                    .map(|guess| activities.ensure_activity(&guess.kind))
                    .transpose()?;
                let transit_id = record
                    .transit_guess
                    .as_ref()
                    .map(|guess| activities.ensure_activity(&guess.kind))
                    .transpose()?;

                tx.execute(
                    "INSERT OR IGNORE INTO journeys (
                        start_time,
                        end_time,
                        activity_guess_id,
                        activity_confidence,
                        transit_guess_id,
                        transit_confidence,
                        completed_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, NULL)",
                    params![
                        format_datetime(&record.start_time),
                        format_datetime(&record.end_time),
                        activity_id,
                        record.activity_guess.as_ref().map(|g| g.confidence),
                        transit_id,
                        record.transit_guess.as_ref().map(|g| g.confidence),
                    ],
                )
                .with_context(|| "failed to insert journey")?
            };
            tx.commit()?;
            Ok(inserted == 1)
        })
        .await
    }

    /// Writes every resolved field and the completeness marker in one
    /// transaction. Returns `false` if the row was already complete (or is
    /// gone), in which case nothing is written.
    pub async fn complete_journey(
        &self,
        start_time: DateTime<Utc>,
        resolution: &JourneyResolution,
        completed_at: DateTime<Utc>,
    ) -> Result<bool> {
        let key = format_datetime(&start_time);
        let resolution = resolution.clone();
        self.execute(move |conn| {
            let tx = conn.transaction()?;
            let updated = {
                let activities = ActivityRepository::new(&tx);
                let activity_id = resolution
                    .activity_guess
                    .as_ref()
                    .map(|guess| activities.ensure_activity(&guess.kind))
                    .transpose()?;
                let transit_id = resolution
                    .transit_guess
                    .as_ref()
                    .map(|guess| activities.ensure_activity(&guess.kind))
                    .transpose()?;

                tx.execute(
                    "UPDATE journeys
                     SET end_time = ?1,
                         start_city_id = ?2,
                         end_city_id = ?3,
                         activity_guess_id = ?4,
                         activity_confidence = ?5,
                         transit_guess_id = ?6,
                         transit_confidence = ?7,
                         completed_at = ?8
                     WHERE start_time = ?9 AND completed_at IS NULL",
                    params![
                        format_datetime(&resolution.end_time),
                        resolution.start_city_id,
                        resolution.end_city_id,
                        activity_id,
                        resolution.activity_guess.as_ref().map(|g| g.confidence),
                        transit_id,
                        resolution.transit_guess.as_ref().map(|g| g.confidence),
                        format_datetime(&completed_at),
                        key,
                    ],
                )
                .with_context(|| "failed to complete journey")?
            };
            tx.commit()?;
            Ok(updated == 1)
        })
        .await
    }

    /// Complete journeys with `from <= start_time < until`, oldest first.
    pub async fn list_complete_journeys(
        &self,
        from: Option<DateTime<Utc>>,
        until: Option<DateTime<Utc>>,
    ) -> Result<Vec<Journey>> {
        let from = from.map(|dt| format_datetime(&dt));
        let until = until.map(|dt| format_datetime(&dt));
        self.execute(move |conn| {
            let query = format!(
                "{JOURNEY_SELECT}
                 WHERE j.completed_at IS NOT NULL
                   AND (?1 IS NULL OR j.start_time >= ?1)
                   AND (?2 IS NULL OR j.start_time < ?2)
                 ORDER BY j.start_time ASC"
            );
            let mut stmt = conn.prepare(&query)?;
            let mut rows = stmt.query(params![from, until])?;
            let mut journeys = Vec::new();
            while let Some(row) = rows.next()? {
                journeys.push(row_to_journey(row)?);
            }
            Ok(journeys)
        })
        .await
    }

    pub async fn journey_counts(&self) -> Result<JourneyCounts> {
        self.execute(|conn| {
            let (total, complete): (i64, i64) = conn.query_row(
                "SELECT COUNT(*), COUNT(completed_at) FROM journeys",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )?;
            Ok(JourneyCounts {
                total: total.max(0) as u64,
                complete: complete.max(0) as u64,
            })
        })
        .await
    }

    /// Start times of the first and last complete journeys.
    pub async fn complete_journey_span(
        &self,
    ) -> Result<Option<(DateTime<Utc>, DateTime<Utc>)>> {
        self.execute(|conn| {
            let span: Option<(Option<String>, Option<String>)> = conn
                .query_row(
                    "SELECT MIN(start_time), MAX(start_time)
                     FROM journeys WHERE completed_at IS NOT NULL",
                    [],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;
            match span {
                Some((Some(first), Some(last))) => Ok(Some((
                    parse_datetime(&first, "start_time")?,
                    parse_datetime(&last, "start_time")?,
                ))),
                _ => Ok(None),
            }
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::OpenMode;
    use crate::models::ActivityKind;
    use chrono::TimeZone;

    fn open_store() -> (tempfile::TempDir, Database) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open(dir.path().join("journeys.sqlite"), OpenMode::CreateIfMissing)
            .unwrap();
        (dir, db)
    }

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2023, 7, 1, hour, minute, 0).unwrap()
    }

    fn new_journey(start: DateTime<Utc>) -> NewJourney {
        NewJourney {
            start_time: start,
            end_time: start + chrono::Duration::minutes(20),
            activity_guess: Some(Candidate::new(ActivityKind::Subway, 80.0)),
            transit_guess: Some(Candidate::new(ActivityKind::Subway, 80.0)),
        }
    }

    #[tokio::test]
    async fn insert_is_keyed_by_start_time() {
        let (_dir, db) = open_store();
        assert!(db.insert_partial_journey(&new_journey(at(10, 0))).await.unwrap());
        assert!(!db.insert_partial_journey(&new_journey(at(10, 0))).await.unwrap());

        let counts = db.journey_counts().await.unwrap();
        assert_eq!(counts, JourneyCounts { total: 1, complete: 0 });

        match db.find_journey(at(10, 0)).await.unwrap() {
            JourneyState::Partial(journey) => {
                assert_eq!(journey.end_time, at(10, 20));
                assert_eq!(journey.start_city, None);
                assert_eq!(
                    journey.transit_guess,
                    Some(Candidate::new(ActivityKind::Subway, 80.0))
                );
            }
            other => panic!("expected partial row, got {}", other.as_str()),
        }
        assert_eq!(db.find_journey(at(11, 0)).await.unwrap(), JourneyState::Absent);
    }

    #[tokio::test]
    async fn completion_happens_once() {
        let (_dir, db) = open_store();
        db.insert_partial_journey(&new_journey(at(10, 0))).await.unwrap();
        let vienna = db.ensure_city("Vienna", "Austria").await.unwrap();

        let resolution = JourneyResolution {
            end_time: at(10, 20),
            start_city_id: Some(vienna.id),
            end_city_id: Some(vienna.id),
            activity_guess: Some(Candidate::new(ActivityKind::Subway, 80.0)),
            transit_guess: Some(Candidate::new(ActivityKind::Subway, 80.0)),
        };
        assert!(db.complete_journey(at(10, 0), &resolution, at(12, 0)).await.unwrap());

        let second = JourneyResolution {
            end_time: at(10, 45),
            ..resolution.clone()
        };
        assert!(!db.complete_journey(at(10, 0), &second, at(13, 0)).await.unwrap());

        match db.find_journey(at(10, 0)).await.unwrap() {
            JourneyState::Complete(journey) => {
                assert_eq!(journey.end_time, at(10, 20));
                assert_eq!(journey.completed_at, Some(at(12, 0)));
                assert_eq!(journey.start_city, Some(vienna.clone()));
                assert_eq!(journey.end_city, Some(vienna));
            }
            other => panic!("expected complete row, got {}", other.as_str()),
        }
    }

    #[tokio::test]
    async fn listing_filters_by_range_and_completeness() {
        let (_dir, db) = open_store();
        for hour in [8, 9, 10] {
            db.insert_partial_journey(&new_journey(at(hour, 0))).await.unwrap();
        }
        let resolution = |end| JourneyResolution {
            end_time: end,
            start_city_id: None,
            end_city_id: None,
            activity_guess: None,
            transit_guess: None,
        };
        db.complete_journey(at(8, 0), &resolution(at(8, 20)), at(12, 0))
            .await
            .unwrap();
        db.complete_journey(at(10, 0), &resolution(at(10, 20)), at(12, 0))
            .await
            .unwrap();

        let all = db.list_complete_journeys(None, None).await.unwrap();
        assert_eq!(
            all.iter().map(|j| j.start_time).collect::<Vec<_>>(),
            vec![at(8, 0), at(10, 0)]
        );

        let morning = db
            .list_complete_journeys(Some(at(7, 0)), Some(at(10, 0)))
            .await
            .unwrap();
        assert_eq!(morning.len(), 1);
        assert_eq!(morning[0].activity_guess, None);

        assert_eq!(
            db.complete_journey_span().await.unwrap(),
            Some((at(8, 0), at(10, 0)))
        );
    }
}
