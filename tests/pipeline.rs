use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::json;
use tokio_util::sync::CancellationToken;

use jahreskarte_lib::db::{Database, OpenMode};
use jahreskarte_lib::fares::{Period, Recommendation};
use jahreskarte_lib::geocode::{GeocodeError, GeocodeResolver, ResolvedCity};
use jahreskarte_lib::ingest::{Ingestor, NoopProgress};
use jahreskarte_lib::models::{Coordinate, FareSchedule, Money};
use jahreskarte_lib::normalizer::Normalizer;
use jahreskarte_lib::pipeline::{build_report, default_period, read_inputs};
use jahreskarte_lib::reporting::PUBLIC_TRANSIT;
use jahreskarte_lib::settings::Settings;

#[derive(Default)]
struct ViennaOnly {
    calls: AtomicUsize,
}

#[async_trait]
impl GeocodeResolver for ViennaOnly {
    async fn resolve_city(&self, _coord: Coordinate) -> Result<ResolvedCity, GeocodeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(ResolvedCity::new("Vienna", "Austria"))
    }
}

fn segment(start: &str, end: &str, mode: &str, probability: f64) -> serde_json::Value {
    json!({
        "activitySegment": {
            "startLocation": { "latitudeE7": 482082000, "longitudeE7": 163738000 },
            "endLocation": { "latitudeE7": 481987000, "longitudeE7": 163700000 },
            "duration": { "startTimestamp": start, "endTimestamp": end },
            "activities": [
                { "activityType": mode, "probability": probability },
                { "activityType": "WALKING", "probability": 100.0 - probability }
            ]
        }
    })
}

fn write_export(dir: &std::path::Path) -> std::path::PathBuf {
    let export = json!({
        "timelineObjects": [
            segment("2023-07-01T10:00:00Z", "2023-07-01T10:20:00Z", "IN_SUBWAY", 80.0),
            { "placeVisit": { "location": { "name": "Stephansplatz" } } },
            segment("2023-07-01T10:22:00Z", "2023-07-01T10:40:00Z", "IN_TRAM", 75.0),
            segment("2023-07-01T11:30:00Z", "2023-07-01T11:45:00Z", "IN_BUS", 70.0),
            { "activitySegment": { "duration": { "startTimestamp": "garbage" } } }
        ]
    });
    let exports = dir.join("exports");
    fs::create_dir(&exports).unwrap();
    fs::write(exports.join("2023_JULY.json"), export.to_string()).unwrap();
    exports
}

fn fares() -> FareSchedule {
    FareSchedule {
        single_ride_price: Money::from_units(2.40),
        yearly_pass_price: Money::from_units(365.0),
        currency: "EUR".into(),
        effective_date: NaiveDate::from_ymd_opt(2023, 1, 1).unwrap(),
    }
}

#[tokio::test]
async fn export_to_report_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let exports = write_export(dir.path());
    let store = dir.path().join("journeys.sqlite");

    assert!(Database::open(store.clone(), OpenMode::MustExist).is_err());
    let db = Database::open(store, OpenMode::CreateIfMissing).unwrap();

    let settings = Settings {
        gap_threshold_minutes: 5,
        ..Settings::default()
    };
    let ingest_config = settings.ingest_config();
    let normalizer = Normalizer::new(ingest_config.public_transit_modes.clone());
    let batch = read_inputs(&[exports], &normalizer).unwrap();
    assert_eq!(batch.segments.len(), 3);
    assert_eq!(batch.ignored, 1);
    assert_eq!(batch.malformed, 1);

    let resolver = Arc::new(ViennaOnly::default());
    let ingestor = Ingestor::new(db.clone(), resolver.clone(), ingest_config);
    let cancel = CancellationToken::new();

    let first = ingestor.ingest(&batch, &NoopProgress, &cancel).await.unwrap();
    assert_eq!(first.records_seen, 5);
    assert_eq!(first.inserted, 3);
    assert_eq!(first.total_complete, 3);
    let lookups = resolver.calls.load(Ordering::SeqCst);

    let second = ingestor.ingest(&batch, &NoopProgress, &cancel).await.unwrap();
    assert_eq!(second.inserted, 0);
    assert_eq!(second.skipped, 3);
    assert_eq!(second.total_complete, 3);
    assert_eq!(resolver.calls.load(Ordering::SeqCst), lookups);

    let period = default_period(&db).await.unwrap().unwrap();
    assert_eq!(period, "2023-07-01..2023-07-01".parse::<Period>().unwrap());

    let report = build_report(
        &db,
        &[period],
        fares(),
        &settings.consolidation_config(),
        &settings.ingest_config().public_transit_modes,
    )
    .await
    .unwrap();

    let day = &report.cost_series[0];
    assert_eq!(day.qualifying_trips, 2);
    assert_eq!(day.single_total, Money::from_units(4.80));
    assert_eq!(day.pass_total, Money::from_units(1.00));
    assert_eq!(day.recommendation, Recommendation::YearlyPass);
    assert_eq!(report.combined.single_total, day.single_total);

    let months = &report.activity_distribution.months;
    assert_eq!(months.len(), 1);
    assert_eq!(months[0].covered_days, 1);
    assert_eq!(months[0].counts[PUBLIC_TRANSIT], 3);
}

#[tokio::test]
async fn empty_store_has_no_default_period() {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open(dir.path().join("empty.sqlite"), OpenMode::CreateIfMissing).unwrap();
    assert_eq!(default_period(&db).await.unwrap(), None);

    let year = Period::calendar_year(2023).unwrap();
    let settings = Settings::default();
    let report = build_report(
        &db,
        &[year],
        fares(),
        &settings.consolidation_config(),
        &settings.ingest_config().public_transit_modes,
    )
    .await
    .unwrap();
    assert_eq!(report.combined.qualifying_trips, 0);
    assert_eq!(report.combined.recommendation, Recommendation::SingleRides);
    assert_eq!(report.combined.saved, Money::from_units(-365.0));
}

#[tokio::test]
async fn distribution_skips_journeys_between_periods() {
    let dir = tempfile::tempdir().unwrap();
    let exports = write_export(dir.path());
    let db = Database::open(dir.path().join("journeys.sqlite"), OpenMode::CreateIfMissing).unwrap();

    let settings = Settings::default();
    let ingest_config = settings.ingest_config();
    let normalizer = Normalizer::new(ingest_config.public_transit_modes.clone());
    let batch = read_inputs(&[exports], &normalizer).unwrap();
    let ingestor = Ingestor::new(db.clone(), Arc::new(ViennaOnly::default()), ingest_config);
    ingestor
        .ingest(&batch, &NoopProgress, &CancellationToken::new())
        .await
        .unwrap();

    let periods = [
        Period::calendar_year(2022).unwrap(),
        Period::calendar_year(2024).unwrap(),
    ];
    let report = build_report(
        &db,
        &periods,
        fares(),
        &settings.consolidation_config(),
        &settings.ingest_config().public_transit_modes,
    )
    .await
    .unwrap();

    assert_eq!(report.combined.qualifying_trips, 0);
    let months = &report.activity_distribution.months;
    assert_eq!(months.len(), 24);
    assert!(months.iter().all(|m| !m.month.starts_with("2023")));
    assert!(months.iter().all(|m| m.counts.values().all(|count| *count == 0)));
}
