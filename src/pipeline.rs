//! Glue between the stages: exports → store → trips → cost report.

use std::path::PathBuf;

use anyhow::{Context, Result};
use log::{info, warn};

use crate::consolidation::{trips_between, ConsolidationConfig};
use crate::db::Database;
use crate::fares::{ensure_disjoint, FareCalculator, Period};
use crate::models::{ActivityKind, FareSchedule};
use crate::normalizer::{collect_export_files, load_export, NormalizedBatch, Normalizer};
use crate::reporting::{monthly_distribution, CostPoint, Report};

/// Reads every export under `inputs` into one batch, in sorted path order.
///
/// A file that is not an export at all is skipped with a warning; record
/// level problems are only counted.
pub fn read_inputs(inputs: &[PathBuf], normalizer: &Normalizer) -> Result<NormalizedBatch> {
    let mut batch = NormalizedBatch::default();
    for input in inputs {
        for file in collect_export_files(input)? {
            let records = match load_export(&file) {
                Ok(records) => records,
                Err(err) => {
                    warn!("Skipping {}: {err:#}", file.display());
                    continue;
                }
            };
            let file_batch = normalizer.normalize_all(&records);
            info!(
                "{}: {} segments, {} other records, {} malformed",
                file.display(),
                file_batch.segments.len(),
                file_batch.ignored,
                file_batch.malformed
            );
            batch.absorb(file_batch);
        }
    }
    Ok(batch)
}

/// First to last day with a complete journey, if the store has any.
pub async fn default_period(db: &Database) -> Result<Option<Period>> {
    match db.complete_journey_span().await? {
        Some((first, last)) => Ok(Some(Period::spanning(first, last)?)),
        None => Ok(None),
    }
}

/// Consolidates each period's journeys and prices them.
pub async fn build_report(
    db: &Database,
    periods: &[Period],
    schedule: FareSchedule,
    consolidation: &ConsolidationConfig,
    public_transit_modes: &[ActivityKind],
) -> Result<Report> {
    ensure_disjoint(periods)?;
    let calculator = FareCalculator::new(schedule);

    let mut comparisons = Vec::with_capacity(periods.len());
    for period in periods {
        let (from, until) = period.utc_bounds();
        let trips = trips_between(db, Some(from), Some(until), consolidation)
            .await
            .with_context(|| format!("Failed to load trips for {period}"))?;
        comparisons.push(calculator.compare(*period, &trips));
    }
    let combined = calculator.combine(&comparisons);

    let mut journeys = Vec::new();
    for period in periods {
        let (from, until) = period.utc_bounds();
        journeys.extend(db.list_complete_journeys(Some(from), Some(until)).await?);
    }
    let labels = db.list_activities().await?;
    let activity_distribution =
        monthly_distribution(&journeys, &labels, public_transit_modes, periods);

    Ok(Report {
        fares: calculator.schedule().clone(),
        cost_series: comparisons.iter().map(CostPoint::from).collect(),
        combined: CostPoint::from(&combined),
        activity_distribution,
        ingest: None,
    })
}
