//! Journey → trip consolidation.

pub mod config;
pub mod merge;

pub use config::ConsolidationConfig;
pub use merge::{consolidate, should_merge};

use anyhow::Result;
use chrono::{DateTime, Utc};

use crate::db::Database;
use crate::models::Trip;

/// Trips built from the complete journeys starting in `[from, until)`.
pub async fn trips_between(
    db: &Database,
    from: Option<DateTime<Utc>>,
    until: Option<DateTime<Utc>>,
    config: &ConsolidationConfig,
) -> Result<Vec<Trip>> {
    let journeys = db.list_complete_journeys(from, until).await?;
    Ok(consolidate(journeys, config))
}
