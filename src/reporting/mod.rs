//! Report data for an external renderer.

pub mod distribution;
pub mod types;

pub use distribution::{monthly_distribution, PUBLIC_TRANSIT};
pub use types::{ActivityDistribution, CostPoint, MonthlyActivity, Report};

use std::{fs, path::Path};

use anyhow::{Context, Result};

pub fn write_report(path: &Path, report: &Report) -> Result<()> {
    let serialized = serde_json::to_string_pretty(report)?;
    fs::write(path, serialized)
        .with_context(|| format!("Failed to write report to {}", path.display()))
}
