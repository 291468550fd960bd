use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::fares::{CostComparison, Period, Recommendation};
use crate::ingest::IngestSummary;
use crate::models::{FareSchedule, Money};

/// One bar pair of the cost chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostPoint {
    pub label: String,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub days: i64,
    pub qualifying_trips: u64,
    pub single_total: Money,
    pub pass_total: Money,
    pub saved: Money,
    pub recommendation: Recommendation,
}

impl From<&CostComparison> for CostPoint {
    fn from(comparison: &CostComparison) -> Self {
        let label = match comparison.period {
            Some(period) => match period.year() {
                Some(year) if Period::calendar_year(year).ok() == Some(period) => year.to_string(),
                _ => period.to_string(),
            },
            None => "combined".to_string(),
        };
        Self {
            label,
            start: comparison.period.map(|p| p.start()),
            end: comparison.period.map(|p| p.end()),
            days: comparison.days,
            qualifying_trips: comparison.qualifying_trips,
            single_total: comparison.single_total,
            pass_total: comparison.pass_total,
            saved: comparison.saved,
            recommendation: comparison.recommendation,
        }
    }
}

/// Activity counts for one calendar month, divided by the days of that
/// month the data actually covers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyActivity {
    /// `YYYY-MM`
    pub month: String,
    pub covered_days: u32,
    pub counts: BTreeMap<String, u32>,
    pub per_day: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityDistribution {
    /// Every category, present in each month even when its count is zero.
    pub categories: Vec<String>,
    pub months: Vec<MonthlyActivity>,
}

/// Everything an external renderer needs; nothing here is drawn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub fares: FareSchedule,
    pub cost_series: Vec<CostPoint>,
    pub combined: CostPoint,
    pub activity_distribution: ActivityDistribution,
    #[serde(skip_serializing_if = "Option::is_none", skip_deserializing)]
    pub ingest: Option<IngestSummary>,
}
