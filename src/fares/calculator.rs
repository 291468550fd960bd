use serde::{Deserialize, Serialize};

use crate::fares::period::Period;
use crate::models::{FareSchedule, Money, Trip};

const DAYS_PER_PASS_YEAR: f64 = 365.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Recommendation {
    SingleRides,
    YearlyPass,
}

/// Single rides versus the pass over one period (or several combined).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostComparison {
    /// `None` for the combined figure over several periods.
    pub period: Option<Period>,
    pub days: i64,
    pub qualifying_trips: u64,
    pub single_total: Money,
    pub pass_total: Money,
    /// `single_total - pass_total`: positive when the pass is cheaper.
    pub saved: Money,
    pub recommendation: Recommendation,
}

impl CostComparison {
    fn new(
        period: Option<Period>,
        days: i64,
        qualifying_trips: u64,
        single_total: Money,
        pass_total: Money,
    ) -> Self {
        let recommendation = if single_total > pass_total {
            Recommendation::YearlyPass
        } else {
            Recommendation::SingleRides
        };
        Self {
            period,
            days,
            qualifying_trips,
            single_total,
            pass_total,
            saved: single_total - pass_total,
            recommendation,
        }
    }
}

pub struct FareCalculator {
    schedule: FareSchedule,
}

impl FareCalculator {
    pub fn new(schedule: FareSchedule) -> Self {
        Self { schedule }
    }

    pub fn schedule(&self) -> &FareSchedule {
        &self.schedule
    }

    /// Pass price prorated to the period's day count.
    pub fn pass_price_for(&self, period: &Period) -> Money {
        self.schedule
            .yearly_pass_price
            .scale(period.days() as f64 / DAYS_PER_PASS_YEAR)
    }

    /// `trips` are the trips of this period; only qualifying ones cost a fare.
    pub fn compare(&self, period: Period, trips: &[Trip]) -> CostComparison {
        let qualifying = trips.iter().filter(|trip| trip.qualifies_for_fare()).count() as u64;
        CostComparison::new(
            Some(period),
            period.days(),
            qualifying,
            self.schedule.single_ride_price.times(qualifying),
            self.pass_price_for(&period),
        )
    }

    /// Sums of the per-period totals, compared the same way.
    pub fn combine(&self, comparisons: &[CostComparison]) -> CostComparison {
        CostComparison::new(
            None,
            comparisons.iter().map(|c| c.days).sum(),
            comparisons.iter().map(|c| c.qualifying_trips).sum(),
            comparisons.iter().map(|c| c.single_total).sum(),
            comparisons.iter().map(|c| c.pass_total).sum(),
        )
    }
}
