use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};

use crate::db::Journey;
use crate::fares::Period;
use crate::models::ActivityKind;
use crate::reporting::types::{ActivityDistribution, MonthlyActivity};

/// Category all public-transit modes are folded into.
pub const PUBLIC_TRANSIT: &str = "PUBLIC TRANSIT";

pub fn category_for(kind: &ActivityKind, public_transit_modes: &[ActivityKind]) -> String {
    if public_transit_modes.contains(kind) {
        PUBLIC_TRANSIT.to_string()
    } else {
        kind.display_label()
    }
}

/// Monthly activity frequency over the analysed periods.
///
/// Each journey inside a period counts once under the category of its
/// activity guess; journeys without one are not counted. Counts are divided
/// by the days of the month the periods cover, so a half-covered month is not
/// under-reported and months between two periods do not show up at all.
/// `known_kinds` seeds the category list so categories with no journeys still
/// show up as zero. Periods are expected to be disjoint.
pub fn monthly_distribution(
    journeys: &[Journey],
    known_kinds: &[ActivityKind],
    public_transit_modes: &[ActivityKind],
    periods: &[Period],
) -> ActivityDistribution {
    let mut categories: Vec<String> = Vec::new();
    let mut add_category = |category: String| {
        if !categories.contains(&category) {
            categories.push(category);
        }
    };
    for kind in known_kinds {
        add_category(category_for(kind, public_transit_modes));
    }
    for journey in journeys {
        if let Some(guess) = &journey.activity_guess {
            add_category(category_for(&guess.kind, public_transit_modes));
        }
    }

    let mut counts: BTreeMap<(i32, u32), BTreeMap<String, u32>> = BTreeMap::new();
    for period in periods {
        let mut month = NaiveDate::from_ymd_opt(period.start().year(), period.start().month(), 1);
        while let Some(start) = month.filter(|m| *m <= period.end()) {
            counts
                .entry((start.year(), start.month()))
                .or_insert_with(|| categories.iter().map(|c| (c.clone(), 0)).collect());
            month = start.checked_add_months(chrono::Months::new(1));
        }
    }

    for journey in journeys {
        let date = journey.start_time.date_naive();
        if !periods.iter().any(|period| period.contains(date)) {
            continue;
        }
        let Some(guess) = &journey.activity_guess else {
            continue;
        };
        if let Some(month) = counts.get_mut(&(date.year(), date.month())) {
            *month
                .entry(category_for(&guess.kind, public_transit_modes))
                .or_insert(0) += 1;
        }
    }

    let months = counts
        .into_iter()
        .map(|((year, month), counts)| {
            let covered_days = covered_days(year, month, periods);
            let per_day = counts
                .iter()
                .map(|(category, count)| {
                    let rate = *count as f64 / f64::from(covered_days.max(1));
                    (category.clone(), (rate * 100.0).round() / 100.0)
                })
                .collect();
            MonthlyActivity {
                month: format!("{year:04}-{month:02}"),
                covered_days,
                counts,
                per_day,
            }
        })
        .collect();

    ActivityDistribution { categories, months }
}

/// Days of the given month that fall inside any of the periods.
fn covered_days(year: i32, month: u32, periods: &[Period]) -> u32 {
    let Some(month_start) = NaiveDate::from_ymd_opt(year, month, 1) else {
        return 0;
    };
    let month_end = month_start
        .checked_add_months(chrono::Months::new(1))
        .and_then(|next| next.pred_opt())
        .unwrap_or(month_start);
    periods
        .iter()
        .map(|period| {
            let from = month_start.max(period.start());
            let to = month_end.min(period.end());
            if to < from {
                0
            } else {
                ((to - from).num_days() + 1) as u32
            }
        })
        .sum()
}
