use std::{fmt, str::FromStr};

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, Datelike, Days, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

/// Inclusive range of calendar days (UTC) analysed as one unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Period {
    start: NaiveDate,
    end: NaiveDate,
}

impl Period {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if end < start {
            bail!("period ends ({end}) before it starts ({start})");
        }
        Ok(Self { start, end })
    }

    pub fn calendar_year(year: i32) -> Result<Self> {
        let start = NaiveDate::from_ymd_opt(year, 1, 1).ok_or_else(|| anyhow!("invalid year {year}"))?;
        let end = NaiveDate::from_ymd_opt(year, 12, 31).ok_or_else(|| anyhow!("invalid year {year}"))?;
        Self::new(start, end)
    }

    /// Period covering the days of two instants.
    pub fn spanning(first: DateTime<Utc>, last: DateTime<Utc>) -> Result<Self> {
        Self::new(first.date_naive(), last.date_naive())
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// Number of days, both ends included.
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    pub fn overlaps(&self, other: &Period) -> bool {
        self.start <= other.end && other.start <= self.end
    }

    /// Half-open instant range `[start 00:00, day after end 00:00)`.
    pub fn utc_bounds(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        let from = self.start.and_time(NaiveTime::default()).and_utc();
        let until = self
            .end
            .checked_add_days(Days::new(1))
            .unwrap_or(NaiveDate::MAX)
            .and_time(NaiveTime::default())
            .and_utc();
        (from, until)
    }

    pub fn year(&self) -> Option<i32> {
        (self.start.year() == self.end.year()).then_some(self.start.year())
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// Accepts `2023` (whole year) or `2023-03-01..2023-08-31`.
impl FromStr for Period {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        let value = value.trim();
        if let Some((start, end)) = value.split_once("..") {
            let start = parse_date(start)?;
            let end = parse_date(end)?;
            return Period::new(start, end);
        }
        let year: i32 = value
            .parse()
            .with_context(|| format!("expected YYYY or YYYY-MM-DD..YYYY-MM-DD, got {value:?}"))?;
        Period::calendar_year(year)
    }
}

fn parse_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .with_context(|| format!("invalid date {value:?}, expected YYYY-MM-DD"))
}

/// Rejects period lists whose members share a day; the combined totals
/// would count those days twice.
pub fn ensure_disjoint(periods: &[Period]) -> Result<()> {
    for (i, a) in periods.iter().enumerate() {
        for b in &periods[i + 1..] {
            if a.overlaps(b) {
                bail!("periods {a} and {b} overlap");
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn parses_years_and_ranges() {
        let year: Period = "2023".parse().unwrap();
        assert_eq!(year.days(), 365);
        assert_eq!(year.year(), Some(2023));
        assert_eq!("2024".parse::<Period>().unwrap().days(), 366);

        let range: Period = "2023-03-01..2023-03-31".parse().unwrap();
        assert_eq!(range.days(), 31);
        assert_eq!(range.to_string(), "2023-03-01..2023-03-31");

        assert!("2023-04-01..2023-03-01".parse::<Period>().is_err());
        assert!("last year".parse::<Period>().is_err());
    }

    #[test]
    fn single_day_period_counts_one_day() {
        let day = Period::new(date(2023, 7, 1), date(2023, 7, 1)).unwrap();
        assert_eq!(day.days(), 1);
        let (from, until) = day.utc_bounds();
        assert_eq!(until - from, chrono::Duration::days(1));
    }

    #[test]
    fn overlapping_periods_are_rejected() {
        let h1: Period = "2023-01-01..2023-06-30".parse().unwrap();
        let h2: Period = "2023-07-01..2023-12-31".parse().unwrap();
        let q3: Period = "2023-07-01..2023-09-30".parse().unwrap();
        assert!(ensure_disjoint(&[h1, h2]).is_ok());
        assert!(ensure_disjoint(&[h1, h2, q3]).is_err());
    }
}
