use std::{
    fmt,
    iter::Sum,
    ops::{Add, Neg, Sub},
};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Amount of money in cents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(pub i64);

impl Money {
    pub const ZERO: Money = Money(0);

    /// Rounds to the nearest cent.
    pub fn from_units(units: f64) -> Self {
        Money((units * 100.0).round() as i64)
    }

    pub fn times(&self, count: u64) -> Money {
        Money(self.0.saturating_mul(count as i64))
    }

    /// Scales by a fraction, rounding to the nearest cent.
    pub fn scale(&self, factor: f64) -> Money {
        Money((self.0 as f64 * factor).round() as i64)
    }

    pub fn abs(&self) -> Money {
        Money(self.0.abs())
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        Money(self.0 + rhs.0)
    }
}

impl Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Money) -> Money {
        Money(self.0 - rhs.0)
    }
}

impl Neg for Money {
    type Output = Money;

    fn neg(self) -> Money {
        Money(-self.0)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, Add::add)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FareSchedule {
    pub single_ride_price: Money,
    pub yearly_pass_price: Money,
    pub currency: String,
    pub effective_date: NaiveDate,
}
