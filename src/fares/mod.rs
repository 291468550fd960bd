//! Single-ride versus yearly-pass cost comparison.

pub mod calculator;
pub mod lookup;
pub mod period;

pub use calculator::{CostComparison, FareCalculator, Recommendation};
pub use lookup::{lookup_from_settings, ConfiguredFares, FareLookup, HttpFareLookup};
pub use period::{ensure_disjoint, Period};
