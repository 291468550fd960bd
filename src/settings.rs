use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path, time::Duration};

use crate::consolidation::ConsolidationConfig;
use crate::geocode::RetryPolicy;
use crate::ingest::IngestConfig;
use crate::models::{ActivityKind, ConfidenceThreshold};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GeocoderSettings {
    pub base_url: String,
    pub api_key: String,
    pub timeout_secs: u64,
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for GeocoderSettings {
    fn default() -> Self {
        Self {
            base_url: "http://py4e-data.dr-chuck.net/json".into(),
            api_key: "42".into(),
            timeout_secs: 10,
            max_attempts: 4,
            initial_backoff_ms: 500,
            max_backoff_ms: 8_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum FareSource {
    /// Prices below are used as the quote.
    Configured,
    /// JSON document with `singleRidePrice`, `yearlyPassPrice`, `currency`.
    Http { url: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FareSettings {
    pub source: FareSource,
    pub single_ride_price: f64,
    pub yearly_pass_price: f64,
    pub currency: String,
}

impl Default for FareSettings {
    fn default() -> Self {
        Self {
            source: FareSource::Configured,
            single_ride_price: 2.40,
            yearly_pass_price: 365.0,
            currency: "EUR".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    /// Percent; guesses below it are stored as absent.
    pub confidence_threshold: f64,
    /// Longest pause between two journeys that still counts as one trip.
    pub gap_threshold_minutes: i64,
    pub home_city: String,
    pub home_country: Option<String>,
    pub public_transit_modes: Vec<String>,
    /// Activities that bridge two transit legs (walking to the next platform).
    pub connector_modes: Vec<String>,
    pub geocoder: GeocoderSettings,
    pub fares: FareSettings,
    pub lock_stale_after_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            confidence_threshold: 30.0,
            gap_threshold_minutes: 15,
            home_city: "Vienna".into(),
            home_country: Some("Austria".into()),
            public_transit_modes: ["IN_BUS", "IN_SUBWAY", "IN_TRAIN", "IN_TRAM"]
                .into_iter()
                .map(String::from)
                .collect(),
            connector_modes: ["WALKING", "RUNNING", "ON_FOOT", "STILL"]
                .into_iter()
                .map(String::from)
                .collect(),
            geocoder: GeocoderSettings::default(),
            fares: FareSettings::default(),
            lock_stale_after_secs: 600,
        }
    }
}

impl Settings {
    /// Reads the settings file; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings from {}", path.display()))?;
        let settings: Settings = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse settings in {}", path.display()))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn persist(&self, path: &Path) -> Result<()> {
        let serialized = serde_json::to_string_pretty(self)?;
        fs::write(path, serialized)
            .with_context(|| format!("Failed to write settings to {}", path.display()))
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=100.0).contains(&self.confidence_threshold) {
            bail!(
                "confidenceThreshold must be between 0 and 100, got {}",
                self.confidence_threshold
            );
        }
        if self.gap_threshold_minutes < 0 {
            bail!("gapThresholdMinutes must not be negative");
        }
        if self.home_city.trim().is_empty() {
            bail!("homeCity must not be empty");
        }
        if self.public_transit_modes.is_empty() {
            bail!("publicTransitModes must name at least one mode");
        }
        if self.fares.single_ride_price < 0.0 || self.fares.yearly_pass_price < 0.0 {
            bail!("fare prices must not be negative");
        }
        if self.geocoder.max_attempts == 0 {
            bail!("geocoder.maxAttempts must be at least 1");
        }
        Ok(())
    }

    pub fn threshold(&self) -> ConfidenceThreshold {
        ConfidenceThreshold(self.confidence_threshold)
    }

    pub fn ingest_config(&self) -> IngestConfig {
        IngestConfig {
            threshold: self.threshold(),
            public_transit_modes: kinds(&self.public_transit_modes),
            lock_stale_after: chrono::Duration::seconds(self.lock_stale_after_secs as i64),
        }
    }

    pub fn consolidation_config(&self) -> ConsolidationConfig {
        ConsolidationConfig {
            gap_threshold: chrono::Duration::minutes(self.gap_threshold_minutes),
            connector_modes: kinds(&self.connector_modes),
            home_city: self.home_city.clone(),
            home_country: self.home_country.clone(),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.geocoder.max_attempts,
            attempt_timeout: Duration::from_secs(self.geocoder.timeout_secs),
            initial_backoff: Duration::from_millis(self.geocoder.initial_backoff_ms),
            max_backoff: Duration::from_millis(self.geocoder.max_backoff_ms),
        }
    }
}

fn kinds(labels: &[String]) -> Vec<ActivityKind> {
    labels.iter().map(|label| ActivityKind::from_label(label)).collect()
}
