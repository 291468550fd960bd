use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use serde::Deserialize;

use crate::models::{FareSchedule, Money};
use crate::settings::{FareSettings, FareSource};

/// Source of the prices the comparison runs with.
#[async_trait]
pub trait FareLookup: Send + Sync {
    async fn current_fares(&self) -> Result<FareSchedule>;

    /// Where the quote comes from, for the confirmation prompt.
    fn describe(&self) -> String;
}

/// Prices straight from the settings file.
pub struct ConfiguredFares {
    schedule: FareSchedule,
}

impl ConfiguredFares {
    pub fn new(schedule: FareSchedule) -> Self {
        Self { schedule }
    }

    pub fn from_settings(settings: &FareSettings) -> Self {
        Self::new(FareSchedule {
            single_ride_price: Money::from_units(settings.single_ride_price),
            yearly_pass_price: Money::from_units(settings.yearly_pass_price),
            currency: settings.currency.clone(),
            effective_date: Utc::now().date_naive(),
        })
    }
}

#[async_trait]
impl FareLookup for ConfiguredFares {
    async fn current_fares(&self) -> Result<FareSchedule> {
        Ok(self.schedule.clone())
    }

    fn describe(&self) -> String {
        "settings file".into()
    }
}

/// Fetches a small JSON fare document:
/// `{"singleRidePrice": 2.4, "yearlyPassPrice": 365, "currency": "EUR"}`.
pub struct HttpFareLookup {
    client: reqwest::Client,
    url: String,
    default_currency: String,
}

impl HttpFareLookup {
    pub fn new(url: impl Into<String>, default_currency: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .context("Failed to build fare HTTP client")?;
        Ok(Self {
            client,
            url: url.into(),
            default_currency: default_currency.into(),
        })
    }
}

#[async_trait]
impl FareLookup for HttpFareLookup {
    async fn current_fares(&self) -> Result<FareSchedule> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .with_context(|| format!("Failed to fetch fares from {}", self.url))?;
        if !response.status().is_success() {
            bail!("fare source {} answered HTTP {}", self.url, response.status());
        }
        let body = response
            .text()
            .await
            .with_context(|| format!("Failed to read fares from {}", self.url))?;
        parse_fare_document(&body, &self.default_currency)
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FareDocument {
    single_ride_price: f64,
    yearly_pass_price: f64,
    currency: Option<String>,
    effective_date: Option<NaiveDate>,
}

pub fn parse_fare_document(body: &str, default_currency: &str) -> Result<FareSchedule> {
    let doc: FareDocument =
        serde_json::from_str(body).context("fare document is not valid JSON")?;
    for (name, value) in [
        ("singleRidePrice", doc.single_ride_price),
        ("yearlyPassPrice", doc.yearly_pass_price),
    ] {
        if !value.is_finite() || value < 0.0 {
            bail!("fare document has an invalid {name}: {value}");
        }
    }
    Ok(FareSchedule {
        single_ride_price: Money::from_units(doc.single_ride_price),
        yearly_pass_price: Money::from_units(doc.yearly_pass_price),
        currency: doc.currency.unwrap_or_else(|| default_currency.to_string()),
        effective_date: doc
            .effective_date
            .unwrap_or_else(|| Utc::now().date_naive()),
    })
}

pub fn lookup_from_settings(settings: &FareSettings) -> Result<Box<dyn FareLookup>> {
    Ok(match &settings.source {
        FareSource::Configured => Box::new(ConfiguredFares::from_settings(settings)),
        FareSource::Http { url } => Box::new(HttpFareLookup::new(url, &settings.currency)?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fare_document_is_parsed_into_cents() {
        let schedule = parse_fare_document(
            r#"{"singleRidePrice": 2.4, "yearlyPassPrice": 365, "effectiveDate": "2023-01-01"}"#,
            "EUR",
        )
        .unwrap();
        assert_eq!(schedule.single_ride_price, Money(240));
        assert_eq!(schedule.yearly_pass_price, Money(36_500));
        assert_eq!(schedule.currency, "EUR");
        assert_eq!(
            schedule.effective_date,
            NaiveDate::from_ymd_opt(2023, 1, 1).unwrap()
        );
    }

    #[test]
    fn broken_fare_documents_are_errors() {
        assert!(parse_fare_document("<html>", "EUR").is_err());
        assert!(parse_fare_document(r#"{"singleRidePrice": 2.4}"#, "EUR").is_err());
        assert!(
            parse_fare_document(r#"{"singleRidePrice": -1, "yearlyPassPrice": 365}"#, "EUR")
                .is_err()
        );
    }

    #[tokio::test]
    async fn configured_fares_come_from_settings() {
        let lookup = lookup_from_settings(&FareSettings::default()).unwrap();
        let schedule = lookup.current_fares().await.unwrap();
        assert_eq!(schedule.single_ride_price, Money(240));
        assert_eq!(schedule.yearly_pass_price, Money(36_500));
        assert_eq!(lookup.describe(), "settings file");
    }
}
