use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;

use crate::models::Coordinate;
use crate::settings::GeocoderSettings;

use super::{GeocodeError, GeocodeResolver, ResolvedCity, UNIDENTIFIED};

/// Client for a Google-geocoding-compatible JSON endpoint.
pub struct HttpGeocoder {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpGeocoder {
    pub fn new(settings: &GeocoderSettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs.max(1)))
            .user_agent(concat!("jahreskarte/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build geocoder HTTP client")?;
        Ok(Self {
            client,
            base_url: settings.base_url.clone(),
            api_key: settings.api_key.clone(),
        })
    }
}

#[async_trait]
impl GeocodeResolver for HttpGeocoder {
    async fn resolve_city(&self, coord: Coordinate) -> Result<ResolvedCity, GeocodeError> {
        let address = coord.to_string();
        let response = self
            .client
            .get(&self.base_url)
            .query(&[("address", address.as_str()), ("key", self.api_key.as_str())])
            .send()
            .await
            .map_err(|err| GeocodeError::Transient(err.to_string()))?;

        let status = response.status();
        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            return Err(GeocodeError::Transient(format!("HTTP {status}")));
        }
        if !status.is_success() {
            return Err(GeocodeError::Malformed(format!("HTTP {status}")));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|err| GeocodeError::Transient(format!("reading body: {err}")))?;
        parse_geocode_response(&body)
    }
}

/// Extracts `(city, country)` from a geocoding response body.
///
/// Results are scanned in order until both parts are known. `locality`
/// names the city, `airport` stands in for places outside any city. A city
/// name without a single ASCII letter is not kept, so the English-facing
/// store does not fill up with names it cannot compare against.
pub fn parse_geocode_response(body: &Value) -> Result<ResolvedCity, GeocodeError> {
    let status = body
        .get("status")
        .and_then(Value::as_str)
        .ok_or_else(|| GeocodeError::Malformed("missing status".into()))?;

    match status {
        "OK" => {}
        "ZERO_RESULTS" => return Ok(ResolvedCity::unidentified()),
        "OVER_QUERY_LIMIT" | "UNKNOWN_ERROR" => {
            return Err(GeocodeError::Transient(status.to_string()))
        }
        other => return Err(GeocodeError::Malformed(format!("status {other}"))),
    }

    let results = body
        .get("results")
        .and_then(Value::as_array)
        .ok_or_else(|| GeocodeError::Malformed("missing results".into()))?;

    let mut city: Option<String> = None;
    let mut country: Option<String> = None;

    for result in results {
        if city.is_some() && country.is_some() {
            break;
        }
        let components = result
            .get("address_components")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();

        for component in components {
            let Some(name) = component.get("long_name").and_then(Value::as_str) else {
                continue;
            };
            let has_type = |wanted: &str| {
                component
                    .get("types")
                    .and_then(Value::as_array)
                    .is_some_and(|types| types.iter().any(|t| t.as_str() == Some(wanted)))
            };
            if has_type("locality") || has_type("airport") {
                city = Some(name.to_string());
            } else if has_type("country") {
                country = Some(name.to_string());
            }
        }

        if city
            .as_deref()
            .is_some_and(|name| !name.chars().any(|c| c.is_ascii_alphabetic()))
        {
            city = None;
        }
    }

    let name = match city.as_deref() {
        Some("Wien") => "Vienna".to_string(),
        Some(name) => name.to_string(),
        None => UNIDENTIFIED.to_string(),
    };
    Ok(ResolvedCity {
        name,
        country: country.unwrap_or_else(|| UNIDENTIFIED.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn component(name: &str, types: &[&str]) -> Value {
        json!({ "long_name": name, "short_name": name, "types": types })
    }

    #[test]
    fn locality_and_country_are_extracted() {
        let body = json!({
            "status": "OK",
            "results": [{
                "address_components": [
                    component("12", &["street_number"]),
                    component("Wien", &["locality", "political"]),
                    component("Austria", &["country", "political"]),
                ]
            }]
        });
        assert_eq!(
            parse_geocode_response(&body).unwrap(),
            ResolvedCity::new("Vienna", "Austria")
        );
    }

    #[test]
    fn airport_stands_in_for_city() {
        let body = json!({
            "status": "OK",
            "results": [{
                "address_components": [
                    component("Vienna International Airport", &["airport", "establishment"]),
                    component("Austria", &["country"]),
                ]
            }]
        });
        assert_eq!(
            parse_geocode_response(&body).unwrap().name,
            "Vienna International Airport"
        );
    }

    #[test]
    fn non_ascii_city_defers_to_later_results() {
        let body = json!({
            "status": "OK",
            "results": [
                { "address_components": [
                    component("ירושלים", &["locality"]),
                    component("Israel", &["country"]),
                ]},
                { "address_components": [component("Jerusalem", &["locality"])] }
            ]
        });
        assert_eq!(
            parse_geocode_response(&body).unwrap(),
            ResolvedCity::new("Jerusalem", "Israel")
        );
    }

    #[test]
    fn zero_results_is_unidentified() {
        let body = json!({ "status": "ZERO_RESULTS", "results": [] });
        assert_eq!(
            parse_geocode_response(&body).unwrap(),
            ResolvedCity::unidentified()
        );
    }

    #[test]
    fn missing_country_is_unidentified() {
        let body = json!({
            "status": "OK",
            "results": [{ "address_components": [component("Graz", &["locality"])] }]
        });
        assert_eq!(
            parse_geocode_response(&body).unwrap(),
            ResolvedCity::new("Graz", UNIDENTIFIED)
        );
    }

    #[test]
    fn status_codes_map_to_error_kinds() {
        let limited = json!({ "status": "OVER_QUERY_LIMIT", "results": [] });
        assert!(parse_geocode_response(&limited).unwrap_err().is_transient());

        let denied = json!({ "status": "REQUEST_DENIED", "results": [] });
        assert!(matches!(
            parse_geocode_response(&denied),
            Err(GeocodeError::Malformed(_))
        ));

        assert!(parse_geocode_response(&json!({})).is_err());
    }
}
