//! Coordinate → city resolution.
//!
//! The ingestor only sees [`GeocodeResolver`]. The production stack is
//! `CachedResolver<RetryingResolver<HttpGeocoder>>`: a lookup is answered
//! from memory when the same point was resolved earlier in the run, and
//! otherwise retried with backoff until the policy gives up.

mod cache;
mod http;
mod retry;

pub use cache::CachedResolver;
pub use http::{parse_geocode_response, HttpGeocoder};
pub use retry::{RetryPolicy, RetryingResolver};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::Coordinate;

/// Placeholder for a city or country the service could not name.
pub const UNIDENTIFIED: &str = "Unidentified";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedCity {
    pub name: String,
    pub country: String,
}

impl ResolvedCity {
    pub fn new(name: impl Into<String>, country: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            country: country.into(),
        }
    }

    pub fn unidentified() -> Self {
        Self::new(UNIDENTIFIED, UNIDENTIFIED)
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeocodeError {
    /// Worth another attempt: network trouble, timeouts, rate limiting.
    #[error("geocoder temporarily failed: {0}")]
    Transient(String),
    #[error("geocoder unavailable after {attempts} attempt(s): {last}")]
    Unavailable { attempts: u32, last: String },
    /// The service answered, but not with anything usable.
    #[error("unusable geocoder response: {0}")]
    Malformed(String),
}

impl GeocodeError {
    pub fn is_transient(&self) -> bool {
        matches!(self, GeocodeError::Transient(_))
    }
}

#[async_trait]
pub trait GeocodeResolver: Send + Sync {
    async fn resolve_city(&self, coord: Coordinate) -> Result<ResolvedCity, GeocodeError>;
}

#[async_trait]
impl<R: GeocodeResolver + ?Sized> GeocodeResolver for std::sync::Arc<R> {
    async fn resolve_city(&self, coord: Coordinate) -> Result<ResolvedCity, GeocodeError> {
        (**self).resolve_city(coord).await
    }
}
