use std::time::Duration;

use async_trait::async_trait;
use log::warn;
use rand::Rng;

use crate::models::Coordinate;

use super::{GeocodeError, GeocodeResolver, ResolvedCity};

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub attempt_timeout: Duration,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            attempt_timeout: Duration::from_secs(10),
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(8),
        }
    }
}

impl RetryPolicy {
    /// Upper bound of the pause after failed attempt `attempt` (1-based):
    /// doubles each time, capped at `max_backoff`.
    pub fn backoff_ceiling(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.initial_backoff
            .saturating_mul(1u32 << exponent)
            .min(self.max_backoff)
    }

    /// Pause with jitter, somewhere in the upper half of the ceiling.
    fn backoff(&self, attempt: u32) -> Duration {
        let ceiling = self.backoff_ceiling(attempt);
        let half = ceiling / 2;
        let jitter_ms = ceiling.saturating_sub(half).as_millis() as u64;
        half + Duration::from_millis(rand::thread_rng().gen_range(0..=jitter_ms))
    }
}

/// Retries transient failures of the wrapped resolver.
///
/// Every attempt is bounded by `attempt_timeout`. Non-transient errors are
/// returned immediately; running out of attempts yields
/// [`GeocodeError::Unavailable`].
pub struct RetryingResolver<R> {
    inner: R,
    policy: RetryPolicy,
}

impl<R> RetryingResolver<R> {
    pub fn new(inner: R, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl<R: GeocodeResolver> GeocodeResolver for RetryingResolver<R> {
    async fn resolve_city(&self, coord: Coordinate) -> Result<ResolvedCity, GeocodeError> {
        let attempts = self.policy.max_attempts.max(1);
        let mut last = String::new();

        for attempt in 1..=attempts {
            let outcome =
                tokio::time::timeout(self.policy.attempt_timeout, self.inner.resolve_city(coord))
                    .await;
            let error = match outcome {
                Ok(Ok(city)) => return Ok(city),
                Ok(Err(err)) if !err.is_transient() => return Err(err),
                Ok(Err(err)) => err.to_string(),
                Err(_) => format!("timed out after {:?}", self.policy.attempt_timeout),
            };

            warn!("Geocoding {coord} failed (attempt {attempt}/{attempts}): {error}");
            last = error;
            if attempt < attempts {
                tokio::time::sleep(self.policy.backoff(attempt)).await;
            }
        }

        Err(GeocodeError::Unavailable { attempts, last })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Fails transiently `failures` times, then answers.
    struct Flaky {
        failures: u32,
        calls: AtomicU32,
    }

    #[async_trait]
    impl GeocodeResolver for Flaky {
        async fn resolve_city(&self, _coord: Coordinate) -> Result<ResolvedCity, GeocodeError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call <= self.failures {
                Err(GeocodeError::Transient("connection reset".into()))
            } else {
                Ok(ResolvedCity::new("Vienna", "Austria"))
            }
        }
    }

    struct Broken;

    #[async_trait]
    impl GeocodeResolver for Broken {
        async fn resolve_city(&self, _coord: Coordinate) -> Result<ResolvedCity, GeocodeError> {
            Err(GeocodeError::Malformed("status REQUEST_DENIED".into()))
        }
    }

    struct Hanging;

    #[async_trait]
    impl GeocodeResolver for Hanging {
        async fn resolve_city(&self, _coord: Coordinate) -> Result<ResolvedCity, GeocodeError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(ResolvedCity::unidentified())
        }
    }

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            attempt_timeout: Duration::from_millis(50),
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(4),
        }
    }

    fn vienna() -> Coordinate {
        Coordinate::new(48.2082, 16.3738)
    }

    #[test]
    fn backoff_doubles_up_to_cap() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff_ceiling(1), Duration::from_millis(500));
        assert_eq!(policy.backoff_ceiling(2), Duration::from_millis(1_000));
        assert_eq!(policy.backoff_ceiling(5), Duration::from_secs(8));
        assert_eq!(policy.backoff_ceiling(40), Duration::from_secs(8));
        for attempt in 1..6 {
            let pause = policy.backoff(attempt);
            assert!(pause <= policy.backoff_ceiling(attempt));
            assert!(pause >= policy.backoff_ceiling(attempt) / 2);
        }
    }

    #[tokio::test]
    async fn transient_failures_are_retried() {
        let resolver = RetryingResolver::new(
            Flaky {
                failures: 2,
                calls: AtomicU32::new(0),
            },
            fast_policy(4),
        );
        let city = resolver.resolve_city(vienna()).await.unwrap();
        assert_eq!(city.name, "Vienna");
        assert_eq!(resolver.inner.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhausted_attempts_report_unavailable() {
        let resolver = RetryingResolver::new(
            Flaky {
                failures: 10,
                calls: AtomicU32::new(0),
            },
            fast_policy(3),
        );
        let err = resolver.resolve_city(vienna()).await.unwrap_err();
        assert!(matches!(err, GeocodeError::Unavailable { attempts: 3, .. }));
        assert_eq!(resolver.inner.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn non_transient_errors_are_not_retried() {
        let resolver = RetryingResolver::new(Broken, fast_policy(5));
        assert!(matches!(
            resolver.resolve_city(vienna()).await,
            Err(GeocodeError::Malformed(_))
        ));
    }

    #[tokio::test]
    async fn slow_attempts_time_out() {
        let resolver = RetryingResolver::new(Hanging, fast_policy(2));
        let err = resolver.resolve_city(vienna()).await.unwrap_err();
        assert!(matches!(err, GeocodeError::Unavailable { attempts: 2, .. }));
    }
}
