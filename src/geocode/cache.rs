use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::models::Coordinate;

use super::{GeocodeError, GeocodeResolver, ResolvedCity};

/// Remembers successful lookups for the lifetime of the resolver.
///
/// Keys are the E7-rounded coordinate, which is the precision of the input
/// data anyway. Failures are never cached.
pub struct CachedResolver<R> {
    inner: R,
    entries: Mutex<HashMap<(i64, i64), ResolvedCity>>,
}

impl<R> CachedResolver<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<(i64, i64), ResolvedCity>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl<R: GeocodeResolver> GeocodeResolver for CachedResolver<R> {
    async fn resolve_city(&self, coord: Coordinate) -> Result<ResolvedCity, GeocodeError> {
        let key = coord.e7_key();
        let cached = self.lock().get(&key).cloned();
        if let Some(hit) = cached {
            return Ok(hit);
        }
        let city = self.inner.resolve_city(coord).await?;
        self.lock().insert(key, city.clone());
        Ok(city)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counting {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl GeocodeResolver for Counting {
        async fn resolve_city(&self, coord: Coordinate) -> Result<ResolvedCity, GeocodeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if coord.lat < 0.0 {
                return Err(GeocodeError::Transient("southern hemisphere is down".into()));
            }
            Ok(ResolvedCity::new("Vienna", "Austria"))
        }
    }

    #[tokio::test]
    async fn repeated_points_hit_the_cache() {
        let resolver = CachedResolver::new(Counting::default());
        let point = Coordinate::new(48.2082, 16.3738);
        resolver.resolve_city(point).await.unwrap();
        resolver.resolve_city(point).await.unwrap();
        resolver
            .resolve_city(Coordinate::new(48.1987, 16.37))
            .await
            .unwrap();

        assert_eq!(resolver.inner.calls.load(Ordering::SeqCst), 2);
        assert_eq!(resolver.len(), 2);
    }

    #[tokio::test]
    async fn failures_are_not_cached() {
        let resolver = CachedResolver::new(Counting::default());
        let point = Coordinate::new(-33.86, 151.2);
        assert!(resolver.resolve_city(point).await.is_err());
        assert!(resolver.resolve_city(point).await.is_err());
        assert_eq!(resolver.inner.calls.load(Ordering::SeqCst), 2);
        assert!(resolver.is_empty());
    }
}
