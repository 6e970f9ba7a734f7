// ============================================================================
// SessionCache : mémoïsation par session
// ============================================================================
// Clé = (nom de l'opération, paramètres) → valeur + date de mise en cache
//
// - Au plus un appel réussi du producteur par clé et par session
// - Un producteur en échec n'est pas mémorisé (l'utilisateur réessaie)
// - Pas d'expiration : clear() = fin de session
//
// CONCEPT RUST : Arc<V>
// - La valeur est partagée entre le cache et l'appelant sans copie
// - Les PriceSeries et listes de news sont immuables une fois en cache
// ============================================================================

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::error::Result;

/// Clé de cache : opération + paramètres normalisés
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub operation: &'static str,
    pub params: Vec<String>,
}

impl CacheKey {
    /// CONCEPT RUST : IntoIterator générique
    /// - Accepte un tableau, un Vec, un itérateur...
    /// - Chaque élément est converti via ToString
    pub fn new<I, P>(operation: &'static str, params: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: ToString,
    {
        Self {
            operation,
            params: params.into_iter().map(|p| p.to_string()).collect(),
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.operation, self.params.join(", "))
    }
}

#[derive(Debug)]
struct CacheEntry<V> {
    value: Arc<V>,
    cached_at: DateTime<Utc>,
}

/// Cache d'une session pour un type de valeur
#[derive(Debug)]
pub struct SessionCache<V> {
    entries: HashMap<CacheKey, CacheEntry<V>>,
    hits: u64,
    misses: u64,
}

impl<V> Default for SessionCache<V> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            hits: 0,
            misses: 0,
        }
    }
}

impl<V> SessionCache<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Retourne la valeur en cache ou l'obtient via `producer`
    ///
    /// CONCEPT RUST : FnOnce() -> Future
    /// - Le producteur n'est appelé qu'en cas de miss
    /// - Sur erreur, rien n'est inséré : l'erreur remonte telle quelle
    pub async fn get_or_compute<F, Fut>(&mut self, key: CacheKey, producer: F) -> Result<Arc<V>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>>,
    {
        if let Some(entry) = self.entries.get(&key) {
            self.hits += 1;
            debug!(key = %key, cached_at = %entry.cached_at, "Cache hit");
            return Ok(Arc::clone(&entry.value));
        }

        self.misses += 1;
        debug!(key = %key, "Cache miss");

        let value = Arc::new(producer().await?);
        self.entries.insert(
            key,
            CacheEntry {
                value: Arc::clone(&value),
                cached_at: Utc::now(),
            },
        );
        Ok(value)
    }

    pub fn get(&self, key: &CacheKey) -> Option<Arc<V>> {
        self.entries.get(key).map(|entry| Arc::clone(&entry.value))
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn cached_at(&self, key: &CacheKey) -> Option<DateTime<Utc>> {
        self.entries.get(key).map(|entry| entry.cached_at)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }

    /// Vide le cache (fin de session)
    pub fn clear(&mut self) {
        debug!(entries = self.entries.len(), "Clearing session cache");
        self.entries.clear();
        self.hits = 0;
        self.misses = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DashboardError;
    use std::cell::Cell;

    fn ok<T>(value: T) -> Result<T> {
        Ok(value)
    }

    #[tokio::test]
    async fn test_producer_called_once_per_key() {
        let mut cache: SessionCache<String> = SessionCache::new();
        let calls = Cell::new(0);
        let key = CacheKey::new("fetch_prices", ["AAPL", "1mo", "1d"]);

        for _ in 0..3 {
            let value = cache
                .get_or_compute(key.clone(), || async {
                    calls.set(calls.get() + 1);
                    ok("series".to_string())
                })
                .await
                .unwrap();
            assert_eq!(value.as_str(), "series");
        }

        assert_eq!(calls.get(), 1);
        assert_eq!(cache.hits(), 2);
        assert_eq!(cache.misses(), 1);
        assert!(cache.cached_at(&key).is_some());
    }

    #[tokio::test]
    async fn test_distinct_params_are_distinct_entries() {
        let mut cache: SessionCache<u32> = SessionCache::new();

        cache
            .get_or_compute(CacheKey::new("fetch_prices", ["AAPL", "1mo"]), || async { ok(1) })
            .await
            .unwrap();
        cache
            .get_or_compute(CacheKey::new("fetch_prices", ["AAPL", "1y"]), || async { ok(2) })
            .await
            .unwrap();
        cache
            .get_or_compute(CacheKey::new("fetch_news", ["AAPL", "1mo"]), || async { ok(3) })
            .await
            .unwrap();

        assert_eq!(cache.len(), 3);
    }

    #[tokio::test]
    async fn test_failure_not_memoized() {
        let mut cache: SessionCache<u32> = SessionCache::new();
        let key = CacheKey::new("fetch_news", ["AAPL"]);

        let failed = cache
            .get_or_compute(key.clone(), || async {
                Err::<u32, _>(DashboardError::provider("finnhub", "timeout"))
            })
            .await;
        assert!(failed.is_err());
        assert!(!cache.contains(&key));

        let value = cache.get_or_compute(key.clone(), || async { ok(7) }).await.unwrap();
        assert_eq!(*value, 7);
    }

    #[tokio::test]
    async fn test_clear() {
        let mut cache: SessionCache<u32> = SessionCache::new();
        let key = CacheKey::new("fetch_prices", ["MSFT"]);
        cache.get_or_compute(key.clone(), || async { ok(1) }).await.unwrap();

        cache.clear();
        assert!(cache.is_empty());
        assert!(cache.get(&key).is_none());
    }

    #[test]
    fn test_key_display() {
        let key = CacheKey::new("fetch_prices", ["AAPL", "1mo", "1d"]);
        assert_eq!(key.to_string(), "fetch_prices(AAPL, 1mo, 1d)");
    }
}
