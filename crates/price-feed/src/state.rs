//! Token price cache
//!
//! Uses DashMap for concurrent reads/writes with minimal contention. Entries are
//! never evicted proactively; stale entries are refetched on the next lookup.

use dashmap::DashMap;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Timestamped price entry
#[derive(Debug, Clone, PartialEq)]
pub struct PriceEntry {
    pub symbol: String,
    pub price: f64,
    pub fetched_at: Instant,
}

impl PriceEntry {
    pub fn age(&self) -> Duration {
        self.fetched_at.elapsed()
    }

    pub fn is_stale(&self, max_age: Duration) -> bool {
        self.age() >= max_age
    }
}

/// Per-symbol price cache keyed by lower-case symbol
#[derive(Debug)]
pub struct PriceCache {
    prices: DashMap<String, PriceEntry>,
    hits: AtomicU64,
    misses: AtomicU64,
    last_update: RwLock<Option<Instant>>,
}

impl PriceCache {
    pub fn new() -> Self {
        Self {
            prices: DashMap::new(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            last_update: RwLock::new(None),
        }
    }

    /// Cached price younger than `ttl`
    pub fn get_fresh(&self, symbol: &str, ttl: Duration) -> Option<f64> {
        let fresh = self
            .prices
            .get(&symbol.to_lowercase())
            .filter(|entry| !entry.is_stale(ttl))
            .map(|entry| entry.price);

        match fresh {
            Some(_) => self.hits.fetch_add(1, Ordering::Relaxed),
            None => self.misses.fetch_add(1, Ordering::Relaxed),
        };
        fresh
    }

    /// Cached price regardless of age
    pub fn get_any(&self, symbol: &str) -> Option<PriceEntry> {
        self.prices.get(&symbol.to_lowercase()).map(|r| r.value().clone())
    }

    pub fn insert(&self, symbol: &str, price: f64) {
        let symbol = symbol.to_lowercase();
        let entry = PriceEntry {
            symbol: symbol.clone(),
            price,
            fetched_at: Instant::now(),
        };
        self.prices.insert(symbol, entry);
        *self.last_update.write() = Some(Instant::now());
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    pub fn stats(&self) -> PriceCacheStats {
        PriceCacheStats {
            entries: self.prices.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            last_update_age: self.last_update.read().map(|t| t.elapsed()),
        }
    }
}

impl Default for PriceCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Statistics about the price cache
#[derive(Debug, Clone)]
pub struct PriceCacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub last_update_age: Option<Duration>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbols_are_case_insensitive() {
        let cache = PriceCache::new();
        cache.insert("AVAX", 40.0);

        assert_eq!(cache.get_fresh("avax", Duration::from_secs(30)), Some(40.0));
        assert_eq!(cache.get_any("Avax").map(|e| e.price), Some(40.0));
    }

    #[test]
    fn test_zero_ttl_is_always_stale() {
        let cache = PriceCache::new();
        cache.insert("avax", 40.0);

        assert_eq!(cache.get_fresh("avax", Duration::ZERO), None);
        assert!(cache.get_any("avax").is_some(), "stale entries are kept");

        let stats = cache.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entries, 1);
    }

    #[test]
    fn test_concurrent_inserts() {
        use std::sync::Arc;
        use std::thread;

        let cache = Arc::new(PriceCache::new());
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || {
                    for j in 0..100 {
                        cache.insert(&format!("tok{}", j % 10), (i * 100 + j) as f64);
                    }
                })
            })
            .collect();

        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(cache.len(), 10);
    }
}
