//! TTL-bounded memoization of quote results.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use ethers::types::U256;
use lru::LruCache;

use crate::types::QuoteRequest;

const DEFAULT_CAPACITY: usize = 1000;

/// Cached quote payload plus its insertion instant. Staleness is enforced
/// purely on read; nothing sweeps the map in the background.
#[derive(Clone, Debug)]
pub struct CachedQuote {
    pub amount_out: U256,
    pub gas_estimate: Option<u64>,
    pub observed_at_epoch_ms: i64,
}

/// Snapshot of cache hit/miss counters.
pub struct CacheMetrics {
    pub hits: usize,
    pub misses: usize,
}

/// Quote cache keyed on the exact request identity (token_in, token_out,
/// amount_in, fee tier). Process-local, rebuilt empty on restart.
pub struct QuoteCache {
    quotes: LruCache<QuoteRequest, (CachedQuote, Instant)>,
    pub ttl: Duration,
    hits: AtomicUsize,
    misses: AtomicUsize,
}

impl QuoteCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            quotes: LruCache::new(NonZeroUsize::new(DEFAULT_CAPACITY).unwrap()),
            ttl,
            hits: AtomicUsize::new(0),
            misses: AtomicUsize::new(0),
        }
    }

    /// Get a cached quote if present and younger than the TTL. An entry at
    /// or past the TTL is treated as absent and evicted on the way out.
    pub fn get(&mut self, key: &QuoteRequest) -> Option<CachedQuote> {
        // Check expiry with a short-lived peek borrow so the expired entry
        // can be removed afterwards.
        let is_expired = match self.quotes.peek(key) {
            Some((_, inserted)) => inserted.elapsed() >= self.ttl,
            None => false,
        };

        if is_expired {
            self.quotes.pop(key);
            self.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        }

        if let Some((quote, _)) = self.quotes.get(key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            Some(quote.clone())
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            None
        }
    }

    /// Insert or replace a cached quote. The entry is replaced atomically
    /// as a whole record.
    pub fn put(&mut self, key: QuoteRequest, value: CachedQuote) {
        self.quotes.put(key, (value, Instant::now()));
    }

    /// Empty the whole cache. Diagnostics/testing only, not part of
    /// steady-state operation.
    pub fn clear(&mut self) {
        self.quotes.clear();
    }

    pub fn len(&self) -> usize {
        self.quotes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quotes.is_empty()
    }

    pub fn metrics(&self) -> CacheMetrics {
        CacheMetrics {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::epoch_ms_now;
    use ethers::types::Address;
    use std::thread::sleep;

    fn key(amount: u64) -> QuoteRequest {
        QuoteRequest {
            token_in: Address::from_low_u64_be(1),
            token_out: Address::from_low_u64_be(2),
            amount_in: U256::from(amount),
            fee_bps: 3000,
        }
    }

    fn quote(amount_out: u64) -> CachedQuote {
        CachedQuote {
            amount_out: U256::from(amount_out),
            gas_estimate: Some(90_000),
            observed_at_epoch_ms: epoch_ms_now(),
        }
    }

    #[test]
    fn fresh_entry_hits_stale_entry_misses() {
        let mut cache = QuoteCache::new(Duration::from_millis(50));
        cache.put(key(1000), quote(2000));

        let hit = cache.get(&key(1000)).expect("fresh entry should hit");
        assert_eq!(hit.amount_out, U256::from(2000u64));

        sleep(Duration::from_millis(60));
        // Entry is physically present but past TTL: must read as absent.
        assert_eq!(cache.len(), 1);
        assert!(cache.get(&key(1000)).is_none());
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn identity_is_the_full_four_tuple() {
        let mut cache = QuoteCache::new(Duration::from_secs(30));
        cache.put(key(1000), quote(2000));
        assert!(cache.get(&key(1001)).is_none());

        let mut other_fee = key(1000);
        other_fee.fee_bps = 500;
        assert!(cache.get(&other_fee).is_none());
        assert!(cache.get(&key(1000)).is_some());
    }

    #[test]
    fn clear_and_metrics() {
        let mut cache = QuoteCache::new(Duration::from_secs(30));
        cache.put(key(1), quote(1));
        assert!(cache.get(&key(1)).is_some());
        assert!(cache.get(&key(2)).is_none());

        cache.clear();
        assert!(cache.is_empty());

        let metrics = cache.metrics();
        assert_eq!(metrics.hits, 1);
        assert_eq!(metrics.misses, 1);
    }
}
