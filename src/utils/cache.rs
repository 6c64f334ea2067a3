//! Stale-While-Revalidate Snapshot Cache
//!
//! Sits in front of the provider mux, keyed by normalized token address.
//! Uses DashMap for per-shard locking without a global lock.
//!
//! Read policy, with `fresh_ttl < stale_ttl`:
//! - age <= fresh_ttl: serve stored copy, no background work
//! - fresh_ttl < age <= stale_ttl: serve stored copy, refresh in background
//! - age > stale_ttl or no entry: block on a fetch
//!
//! At most one mux call per address is in flight at any time. The
//! in-flight registry maps address -> shared future; later callers await
//! the same future instead of issuing another upstream request.
//! Entries are never evicted by size, only cleared explicitly.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures_util::future::{self, BoxFuture, FutureExt, Shared};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::core::mux::ProviderMux;
use crate::models::config::PulseConfig;
use crate::models::errors::{SnapshotError, SnapshotResult};
use crate::models::types::{Provenance, Snapshot, SnapshotResponse, Stage};
use crate::utils::address::normalize_address;

type InFlight = Shared<BoxFuture<'static, SnapshotResult<SnapshotResponse>>>;

/// Stored observation for one address
#[derive(Clone, Debug)]
pub struct CacheEntry {
    pub snapshot: Snapshot,
    pub provenance: Provenance,
    /// When the entry was stored (monotonic, drives TTL classification)
    pub stored_at: Instant,
}

impl CacheEntry {
    pub fn new(snapshot: Snapshot, provenance: Provenance) -> Self {
        Self {
            snapshot,
            provenance,
            stored_at: Instant::now(),
        }
    }

    pub fn age(&self) -> Duration {
        self.stored_at.elapsed()
    }
}

/// Age classification of a stored entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    Fresh,
    Stale,
    Expired,
}

/// Counters shared between clones of the cache
#[derive(Default)]
struct Counters {
    fresh_hits: AtomicU64,
    stale_hits: AtomicU64,
    misses: AtomicU64,
    refreshes_started: AtomicU64,
    refresh_failures: AtomicU64,
}

/// Removes an address from the in-flight registry when dropped, so a
/// fetch task that panics does not pin the address forever
struct Registration {
    in_flight: Arc<DashMap<String, InFlight>>,
    key: String,
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.in_flight.remove(&self.key);
    }
}

/// Snapshot cache with single-flight fetches
#[derive(Clone)]
pub struct SnapshotCache {
    store: Arc<DashMap<String, CacheEntry>>,
    in_flight: Arc<DashMap<String, InFlight>>,
    mux: Arc<ProviderMux>,
    fresh_ttl: Duration,
    stale_ttl: Duration,
    counters: Arc<Counters>,
}

impl SnapshotCache {
    pub fn new(mux: Arc<ProviderMux>, fresh_ttl: Duration, stale_ttl: Duration) -> Self {
        Self {
            store: Arc::new(DashMap::new()),
            in_flight: Arc::new(DashMap::new()),
            mux,
            fresh_ttl,
            stale_ttl,
            counters: Arc::new(Counters::default()),
        }
    }

    /// Cache with TTLs from config
    pub fn from_config(mux: Arc<ProviderMux>, config: &PulseConfig) -> Self {
        Self::new(mux, config.fresh_ttl, config.stale_ttl)
    }

    fn classify(&self, age: Duration) -> Freshness {
        if age <= self.fresh_ttl {
            Freshness::Fresh
        } else if age <= self.stale_ttl {
            Freshness::Stale
        } else {
            Freshness::Expired
        }
    }

    /// Get a snapshot for `address`, serving from cache when allowed
    pub async fn get(&self, address: &str) -> SnapshotResult<SnapshotResponse> {
        let key = normalize_address(address);

        // Copy out under the shard read lock, then release it before awaiting
        let stored = self.store.get(&key).map(|entry| entry.value().clone());

        let prior = match stored {
            Some(entry) => {
                let age = entry.age();
                match self.classify(age) {
                    Freshness::Fresh => {
                        self.counters.fresh_hits.fetch_add(1, Ordering::Relaxed);
                        debug!("✅ CACHE HIT: {} (age {}ms)", key, age.as_millis());
                        return Ok(Self::served_from_cache(entry, age));
                    }
                    Freshness::Stale => {
                        self.counters.stale_hits.fetch_add(1, Ordering::Relaxed);
                        info!("♻️ CACHE STALE: {} (age {}s), serving and revalidating", key, age.as_secs());
                        self.revalidate(&key, entry.snapshot.clone());
                        return Ok(Self::served_from_cache(entry, age));
                    }
                    Freshness::Expired => {
                        debug!("📭 CACHE EXPIRED: {} (age {}s)", key, age.as_secs());
                        Some(entry.snapshot)
                    }
                }
            }
            None => {
                debug!("📭 CACHE MISS: {}", key);
                None
            }
        };

        self.join_or_start(&key, prior, true).await
    }

    fn served_from_cache(entry: CacheEntry, age: Duration) -> SnapshotResponse {
        let mut provenance = entry.provenance;
        provenance.stage = Stage::Cache;
        provenance.age_ms = Some(age.as_millis() as u64);
        provenance.attempts.clear();
        SnapshotResponse {
            snapshot: entry.snapshot,
            provenance,
            analysis: None,
        }
    }

    /// Start a detached refresh unless one is already running for `key`
    fn revalidate(&self, key: &str, prior: Snapshot) {
        if self.in_flight.contains_key(key) {
            debug!("🔁 Revalidation already in flight: {}", key);
            return;
        }
        self.counters.refreshes_started.fetch_add(1, Ordering::Relaxed);
        // The spawned task drives the fetch; the handle is not awaited here
        drop(self.join_or_start(key, Some(prior), false));
    }

    /// Return the in-flight fetch for `key`, starting one if none exists.
    ///
    /// The fetch runs on its own task, so it completes even if every waiter
    /// goes away. It writes the entry before leaving the registry, and
    /// leaves the registry even if the fetch panics.
    ///
    /// `reader` marks a caller-facing read, which is counted as a hit or
    /// a miss; background refreshes are not.
    fn join_or_start(&self, key: &str, prior: Option<Snapshot>, reader: bool) -> InFlight {
        match self.in_flight.entry(key.to_string()) {
            Entry::Occupied(existing) => {
                if reader {
                    self.counters.misses.fetch_add(1, Ordering::Relaxed);
                }
                debug!("⏳ Joining in-flight fetch: {}", key);
                existing.get().clone()
            }
            Entry::Vacant(slot) => {
                // A fetch may have completed between our store read and now
                if let Some(entry) = self.store.get(key).map(|e| e.value().clone()) {
                    let age = entry.age();
                    if self.classify(age) == Freshness::Fresh {
                        if reader {
                            self.counters.fresh_hits.fetch_add(1, Ordering::Relaxed);
                        }
                        debug!("✅ Fetch completed meanwhile: {}", key);
                        let response = Self::served_from_cache(entry, age);
                        return future::ready(Ok(response)).boxed().shared();
                    }
                }
                if reader {
                    self.counters.misses.fetch_add(1, Ordering::Relaxed);
                }

                let mux = self.mux.clone();
                let store = self.store.clone();
                let in_flight = self.in_flight.clone();
                let counters = self.counters.clone();
                let key_owned = key.to_string();
                let is_refresh = prior.is_some();

                let handle = tokio::spawn(async move {
                    let _registration = Registration {
                        in_flight,
                        key: key_owned.clone(),
                    };
                    let result = mux.fetch(&key_owned, prior.as_ref()).await;
                    match &result {
                        Ok(response) if response.provenance.stage.is_live() => {
                            store.insert(
                                key_owned.clone(),
                                CacheEntry::new(response.snapshot.clone(), response.provenance.clone()),
                            );
                            info!(
                                "💾 CACHE SET: {} from {}",
                                key_owned, response.provenance.provider
                            );
                        }
                        Ok(_) => {
                            counters.refresh_failures.fetch_add(1, Ordering::Relaxed);
                            debug!("Heuristic result not cached: {}", key_owned);
                        }
                        Err(e) => {
                            if is_refresh {
                                counters.refresh_failures.fetch_add(1, Ordering::Relaxed);
                            }
                            warn!("⚠️ Fetch failed for {}: {}", key_owned, e);
                        }
                    }
                    result
                });

                let shared = async move {
                    handle
                        .await
                        .unwrap_or_else(|e| Err(SnapshotError::Internal(format!("Fetch task failed: {}", e))))
                }
                .boxed()
                .shared();

                slot.insert(shared.clone());
                shared
            }
        }
    }

    /// Remove one entry, or all entries when `address` is None.
    ///
    /// In-flight fetches are untouched and may recreate the entry.
    pub fn clear(&self, address: Option<&str>) {
        match address {
            Some(address) => {
                let key = normalize_address(address);
                self.store.remove(&key);
                info!("🗑️ CACHE INVALIDATE: {}", key);
            }
            None => {
                self.store.clear();
                info!("🗑️ CACHE CLEARED");
            }
        }
    }

    /// Copy of the stored entry, without fetching
    pub fn peek(&self, address: &str) -> Option<CacheEntry> {
        self.store
            .get(&normalize_address(address))
            .map(|entry| entry.value().clone())
    }

    /// Whether a fetch for `address` is currently running
    pub fn is_in_flight(&self, address: &str) -> bool {
        self.in_flight.contains_key(&normalize_address(address))
    }

    pub fn mux(&self) -> &Arc<ProviderMux> {
        &self.mux
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        let fresh_hits = self.counters.fresh_hits.load(Ordering::Relaxed);
        let stale_hits = self.counters.stale_hits.load(Ordering::Relaxed);
        let misses = self.counters.misses.load(Ordering::Relaxed);
        let total = fresh_hits + stale_hits + misses;
        let hit_rate = if total > 0 {
            ((fresh_hits + stale_hits) as f64 / total as f64) * 100.0
        } else {
            0.0
        };

        CacheStats {
            entries: self.store.len(),
            in_flight: self.in_flight.len(),
            fresh_hits,
            stale_hits,
            misses,
            refreshes_started: self.counters.refreshes_started.load(Ordering::Relaxed),
            refresh_failures: self.counters.refresh_failures.load(Ordering::Relaxed),
            hit_rate,
            fresh_ttl_secs: self.fresh_ttl.as_secs(),
            stale_ttl_secs: self.stale_ttl.as_secs(),
        }
    }
}

/// Cache statistics for monitoring
#[derive(Debug, Clone, serde::Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub in_flight: usize,
    pub fresh_hits: u64,
    pub stale_hits: u64,
    pub misses: u64,
    pub refreshes_started: u64,
    pub refresh_failures: u64,
    pub hit_rate: f64,
    pub fresh_ttl_secs: u64,
    pub stale_ttl_secs: u64,
}
