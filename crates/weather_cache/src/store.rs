//! The cache store: entries, per-city refresh schedules, and the
//! single-flight bookkeeping around upstream fetches.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use common::{Error, Result, WeatherReport, WeatherSource};

/// One cached report with bookkeeping.
#[derive(Debug, Clone)]
struct CacheEntry {
    report: WeatherReport,
    last_updated: DateTime<Utc>,
}

/// Snapshot row returned by [`WeatherCache::status`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CityStatus {
    pub city: String,
    pub last_updated: DateTime<Utc>,
    pub age_secs: i64,
}

/// A live background refresh schedule for one city.
struct RefreshHandle {
    /// Monotonic id; a tick only writes back while its generation is still
    /// the city's current schedule.
    generation: u64,
    task: JoinHandle<()>,
}

/// Shared internals behind the [`WeatherCache`] handle.
///
/// Lock order: `refreshers` is the outermost lock. Every entry-lifecycle
/// transition (commit, refresh write-back, remove, shutdown) serializes on
/// it before touching `entries` or `flights`; everything else takes a
/// single inner lock at a time.
struct CacheInner {
    source: Arc<dyn WeatherSource>,
    ttl: Duration,
    entries: RwLock<HashMap<String, CacheEntry>>,
    /// Per-city fetch locks: concurrent misses on one city share one fetch.
    flights: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    refreshers: Mutex<HashMap<String, RefreshHandle>>,
    next_generation: AtomicU64,
}

/// Self-refreshing, time-bound cache of weather reports keyed by city.
///
/// A report is served straight from memory while it is younger than the
/// freshness window. A cold or stale city triggers one synchronous fetch;
/// the first successful fetch also starts a background task that re-fetches
/// the city every window so steady-state requests never wait on upstream.
/// When a fetch fails the previous report is served unchanged; an error
/// surfaces only when there is nothing cached at all.
///
/// Cheaply cloneable handle; dropping the last handle winds down the
/// background tasks, but [`WeatherCache::shutdown`] does so deterministically.
#[derive(Clone)]
pub struct WeatherCache {
    inner: Arc<CacheInner>,
}

impl WeatherCache {
    pub fn new(source: Arc<dyn WeatherSource>, ttl: Duration) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                source,
                ttl,
                entries: RwLock::new(HashMap::new()),
                flights: Mutex::new(HashMap::new()),
                refreshers: Mutex::new(HashMap::new()),
                next_generation: AtomicU64::new(0),
            }),
        }
    }

    /// Get the report for a city, fetching from upstream if the cached one
    /// is missing or older than the freshness window.
    ///
    /// City names are matched case-insensitively: "London" and "LONDON"
    /// share one entry and one refresh schedule.
    pub async fn get(&self, city: &str) -> Result<WeatherReport> {
        let key = normalize_key(city);

        // Fast path: fresh entry, no upstream involved.
        if let Some(report) = self.inner.fresh_report(&key).await {
            debug!("Cache hit for {}", key);
            return Ok(report);
        }

        // Cold or stale. Take this city's fetch lock so concurrent misses
        // collapse into a single upstream call.
        let flight = self.inner.flight_lock(&key).await;
        let _guard = flight.lock().await;

        // Another caller may have completed the fetch while we waited.
        if let Some(report) = self.inner.fresh_report(&key).await {
            debug!("Cache hit for {} (filled while waiting)", key);
            return Ok(report);
        }

        debug!("Fetching weather data for {}", key);
        match self.inner.source.fetch(&key).await {
            Ok(report) => {
                self.inner.commit_fetch(&key, &flight, &report).await;
                Ok(report)
            }
            Err(e) => {
                // Keep serving the previous report if there is one; the
                // background schedule keeps retrying.
                if let Some(report) = self.inner.stale_report(&key).await {
                    warn!("Fetch failed for {}, serving stale data: {}", key, e);
                    return Ok(report);
                }
                warn!("Fetch failed for {} with nothing cached: {}", key, e);
                Err(Error::UpstreamUnavailable { city: key })
            }
        }
    }

    /// Stop tracking a city: cancel its refresh schedule and drop its entry.
    ///
    /// Idempotent. A fetch already in flight for the city completes for its
    /// caller but does not re-create the entry.
    pub async fn remove(&self, city: &str) {
        let key = normalize_key(city);

        let mut refreshers = self.inner.refreshers.lock().await;
        let had_schedule = match refreshers.remove(&key) {
            Some(handle) => {
                handle.task.abort();
                true
            }
            None => false,
        };
        let had_entry = self.inner.entries.write().await.remove(&key).is_some();
        self.inner.flights.lock().await.remove(&key);
        drop(refreshers);

        if had_schedule || had_entry {
            info!("Stopped tracking weather for {}", key);
        }
    }

    /// Snapshot of every cached city (by normalized key), sorted by name.
    /// Never triggers a fetch and reports entries regardless of staleness.
    pub async fn status(&self) -> Vec<CityStatus> {
        let entries = self.inner.entries.read().await;
        let now = Utc::now();
        let mut rows: Vec<CityStatus> = entries
            .iter()
            .map(|(key, entry)| CityStatus {
                city: key.clone(),
                last_updated: entry.last_updated,
                age_secs: now.signed_duration_since(entry.last_updated).num_seconds(),
            })
            .collect();
        rows.sort_by(|a, b| a.city.cmp(&b.city));
        rows
    }

    /// Number of cities currently cached.
    pub async fn len(&self) -> usize {
        self.inner.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.entries.read().await.is_empty()
    }

    /// Cancel every refresh schedule and drop all cached state. Intended for
    /// process teardown; a later `get` starts from cold.
    pub async fn shutdown(&self) {
        let mut refreshers = self.inner.refreshers.lock().await;
        let cancelled = refreshers.len();
        for (_, handle) in refreshers.drain() {
            handle.task.abort();
        }
        self.inner.entries.write().await.clear();
        self.inner.flights.lock().await.clear();
        drop(refreshers);

        info!("Cache shut down ({} refresh schedules cancelled)", cancelled);
    }
}

impl CacheInner {
    fn is_fresh(&self, last_updated: DateTime<Utc>) -> bool {
        let age_ms = Utc::now()
            .signed_duration_since(last_updated)
            .num_milliseconds();
        age_ms < self.ttl.as_millis() as i64
    }

    async fn fresh_report(&self, key: &str) -> Option<WeatherReport> {
        let entries = self.entries.read().await;
        let entry = entries.get(key)?;
        if self.is_fresh(entry.last_updated) {
            Some(entry.report.clone())
        } else {
            None
        }
    }

    async fn stale_report(&self, key: &str) -> Option<WeatherReport> {
        let entries = self.entries.read().await;
        entries.get(key).map(|entry| entry.report.clone())
    }

    async fn flight_lock(&self, key: &str) -> Arc<Mutex<()>> {
        let mut flights = self.flights.lock().await;
        flights
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Store a synchronously fetched report and make sure the city has a
    /// refresh schedule.
    ///
    /// If the city was removed while the fetch was in flight its flight lock
    /// is no longer the registered one, and the result is discarded: removal
    /// wins, the caller still gets the report it asked for. No entry or
    /// schedule is created from the discarded result; a later `get` starts
    /// the city from cold.
    async fn commit_fetch(
        self: &Arc<Self>,
        key: &str,
        flight: &Arc<Mutex<()>>,
        report: &WeatherReport,
    ) {
        let mut refreshers = self.refreshers.lock().await;

        {
            let flights = self.flights.lock().await;
            let still_tracked = flights
                .get(key)
                .map(|current| Arc::ptr_eq(current, flight))
                .unwrap_or(false);
            if !still_tracked {
                debug!("Discarding fetch result for {}: removed mid-flight", key);
                return;
            }
        }

        self.entries.write().await.insert(
            key.to_string(),
            CacheEntry {
                report: report.clone(),
                last_updated: Utc::now(),
            },
        );

        if !refreshers.contains_key(key) {
            let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
            let task = spawn_refresher(Arc::downgrade(self), key.to_string(), generation, self.ttl);
            refreshers.insert(key.to_string(), RefreshHandle { generation, task });
            info!(
                "Started refresh schedule for {} (every {}s)",
                key,
                self.ttl.as_secs()
            );
        }
    }

    async fn refresher_is_current(&self, key: &str, generation: u64) -> bool {
        let refreshers = self.refreshers.lock().await;
        refreshers.get(key).map(|h| h.generation) == Some(generation)
    }

    /// Write back a background refresh result, unless the schedule that
    /// produced it has been cancelled in the meantime.
    async fn apply_refresh(&self, key: &str, generation: u64, report: WeatherReport) {
        let refreshers = self.refreshers.lock().await;
        if refreshers.get(key).map(|h| h.generation) != Some(generation) {
            debug!("Discarding refresh result for {}: schedule cancelled", key);
            return;
        }
        let mut entries = self.entries.write().await;
        if let Some(entry) = entries.get_mut(key) {
            entry.report = report;
            entry.last_updated = Utc::now();
        }
    }
}

/// Spawn the per-city refresh task. First tick lands one full window after
/// the entry was created, then every window after that. The task holds only
/// a weak reference, so an abandoned cache winds itself down.
fn spawn_refresher(
    inner: Weak<CacheInner>,
    key: String,
    generation: u64,
    ttl: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + ttl, ttl);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            interval.tick().await;

            let Some(cache) = inner.upgrade() else {
                return;
            };
            if !cache.refresher_is_current(&key, generation).await {
                return;
            }

            debug!("Auto-updating weather data for {}", key);
            match cache.source.fetch(&key).await {
                Ok(report) => {
                    cache.apply_refresh(&key, generation, report).await;
                    info!("Refreshed weather data for {}", key);
                }
                Err(e) => {
                    warn!(
                        "Background refresh failed for {} (keeping cached data): {}",
                        key, e
                    );
                }
            }
        }
    })
}

/// Cache keys are the lowercased city name.
fn normalize_key(city: &str) -> String {
    city.to_lowercase()
}
