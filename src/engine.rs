//! Stream cache engine - orchestrates the hot and warm tiers
//!
//! Callers interact with this type exclusively. Reads check the hot tier
//! first and fall back to the warm tier, promoting warm hits so subsequent
//! reads of the same key stay in-process. Writes are placed by a
//! `CachePriority` policy. Every steady-state warm-tier failure degrades to
//! cache-miss behavior; routine operations never return errors.

use futures::stream::{self, StreamExt};
use parking_lot::Mutex;
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::CacheConfig;
use crate::error::Result;
use crate::health::HealthMonitor;
use crate::hot_tier::HotTierStore;
use crate::metrics::{emit_event, operation_payload, CacheEventSink};
use crate::types::{now_ms, CachePriority, CacheStats, HealthStatus, RawDataPoint, StreamDataPoint};
use crate::warm_tier::{RedisWarmTier, WarmTierStore};

/// Authoritative hit/miss counters. The engine owns these; external
/// collectors only ever receive copies through the event sink.
#[derive(Default)]
struct EngineCounters {
    hot_hits: AtomicU64,
    warm_hits: AtomicU64,
    misses: AtomicU64,
    wire_bytes: AtomicU64,
    verbose_bytes: AtomicU64,
}

impl EngineCounters {
    fn reset(&self) {
        self.hot_hits.store(0, Ordering::Relaxed);
        self.warm_hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.wire_bytes.store(0, Ordering::Relaxed);
        self.verbose_bytes.store(0, Ordering::Relaxed);
    }
}

/// Two-tier cache engine for real-time tick streams
pub struct StreamCacheEngine {
    config: CacheConfig,
    hot: Arc<HotTierStore>,
    warm: Arc<dyn WarmTierStore>,
    health: HealthMonitor,
    counters: Arc<EngineCounters>,
    events: Option<Arc<dyn CacheEventSink>>,
    maintenance_task: Mutex<Option<JoinHandle<()>>>,
}

impl StreamCacheEngine {
    /// Build an engine over an already-constructed warm tier.
    ///
    /// Must be called from within a Tokio runtime: the constructor spawns
    /// the background TTL sweep, which `close` (or drop) stops.
    pub fn new(
        config: CacheConfig,
        warm: Arc<dyn WarmTierStore>,
        events: Option<Arc<dyn CacheEventSink>>,
    ) -> Result<Self> {
        config.validate()?;

        let hot = Arc::new(HotTierStore::new(config.max_hot_cache_size));
        let health = HealthMonitor::new(Arc::clone(&warm), &config.namespace);

        let maintenance_task = Self::spawn_maintenance(
            Arc::clone(&hot),
            Duration::from_millis(config.cleanup_interval_ms),
        );

        info!(
            "StreamCacheEngine initialized: namespace={}, hot_ttl={}ms, max_hot_size={}",
            config.namespace, config.hot_cache_ttl_ms, config.max_hot_cache_size
        );

        Ok(Self {
            config,
            hot,
            warm,
            health,
            counters: Arc::new(EngineCounters::default()),
            events,
            maintenance_task: Mutex::new(Some(maintenance_task)),
        })
    }

    /// Build an engine with a Redis warm tier from configuration.
    /// Fails fast if the warm tier is unreachable.
    pub async fn connect(
        config: CacheConfig,
        events: Option<Arc<dyn CacheEventSink>>,
    ) -> Result<Self> {
        config.validate()?;
        let warm = RedisWarmTier::connect(&config.warm_url, config.warm_op_timeout()).await?;
        Self::new(config, Arc::new(warm), events)
    }

    fn spawn_maintenance(hot: Arc<HotTierStore>, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // First tick completes immediately; skip it so the loop waits a
            // full interval before the first sweep
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let removed = hot.sweep_expired();
                hot.evict_if_needed();
                if removed > 0 {
                    debug!("Maintenance sweep reclaimed {} hot tier entries", removed);
                }
            }
        })
    }

    /// Read-through fetch: hot tier first, warm tier on miss with
    /// unconditional promotion. Returns `None` on absence, expiry, malformed
    /// warm payload, or warm-tier failure, never an error.
    pub async fn get_data(&self, key: &str) -> Option<Arc<Vec<StreamDataPoint>>> {
        let start = Instant::now();

        if let Some(points) = self.hot.get(key) {
            self.counters.hot_hits.fetch_add(1, Ordering::Relaxed);
            emit_event(
                &self.events,
                "cache_hit",
                operation_payload(key, "hot", start.elapsed().as_micros()),
            );
            return Some(points);
        }

        let warm_key = self.config.namespaced_key(key);
        let raw = match self.warm.get(&warm_key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                emit_event(
                    &self.events,
                    "cache_miss",
                    operation_payload(key, "warm", start.elapsed().as_micros()),
                );
                return None;
            }
            Err(e) => {
                warn!("Warm tier get failed for {}: {}", key, e);
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                emit_event(
                    &self.events,
                    "cache_error",
                    json!({ "key": key, "operation": "get", "error": e.to_string() }),
                );
                return None;
            }
        };

        let points: Vec<StreamDataPoint> = match serde_json::from_str(&raw) {
            Ok(points) => points,
            Err(e) => {
                // Malformed warm payload is a miss, not a caller error
                warn!("Discarding malformed warm payload for {}: {}", key, e);
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                emit_event(
                    &self.events,
                    "cache_error",
                    json!({ "key": key, "operation": "parse", "error": e.to_string() }),
                );
                return None;
            }
        };

        let points = Arc::new(points);
        // A warm hit implies durable presence, so promotion is always safe
        // regardless of the original write's placement policy
        self.hot
            .put(key, Arc::clone(&points), self.config.hot_ttl());
        self.counters.warm_hits.fetch_add(1, Ordering::Relaxed);
        debug!("Promoted {} from warm tier ({} points)", key, points.len());
        emit_event(
            &self.events,
            "cache_hit",
            operation_payload(key, "warm", start.elapsed().as_micros()),
        );

        Some(points)
    }

    /// Normalize and place a payload according to `priority`.
    ///
    /// Returns `true` when the payload landed in at least one tier. An empty
    /// input is accepted as a no-op and returns `false`.
    pub async fn set_data(
        &self,
        key: &str,
        raw_points: Vec<RawDataPoint>,
        priority: CachePriority,
    ) -> bool {
        if raw_points.is_empty() {
            debug!("Ignoring empty set_data payload for {}", key);
            return false;
        }

        let now = now_ms();
        let points: Vec<StreamDataPoint> = raw_points
            .into_iter()
            .map(|raw| raw.normalize(now))
            .collect();

        let place_hot = match priority {
            CachePriority::Hot => true,
            CachePriority::Warm => false,
            CachePriority::Auto => points.len() <= self.config.auto_placement_max_points,
        };

        let points = Arc::new(points);
        let warm_ok = self.write_warm(key, &points).await;

        if place_hot {
            self.hot
                .put(key, Arc::clone(&points), self.config.hot_ttl());
        }

        let layer = match (place_hot, warm_ok) {
            (true, true) => "both",
            (true, false) => "hot",
            (false, true) => "warm",
            (false, false) => "none",
        };
        emit_event(
            &self.events,
            "cache_write",
            json!({ "key": key, "layer": layer, "points": points.len(), "timestamp": now }),
        );

        place_hot || warm_ok
    }

    async fn write_warm(&self, key: &str, points: &Arc<Vec<StreamDataPoint>>) -> bool {
        let raw = match serde_json::to_string(points.as_ref()) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Failed to serialize payload for {}: {}", key, e);
                return false;
            }
        };

        let warm_key = self.config.namespaced_key(key);
        match self
            .warm
            .set_with_ttl(&warm_key, &raw, self.config.warm_cache_ttl_secs)
            .await
        {
            Ok(()) => {
                self.counters
                    .wire_bytes
                    .fetch_add(raw.len() as u64, Ordering::Relaxed);
                self.counters.verbose_bytes.fetch_add(
                    raw.len() as u64 + points.iter().map(verbose_overhead).sum::<u64>(),
                    Ordering::Relaxed,
                );
                true
            }
            Err(e) => {
                warn!("Warm tier write failed for {}: {}", key, e);
                emit_event(
                    &self.events,
                    "cache_error",
                    json!({ "key": key, "operation": "set", "error": e.to_string() }),
                );
                false
            }
        }
    }

    /// Resolve the full point list for `key` and keep only points newer than
    /// `since_timestamp_ms`, preserving order. `None` when the key is absent
    /// or no point is newer than the requested timestamp.
    pub async fn get_data_since(
        &self,
        key: &str,
        since_timestamp_ms: i64,
    ) -> Option<Vec<StreamDataPoint>> {
        let points = self.get_data(key).await?;

        let fresh: Vec<StreamDataPoint> = points
            .iter()
            .filter(|p| p.timestamp > since_timestamp_ms)
            .cloned()
            .collect();

        if fresh.is_empty() {
            None
        } else {
            Some(fresh)
        }
    }

    /// Resolve each key concurrently through the `get_data` path, bounded by
    /// the configured fan-out limit. An empty input returns an empty map
    /// without touching the warm tier.
    pub async fn get_batch_data(
        &self,
        keys: &[String],
    ) -> HashMap<String, Option<Arc<Vec<StreamDataPoint>>>> {
        if keys.is_empty() {
            return HashMap::new();
        }

        stream::iter(keys.iter().cloned())
            .map(|key| async move {
                let points = self.get_data(&key).await;
                (key, points)
            })
            .buffer_unordered(self.config.batch_concurrency)
            .collect()
            .await
    }

    /// Remove a key from both tiers. Warm-tier failures are logged and
    /// swallowed; the call always completes, and deleting an absent key is a
    /// safe no-op.
    pub async fn delete_data(&self, key: &str) {
        self.hot.delete(key);

        let warm_key = self.config.namespaced_key(key);
        if let Err(e) = self.warm.delete(&warm_key).await {
            warn!("Warm tier delete failed for {}: {}", key, e);
        }

        emit_event(
            &self.events,
            "cache_delete",
            json!({ "key": key, "timestamp": now_ms() }),
        );
    }

    /// Drop every warm-tier key under this engine's namespace, clear the hot
    /// tier, and reset counters
    pub async fn clear_all(&self) {
        let prefix = format!("{}:", self.config.namespace);
        match self.warm.scan_keys(&prefix).await {
            Ok(keys) => {
                let count = keys.len();
                if let Err(e) = self.warm.delete_many(&keys).await {
                    warn!("Warm tier bulk delete failed during clear_all: {}", e);
                } else {
                    info!("Cleared {} warm tier keys under {}", count, prefix);
                }
            }
            Err(e) => {
                warn!("Warm tier scan failed during clear_all: {}", e);
            }
        }

        self.hot.clear();
        self.counters.reset();
    }

    pub fn get_cache_stats(&self) -> CacheStats {
        let wire = self.counters.wire_bytes.load(Ordering::Relaxed);
        let verbose = self.counters.verbose_bytes.load(Ordering::Relaxed);
        let compression_ratio = if wire > 0 {
            verbose as f64 / wire as f64
        } else {
            1.0
        };

        CacheStats {
            hot_hits: self.counters.hot_hits.load(Ordering::Relaxed),
            warm_hits: self.counters.warm_hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            hot_cache_size: self.hot.len(),
            compression_ratio,
        }
    }

    /// Probe the warm tier and report the combined health grade
    pub async fn get_health_status(&self) -> HealthStatus {
        self.health.probe(self.hot.len()).await
    }

    /// Stop the background maintenance task. Idempotent; also runs on drop.
    pub fn close(&self) {
        if let Some(task) = self.maintenance_task.lock().take() {
            task.abort();
            info!("StreamCacheEngine maintenance task stopped");
        }
    }
}

impl Drop for StreamCacheEngine {
    fn drop(&mut self) {
        self.close();
    }
}

/// Extra bytes the verbose field names (`symbol`, `price`, `volume`,
/// `timestamp`, `change`, `changePercent`) would add over the wire encoding
fn verbose_overhead(point: &StreamDataPoint) -> u64 {
    let mut overhead = 22u64; // symbol/price/volume/timestamp vs s/p/v/t
    if point.change.is_some() {
        overhead += 5;
    }
    if point.change_percent.is_some() {
        overhead += 11;
    }
    overhead
}
