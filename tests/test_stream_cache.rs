//! Integration tests for the stream cache engine
//!
//! Drives the full engine through the public API against an in-memory warm
//! tier double, covering the end-to-end read-through/promotion flow, event
//! emission, and fail-soft behavior under warm-tier outage.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use tickcache::{
    CacheConfig, CacheError, CacheEventSink, CachePriority, HealthState, RawDataPoint,
    StreamCacheEngine, WarmTierStore,
};

/// In-memory stand-in for the Redis warm tier
#[derive(Default)]
struct FakeWarmTier {
    data: Mutex<HashMap<String, String>>,
    get_calls: AtomicU64,
    offline: AtomicBool,
}

impl FakeWarmTier {
    fn check_online(&self) -> Result<(), CacheError> {
        if self.offline.load(Ordering::SeqCst) {
            Err(CacheError::WarmTier("warm tier offline".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl WarmTierStore for FakeWarmTier {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        self.check_online()?;
        Ok(self.data.lock().get(key).cloned())
    }

    async fn set_with_ttl(&self, key: &str, value: &str, _ttl_secs: u64) -> Result<(), CacheError> {
        self.check_online()?;
        self.data.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.check_online()?;
        self.data.lock().remove(key);
        Ok(())
    }

    async fn scan_keys(&self, prefix: &str) -> Result<Vec<String>, CacheError> {
        self.check_online()?;
        Ok(self
            .data
            .lock()
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }

    async fn ping(&self) -> Result<(), CacheError> {
        self.check_online()
    }
}

/// Event sink that records every emitted event name
#[derive(Default)]
struct RecordingSink {
    events: Mutex<Vec<String>>,
}

impl CacheEventSink for RecordingSink {
    fn emit(&self, event: &str, _payload: Value) {
        self.events.lock().push(event.to_string());
    }
}

fn tick(symbol: &str, timestamp: i64) -> RawDataPoint {
    RawDataPoint {
        symbol: symbol.to_string(),
        price: 150.25,
        volume: 1000.0,
        timestamp: Some(timestamp),
        change: None,
        change_percent: None,
    }
}

fn build_engine() -> (StreamCacheEngine, Arc<FakeWarmTier>, Arc<RecordingSink>) {
    let warm = Arc::new(FakeWarmTier::default());
    let sink = Arc::new(RecordingSink::default());
    let engine = StreamCacheEngine::new(
        CacheConfig::default(),
        warm.clone(),
        Some(sink.clone()),
    )
    .unwrap();
    (engine, warm, sink)
}

#[tokio::test]
async fn test_full_write_read_promote_cycle() {
    let (engine, warm, _) = build_engine();

    // Warm-only write, then read through: the first read promotes
    engine
        .set_data("q:AAPL", vec![tick("AAPL.US", 1_700_000_000_000)], CachePriority::Warm)
        .await;

    let points = engine.get_data("q:AAPL").await.unwrap();
    assert_eq!(points[0].symbol, "AAPL.US");
    let warm_reads = warm.get_calls.load(Ordering::SeqCst);

    // Promoted: no further warm reads for the same key
    let points = engine.get_data("q:AAPL").await.unwrap();
    assert_eq!(points[0].timestamp, 1_700_000_000_000);
    assert_eq!(warm.get_calls.load(Ordering::SeqCst), warm_reads);
}

#[tokio::test]
async fn test_pre_seeded_warm_payload_round_trip() -> anyhow::Result<()> {
    let (engine, warm, _) = build_engine();
    warm.data.lock().insert(
        "stream_cache:q:TSLA".to_string(),
        r#"[{"s":"TSLA.US","p":800.75,"v":2000,"t":1700000001000}]"#.to_string(),
    );

    let points = engine
        .get_data("q:TSLA")
        .await
        .ok_or_else(|| anyhow::anyhow!("expected warm hit"))?;
    assert_eq!(points.len(), 1);
    assert_eq!(points[0].symbol, "TSLA.US");
    assert_eq!(points[0].price, 800.75);
    assert_eq!(points[0].volume, 2000.0);
    assert_eq!(points[0].timestamp, 1_700_000_001_000);
    Ok(())
}

#[tokio::test]
async fn test_events_emitted_per_operation() {
    let (engine, _, sink) = build_engine();

    engine
        .set_data("q:AAPL", vec![tick("AAPL.US", 1)], CachePriority::Hot)
        .await;
    let _ = engine.get_data("q:AAPL").await; // hot hit
    let _ = engine.get_data("q:MISSING").await; // miss
    engine.delete_data("q:AAPL").await;

    let events = sink.events.lock().clone();
    assert!(events.contains(&"cache_write".to_string()));
    assert!(events.contains(&"cache_hit".to_string()));
    assert!(events.contains(&"cache_miss".to_string()));
    assert!(events.contains(&"cache_delete".to_string()));
}

#[tokio::test]
async fn test_warm_outage_degrades_to_misses() {
    let (engine, warm, _) = build_engine();

    engine
        .set_data("q:AAPL", vec![tick("AAPL.US", 1)], CachePriority::Hot)
        .await;

    warm.offline.store(true, Ordering::SeqCst);

    // Hot-tier data still serves
    assert!(engine.get_data("q:AAPL").await.is_some());

    // Everything else fail-softs: miss, false, completed delete
    assert!(engine.get_data("q:OTHER").await.is_none());
    assert!(
        !engine
            .set_data("q:NEW", vec![tick("N.US", 1)], CachePriority::Warm)
            .await
    );
    engine.delete_data("q:GONE").await;

    let health = engine.get_health_status().await;
    assert_eq!(health.status, HealthState::Unhealthy);
    assert!(!health.warm_connected);
    assert!(health.last_error.is_some());

    // Recovery is observed on the next probe
    warm.offline.store(false, Ordering::SeqCst);
    let health = engine.get_health_status().await;
    assert_eq!(health.status, HealthState::Healthy);
    assert!(health.warm_connected);
}

#[tokio::test]
async fn test_batch_fan_out_against_warm_tier() {
    let (engine, _, _) = build_engine();

    for i in 0..20 {
        engine
            .set_data(
                &format!("q:SYM{}", i),
                vec![tick(&format!("SYM{}.US", i), 1_700_000_000_000 + i)],
                CachePriority::Warm,
            )
            .await;
    }

    let keys: Vec<String> = (0..20).map(|i| format!("q:SYM{}", i)).collect();
    let result = engine.get_batch_data(&keys).await;

    assert_eq!(result.len(), 20);
    for (key, points) in result {
        let points = points.unwrap_or_else(|| panic!("missing batch result for {}", key));
        assert_eq!(points.len(), 1);
    }
}

#[tokio::test]
async fn test_get_data_since_across_promotion() {
    let (engine, _, _) = build_engine();

    engine
        .set_data(
            "q:HIST",
            vec![tick("H.US", 1000), tick("H.US", 2000), tick("H.US", 3000)],
            CachePriority::Warm,
        )
        .await;

    // Resolution goes through the warm tier and promotes
    let fresh = engine.get_data_since("q:HIST", 1500).await.unwrap();
    assert_eq!(
        fresh.iter().map(|p| p.timestamp).collect::<Vec<_>>(),
        vec![2000, 3000]
    );

    assert!(engine.get_data_since("q:HIST", 5000).await.is_none());
}

#[tokio::test]
async fn test_clear_all_then_engine_still_usable() {
    let (engine, _, _) = build_engine();

    engine
        .set_data("q:AAPL", vec![tick("AAPL.US", 1)], CachePriority::Hot)
        .await;
    engine.clear_all().await;

    assert!(engine.get_data("q:AAPL").await.is_none());

    engine
        .set_data("q:AAPL", vec![tick("AAPL.US", 2)], CachePriority::Hot)
        .await;
    assert!(engine.get_data("q:AAPL").await.is_some());

    engine.close();
}
