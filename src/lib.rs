//! tickcache - two-tier cache engine for real-time market tick streams
//!
//! Provides low-latency access to small, high-volume, frequently-changing
//! records for callers that tolerate brief staleness but not the cost of a
//! durable store on every read:
//! - Hot tier: in-process, bounded, TTL+LRU store with sub-millisecond access
//! - Warm tier: durable, shared Redis-compatible store with per-key TTL
//!
//! Reads check the hot tier first and fall back to the warm tier, promoting
//! warm hits so subsequent reads stay in-process. Warm-tier outages degrade
//! every routine operation to cache-miss behavior; only construction-time
//! misconfiguration surfaces as an error.
//!
//! ```no_run
//! use tickcache::{CacheConfig, CachePriority, RawDataPoint, StreamCacheEngine};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), tickcache::CacheError> {
//!     let engine = StreamCacheEngine::connect(CacheConfig::default(), None).await?;
//!
//!     let tick = RawDataPoint {
//!         symbol: "AAPL.US".to_string(),
//!         price: 150.25,
//!         volume: 1000.0,
//!         timestamp: None,
//!         change: None,
//!         change_percent: None,
//!     };
//!     engine.set_data("q:AAPL", vec![tick], CachePriority::Auto).await;
//!
//!     if let Some(points) = engine.get_data("q:AAPL").await {
//!         println!("cached points: {}", points.len());
//!     }
//!
//!     engine.close();
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod health;
pub mod hot_tier;
pub mod metrics;
pub mod types;
pub mod warm_tier;

// Re-export main types for convenience
pub use config::CacheConfig;
pub use engine::StreamCacheEngine;
pub use error::CacheError;
pub use health::HealthMonitor;
pub use hot_tier::HotTierStore;
pub use metrics::{CacheEventSink, MetricsCollector, MetricsReporter, SystemMetrics};
pub use types::{
    CachePriority, CacheStats, HealthState, HealthStatus, RawDataPoint, StreamDataPoint,
};
pub use warm_tier::{RedisWarmTier, WarmTierStore};
