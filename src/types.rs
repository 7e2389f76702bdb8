//! Core data types for the tick cache
//!
//! `StreamDataPoint` is the compact tick record stored in both tiers. On the
//! warm-tier wire it serializes with single/double-letter field names
//! (`s,p,v,t,c,cp`) to keep payloads small; the short names are the only
//! "compression" applied.

use serde::{Deserialize, Serialize};

/// Compact record for one symbol at one point in time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamDataPoint {
    /// Symbol, e.g. "AAPL.US"
    #[serde(rename = "s")]
    pub symbol: String,

    /// Last trade price
    #[serde(rename = "p")]
    pub price: f64,

    /// Trade volume
    #[serde(rename = "v")]
    pub volume: f64,

    /// Event time, epoch milliseconds
    #[serde(rename = "t")]
    pub timestamp: i64,

    /// Absolute change since previous close
    #[serde(rename = "c", skip_serializing_if = "Option::is_none")]
    pub change: Option<f64>,

    /// Percentage change since previous close
    #[serde(rename = "cp", skip_serializing_if = "Option::is_none")]
    pub change_percent: Option<f64>,
}

/// Ingest shape accepted by `set_data`
///
/// Identical to `StreamDataPoint` except the timestamp is optional; missing
/// timestamps are backfilled with the current wall clock during
/// normalization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawDataPoint {
    #[serde(rename = "s")]
    pub symbol: String,
    #[serde(rename = "p")]
    pub price: f64,
    #[serde(rename = "v")]
    pub volume: f64,
    #[serde(rename = "t", skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    #[serde(rename = "c", skip_serializing_if = "Option::is_none")]
    pub change: Option<f64>,
    #[serde(rename = "cp", skip_serializing_if = "Option::is_none")]
    pub change_percent: Option<f64>,
}

impl RawDataPoint {
    /// Normalize into a `StreamDataPoint`, backfilling a missing timestamp
    pub fn normalize(self, now_ms: i64) -> StreamDataPoint {
        StreamDataPoint {
            symbol: self.symbol,
            price: self.price,
            volume: self.volume,
            timestamp: self.timestamp.unwrap_or(now_ms),
            change: self.change,
            change_percent: self.change_percent,
        }
    }
}

/// Placement policy for `set_data`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CachePriority {
    /// Size-based placement: small payloads go to both tiers, large
    /// payloads to the warm tier only
    #[default]
    Auto,
    /// Force into the hot tier, with a warm-tier write as durability backup
    Hot,
    /// Warm tier only; the hot tier is populated lazily on first read
    Warm,
}

/// Snapshot of engine counters
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    /// Hot-tier hits
    pub hot_hits: u64,
    /// Warm-tier hits (promotions)
    pub warm_hits: u64,
    /// Misses across both tiers (including warm-tier failures)
    pub misses: u64,
    /// Current number of hot-tier entries
    pub hot_cache_size: usize,
    /// Approximate ratio of verbose-field encoding to the short-field wire
    /// encoding actually written (>= 1.0 once data has been written)
    pub compression_ratio: f64,
}

impl CacheStats {
    /// Overall hit rate across both tiers, 0.0..=1.0
    pub fn hit_rate(&self) -> f64 {
        let total = self.hot_hits + self.warm_hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hot_hits + self.warm_hits) as f64 / total as f64
        }
    }
}

/// Health grade derived from warm-tier probes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    /// Ping and canary write both succeeded
    Healthy,
    /// Ping succeeded but the canary write failed
    Degraded,
    /// Ping failed or timed out
    Unhealthy,
}

/// Health report returned by `get_health_status`
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    pub status: HealthState,
    pub hot_cache_size: usize,
    pub warm_connected: bool,
    /// Most recent probe failure message, if any
    pub last_error: Option<String>,
}

/// Current wall clock in epoch milliseconds
pub(crate) fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
