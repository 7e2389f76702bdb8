//! Warm-tier health probing
//!
//! A probe grades the warm tier in two steps: a `PING` for connectivity,
//! then a throwaway canary write for actual write capability. A reachable
//! server that rejects writes (full, read-only replica, ACL problem) is
//! `degraded` rather than `unhealthy`.

use parking_lot::Mutex;
use std::sync::Arc;
use tracing::warn;

use crate::types::{HealthState, HealthStatus};
use crate::warm_tier::WarmTierStore;

const CANARY_TTL_SECS: u64 = 5;

pub struct HealthMonitor {
    warm: Arc<dyn WarmTierStore>,
    namespace: String,
    last_error: Mutex<Option<String>>,
}

impl HealthMonitor {
    pub fn new(warm: Arc<dyn WarmTierStore>, namespace: &str) -> Self {
        Self {
            warm,
            namespace: namespace.to_string(),
            last_error: Mutex::new(None),
        }
    }

    /// Probe the warm tier and derive a health grade.
    ///
    /// `hot_cache_size` is passed through into the report so a single call
    /// answers both "is the warm tier up" and "how full is the hot tier".
    pub async fn probe(&self, hot_cache_size: usize) -> HealthStatus {
        if let Err(e) = self.warm.ping().await {
            warn!("Warm tier ping failed: {}", e);
            let message = e.to_string();
            *self.last_error.lock() = Some(message.clone());
            return HealthStatus {
                status: HealthState::Unhealthy,
                hot_cache_size,
                warm_connected: false,
                last_error: Some(message),
            };
        }

        let canary_key = format!(
            "{}:healthcheck:{}",
            self.namespace,
            rand::random::<u32>()
        );
        if let Err(e) = self
            .warm
            .set_with_ttl(&canary_key, "ok", CANARY_TTL_SECS)
            .await
        {
            warn!("Warm tier canary write failed: {}", e);
            let message = e.to_string();
            *self.last_error.lock() = Some(message.clone());
            return HealthStatus {
                status: HealthState::Degraded,
                hot_cache_size,
                warm_connected: true,
                last_error: Some(message),
            };
        }

        HealthStatus {
            status: HealthState::Healthy,
            hot_cache_size,
            warm_connected: true,
            last_error: self.last_error.lock().clone(),
        }
    }
}
