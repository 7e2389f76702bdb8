//! Metrics reporting and operational event emission
//!
//! Both consumer interfaces here are best-effort: a panicking or failing
//! collector must never affect cache correctness, so every outbound call is
//! wrapped in `catch_unwind` and failures are logged and dropped.

use parking_lot::Mutex;
use serde::Serialize;
use serde_json::{json, Value};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;
use sysinfo::{get_current_pid, Pid, ProcessesToUpdate, System};
use tracing::{debug, warn};

use crate::types::now_ms;

/// Process resource snapshot forwarded to a `MetricsCollector`
#[derive(Debug, Clone, Serialize)]
pub struct SystemMetrics {
    pub memory: MemoryMetrics,
    pub cpu: CpuMetrics,
    /// Seconds since the reporter was created
    pub uptime_secs: u64,
    /// Epoch milliseconds at collection time
    pub timestamp: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MemoryMetrics {
    /// Resident memory of this process, bytes
    pub used: u64,
    /// Total system memory, bytes
    pub total: u64,
    /// used / total, 0.0..=100.0
    pub percentage: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CpuMetrics {
    /// Process CPU usage percentage since the previous refresh
    pub usage: f32,
}

/// External collector for periodic system metrics
pub trait MetricsCollector: Send + Sync {
    fn record_system_metrics(&self, metrics: &SystemMetrics);
}

/// Fire-and-forget sink for per-operation cache events
pub trait CacheEventSink: Send + Sync {
    fn emit(&self, event: &str, payload: Value);
}

/// Emit an operational event, isolating sink panics from the caller
pub(crate) fn emit_event(sink: &Option<Arc<dyn CacheEventSink>>, event: &str, payload: Value) {
    if let Some(sink) = sink {
        let result = catch_unwind(AssertUnwindSafe(|| sink.emit(event, payload)));
        if result.is_err() {
            warn!("Event sink panicked while emitting '{}', ignoring", event);
        }
    }
}

/// Convenience payload for per-operation events
pub(crate) fn operation_payload(key: &str, layer: &str, latency_us: u128) -> Value {
    json!({
        "key": key,
        "layer": layer,
        "latency_us": latency_us as u64,
        "timestamp": now_ms(),
    })
}

/// Periodically summarizes process resource usage for an injected collector
///
/// Absence of a configured collector is tolerated; `report_system_metrics`
/// still gathers and returns the snapshot so callers can expose it on an
/// admin endpoint.
pub struct MetricsReporter {
    system: Mutex<System>,
    pid: Option<Pid>,
    started_at: Instant,
    collector: Option<Arc<dyn MetricsCollector>>,
}

impl MetricsReporter {
    pub fn new(collector: Option<Arc<dyn MetricsCollector>>) -> Self {
        let pid = match get_current_pid() {
            Ok(pid) => Some(pid),
            Err(e) => {
                warn!("Could not resolve current pid, memory metrics disabled: {}", e);
                None
            }
        };

        Self {
            system: Mutex::new(System::new()),
            pid,
            started_at: Instant::now(),
            collector,
        }
    }

    /// Gather a snapshot and forward it to the collector, if any
    pub fn report_system_metrics(&self) -> SystemMetrics {
        let snapshot = self.collect();

        if let Some(collector) = &self.collector {
            let result = catch_unwind(AssertUnwindSafe(|| {
                collector.record_system_metrics(&snapshot)
            }));
            if result.is_err() {
                warn!("Metrics collector panicked, ignoring");
            }
        }

        snapshot
    }

    fn collect(&self) -> SystemMetrics {
        let mut system = self.system.lock();
        system.refresh_memory();
        let total = system.total_memory();

        let (used, usage) = match self.pid {
            Some(pid) => {
                system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
                match system.process(pid) {
                    Some(process) => (process.memory(), process.cpu_usage()),
                    None => (0, 0.0),
                }
            }
            None => (0, 0.0),
        };

        let percentage = if total > 0 {
            (used as f64 / total as f64) * 100.0
        } else {
            0.0
        };

        let snapshot = SystemMetrics {
            memory: MemoryMetrics {
                used,
                total,
                percentage,
            },
            cpu: CpuMetrics { usage },
            uptime_secs: self.started_at.elapsed().as_secs(),
            timestamp: now_ms(),
        };

        debug!(
            "System metrics: {:.1}MB resident ({:.2}%), cpu {:.1}%",
            snapshot.memory.used as f64 / (1024.0 * 1024.0),
            snapshot.memory.percentage,
            snapshot.cpu.usage
        );

        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    struct RecordingCollector {
        calls: AtomicU64,
    }

    impl MetricsCollector for RecordingCollector {
        fn record_system_metrics(&self, metrics: &SystemMetrics) {
            assert!(metrics.memory.total > 0);
            self.calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct PanickingCollector;

    impl MetricsCollector for PanickingCollector {
        fn record_system_metrics(&self, _metrics: &SystemMetrics) {
            panic!("collector exploded");
        }
    }

    struct PanickingSink;

    impl CacheEventSink for PanickingSink {
        fn emit(&self, _event: &str, _payload: Value) {
            panic!("sink exploded");
        }
    }

    #[test]
    fn test_report_forwards_to_collector() {
        let collector = Arc::new(RecordingCollector {
            calls: AtomicU64::new(0),
        });
        let reporter = MetricsReporter::new(Some(collector.clone()));

        let snapshot = reporter.report_system_metrics();
        assert!(snapshot.memory.total > 0);
        assert_eq!(collector.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_report_without_collector_is_noop() {
        let reporter = MetricsReporter::new(None);
        let snapshot = reporter.report_system_metrics();
        assert!(snapshot.memory.total > 0);
    }

    #[test]
    fn test_collector_panic_is_isolated() {
        let reporter = MetricsReporter::new(Some(Arc::new(PanickingCollector)));
        // Must not propagate the panic
        let _ = reporter.report_system_metrics();
    }

    #[test]
    fn test_sink_panic_is_isolated() {
        let sink: Option<Arc<dyn CacheEventSink>> = Some(Arc::new(PanickingSink));
        emit_event(&sink, "cache_hit", json!({}));
    }

    #[test]
    fn test_emit_without_sink_is_noop() {
        emit_event(&None, "cache_hit", json!({}));
    }
}
