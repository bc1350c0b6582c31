//! Observability infrastructure for the stats agent
//!
//! Provides:
//! - Prometheus metrics (cycle latency, containers monitored, per-item errors, relayed events)
//! - Structured JSON logging with tracing

use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge,
    Histogram, IntCounter, IntCounterVec, IntGauge,
};
use std::sync::OnceLock;
use tracing::{error, info};

/// Histogram buckets for cycle latency (in seconds)
const CYCLE_LATENCY_BUCKETS: &[f64] = &[0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<AgentMetricsInner> = OnceLock::new();

/// Inner metrics structure that holds the actual Prometheus metrics
struct AgentMetricsInner {
    cycle_latency_seconds: Histogram,
    cycles_total: IntCounter,
    containers_monitored: IntGauge,
    container_fetch_errors: IntCounter,
    host_metric_errors: IntCounterVec,
    events_relayed: IntCounter,
    sink_errors: IntCounterVec,
}

impl AgentMetricsInner {
    fn new() -> Self {
        Self {
            cycle_latency_seconds: register_histogram!(
                "stats_agent_cycle_latency_seconds",
                "Time spent on one stats cycle including delivery",
                CYCLE_LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register cycle_latency_seconds"),

            cycles_total: register_int_counter!(
                "stats_agent_cycles_total",
                "Total number of completed stats cycles"
            )
            .expect("Failed to register cycles_total"),

            containers_monitored: register_int_gauge!(
                "stats_agent_containers_monitored",
                "Number of containers enumerated in the last cycle"
            )
            .expect("Failed to register containers_monitored"),

            container_fetch_errors: register_int_counter!(
                "stats_agent_container_fetch_errors_total",
                "Total number of container stats fetches that produced a zero record"
            )
            .expect("Failed to register container_fetch_errors"),

            host_metric_errors: register_int_counter_vec!(
                "stats_agent_host_metric_errors_total",
                "Total number of failed host metric reads",
                &["metric"]
            )
            .expect("Failed to register host_metric_errors"),

            events_relayed: register_int_counter!(
                "stats_agent_events_relayed_total",
                "Total number of runtime events forwarded to the sink"
            )
            .expect("Failed to register events_relayed"),

            sink_errors: register_int_counter_vec!(
                "stats_agent_sink_errors_total",
                "Total number of payloads the sink failed to deliver",
                &["kind"]
            )
            .expect("Failed to register sink_errors"),
        }
    }
}

/// Agent metrics for Prometheus exposition
///
/// This is a lightweight handle to the global metrics instance.
/// Multiple clones share the same underlying metrics.
#[derive(Clone)]
pub struct AgentMetrics {
    _private: (),
}

impl Default for AgentMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(AgentMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &AgentMetricsInner {
        GLOBAL_METRICS.get_or_init(AgentMetricsInner::new)
    }

    /// Record a completed cycle and its duration
    pub fn observe_cycle(&self, duration_secs: f64) {
        self.inner().cycle_latency_seconds.observe(duration_secs);
        self.inner().cycles_total.inc();
    }

    pub fn set_containers_monitored(&self, count: i64) {
        self.inner().containers_monitored.set(count);
    }

    pub fn inc_container_fetch_errors(&self) {
        self.inner().container_fetch_errors.inc();
    }

    pub fn inc_host_metric_errors(&self, metric: &str) {
        self.inner()
            .host_metric_errors
            .with_label_values(&[metric])
            .inc();
    }

    pub fn inc_events_relayed(&self) {
        self.inner().events_relayed.inc();
    }

    pub fn inc_sink_errors(&self, kind: &str) {
        self.inner().sink_errors.with_label_values(&[kind]).inc();
    }

    pub fn cycles_total(&self) -> u64 {
        self.inner().cycles_total.get()
    }

    pub fn events_relayed(&self) -> u64 {
        self.inner().events_relayed.get()
    }
}

/// Structured logger for agent lifecycle events
///
/// Provides consistent JSON-formatted logging with the node name attached.
#[derive(Clone)]
pub struct StructuredLogger {
    node_name: String,
}

impl StructuredLogger {
    pub fn new(node_name: impl Into<String>) -> Self {
        Self {
            node_name: node_name.into(),
        }
    }

    /// Log agent startup
    pub fn log_startup(&self, version: &str, runtime: &str, collector: &str) {
        info!(
            event = "agent_started",
            node = %self.node_name,
            agent_version = %version,
            runtime = %runtime,
            collector = %collector,
            "Stats agent started"
        );
    }

    /// Log agent shutdown
    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "agent_shutdown",
            node = %self.node_name,
            reason = %reason,
            "Stats agent shutting down"
        );
    }

    /// Log a completed stats cycle
    pub fn log_cycle(&self, report_id: &str, containers: usize, elapsed_ms: u128, delivered: bool) {
        info!(
            event = "stats_cycle_complete",
            node = %self.node_name,
            report_id = %report_id,
            containers = containers,
            elapsed_ms = elapsed_ms,
            delivered = delivered,
            "Stats cycle complete"
        );
    }

    /// Log loss of the runtime event stream
    pub fn log_relay_terminated(&self, reason: &str, events_relayed: u64) {
        error!(
            event = "event_relay_terminated",
            node = %self.node_name,
            reason = %reason,
            events_relayed = events_relayed,
            "Event collector is broken, shutting down"
        );
    }

    pub fn node_name(&self) -> &str {
        &self.node_name
    }
}
