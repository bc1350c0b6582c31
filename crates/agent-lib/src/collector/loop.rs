//! Stats cycle loop
//!
//! Sleeps for the configured interval, then samples the host, fans out over
//! the containers and hands the assembled report to the sink. Cycles run
//! strictly one after another; a slow cycle delays the next one instead of
//! triggering a catch-up.

use super::fanout::{FanOutCollector, FanOutConfig};
use super::host::{HostProbe, HostSampler};
use crate::health::{components, HealthRegistry};
use crate::models::{HostReport, Payload, PayloadKind};
use crate::observability::{AgentMetrics, StructuredLogger};
use crate::runtime::{ContainerRuntime, NodeInfo};
use crate::sync::Sink;
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Configuration for the stats cycle loop
#[derive(Debug, Clone)]
pub struct CollectionConfig {
    /// Pause before each cycle (default: 10 seconds)
    pub interval: Duration,
    /// Limits for the per-container fan-out
    pub fan_out: FanOutConfig,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            fan_out: FanOutConfig::default(),
        }
    }
}

/// Periodic producer of [`HostReport`]s
pub struct CollectionLoop {
    runtime: Arc<dyn ContainerRuntime>,
    sink: Arc<dyn Sink>,
    host: HostSampler,
    fan_out: FanOutCollector,
    config: CollectionConfig,
    health: HealthRegistry,
    metrics: AgentMetrics,
    logger: StructuredLogger,
}

impl CollectionLoop {
    pub fn new(
        runtime: Arc<dyn ContainerRuntime>,
        sink: Arc<dyn Sink>,
        probe: Arc<dyn HostProbe>,
        config: CollectionConfig,
    ) -> Self {
        let fan_out = FanOutCollector::new(Arc::clone(&runtime), config.fan_out.clone());

        Self {
            runtime,
            sink,
            host: HostSampler::new(probe),
            fan_out,
            config,
            health: HealthRegistry::new(),
            metrics: AgentMetrics::new(),
            logger: StructuredLogger::new("unknown"),
        }
    }

    pub fn config(&self) -> &CollectionConfig {
        &self.config
    }

    /// Run cycles until a shutdown signal arrives between cycles
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        info!(
            interval_secs = self.config.interval.as_secs(),
            max_concurrency = ?self.config.fan_out.max_concurrency,
            fetch_timeout_secs = ?self.config.fan_out.fetch_timeout.map(|t| t.as_secs()),
            "Starting stats cycle loop"
        );

        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.config.interval) => {
                    self.run_cycle().await;
                }
                _ = shutdown.recv() => {
                    info!("Shutting down stats cycle loop");
                    break;
                }
            }
        }
    }

    /// One full cycle: collect, deliver and record the outcome
    pub async fn run_cycle(&self) -> bool {
        let start = Instant::now();

        let report = self.collect_report().await;
        let report_id = report.id.clone();
        let containers = report.containers.len();
        let delivered = self.deliver(report).await;

        let elapsed = start.elapsed();
        self.metrics.observe_cycle(elapsed.as_secs_f64());
        self.health.set_healthy(components::STATS_CYCLE).await;
        self.logger
            .log_cycle(&report_id, containers, elapsed.as_millis(), delivered);

        delivered
    }

    /// Assemble a report from node identity, host metrics and containers
    pub async fn collect_report(&self) -> HostReport {
        let node = match self.runtime.node_info().await {
            Ok(node) => node,
            Err(e) => {
                warn!(error = %e, "Cannot obtain node information");
                NodeInfo::default()
            }
        };

        let (disk, cpu, memory) = self.host.sample(node.cpus).await;
        let containers = self.fan_out.collect().await;
        debug!(node_id = %node.id, containers = containers.len(), "Report assembled");

        HostReport {
            id: node.id,
            disk,
            cpu,
            memory,
            containers,
        }
    }

    async fn deliver(&self, report: HostReport) -> bool {
        let result = self.sink.send(Payload::Stats(report)).await;
        if let Err(e) = &result {
            warn!(error = %e, "Failed to deliver stats report");
            self.metrics.inc_sink_errors(PayloadKind::Stats.as_str());
        }
        self.health.record(components::SINK, &result).await;
        result.is_ok()
    }
}

/// Builder for the stats cycle loop
pub struct CollectionLoopBuilder {
    runtime: Option<Arc<dyn ContainerRuntime>>,
    sink: Option<Arc<dyn Sink>>,
    probe: Option<Arc<dyn HostProbe>>,
    health: Option<HealthRegistry>,
    logger: Option<StructuredLogger>,
    config: CollectionConfig,
}

impl CollectionLoopBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self {
            runtime: None,
            sink: None,
            probe: None,
            health: None,
            logger: None,
            config: CollectionConfig::default(),
        }
    }

    pub fn runtime(mut self, runtime: Arc<dyn ContainerRuntime>) -> Self {
        self.runtime = Some(runtime);
        self
    }

    pub fn sink(mut self, sink: Arc<dyn Sink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Set the host metrics source
    pub fn probe(mut self, probe: Arc<dyn HostProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    pub fn health(mut self, health: HealthRegistry) -> Self {
        self.health = Some(health);
        self
    }

    pub fn logger(mut self, logger: StructuredLogger) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Set the pause between cycles
    pub fn interval(mut self, interval: Duration) -> Self {
        self.config.interval = interval;
        self
    }

    /// Cap the number of stats fetches in flight
    pub fn max_concurrency(mut self, limit: Option<usize>) -> Self {
        self.config.fan_out.max_concurrency = limit;
        self
    }

    /// Bound each stats fetch
    pub fn fetch_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.fan_out.fetch_timeout = timeout;
        self
    }

    pub fn build(self) -> Result<CollectionLoop> {
        let runtime = self
            .runtime
            .ok_or_else(|| anyhow::anyhow!("Container runtime is required"))?;
        let sink = self.sink.ok_or_else(|| anyhow::anyhow!("Sink is required"))?;
        let probe = self
            .probe
            .ok_or_else(|| anyhow::anyhow!("Host probe is required"))?;
        if self.config.interval.is_zero() {
            anyhow::bail!("Stats interval must be positive");
        }

        let mut collection_loop = CollectionLoop::new(runtime, sink, probe, self.config);
        if let Some(health) = self.health {
            collection_loop.health = health;
        }
        if let Some(logger) = self.logger {
            collection_loop.logger = logger;
        }
        Ok(collection_loop)
    }
}

impl Default for CollectionLoopBuilder {
    fn default() -> Self {
        Self::new()
    }
}
