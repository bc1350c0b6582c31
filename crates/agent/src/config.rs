//! Agent configuration

use agent_lib::collector::default_disk_path;
use agent_lib::runtime::DockerHost;
use agent_lib::sync::SinkConfig;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Agent configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    /// Node name attached to structured logs
    #[serde(default = "default_node_name")]
    pub node_name: String,

    /// API server port for health/metrics
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Collector base URL
    #[serde(default = "default_collector_endpoint")]
    pub collector_endpoint: String,

    /// Docker Engine address (unix:// or tcp://)
    #[serde(default = "default_docker_host")]
    pub docker_host: String,

    /// Pause between stats cycles in seconds
    #[serde(default = "default_stats_interval")]
    pub stats_interval_secs: u64,

    /// Host CPU sampling window in milliseconds
    #[serde(default = "default_cpu_sample_millis")]
    pub cpu_sample_millis: u64,

    /// Mount point whose disk usage is reported
    #[serde(default = "default_disk_path")]
    pub disk_path: PathBuf,

    /// Upper bound on a single container stats fetch
    #[serde(default)]
    pub fetch_timeout_secs: Option<u64>,

    /// Maximum number of stats fetches in flight
    #[serde(default)]
    pub max_concurrent_fetches: Option<usize>,

    /// Block start-up until the collector answers its health check
    #[serde(default = "default_wait_for_collector")]
    pub wait_for_collector: bool,

    /// Request timeout for payload delivery in seconds
    #[serde(default = "default_sink_timeout")]
    pub sink_timeout_secs: u64,
}

fn default_node_name() -> String {
    std::env::var("NODE_NAME").unwrap_or_else(|_| "unknown".to_string())
}

fn default_api_port() -> u16 {
    8080
}

fn default_collector_endpoint() -> String {
    "http://collector:8080".to_string()
}

fn default_docker_host() -> String {
    std::env::var("DOCKER_HOST").unwrap_or_else(|_| DockerHost::DEFAULT.to_string())
}

fn default_stats_interval() -> u64 {
    10
}

fn default_cpu_sample_millis() -> u64 {
    200
}

fn default_wait_for_collector() -> bool {
    true
}

fn default_sink_timeout() -> u64 {
    30
}

impl AgentConfig {
    /// Load configuration from `AGENT_*` environment variables
    pub fn load() -> Result<Self> {
        Self::from_env(config::Environment::with_prefix("AGENT"))
    }

    fn from_env(source: config::Environment) -> Result<Self> {
        let config: AgentConfig = config::Config::builder()
            .add_source(source.try_parsing(true))
            .build()
            .context("Failed to read agent configuration")?
            .try_deserialize()
            .context("Invalid agent configuration")?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.stats_interval_secs == 0 {
            anyhow::bail!("stats_interval_secs must be at least 1");
        }
        if self.max_concurrent_fetches == Some(0) {
            anyhow::bail!("max_concurrent_fetches must be at least 1 when set");
        }
        DockerHost::parse(&self.docker_host)
            .with_context(|| format!("Invalid docker_host {:?}", self.docker_host))?;
        Ok(())
    }

    pub fn stats_interval(&self) -> Duration {
        Duration::from_secs(self.stats_interval_secs)
    }

    pub fn cpu_window(&self) -> Duration {
        Duration::from_millis(self.cpu_sample_millis)
    }

    pub fn fetch_timeout(&self) -> Option<Duration> {
        self.fetch_timeout_secs.map(Duration::from_secs)
    }

    pub fn sink_config(&self) -> SinkConfig {
        SinkConfig {
            endpoint: self.collector_endpoint.clone(),
            request_timeout: Duration::from_secs(self.sink_timeout_secs),
            ..Default::default()
        }
    }
}
