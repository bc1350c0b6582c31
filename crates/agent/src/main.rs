//! Stats Agent - per-node container statistics agent
//!
//! Runs on every node next to the container daemon, periodically reporting
//! host and per-container utilization and relaying lifecycle events to the
//! central collector.

use agent_lib::{
    collector::{CollectionLoopBuilder, SysinfoProbe},
    health::{components, HealthRegistry},
    observability::{AgentMetrics, StructuredLogger},
    relay::EventRelay,
    runtime::{ContainerRuntime, DockerClient},
    sync::{HttpSink, Sink},
};
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod api;
mod config;

const AGENT_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting stats-agent");

    let config = config::AgentConfig::load()?;
    info!(node_name = %config.node_name, "Agent configured");

    let health_registry = HealthRegistry::new();
    health_registry.register(components::STATS_CYCLE).await;
    health_registry.register(components::EVENT_RELAY).await;
    health_registry.register(components::SINK).await;

    let metrics = AgentMetrics::new();
    let logger = StructuredLogger::new(&config.node_name);

    let docker = DockerClient::from_address(&config.docker_host)
        .context("Failed to configure container runtime client")?;
    let runtime_address = docker.host().to_string();
    let runtime: Arc<dyn ContainerRuntime> = Arc::new(docker);

    let http_sink = HttpSink::new(config.sink_config()).context("Failed to create collector client")?;

    // Health and metrics are served while waiting for the collector
    let app_state = Arc::new(api::AppState::new(health_registry.clone(), metrics.clone()));
    let api_port = config.api_port;
    let api_handle = tokio::spawn(async move {
        if let Err(e) = api::serve(api_port, app_state).await {
            error!(error = %e, "API server failed");
        }
    });

    if config.wait_for_collector {
        tokio::select! {
            _ = http_sink.wait_until_ready() => {}
            signal = tokio::signal::ctrl_c() => {
                signal.context("Failed to listen for shutdown signal")?;
                logger.log_shutdown("SIGINT received while waiting for collector");
                api_handle.abort();
                return Ok(());
            }
        }
    }
    let sink: Arc<dyn Sink> = Arc::new(http_sink);

    logger.log_startup(AGENT_VERSION, &runtime_address, &config.collector_endpoint);

    let probe = Arc::new(SysinfoProbe::new(config.disk_path.clone(), config.cpu_window()));
    let collection_loop = CollectionLoopBuilder::new()
        .runtime(Arc::clone(&runtime))
        .sink(Arc::clone(&sink))
        .probe(probe)
        .health(health_registry.clone())
        .logger(logger.clone())
        .interval(config.stats_interval())
        .max_concurrency(config.max_concurrent_fetches)
        .fetch_timeout(config.fetch_timeout())
        .build()?;

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let loop_handle = tokio::spawn(collection_loop.run(shutdown_rx));

    let relay = EventRelay::new(Arc::clone(&runtime), Arc::clone(&sink))
        .with_health(health_registry.clone());
    let mut relay_handle = tokio::spawn(relay.run());

    health_registry.set_ready(true).await;

    tokio::select! {
        outcome = &mut relay_handle => {
            let reason = match outcome {
                Ok(reason) => reason.to_string(),
                Err(e) => format!("event relay task failed: {}", e),
            };
            logger.log_relay_terminated(&reason, metrics.events_relayed());
            let _ = shutdown_tx.send(());
            api_handle.abort();
            anyhow::bail!("Event collector is broken: {}", reason);
        }
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for shutdown signal")?;
            logger.log_shutdown("SIGINT received");
            let _ = shutdown_tx.send(());
            if let Err(e) = loop_handle.await {
                error!(error = %e, "Stats cycle loop failed");
            }
            relay_handle.abort();
            api_handle.abort();
        }
    }

    info!("Shutting down");
    Ok(())
}
