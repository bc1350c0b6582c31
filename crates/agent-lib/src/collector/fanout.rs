//! Concurrent per-container stats collection
//!
//! Every cycle enumerates the live containers, fetches one snapshot per
//! container on its own task and joins all of them before returning. The
//! result always holds exactly one record per enumerated container.

use super::derive::derive_record;
use crate::models::ContainerRecord;
use crate::observability::AgentMetrics;
use crate::runtime::{ContainerRuntime, ContainerSummary, RuntimeError};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Semaphore};
use tracing::{debug, warn};

/// Limits applied to one fan-out
///
/// The defaults impose no limits: one task per container and no timeout, so a
/// hung stats call holds up the whole cycle.
#[derive(Debug, Clone, Default)]
pub struct FanOutConfig {
    /// Maximum number of stats fetches in flight
    pub max_concurrency: Option<usize>,
    /// Upper bound on a single stats fetch
    pub fetch_timeout: Option<Duration>,
}

/// Collects container records from a runtime
#[derive(Clone)]
pub struct FanOutCollector {
    runtime: Arc<dyn ContainerRuntime>,
    config: FanOutConfig,
    metrics: AgentMetrics,
}

impl FanOutCollector {
    pub fn new(runtime: Arc<dyn ContainerRuntime>, config: FanOutConfig) -> Self {
        Self {
            runtime,
            config,
            metrics: AgentMetrics::new(),
        }
    }

    /// Enumerate live containers and collect one record each
    ///
    /// A failed enumeration yields an empty list.
    pub async fn collect(&self) -> Vec<ContainerRecord> {
        match self.runtime.list_containers().await {
            Ok(containers) => self.collect_containers(containers).await,
            Err(e) => {
                warn!(error = %e, "Cannot obtain container list");
                self.metrics.set_containers_monitored(0);
                Vec::new()
            }
        }
    }

    /// Collect one record per container concurrently
    pub async fn collect_containers(&self, containers: Vec<ContainerSummary>) -> Vec<ContainerRecord> {
        let count = containers.len();
        let records = Arc::new(Mutex::new(Vec::with_capacity(count)));
        let limiter = self
            .config
            .max_concurrency
            .map(|limit| Arc::new(Semaphore::new(limit.max(1))));

        let mut handles = Vec::with_capacity(count);
        for container in containers {
            let runtime = Arc::clone(&self.runtime);
            let records = Arc::clone(&records);
            let limiter = limiter.clone();
            let timeout = self.config.fetch_timeout;
            let metrics = self.metrics.clone();
            let summary = container.clone();

            let handle = tokio::spawn(async move {
                let _permit = match limiter {
                    Some(semaphore) => semaphore.acquire_owned().await.ok(),
                    None => None,
                };
                let record = container_record(runtime.as_ref(), &container, timeout, &metrics).await;
                records.lock().await.push(record);
            });
            handles.push((summary, handle));
        }

        for (container, handle) in handles {
            if let Err(e) = handle.await {
                warn!(
                    container_id = %container.id,
                    error = %e,
                    "Stats task failed"
                );
                self.metrics.inc_container_fetch_errors();
                records
                    .lock()
                    .await
                    .push(ContainerRecord::zeroed(container.id, container.name));
            }
        }

        self.metrics.set_containers_monitored(count as i64);
        let collected = std::mem::take(&mut *records.lock().await);
        collected
    }
}

/// Fetch and derive one container's record; failures produce a zero record
async fn container_record(
    runtime: &dyn ContainerRuntime,
    container: &ContainerSummary,
    timeout: Option<Duration>,
    metrics: &AgentMetrics,
) -> ContainerRecord {
    let fetch = runtime.container_stats(&container.id);
    let result = match timeout {
        Some(limit) => tokio::time::timeout(limit, fetch)
            .await
            .unwrap_or(Err(RuntimeError::Timeout(limit))),
        None => fetch.await,
    };

    match result {
        Ok(snapshot) => {
            let mut record = derive_record(&snapshot);
            if record.id.is_empty() {
                record.id = container.id.clone();
            }
            if record.name.is_empty() {
                record.name = container.name.clone();
            }
            debug!(
                container_id = %record.id,
                cpu_percentage = record.cpu_percentage,
                memory_percentage = record.memory_percentage,
                "Derived container stats"
            );
            record
        }
        Err(e) => {
            warn!(
                container_id = %container.id,
                error = %e,
                "Statistics fetching failed"
            );
            metrics.inc_container_fetch_errors();
            ContainerRecord::zeroed(container.id.clone(), container.name.clone())
        }
    }
}
