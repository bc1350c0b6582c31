//! Shared fakes for unit tests

use crate::collector::{HostMetricError, HostProbe};
use crate::models::{LifecycleEvent, Payload, UsageRecord};
use crate::runtime::{
    ContainerRuntime, ContainerSummary, CpuCounters, EventSubscription, NodeInfo, RuntimeError,
    Snapshot, UnixSnapshot,
};
use crate::sync::{Sink, SinkError};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

/// Snapshot yielding 200% CPU, 800 bytes memory and 40% of the limit
pub fn unix_snapshot(id: &str) -> Snapshot {
    Snapshot::Unix(UnixSnapshot {
        name: format!("/{}", id),
        id: id.to_string(),
        cpu: CpuCounters {
            total_usage: 200,
            system_usage: 500,
        },
        pre_cpu: CpuCounters {
            total_usage: 100,
            system_usage: 300,
        },
        online_cpus: 4,
        per_cpu_count: 4,
        memory_usage: 1000,
        memory_cache: Some(200),
        memory_limit: 2000,
    })
}

/// In-memory runtime with configurable failures
#[derive(Default)]
pub struct MockRuntime {
    pub containers: Vec<ContainerSummary>,
    pub failing: HashSet<String>,
    pub panicking: HashSet<String>,
    pub hanging: HashSet<String>,
    pub fail_list: bool,
    pub fail_info: bool,
    pub stats_delay: Option<Duration>,
    pub subscription: Mutex<Option<EventSubscription>>,
    pub in_flight: std::sync::atomic::AtomicUsize,
    pub max_in_flight: std::sync::atomic::AtomicUsize,
}

impl MockRuntime {
    pub fn with_containers(count: usize) -> Self {
        Self {
            containers: (0..count)
                .map(|i| ContainerSummary {
                    id: format!("c{}", i),
                    name: format!("/c{}", i),
                })
                .collect(),
            ..Default::default()
        }
    }

    pub fn failing(mut self, id: &str) -> Self {
        self.failing.insert(id.to_string());
        self
    }

    pub fn panicking(mut self, id: &str) -> Self {
        self.panicking.insert(id.to_string());
        self
    }

    pub fn hanging(mut self, id: &str) -> Self {
        self.hanging.insert(id.to_string());
        self
    }

    /// Attach an event subscription and return its producer ends
    pub fn with_events(
        self,
    ) -> (
        Self,
        mpsc::Sender<LifecycleEvent>,
        oneshot::Sender<Result<(), RuntimeError>>,
    ) {
        let (message_tx, messages) = mpsc::channel(16);
        let (error_tx, errors) = oneshot::channel();
        *self.subscription.lock().unwrap() = Some(EventSubscription { messages, errors });
        (self, message_tx, error_tx)
    }
}

#[async_trait]
impl ContainerRuntime for MockRuntime {
    async fn list_containers(&self) -> Result<Vec<ContainerSummary>, RuntimeError> {
        if self.fail_list {
            return Err(RuntimeError::Status {
                status: 500,
                message: "daemon unavailable".to_string(),
            });
        }
        Ok(self.containers.clone())
    }

    async fn container_stats(&self, id: &str) -> Result<Snapshot, RuntimeError> {
        use std::sync::atomic::Ordering;

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        if let Some(delay) = self.stats_delay {
            tokio::time::sleep(delay).await;
        }
        if self.hanging.contains(id) {
            std::future::pending::<()>().await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.panicking.contains(id) {
            panic!("stats decoder crashed for {}", id);
        }
        if self.failing.contains(id) {
            return Err(RuntimeError::NotFound(id.to_string()));
        }
        Ok(unix_snapshot(id))
    }

    async fn events(&self) -> Result<EventSubscription, RuntimeError> {
        self.subscription
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| RuntimeError::Status {
                status: 500,
                message: "events unavailable".to_string(),
            })
    }

    async fn node_info(&self) -> Result<NodeInfo, RuntimeError> {
        if self.fail_info {
            return Err(RuntimeError::Status {
                status: 500,
                message: "info unavailable".to_string(),
            });
        }
        Ok(NodeInfo {
            id: "node-1".to_string(),
            cpus: 4,
        })
    }
}

/// Sink recording every payload it receives
#[derive(Default)]
pub struct RecordingSink {
    pub payloads: Mutex<Vec<Payload>>,
    pub fail: bool,
}

impl RecordingSink {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn payloads(&self) -> Vec<Payload> {
        self.payloads.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sink for RecordingSink {
    async fn send(&self, payload: Payload) -> Result<(), SinkError> {
        self.payloads.lock().unwrap().push(payload);
        if self.fail {
            return Err(SinkError::Rejected {
                status: 503,
                body: "collector down".to_string(),
            });
        }
        Ok(())
    }
}

/// Host probe with fixed readings and optional failures
#[derive(Default)]
pub struct StaticProbe {
    pub fail_all: bool,
}

#[async_trait]
impl HostProbe for StaticProbe {
    async fn disk_usage(&self) -> Result<UsageRecord, HostMetricError> {
        if self.fail_all {
            return Err(HostMetricError::DiskNotFound("/".into()));
        }
        Ok(UsageRecord {
            total: 100,
            used: 50,
            used_percentage: 50.0,
            free: 50,
        })
    }

    async fn cpu_percentages(&self) -> Result<Vec<f64>, HostMetricError> {
        if self.fail_all {
            return Err(HostMetricError::NoCpus);
        }
        Ok(vec![20.0, 40.0])
    }

    async fn virtual_memory(&self) -> Result<UsageRecord, HostMetricError> {
        if self.fail_all {
            return Err(HostMetricError::MemoryUnavailable);
        }
        Ok(UsageRecord {
            total: 1000,
            used: 100,
            used_percentage: 10.0,
            free: 900,
        })
    }
}
