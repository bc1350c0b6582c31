//! Core data models for the stats agent
//!
//! Field names follow the collector's wire format, so every record here
//! serializes straight into the STATS payload.

use serde::{Deserialize, Serialize};

/// Per-cycle report for the whole host
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HostReport {
    /// Cluster/node identity reported by the runtime
    pub id: String,
    pub disk: UsageRecord,
    pub cpu: CpuRecord,
    pub memory: UsageRecord,
    /// One record per container enumerated during the cycle, unordered
    #[serde(rename = "tasks")]
    pub containers: Vec<ContainerRecord>,
}

/// Disk or memory usage as reported by the OS
///
/// `used + free` is not required to equal `total`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageRecord {
    pub total: u64,
    pub used: u64,
    pub used_percentage: f64,
    pub free: u64,
}

/// Host CPU utilization averaged across logical cores
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CpuRecord {
    pub used_percentage: f64,
    pub cores: u32,
}

/// Utilization derived from a single container stats snapshot
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerRecord {
    pub name: String,
    pub id: String,
    pub cpu_percentage: f64,
    pub memory: f64,
    pub memory_limit: f64,
    pub memory_percentage: f64,
}

impl ContainerRecord {
    /// Zero-valued record that still identifies the container
    pub fn zeroed(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: id.into(),
            ..Default::default()
        }
    }
}

/// Raw lifecycle event from the runtime, forwarded without interpretation
pub type LifecycleEvent = serde_json::Value;

/// Kind of payload handed to a sink
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PayloadKind {
    Stats,
    Event,
}

impl PayloadKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PayloadKind::Stats => "STATS",
            PayloadKind::Event => "EVENT",
        }
    }
}

impl std::fmt::Display for PayloadKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload accepted by a sink
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Payload {
    Stats(HostReport),
    Event(LifecycleEvent),
}

impl Payload {
    pub fn kind(&self) -> PayloadKind {
        match self {
            Payload::Stats(_) => PayloadKind::Stats,
            Payload::Event(_) => PayloadKind::Event,
        }
    }
}
