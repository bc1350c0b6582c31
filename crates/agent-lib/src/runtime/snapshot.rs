//! Container stats snapshots
//!
//! [`StatsResponse`] mirrors the body of `GET /containers/{id}/stats`. The
//! daemon reports its OS family out of band, so the raw body is resolved into a
//! [`Snapshot`] variant holding only the fields its derivation needs.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::HashMap;

/// OS family of the daemon that produced a snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OsType {
    #[default]
    Unix,
    Windows,
}

impl OsType {
    /// Parse the `Ostype` response header; anything but `windows` is Unix-like
    pub fn from_header(value: Option<&str>) -> Self {
        match value {
            Some(os) if os.trim().eq_ignore_ascii_case("windows") => OsType::Windows,
            _ => OsType::Unix,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatsResponse {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub read: Option<DateTime<Utc>>,
    #[serde(default)]
    pub preread: Option<DateTime<Utc>>,
    #[serde(default)]
    pub num_procs: u32,
    #[serde(default)]
    pub cpu_stats: RawCpuStats,
    #[serde(default)]
    pub precpu_stats: RawCpuStats,
    #[serde(default)]
    pub memory_stats: RawMemoryStats,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawCpuStats {
    #[serde(default)]
    pub cpu_usage: RawCpuUsage,
    #[serde(default)]
    pub system_cpu_usage: u64,
    #[serde(default)]
    pub online_cpus: u32,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawCpuUsage {
    #[serde(default)]
    pub total_usage: u64,
    #[serde(default)]
    pub percpu_usage: Option<Vec<u64>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawMemoryStats {
    #[serde(default)]
    pub usage: u64,
    #[serde(default)]
    pub limit: u64,
    #[serde(default)]
    pub stats: HashMap<String, u64>,
    #[serde(default)]
    pub privateworkingset: u64,
}

/// Cumulative CPU counters for one period
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CpuCounters {
    pub total_usage: u64,
    pub system_usage: u64,
}

/// Snapshot from a Linux (or other Unix) daemon
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UnixSnapshot {
    pub name: String,
    pub id: String,
    pub cpu: CpuCounters,
    pub pre_cpu: CpuCounters,
    pub online_cpus: u32,
    pub per_cpu_count: usize,
    pub memory_usage: u64,
    /// Page cache bytes; `None` when the runtime did not report a `cache` entry
    pub memory_cache: Option<u64>,
    pub memory_limit: u64,
}

/// Snapshot from a Windows daemon
#[derive(Debug, Clone, PartialEq)]
pub struct WindowsSnapshot {
    pub name: String,
    pub id: String,
    pub read: Option<DateTime<Utc>>,
    pub pre_read: Option<DateTime<Utc>>,
    pub num_procs: u32,
    pub cpu_total: u64,
    pub pre_cpu_total: u64,
    pub private_working_set: u64,
}

/// One point-in-time stats payload, with the runtime's previous-period
/// counters embedded as the delta baseline
#[derive(Debug, Clone, PartialEq)]
pub enum Snapshot {
    Unix(UnixSnapshot),
    Windows(WindowsSnapshot),
}

impl Snapshot {
    pub fn from_response(os: OsType, raw: StatsResponse) -> Self {
        match os {
            OsType::Unix => Snapshot::Unix(UnixSnapshot {
                cpu: CpuCounters {
                    total_usage: raw.cpu_stats.cpu_usage.total_usage,
                    system_usage: raw.cpu_stats.system_cpu_usage,
                },
                pre_cpu: CpuCounters {
                    total_usage: raw.precpu_stats.cpu_usage.total_usage,
                    system_usage: raw.precpu_stats.system_cpu_usage,
                },
                online_cpus: raw.cpu_stats.online_cpus,
                per_cpu_count: raw
                    .cpu_stats
                    .cpu_usage
                    .percpu_usage
                    .as_ref()
                    .map_or(0, Vec::len),
                memory_usage: raw.memory_stats.usage,
                memory_cache: raw.memory_stats.stats.get("cache").copied(),
                memory_limit: raw.memory_stats.limit,
                name: raw.name,
                id: raw.id,
            }),
            OsType::Windows => Snapshot::Windows(WindowsSnapshot {
                read: raw.read,
                pre_read: raw.preread,
                num_procs: raw.num_procs,
                cpu_total: raw.cpu_stats.cpu_usage.total_usage,
                pre_cpu_total: raw.precpu_stats.cpu_usage.total_usage,
                private_working_set: raw.memory_stats.privateworkingset,
                name: raw.name,
                id: raw.id,
            }),
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Snapshot::Unix(s) => &s.id,
            Snapshot::Windows(s) => &s.id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Snapshot::Unix(s) => &s.name,
            Snapshot::Windows(s) => &s.name,
        }
    }
}

/// Decode the first JSON document in `buffered`
///
/// Trailing bytes after the document (a newline, or the start of a second
/// sample on a streaming connection) are ignored.
pub fn decode_stats(buffered: &[u8]) -> Result<StatsResponse, serde_json::Error> {
    let mut documents = serde_json::Deserializer::from_slice(buffered).into_iter::<StatsResponse>();
    match documents.next() {
        Some(result) => result,
        None => serde_json::from_slice::<StatsResponse>(buffered),
    }
}
