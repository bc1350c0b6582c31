//! Per-container utilization derived from one stats snapshot
//!
//! The runtime embeds the previous period's counters in every snapshot, so a
//! single sample is enough to compute a delta; nothing is kept between cycles.

use crate::models::ContainerRecord;
use crate::runtime::{CpuCounters, Snapshot, UnixSnapshot, WindowsSnapshot};
use chrono::{DateTime, Utc};

/// CPU percentage for a Unix daemon
///
/// `online_cpus` falls back to the per-core array length when the runtime
/// reports zero online CPUs. The result can exceed 100 on multi-core hosts.
pub fn cpu_percent_unix(
    current: &CpuCounters,
    previous: &CpuCounters,
    online_cpus: u32,
    per_cpu_count: usize,
) -> f64 {
    let cpu_delta = current.total_usage as f64 - previous.total_usage as f64;
    let system_delta = current.system_usage as f64 - previous.system_usage as f64;
    let online_cpus = if online_cpus == 0 {
        per_cpu_count as f64
    } else {
        online_cpus as f64
    };

    if system_delta > 0.0 && cpu_delta > 0.0 {
        (cpu_delta / system_delta) * online_cpus * 100.0
    } else {
        0.0
    }
}

/// CPU percentage for a Windows daemon
///
/// Windows counters are in 100ns intervals, so the elapsed wall time between
/// the two reads is converted to the same unit and scaled by processor count.
pub fn cpu_percent_windows(
    read: Option<DateTime<Utc>>,
    pre_read: Option<DateTime<Utc>>,
    num_procs: u32,
    current_total: u64,
    previous_total: u64,
) -> f64 {
    let elapsed_nanos = match (read, pre_read) {
        (Some(read), Some(pre_read)) => (read - pre_read).num_nanoseconds().unwrap_or(0),
        _ => 0,
    };
    let possible_intervals = (elapsed_nanos.max(0) as u64 / 100).saturating_mul(num_procs as u64);
    let used_intervals = current_total.saturating_sub(previous_total);

    if possible_intervals > 0 {
        used_intervals as f64 / possible_intervals as f64 * 100.0
    } else {
        0.0
    }
}

/// Memory usage excluding page cache; a missing cache entry counts as zero
pub fn memory_usage_no_cache(usage: u64, cache: Option<u64>) -> f64 {
    usage.saturating_sub(cache.unwrap_or(0)) as f64
}

/// Memory usage as a percentage of the limit, zero when there is no limit
pub fn memory_percent(limit: f64, used: f64) -> f64 {
    if limit != 0.0 {
        used / limit * 100.0
    } else {
        0.0
    }
}

fn derive_unix(snapshot: &UnixSnapshot) -> ContainerRecord {
    let memory = memory_usage_no_cache(snapshot.memory_usage, snapshot.memory_cache);
    let memory_limit = snapshot.memory_limit as f64;

    ContainerRecord {
        name: snapshot.name.clone(),
        id: snapshot.id.clone(),
        cpu_percentage: cpu_percent_unix(
            &snapshot.cpu,
            &snapshot.pre_cpu,
            snapshot.online_cpus,
            snapshot.per_cpu_count,
        ),
        memory,
        memory_limit,
        memory_percentage: memory_percent(memory_limit, memory),
    }
}

fn derive_windows(snapshot: &WindowsSnapshot) -> ContainerRecord {
    ContainerRecord {
        name: snapshot.name.clone(),
        id: snapshot.id.clone(),
        cpu_percentage: cpu_percent_windows(
            snapshot.read,
            snapshot.pre_read,
            snapshot.num_procs,
            snapshot.cpu_total,
            snapshot.pre_cpu_total,
        ),
        memory: snapshot.private_working_set as f64,
        memory_limit: 0.0,
        memory_percentage: 0.0,
    }
}

/// Derive a container record from one snapshot
pub fn derive_record(snapshot: &Snapshot) -> ContainerRecord {
    match snapshot {
        Snapshot::Unix(unix) => derive_unix(unix),
        Snapshot::Windows(windows) => derive_windows(windows),
    }
}
