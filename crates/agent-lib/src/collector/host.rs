//! Host metric samplers
//!
//! Disk, CPU and memory are read independently through a [`HostProbe`]. A
//! failed read degrades to a zero-valued record for that metric only.

use crate::models::{CpuRecord, UsageRecord};
use crate::observability::AgentMetrics;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use sysinfo::{Disks, System};
use tracing::warn;

/// Errors from host OS queries
#[derive(Debug, thiserror::Error)]
pub enum HostMetricError {
    #[error("no mounted disk found for `{0}`")]
    DiskNotFound(PathBuf),
    #[error("no CPU information available")]
    NoCpus,
    #[error("memory information unavailable")]
    MemoryUnavailable,
}

/// Source of raw host readings
#[async_trait]
pub trait HostProbe: Send + Sync {
    /// Usage of the filesystem holding the configured root path
    async fn disk_usage(&self) -> Result<UsageRecord, HostMetricError>;

    /// Per-core utilization percentages over one sampling window
    async fn cpu_percentages(&self) -> Result<Vec<f64>, HostMetricError>;

    /// Virtual memory usage
    async fn virtual_memory(&self) -> Result<UsageRecord, HostMetricError>;
}

/// Default root path for disk usage on this OS
pub fn default_disk_path() -> PathBuf {
    if cfg!(windows) {
        PathBuf::from("C:\\")
    } else {
        PathBuf::from("/")
    }
}

/// [`HostProbe`] backed by `sysinfo`
pub struct SysinfoProbe {
    disk_path: PathBuf,
    cpu_window: Duration,
}

impl Default for SysinfoProbe {
    fn default() -> Self {
        Self::new(default_disk_path(), sysinfo::MINIMUM_CPU_UPDATE_INTERVAL)
    }
}

impl SysinfoProbe {
    /// The CPU window is raised to the shortest interval `sysinfo` can measure
    pub fn new(disk_path: impl Into<PathBuf>, cpu_window: Duration) -> Self {
        Self {
            disk_path: disk_path.into(),
            cpu_window: cpu_window.max(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL),
        }
    }

    pub fn disk_path(&self) -> &Path {
        &self.disk_path
    }

    pub fn cpu_window(&self) -> Duration {
        self.cpu_window
    }
}

#[async_trait]
impl HostProbe for SysinfoProbe {
    async fn disk_usage(&self) -> Result<UsageRecord, HostMetricError> {
        let disks = Disks::new_with_refreshed_list();

        // Deepest mount point containing the path
        let disk = disks
            .list()
            .iter()
            .filter(|disk| self.disk_path.starts_with(disk.mount_point()))
            .max_by_key(|disk| disk.mount_point().as_os_str().len())
            .ok_or_else(|| HostMetricError::DiskNotFound(self.disk_path.clone()))?;

        let total = disk.total_space();
        if total == 0 {
            return Err(HostMetricError::DiskNotFound(self.disk_path.clone()));
        }
        let free = disk.available_space();
        let used = total.saturating_sub(free);

        Ok(UsageRecord {
            total,
            used,
            used_percentage: used as f64 / total as f64 * 100.0,
            free,
        })
    }

    async fn cpu_percentages(&self) -> Result<Vec<f64>, HostMetricError> {
        let mut system = System::new();
        system.refresh_cpu_usage();
        tokio::time::sleep(self.cpu_window).await;
        system.refresh_cpu_usage();

        let percentages: Vec<f64> = system
            .cpus()
            .iter()
            .map(|cpu| cpu.cpu_usage() as f64)
            .collect();

        if percentages.is_empty() {
            return Err(HostMetricError::NoCpus);
        }
        Ok(percentages)
    }

    async fn virtual_memory(&self) -> Result<UsageRecord, HostMetricError> {
        let mut system = System::new();
        system.refresh_memory();

        let total = system.total_memory();
        if total == 0 {
            return Err(HostMetricError::MemoryUnavailable);
        }
        let used = system.used_memory();

        Ok(UsageRecord {
            total,
            used,
            used_percentage: used as f64 / total as f64 * 100.0,
            free: system.free_memory(),
        })
    }
}

/// Arithmetic mean of per-core samples
pub fn mean_cpu_percent(percentages: &[f64]) -> f64 {
    if percentages.is_empty() {
        return 0.0;
    }
    percentages.iter().sum::<f64>() / percentages.len() as f64
}

/// Runs the three host samplers, absorbing failures
#[derive(Clone)]
pub struct HostSampler {
    probe: Arc<dyn HostProbe>,
    metrics: AgentMetrics,
}

impl HostSampler {
    pub fn new(probe: Arc<dyn HostProbe>) -> Self {
        Self {
            probe,
            metrics: AgentMetrics::new(),
        }
    }

    pub async fn disk(&self) -> UsageRecord {
        self.probe.disk_usage().await.unwrap_or_else(|e| {
            warn!(metric = "disk", error = %e, "Host metric unavailable");
            self.metrics.inc_host_metric_errors("disk");
            UsageRecord::default()
        })
    }

    /// `cores` is the logical CPU count reported by the runtime
    pub async fn cpu(&self, cores: u32) -> CpuRecord {
        match self.probe.cpu_percentages().await {
            Ok(percentages) => CpuRecord {
                used_percentage: mean_cpu_percent(&percentages),
                cores,
            },
            Err(e) => {
                warn!(metric = "cpu", error = %e, "Host metric unavailable");
                self.metrics.inc_host_metric_errors("cpu");
                CpuRecord::default()
            }
        }
    }

    pub async fn memory(&self) -> UsageRecord {
        self.probe.virtual_memory().await.unwrap_or_else(|e| {
            warn!(metric = "memory", error = %e, "Host metric unavailable");
            self.metrics.inc_host_metric_errors("memory");
            UsageRecord::default()
        })
    }

    /// Sample disk, CPU and memory concurrently
    pub async fn sample(&self, cores: u32) -> (UsageRecord, CpuRecord, UsageRecord) {
        tokio::join!(self.disk(), self.cpu(cores), self.memory())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Probe with independently failing metrics
    #[derive(Default)]
    struct MockProbe {
        fail_disk: bool,
        fail_cpu: bool,
        fail_memory: bool,
    }

    #[async_trait]
    impl HostProbe for MockProbe {
        async fn disk_usage(&self) -> Result<UsageRecord, HostMetricError> {
            if self.fail_disk {
                return Err(HostMetricError::DiskNotFound(PathBuf::from("/")));
            }
            Ok(UsageRecord {
                total: 100,
                used: 60,
                used_percentage: 60.0,
                free: 40,
            })
        }

        async fn cpu_percentages(&self) -> Result<Vec<f64>, HostMetricError> {
            if self.fail_cpu {
                return Err(HostMetricError::NoCpus);
            }
            Ok(vec![10.0, 20.0, 30.0, 40.0])
        }

        async fn virtual_memory(&self) -> Result<UsageRecord, HostMetricError> {
            if self.fail_memory {
                return Err(HostMetricError::MemoryUnavailable);
            }
            Ok(UsageRecord {
                total: 1000,
                used: 250,
                used_percentage: 25.0,
                free: 750,
            })
        }
    }

    #[test]
    fn test_mean_cpu_percent() {
        assert_eq!(mean_cpu_percent(&[10.0, 20.0, 30.0, 40.0]), 25.0);
        assert_eq!(mean_cpu_percent(&[]), 0.0);
    }

    #[tokio::test]
    async fn test_sample_all_metrics() {
        let sampler = HostSampler::new(Arc::new(MockProbe::default()));
        let (disk, cpu, memory) = sampler.sample(4).await;

        assert_eq!(disk.used, 60);
        assert_eq!(cpu.used_percentage, 25.0);
        assert_eq!(cpu.cores, 4);
        assert_eq!(memory.used_percentage, 25.0);
    }

    #[tokio::test]
    async fn test_each_failure_is_isolated() {
        let sampler = HostSampler::new(Arc::new(MockProbe {
            fail_disk: true,
            ..Default::default()
        }));
        let (disk, cpu, memory) = sampler.sample(4).await;
        assert_eq!(disk, UsageRecord::default());
        assert_eq!(cpu.used_percentage, 25.0);
        assert_eq!(memory.total, 1000);

        let sampler = HostSampler::new(Arc::new(MockProbe {
            fail_cpu: true,
            ..Default::default()
        }));
        let (disk, cpu, memory) = sampler.sample(4).await;
        assert_eq!(disk.total, 100);
        assert_eq!(cpu, CpuRecord::default());
        assert_eq!(memory.total, 1000);

        let sampler = HostSampler::new(Arc::new(MockProbe {
            fail_memory: true,
            ..Default::default()
        }));
        let (disk, cpu, memory) = sampler.sample(4).await;
        assert_eq!(disk.total, 100);
        assert_eq!(cpu.cores, 4);
        assert_eq!(memory, UsageRecord::default());
    }

    #[tokio::test]
    async fn test_all_failures_yield_zero_records() {
        let sampler = HostSampler::new(Arc::new(MockProbe {
            fail_disk: true,
            fail_cpu: true,
            fail_memory: true,
        }));
        let (disk, cpu, memory) = sampler.sample(8).await;

        assert_eq!(disk, UsageRecord::default());
        assert_eq!(cpu, CpuRecord::default());
        assert_eq!(memory, UsageRecord::default());
    }

    #[test]
    fn test_sysinfo_probe_window_is_clamped() {
        let probe = SysinfoProbe::new("/", Duration::from_millis(1));
        assert_eq!(probe.cpu_window(), sysinfo::MINIMUM_CPU_UPDATE_INTERVAL);
        assert_eq!(probe.disk_path(), Path::new("/"));
    }

    #[tokio::test]
    async fn test_sysinfo_probe_reads_memory() {
        let probe = SysinfoProbe::default();
        let memory = probe.virtual_memory().await.unwrap();
        assert!(memory.total > 0);
        assert!(memory.used_percentage >= 0.0 && memory.used_percentage <= 100.0);
    }
}
