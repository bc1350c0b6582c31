//! Stats collection
//!
//! Turns raw runtime snapshots into container records, samples host-level
//! disk, CPU and memory, fans out over all live containers each cycle and
//! drives the periodic cycle loop that delivers reports to the sink.

mod derive;
mod fanout;
mod host;
mod r#loop;


pub use derive::{
    cpu_percent_unix, cpu_percent_windows, derive_record, memory_percent, memory_usage_no_cache,
};
pub use fanout::{FanOutCollector, FanOutConfig};
pub use host::{default_disk_path, mean_cpu_percent, HostMetricError, HostProbe, HostSampler, SysinfoProbe};
pub use r#loop::{CollectionConfig, CollectionLoop, CollectionLoopBuilder};
