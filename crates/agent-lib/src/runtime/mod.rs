//! Container runtime capability surface
//!
//! The agent only needs four things from a runtime: the live container list,
//! a one-shot stats snapshot per container, the lifecycle event feed and the
//! node identity. [`DockerClient`] provides them over the Docker Engine API.

mod docker;
mod snapshot;
mod transport;

pub use docker::DockerClient;
pub use snapshot::{
    decode_stats, CpuCounters, OsType, Snapshot, StatsResponse, UnixSnapshot, WindowsSnapshot,
};
pub use transport::DockerHost;

use crate::models::LifecycleEvent;
use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

/// Errors returned by the container runtime
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("invalid runtime address `{0}`")]
    InvalidHost(String),
    #[error("failed to connect to `{address}`: {source}")]
    Connect {
        address: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to build request: {0}")]
    Request(#[from] hyper::http::Error),
    #[error("http transport error: {0}")]
    Http(#[from] hyper::Error),
    #[error("no such container: {0}")]
    NotFound(String),
    #[error("runtime returned status {status}: {message}")]
    Status { status: u16, message: String },
    #[error("failed to decode runtime response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("event line exceeds {limit} bytes without a newline")]
    EventTooLarge { limit: usize },
    #[error("request timed out after {0:?}")]
    Timeout(std::time::Duration),
}

/// A container as seen at enumeration time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSummary {
    pub id: String,
    pub name: String,
}

/// Node identity and size
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeInfo {
    pub id: String,
    pub cpus: u32,
}

/// Live subscription to the lifecycle event feed
///
/// `errors` resolves once: `Ok(())` when the feed reached end-of-stream,
/// `Err(_)` on a transport or decode failure.
pub struct EventSubscription {
    pub messages: mpsc::Receiver<LifecycleEvent>,
    pub errors: oneshot::Receiver<Result<(), RuntimeError>>,
}

/// Capabilities the agent requires from a container runtime
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// List running containers
    async fn list_containers(&self) -> Result<Vec<ContainerSummary>, RuntimeError>;

    /// Fetch one stats snapshot for a container
    async fn container_stats(&self, id: &str) -> Result<Snapshot, RuntimeError>;

    /// Subscribe to the lifecycle event feed
    async fn events(&self) -> Result<EventSubscription, RuntimeError>;

    /// Node identity and logical CPU count
    async fn node_info(&self) -> Result<NodeInfo, RuntimeError>;
}
