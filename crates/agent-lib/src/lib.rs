//! Agent library for per-node container statistics
//!
//! This crate provides the core functionality for:
//! - Container runtime access (Docker Engine API)
//! - Per-container utilization derived from stats snapshots
//! - Host disk, CPU and memory sampling
//! - Periodic fan-out collection and delivery to a sink
//! - Lifecycle event relaying
//! - Health checks and observability

pub mod collector;
pub mod health;
pub mod models;
pub mod observability;
pub mod relay;
pub mod runtime;
pub mod sync;

#[cfg(test)]
pub(crate) mod test_support;

pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::{AgentMetrics, StructuredLogger};
pub use relay::{EventRelay, RelayError};
