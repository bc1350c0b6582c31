//! Delivery of STATS and EVENT payloads to the remote collector
//!
//! This module provides:
//! - the [`Sink`] seam shared by the stats scheduler and the event relay
//! - an HTTP client for the collector, including a readiness wait

mod client;

pub use client::{HttpSink, SinkConfig};

use crate::models::Payload;
use async_trait::async_trait;

/// Errors returned by a sink
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("invalid collector endpoint: {0}")]
    InvalidEndpoint(#[from] url::ParseError),
    #[error("failed to reach collector: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("collector rejected payload ({status}): {body}")]
    Rejected { status: u16, body: String },
}

/// Delivery target for agent payloads
#[async_trait]
pub trait Sink: Send + Sync {
    async fn send(&self, payload: Payload) -> Result<(), SinkError>;
}
