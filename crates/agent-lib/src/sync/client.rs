//! HTTP client for the remote collector
//!
//! Payloads are posted as `{"type": "STATS" | "EVENT", "payload": ...}` to the
//! collector's ingest path. Before the agent starts it can block on the
//! collector's health endpoint, retrying with exponential backoff.

use super::{Sink, SinkError};
use crate::models::{Payload, PayloadKind};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

const INGEST_PATH: &str = "api/agent/events";
const HEALTH_PATH: &str = "health";

/// Configuration for the collector client
#[derive(Debug, Clone)]
pub struct SinkConfig {
    /// Collector base URL (e.g. "http://collector:8080")
    pub endpoint: String,
    /// Request timeout
    pub request_timeout: Duration,
    /// Initial backoff while waiting for the collector
    pub initial_backoff: Duration,
    /// Maximum backoff while waiting for the collector
    pub max_backoff: Duration,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://collector:8080".to_string(),
            request_timeout: Duration::from_secs(30),
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(30),
        }
    }
}

#[derive(Serialize)]
struct Envelope<'a> {
    #[serde(rename = "type")]
    kind: PayloadKind,
    payload: &'a Payload,
}

/// [`Sink`] posting payloads to the collector over HTTP
#[derive(Debug, Clone)]
pub struct HttpSink {
    client: Client,
    config: SinkConfig,
    ingest_url: Url,
    health_url: Url,
}

impl HttpSink {
    pub fn new(config: SinkConfig) -> Result<Self, SinkError> {
        let client = Client::builder().timeout(config.request_timeout).build()?;

        // Keep any base path of the endpoint when joining
        let mut base = Url::parse(&config.endpoint)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let ingest_url = base.join(INGEST_PATH)?;
        let health_url = base.join(HEALTH_PATH)?;

        Ok(Self {
            client,
            config,
            ingest_url,
            health_url,
        })
    }

    pub fn ingest_url(&self) -> &Url {
        &self.ingest_url
    }

    pub fn health_url(&self) -> &Url {
        &self.health_url
    }

    /// Single health probe; true on a 2xx response
    pub async fn is_ready(&self) -> bool {
        match self.client.get(self.health_url.clone()).send().await {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                debug!(status = %response.status(), "Collector not ready");
                false
            }
            Err(e) => {
                debug!(error = %e, "Collector unreachable");
                false
            }
        }
    }

    /// Block until the collector reports healthy
    pub async fn wait_until_ready(&self) {
        let mut backoff = self.config.initial_backoff;
        let mut attempts = 0u32;

        info!(url = %self.health_url, "Waiting for collector");
        loop {
            attempts += 1;
            if self.is_ready().await {
                info!(attempts = attempts, "Collector is ready");
                return;
            }

            warn!(
                attempts = attempts,
                next_backoff_secs = backoff.as_secs_f64(),
                "Collector not ready, retrying"
            );
            tokio::time::sleep(backoff).await;
            backoff = std::cmp::min(backoff * 2, self.config.max_backoff);
        }
    }
}

#[async_trait]
impl Sink for HttpSink {
    async fn send(&self, payload: Payload) -> Result<(), SinkError> {
        let envelope = Envelope {
            kind: payload.kind(),
            payload: &payload,
        };

        let response = self
            .client
            .post(self.ingest_url.clone())
            .json(&envelope)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(SinkError::Rejected { status, body });
        }

        debug!(kind = %envelope.kind, "Payload delivered");
        Ok(())
    }
}
