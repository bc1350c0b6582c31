//! Docker Engine API client

use super::snapshot::{decode_stats, OsType, Snapshot};
use super::transport::DockerHost;
use super::{ContainerRuntime, ContainerSummary, EventSubscription, NodeInfo, RuntimeError};
use crate::models::LifecycleEvent;
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use http_body_util::{BodyExt, Empty};
use hyper::body::Incoming;
use hyper::header::{HOST, USER_AGENT};
use hyper::{Request, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

const AGENT_USER_AGENT: &str = concat!("stats-agent/", env!("CARGO_PKG_VERSION"));

/// Capacity of the event message channel
const EVENT_BUFFER: usize = 256;

/// Longest event line buffered before the stream is abandoned
const MAX_EVENT_LINE_BYTES: usize = 1024 * 1024;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ContainerListEntry {
    id: String,
    #[serde(default)]
    names: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct InfoResponse {
    #[serde(rename = "ID", default)]
    id: String,
    #[serde(rename = "NCPU", default)]
    ncpu: u32,
    #[serde(rename = "Swarm", default)]
    swarm: SwarmInfo,
}

#[derive(Debug, Default, Deserialize)]
struct SwarmInfo {
    #[serde(rename = "NodeID", default)]
    node_id: String,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorResponse {
    #[serde(default)]
    message: String,
}

/// Client for a Docker daemon
#[derive(Debug, Clone)]
pub struct DockerClient {
    host: DockerHost,
}

impl DockerClient {
    pub fn new(host: DockerHost) -> Self {
        Self { host }
    }

    /// Create a client from a `DOCKER_HOST` style address
    pub fn from_address(address: &str) -> Result<Self, RuntimeError> {
        Ok(Self::new(DockerHost::parse(address)?))
    }

    pub fn host(&self) -> &DockerHost {
        &self.host
    }

    /// Issue a GET and fail on non-2xx responses
    async fn get(&self, path: &str) -> Result<Response<Incoming>, RuntimeError> {
        let request = Request::get(path)
            .header(HOST, self.host.host_header())
            .header(USER_AGENT, AGENT_USER_AGENT)
            .body(Empty::<Bytes>::new())?;

        let response = self.host.send(request).await?;
        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let body = response.into_body().collect().await?.to_bytes();
        let message = serde_json::from_slice::<ErrorResponse>(&body)
            .map(|e| e.message)
            .unwrap_or_else(|_| String::from_utf8_lossy(&body).trim().to_string());

        if status == hyper::StatusCode::NOT_FOUND {
            Err(RuntimeError::NotFound(message))
        } else {
            Err(RuntimeError::Status {
                status: status.as_u16(),
                message,
            })
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, RuntimeError> {
        let body = self.get(path).await?.into_body().collect().await?.to_bytes();
        Ok(serde_json::from_slice(&body)?)
    }
}

/// Next data chunk of a body, skipping trailer frames
async fn next_chunk(body: &mut Incoming) -> Result<Option<Bytes>, hyper::Error> {
    while let Some(frame) = body.frame().await {
        if let Ok(data) = frame?.into_data() {
            return Ok(Some(data));
        }
    }
    Ok(None)
}

/// Read newline-delimited events until the body ends or the receiver goes away
async fn pump_events(
    mut body: Incoming,
    messages: &mpsc::Sender<LifecycleEvent>,
) -> Result<(), RuntimeError> {
    let mut pending = BytesMut::new();

    while let Some(chunk) = next_chunk(&mut body).await? {
        pending.extend_from_slice(&chunk);

        while let Some(newline) = pending.iter().position(|b| *b == b'\n') {
            let line = pending.split_to(newline + 1);
            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            let event: LifecycleEvent = serde_json::from_slice(&line)?;
            if messages.send(event).await.is_err() {
                debug!("Event receiver dropped, closing subscription");
                return Ok(());
            }
        }

        if pending.len() > MAX_EVENT_LINE_BYTES {
            return Err(RuntimeError::EventTooLarge {
                limit: MAX_EVENT_LINE_BYTES,
            });
        }
    }

    if !pending.iter().all(u8::is_ascii_whitespace) {
        let event: LifecycleEvent = serde_json::from_slice(&pending)?;
        let _ = messages.send(event).await;
    }

    Ok(())
}

#[async_trait]
impl ContainerRuntime for DockerClient {
    async fn list_containers(&self) -> Result<Vec<ContainerSummary>, RuntimeError> {
        let entries: Vec<ContainerListEntry> = self.get_json("/containers/json").await?;

        Ok(entries
            .into_iter()
            .map(|entry| ContainerSummary {
                name: entry.names.into_iter().next().unwrap_or_default(),
                id: entry.id,
            })
            .collect())
    }

    async fn container_stats(&self, id: &str) -> Result<Snapshot, RuntimeError> {
        let response = self
            .get(&format!("/containers/{}/stats?stream=false", id))
            .await?;
        let os = OsType::from_header(
            response
                .headers()
                .get("ostype")
                .and_then(|value| value.to_str().ok()),
        );

        let mut body = response.into_body();
        let mut buffered = BytesMut::new();
        if let Some(chunk) = next_chunk(&mut body).await? {
            buffered.extend_from_slice(&chunk);
        }

        let raw = match decode_stats(&buffered) {
            Ok(raw) => raw,
            Err(e) => {
                debug!(
                    container_id = %id,
                    buffered_bytes = buffered.len(),
                    error = %e,
                    "Stats body incomplete, re-reading with remaining stream"
                );
                let remaining = body.collect().await?.to_bytes();
                buffered.extend_from_slice(&remaining);
                decode_stats(&buffered)?
            }
        };

        Ok(Snapshot::from_response(os, raw))
    }

    async fn events(&self) -> Result<EventSubscription, RuntimeError> {
        let response = self.get("/events").await?;
        let (message_tx, messages) = mpsc::channel(EVENT_BUFFER);
        let (error_tx, errors) = oneshot::channel();

        tokio::spawn(async move {
            let result = pump_events(response.into_body(), &message_tx).await;
            if let Err(e) = &result {
                warn!(error = %e, "Event stream failed");
            }
            let _ = error_tx.send(result);
        });

        Ok(EventSubscription { messages, errors })
    }

    async fn node_info(&self) -> Result<NodeInfo, RuntimeError> {
        let info: InfoResponse = self.get_json("/info").await?;

        let id = if info.swarm.node_id.is_empty() {
            info.id
        } else {
            info.swarm.node_id
        };

        Ok(NodeInfo {
            id,
            cpus: info.ncpu,
        })
    }
}
