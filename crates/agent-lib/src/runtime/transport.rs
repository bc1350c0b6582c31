//! HTTP/1.1 transport to the runtime daemon
//!
//! Each request opens its own connection to the daemon socket and drives it
//! on a spawned task until the response body has been consumed.

use super::RuntimeError;
use bytes::Bytes;
use http_body_util::Empty;
use hyper::body::Incoming;
use hyper::{Request, Response};
use hyper_util::rt::TokioIo;
use std::path::PathBuf;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::debug;

/// Where the runtime daemon listens
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DockerHost {
    /// Local daemon socket, e.g. `unix:///var/run/docker.sock`
    Unix(PathBuf),
    /// `host:port` of a daemon exposed over TCP
    Tcp(String),
}

impl DockerHost {
    pub const DEFAULT: &'static str = "unix:///var/run/docker.sock";

    /// Parse a `DOCKER_HOST` style address
    pub fn parse(address: &str) -> Result<Self, RuntimeError> {
        let address = address.trim();
        if let Some(path) = address.strip_prefix("unix://") {
            if path.is_empty() {
                return Err(RuntimeError::InvalidHost(address.to_string()));
            }
            return Ok(DockerHost::Unix(PathBuf::from(path)));
        }

        let authority = address
            .strip_prefix("tcp://")
            .or_else(|| address.strip_prefix("http://"));
        if let Some(authority) = authority {
            let authority = authority.trim_end_matches('/');
            if authority.is_empty() || authority.contains('/') {
                return Err(RuntimeError::InvalidHost(address.to_string()));
            }
            return Ok(DockerHost::Tcp(authority.to_string()));
        }

        if address.starts_with('/') {
            return Ok(DockerHost::Unix(PathBuf::from(address)));
        }

        Err(RuntimeError::InvalidHost(address.to_string()))
    }

    /// Value for the `Host` header of requests to this daemon
    pub(crate) fn host_header(&self) -> &str {
        match self {
            DockerHost::Unix(_) => "docker",
            DockerHost::Tcp(authority) => authority,
        }
    }

    /// Send one request and return the response with its body unread
    pub(crate) async fn send(
        &self,
        request: Request<Empty<Bytes>>,
    ) -> Result<Response<Incoming>, RuntimeError> {
        match self {
            #[cfg(unix)]
            DockerHost::Unix(path) => {
                let stream = tokio::net::UnixStream::connect(path)
                    .await
                    .map_err(|source| RuntimeError::Connect {
                        address: path.display().to_string(),
                        source,
                    })?;
                exchange(TokioIo::new(stream), request).await
            }
            #[cfg(not(unix))]
            DockerHost::Unix(path) => Err(RuntimeError::InvalidHost(path.display().to_string())),
            DockerHost::Tcp(authority) => {
                let stream = tokio::net::TcpStream::connect(authority.as_str())
                    .await
                    .map_err(|source| RuntimeError::Connect {
                        address: authority.clone(),
                        source,
                    })?;
                exchange(TokioIo::new(stream), request).await
            }
        }
    }
}

impl std::fmt::Display for DockerHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DockerHost::Unix(path) => write!(f, "unix://{}", path.display()),
            DockerHost::Tcp(authority) => write!(f, "tcp://{}", authority),
        }
    }
}

async fn exchange<S>(
    io: TokioIo<S>,
    request: Request<Empty<Bytes>>,
) -> Result<Response<Incoming>, RuntimeError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (mut sender, connection) = hyper::client::conn::http1::handshake(io).await?;
    tokio::spawn(async move {
        if let Err(e) = connection.await {
            debug!(error = %e, "Runtime connection closed with error");
        }
    });

    Ok(sender.send_request(request).await?)
}
