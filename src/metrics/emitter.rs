use crate::metrics::sample::MetricSample;
use async_trait::async_trait;
use std::ffi::OsString;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use thiserror::Error;
use tokio::net::UdpSocket;
use tracing::debug;

#[derive(Debug, Error)]
pub enum EmitError {
    #[error("failed to resolve collector address '{addr}': {source}")]
    Resolve {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("collector address '{0}' did not resolve to any socket address")]
    NoAddress(String),

    #[error("failed to open UDP socket: {0}")]
    Socket(#[source] std::io::Error),

    #[error("failed to send datagram: {0}")]
    Send(#[source] std::io::Error),

    #[error("short send: {sent} of {len} bytes")]
    ShortSend { sent: usize, len: usize },

    #[error("failed to read hostname for the host tag: {0}")]
    Hostname(#[source] std::io::Error),
}

/// Destination for metric samples
#[async_trait]
pub trait MetricSink: Send + Sync {
    async fn send(&self, sample: &MetricSample) -> Result<(), EmitError>;
}

/// Sends each sample as one line protocol datagram to a UDP collector.
///
/// Fire-and-forget: there is no acknowledgement, retry or batching.
#[derive(Debug)]
pub struct UdpEmitter {
    socket: UdpSocket,
    host: String,
}

impl UdpEmitter {
    /// Resolve `host:port`, bind an ephemeral socket of the matching family and
    /// connect it to the collector
    pub async fn connect(host: &str, port: u16, host_tag: String) -> Result<Self, EmitError> {
        let addr = format!("{}:{}", host, port);
        let target = tokio::net::lookup_host((host, port))
            .await
            .map_err(|e| EmitError::Resolve {
                addr: addr.clone(),
                source: e,
            })?
            .next()
            .ok_or_else(|| EmitError::NoAddress(addr.clone()))?;

        let local: SocketAddr = match target {
            SocketAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
            SocketAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, 0).into(),
        };

        let socket = UdpSocket::bind(local).await.map_err(EmitError::Socket)?;
        socket.connect(target).await.map_err(EmitError::Socket)?;

        debug!(collector = %target, host_tag = %host_tag, "UDP emitter connected");

        Ok(Self {
            socket,
            host: host_tag,
        })
    }

    pub fn host_tag(&self) -> &str {
        &self.host
    }

    pub fn peer_addr(&self) -> Result<SocketAddr, EmitError> {
        self.socket.peer_addr().map_err(EmitError::Socket)
    }
}

#[async_trait]
impl MetricSink for UdpEmitter {
    async fn send(&self, sample: &MetricSample) -> Result<(), EmitError> {
        let payload = sample.to_line_protocol(&self.host);
        let sent = self
            .socket
            .send(payload.as_bytes())
            .await
            .map_err(EmitError::Send)?;

        if sent != payload.len() {
            return Err(EmitError::ShortSend {
                sent,
                len: payload.len(),
            });
        }

        debug!(series = %sample.series, bytes = sent, "Sample sent");
        Ok(())
    }
}

/// Hostname of this machine, used as the default `host` tag
pub fn default_host_tag() -> Result<String, EmitError> {
    host_tag_from(hostname::get())
}

fn host_tag_from(name: std::io::Result<OsString>) -> Result<String, EmitError> {
    let name = name.map_err(EmitError::Hostname)?;
    Ok(name.to_string_lossy().into_owned())
}
