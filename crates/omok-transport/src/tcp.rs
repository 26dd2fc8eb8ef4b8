//! TCP setup: a listening [`Transport`] for the host side and [`connect`]
//! for the guest side.
//!
//! Both hand back a plain `TcpStream`; wrapping it in a
//! [`Channel`](crate::Channel) is the caller's job.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};

use crate::{Transport, TransportError};

/// A TCP [`Transport`] that listens for incoming peers.
pub struct TcpTransport {
    listener: TcpListener,
}

impl TcpTransport {
    /// Binds a new TCP transport to the given address.
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr).await.map_err(|source| {
            TransportError::Bind {
                addr: addr.to_string(),
                source,
            }
        })?;
        tracing::info!(addr, "TCP transport listening");
        Ok(Self { listener })
    }
}

impl Transport for TcpTransport {
    type Stream = TcpStream;

    async fn accept(
        &mut self,
    ) -> Result<(TcpStream, SocketAddr), TransportError> {
        let (stream, addr) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::Accept)?;

        // Moves are tiny and latency-sensitive.
        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!(%addr, error = %e, "set_nodelay failed");
        }
        tracing::debug!(%addr, "accepted TCP connection");
        Ok((stream, addr))
    }

    fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        Ok(self.listener.local_addr()?)
    }
}

/// Opens an outbound connection to `addr` (a `host:port` string).
///
/// # Errors
/// - [`TransportError::Connect`] if the host is unreachable or refuses.
/// - [`TransportError::ConnectTimeout`] if `timeout` elapses first.
pub async fn connect(
    addr: &str,
    timeout: Duration,
) -> Result<TcpStream, TransportError> {
    let stream = match tokio::time::timeout(timeout, TcpStream::connect(addr))
        .await
    {
        Ok(Ok(stream)) => stream,
        Ok(Err(source)) => {
            return Err(TransportError::Connect {
                addr: addr.to_string(),
                source,
            });
        }
        Err(_) => {
            return Err(TransportError::ConnectTimeout {
                addr: addr.to_string(),
                timeout,
            });
        }
    };

    if let Err(e) = stream.set_nodelay(true) {
        tracing::debug!(addr, error = %e, "set_nodelay failed");
    }
    tracing::debug!(addr, "connected to peer");
    Ok(stream)
}
