//! Transport layer for omok peers.
//!
//! Provides the [`Channel`], a line-oriented send/receive pipeline over
//! one already-connected duplex stream, and the [`Transport`] trait with
//! its TCP implementation for establishing those streams.
//!
//! # How it fits in the stack
//!
//! ```text
//! Session Layer (above)  ← interprets messages as game events
//!     ↕
//! Transport Layer (this crate)  ← frames lines, runs reader/writer tasks
//!     ↕
//! Protocol Layer (below)  ← encodes/decodes single lines
//! ```

#![allow(async_fn_in_trait)]

mod channel;
mod error;
mod tcp;

pub use channel::{Channel, Direction, MessageListener, WireTap};
pub use error::TransportError;
pub use tcp::{TcpTransport, connect};

use std::fmt;
use std::net::SocketAddr;

use tokio::io::{AsyncRead, AsyncWrite};

/// Opaque identifier for a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelId(u64);

impl ChannelId {
    /// Creates a new `ChannelId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "chan-{}", self.0)
    }
}

/// Accepts new incoming connections.
pub trait Transport: Send + 'static {
    /// The duplex stream produced for each accepted peer.
    type Stream: AsyncRead + AsyncWrite + Send + Unpin + 'static;

    /// Waits for and accepts the next incoming connection.
    async fn accept(
        &mut self,
    ) -> Result<(Self::Stream, SocketAddr), TransportError>;

    /// Returns the address this transport is listening on.
    fn local_addr(&self) -> Result<SocketAddr, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_id_new_and_into_inner() {
        let id = ChannelId::new(42);
        assert_eq!(id.into_inner(), 42);
    }

    #[test]
    fn test_channel_id_display() {
        let id = ChannelId::new(7);
        assert_eq!(id.to_string(), "chan-7");
    }

    #[test]
    fn test_channel_id_equality() {
        assert_eq!(ChannelId::new(1), ChannelId::new(1));
        assert_ne!(ChannelId::new(1), ChannelId::new(2));
    }
}
