use std::time::Duration;

use omok_protocol::ProtocolError;

/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The channel was closed, locally or by the peer.
    #[error("channel closed")]
    Closed,

    /// The receive loop was already started for this channel.
    #[error("channel is already receiving")]
    AlreadyReceiving,

    /// Binding the listening socket failed.
    #[error("bind to {addr} failed: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// Accepting an inbound connection failed.
    #[error("accept failed: {0}")]
    Accept(#[source] std::io::Error),

    /// Opening an outbound connection failed.
    #[error("connect to {addr} failed: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// The outbound connection didn't complete in time.
    #[error("connect to {addr} timed out after {timeout:?}")]
    ConnectTimeout { addr: String, timeout: Duration },

    /// A socket-level operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The message could not be encoded for the wire.
    #[error(transparent)]
    Encode(#[from] ProtocolError),
}
