//! Error types for the protocol layer.
//!
//! Decoding never fails: a line that can't be understood becomes
//! [`Message::Unknown`](crate::Message::Unknown). The only protocol-level
//! error is trying to put a local-only message on the wire.

use crate::MessageKind;

/// Errors that can occur in the protocol layer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// The message kind has no wire header.
    ///
    /// `Unknown` and `Closed` are produced locally by the receive loop to
    /// report a decode failure or the end of the stream. They have no
    /// textual form, so asking the codec to encode one is a caller bug
    /// that we report instead of panicking on.
    #[error("message kind {0} is local-only and cannot be encoded")]
    NotEncodable(MessageKind),
}
