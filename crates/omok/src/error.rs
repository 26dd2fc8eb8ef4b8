//! Unified error type for the omok crates.

use omok_protocol::ProtocolError;
use omok_session::SessionError;
use omok_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// When using the `omok` meta-crate, you deal with this single error type
/// instead of importing errors from each sub-crate. The `#[from]`
/// attribute on each variant generates the `From` impls, so `?` converts
/// sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum OmokError {
    /// A transport-level error (bind, connect, channel closed).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encoding a local-only message).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A session-level error (wrong state for the operation).
    #[error(transparent)]
    Session(#[from] SessionError),
}
