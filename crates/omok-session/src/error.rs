//! Error types for the session layer.

use omok_transport::TransportError;

use crate::SessionState;

/// Errors returned to the local caller of a session operation.
///
/// These only ever describe misuse of the session (asking for a move when
/// it isn't your turn, playing without a peer, ...) or a failure to set up
/// a connection. Once a peer is attached, transport faults are never
/// returned from here: they end the session with
/// [`Controller::on_connection_terminated`](crate::Controller::on_connection_terminated).
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The operation needs a connected peer.
    #[error("not connected to a peer (session is {0})")]
    NotConnected(SessionState),

    /// `connect()` was called while a peer is already attached.
    #[error("already connected to a peer")]
    AlreadyConnected,

    /// `play()` was called while our own request is still unanswered.
    #[error("a play request is already pending")]
    PlayPending,

    /// `play()` was called while a game is running.
    #[error("a game is already in progress")]
    GameInProgress,

    /// The operation needs a running game.
    #[error("no game in progress")]
    NoActiveGame,

    /// `send_move()` was called while the peer holds the turn.
    #[error("it is not this side's turn")]
    NotYourTurn,

    /// `listen()` was called while the accept loop is already running.
    #[error("already listening")]
    AlreadyListening,

    /// Binding, connecting, or queueing a message failed.
    #[error(transparent)]
    Transport(#[from] TransportError),
}
