//! Session state: where a peer is in the pairing/game lifecycle.

use std::fmt;

// ---------------------------------------------------------------------------
// Role and Side
// ---------------------------------------------------------------------------

/// How the current connection was established.
///
/// Purely informational: the role never decides who moves first. That is
/// settled by the play handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Accepted an inbound connection.
    Host,
    /// Opened an outbound connection.
    Guest,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Host => f.write_str("host"),
            Self::Guest => f.write_str("guest"),
        }
    }
}

/// One of the two participants, seen from this side of the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    /// This peer.
    Local,
    /// The other peer.
    Peer,
}

impl Side {
    /// The other participant.
    pub fn opponent(self) -> Self {
        match self {
            Self::Local => Self::Peer,
            Self::Peer => Self::Local,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => f.write_str("local"),
            Self::Peer => f.write_str("peer"),
        }
    }
}

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

/// The lifecycle state of a session.
///
/// ```text
///   Idle ──listen()──→ Listening ──(peer accepted)──┐
///     │                                             ▼
///     └────────connect()──────────────────────→ Connected ←────────────┐
///                                                │     ▲               │
///                                        play()  │     │ rejected /    │
///                                                ▼     │ quit          │
///                                          PlayRequested               │
///                                                │ accepted            │
///                                                ▼                     │
///                                          InGame { turn } ──quit / finish_game()
///
///   any connected state ──(stream closed)──→ Disconnected
///   any state ──shutdown()──→ Idle
/// ```
///
/// `Listening` only describes a session that has no peer yet. A host
/// keeps its accept loop running after a peer arrives, and a
/// `Disconnected` host can adopt the next inbound peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SessionState {
    /// No transport, no accept loop.
    #[default]
    Idle,

    /// Accept loop running, no peer yet.
    Listening,

    /// A peer is connected and no game is running.
    Connected,

    /// `play:` was sent; waiting for the peer's `play_ack:`.
    PlayRequested,

    /// A game is running. `turn` is who may place the next stone.
    InGame { turn: Side },

    /// The stream to the peer ended.
    Disconnected,
}

impl SessionState {
    /// Returns `true` while a peer is attached.
    pub fn is_connected(&self) -> bool {
        matches!(
            self,
            Self::Connected | Self::PlayRequested | Self::InGame { .. }
        )
    }

    /// Returns `true` between an accepted play handshake and the end of
    /// that game.
    pub fn is_game_active(&self) -> bool {
        matches!(self, Self::InGame { .. })
    }

    /// Who may move next. Only defined while a game is running.
    pub fn turn(&self) -> Option<Side> {
        match self {
            Self::InGame { turn } => Some(*turn),
            _ => None,
        }
    }

    /// Returns `true` if a new peer may be attached in this state.
    pub fn accepts_peer(&self) -> bool {
        matches!(self, Self::Idle | Self::Listening | Self::Disconnected)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::Listening => f.write_str("listening"),
            Self::Connected => f.write_str("connected"),
            Self::PlayRequested => f.write_str("play-requested"),
            Self::InGame { turn } => write!(f, "in-game({turn} to move)"),
            Self::Disconnected => f.write_str("disconnected"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_state_is_idle() {
        assert_eq!(SessionState::default(), SessionState::Idle);
    }

    #[test]
    fn test_connected_states() {
        assert!(SessionState::Connected.is_connected());
        assert!(SessionState::PlayRequested.is_connected());
        assert!(SessionState::InGame { turn: Side::Peer }.is_connected());

        assert!(!SessionState::Idle.is_connected());
        assert!(!SessionState::Listening.is_connected());
        assert!(!SessionState::Disconnected.is_connected());
    }

    #[test]
    fn test_turn_is_only_defined_in_game() {
        assert_eq!(
            SessionState::InGame { turn: Side::Local }.turn(),
            Some(Side::Local)
        );
        assert_eq!(SessionState::Connected.turn(), None);
        assert_eq!(SessionState::PlayRequested.turn(), None);
        assert!(!SessionState::PlayRequested.is_game_active());
    }

    #[test]
    fn test_only_peerless_states_accept_a_peer() {
        assert!(SessionState::Idle.accepts_peer());
        assert!(SessionState::Listening.accepts_peer());
        assert!(SessionState::Disconnected.accepts_peer());
        assert!(!SessionState::Connected.accepts_peer());
        assert!(!SessionState::InGame { turn: Side::Local }.accepts_peer());
    }

    #[test]
    fn test_side_opponent() {
        assert_eq!(Side::Local.opponent(), Side::Peer);
        assert_eq!(Side::Peer.opponent(), Side::Local);
    }

    #[test]
    fn test_state_display() {
        assert_eq!(
            SessionState::InGame { turn: Side::Peer }.to_string(),
            "in-game(peer to move)"
        );
        assert_eq!(Role::Host.to_string(), "host");
    }
}
