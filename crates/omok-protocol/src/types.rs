//! Core protocol types for the omok wire format.
//!
//! This module defines every message that travels "on the wire" between
//! two peers, plus the two synthetic kinds the receive loop produces
//! locally. Each message is one line of text; see [`crate::codec`] for
//! the exact grammar.

use std::fmt;

// ---------------------------------------------------------------------------
// PlayAnswer: the body of a play_ack
// ---------------------------------------------------------------------------

/// The answer carried by a `play_ack:` line.
///
/// On the wire this is two flags, `m,n`, where `n` only means something
/// when `m` is 1. Modelling it as an enum makes the meaningless
/// combination ("rejected, but requester plays first") unrepresentable:
///
/// ```text
/// play_ack:0,0  →  PlayAnswer::Rejected
/// play_ack:1,1  →  PlayAnswer::Accepted { requester_first: true }
/// play_ack:1,0  →  PlayAnswer::Accepted { requester_first: false }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlayAnswer {
    /// The play request was declined.
    Rejected,

    /// The play request was accepted.
    ///
    /// `requester_first` is `true` when the side that sent `play:` makes
    /// the first move, `false` when the side that answered does.
    Accepted { requester_first: bool },
}

impl PlayAnswer {
    /// Returns `true` for [`PlayAnswer::Accepted`].
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted { .. })
    }

    /// Returns `true` if the requester moves first.
    ///
    /// Always `false` for a rejection, matching the `0` the wire carries
    /// in the turn slot of a rejected `play_ack`.
    pub fn requester_first(&self) -> bool {
        matches!(
            self,
            Self::Accepted {
                requester_first: true
            }
        )
    }
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// A single protocol message.
///
/// Coordinates are `i32` rather than `usize` on purpose: the permissive
/// parser maps unparsable numbers to `-1`, and that sentinel has to
/// survive the trip to the board-rule engine, which rejects it as an
/// off-board cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Message {
    /// `play:`: "let's start a new game."
    Play,

    /// `play_ack:m,n`: the answer to a [`Message::Play`].
    PlayAck(PlayAnswer),

    /// `move:x,y`: "I placed a stone at column x, row y."
    Move { col: i32, row: i32 },

    /// `move_ack:x,y`: "I received your move at column x, row y."
    MoveAck { col: i32, row: i32 },

    /// `quit:`: "I'm leaving this game."
    Quit,

    /// Local-only: a line arrived that could not be decoded.
    Unknown,

    /// Local-only: the stream ended (peer closed, local close, or I/O fault).
    Closed,
}

impl Message {
    /// Returns the [`MessageKind`] of this message.
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::Play => MessageKind::Play,
            Self::PlayAck(_) => MessageKind::PlayAck,
            Self::Move { .. } => MessageKind::Move,
            Self::MoveAck { .. } => MessageKind::MoveAck,
            Self::Quit => MessageKind::Quit,
            Self::Unknown => MessageKind::Unknown,
            Self::Closed => MessageKind::Closed,
        }
    }

    /// Returns `true` for the kinds that are never sent on the wire.
    pub fn is_local_only(&self) -> bool {
        self.kind().header().is_none()
    }
}

// ---------------------------------------------------------------------------
// MessageKind
// ---------------------------------------------------------------------------

/// The kind of a [`Message`], without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Play,
    PlayAck,
    Move,
    MoveAck,
    Quit,
    Unknown,
    Closed,
}

impl MessageKind {
    /// The wire header for this kind, or `None` for the local-only kinds.
    pub fn header(&self) -> Option<&'static str> {
        match self {
            Self::Play => Some("play:"),
            Self::PlayAck => Some("play_ack:"),
            Self::Move => Some("move:"),
            Self::MoveAck => Some("move_ack:"),
            Self::Quit => Some("quit:"),
            Self::Unknown | Self::Closed => None,
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Play => "play",
            Self::PlayAck => "play_ack",
            Self::Move => "move",
            Self::MoveAck => "move_ack",
            Self::Quit => "quit",
            Self::Unknown => "unknown",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

// =========================================================================
// Tests
// =========================================================================
