//! The controller hook: how a session talks to whatever drives the game.
//!
//! The session owns the protocol. It doesn't own the board, the rules, or
//! the screen. Those belong to a [`Controller`] you implement: the session
//! calls it when something happens on the wire, and you decide what to do
//! about it (draw a stone, check for five in a row, ask the user whether
//! they want to play).
//!
//! # Threading
//!
//! Every callback runs on the channel's receive loop. The next line from
//! the peer isn't read until the callback returns, so:
//!
//! - keep callbacks short, or forward the event to your own task through
//!   a channel and return;
//! - never block on a session operation that waits for the *next* inbound
//!   message from inside a callback (there is no such operation today, but
//!   a controller that parks the receive loop parks the whole session).
//!
//! Calling non-blocking session methods (`send_move`, `set_turn`, `quit`,
//! ...) from a callback is fine: the session never holds its lock while a
//! callback runs.

use std::net::SocketAddr;
use std::sync::Arc;

use crate::Role;

/// Receives game events from a [`Session`](crate::Session).
///
/// Only the events with no sensible default are required; the rest are
/// informational and default to doing nothing.
///
/// # Example
///
/// ```rust
/// use omok_session::Controller;
///
/// /// Accepts every game and prints what happens.
/// struct AlwaysPlay;
///
/// impl Controller for AlwaysPlay {
///     fn on_pairing_offer(&self) -> bool {
///         true
///     }
///
///     fn on_pairing_result(&self, accepted: bool, self_plays_first: bool) {
///         println!("accepted={accepted} first={self_plays_first}");
///     }
///
///     fn on_move_received(&self, col: i32, row: i32) {
///         println!("opponent played ({col}, {row})");
///     }
///
///     fn on_opponent_left(&self) {
///         println!("opponent left");
///     }
///
///     fn on_connection_terminated(&self) {
///         println!("connection lost");
///     }
/// }
/// ```
pub trait Controller: Send + Sync + 'static {
    /// A peer was attached, either accepted (`Role::Host`) or dialed
    /// (`Role::Guest`).
    fn on_connected(&self, role: Role, peer: SocketAddr) {
        let _ = (role, peer);
    }

    /// The peer asked for a game. Return `true` to accept.
    ///
    /// When accepted, the peer always moves first.
    fn on_pairing_offer(&self) -> bool;

    /// The peer answered our `play()` request.
    ///
    /// `self_plays_first` is only meaningful when `accepted` is `true`.
    fn on_pairing_result(&self, accepted: bool, self_plays_first: bool);

    /// The peer placed a stone. The session has not judged the move: it
    /// is acknowledged on the wire whether or not it's legal.
    fn on_move_received(&self, col: i32, row: i32);

    /// The peer acknowledged one of our moves.
    fn on_move_acknowledged(&self, col: i32, row: i32) {
        let _ = (col, row);
    }

    /// The peer left the current game. The connection stays up.
    fn on_opponent_left(&self);

    /// We left the current game with [`Session::quit`](crate::Session::quit).
    fn on_left_game(&self) {}

    /// The connection to the peer is gone. Terminal for this peer: the
    /// session doesn't reconnect.
    fn on_connection_terminated(&self);

    /// The peer sent a line that didn't decode.
    fn on_unknown_message(&self) {}
}

impl<T: Controller> Controller for Arc<T> {
    fn on_connected(&self, role: Role, peer: SocketAddr) {
        (**self).on_connected(role, peer)
    }

    fn on_pairing_offer(&self) -> bool {
        (**self).on_pairing_offer()
    }

    fn on_pairing_result(&self, accepted: bool, self_plays_first: bool) {
        (**self).on_pairing_result(accepted, self_plays_first)
    }

    fn on_move_received(&self, col: i32, row: i32) {
        (**self).on_move_received(col, row)
    }

    fn on_move_acknowledged(&self, col: i32, row: i32) {
        (**self).on_move_acknowledged(col, row)
    }

    fn on_opponent_left(&self) {
        (**self).on_opponent_left()
    }

    fn on_left_game(&self) {
        (**self).on_left_game()
    }

    fn on_connection_terminated(&self) {
        (**self).on_connection_terminated()
    }

    fn on_unknown_message(&self) {
        (**self).on_unknown_message()
    }
}
