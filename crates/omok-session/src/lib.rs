//! Session layer for omok peers.
//!
//! This crate turns a [`Channel`](omok_transport::Channel) into a game:
//!
//! 1. **Connection setup**: host with [`Session::listen`] or dial with
//!    [`Session::connect`]. Exactly one peer at a time.
//! 2. **Pairing**: one side sends `play:`, the other side's
//!    [`Controller`] decides, and the accepting side always lets the
//!    requester move first.
//! 3. **Moves**: stones travel as `move:` and are acknowledged with
//!    `move_ack:`. The session checks whose turn it is before sending;
//!    judging moves and handing the turn over is up to the controller's
//!    rule engine ([`Session::set_turn`], [`Session::finish_game`]).
//! 4. **Teardown**: `quit:` ends a game, a lost stream ends the peer.
//!
//! # How it fits in the stack
//!
//! ```text
//! Controller (above)  ← board, rules, UI: implements Controller
//!     ↕
//! Session Layer (this crate)  ← pairing/turn state machine
//!     ↕
//! Transport Layer (below)  ← Channel, TcpTransport
//! ```

mod config;
mod controller;
mod error;
mod session;
mod state;

pub use config::{DEFAULT_PORT, SessionConfig};
pub use controller::Controller;
pub use error::SessionError;
pub use session::Session;
pub use state::{Role, SessionState, Side};
