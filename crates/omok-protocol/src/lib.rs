//! Wire protocol for omok peers.
//!
//! This crate defines the "language" two peers speak over a raw socket:
//!
//! - **Types** ([`Message`], [`PlayAnswer`], [`MessageKind`]): the
//!   messages that travel on the wire, plus two local-only kinds
//!   (`Unknown`, `Closed`) that never do.
//! - **Codec** ([`Codec`] trait, [`TextCodec`]): how those messages are
//!   converted to/from single lines of text.
//! - **Errors** ([`ProtocolError`]): what can go wrong while encoding.
//!
//! # Architecture
//!
//! The protocol layer is a pure leaf: no I/O, no tasks, no locks. The
//! transport layer adds the line framing (`\n`) and the session layer
//! gives the messages their meaning.
//!
//! ```text
//! Transport (lines) → Protocol (Message) → Session (game events)
//! ```
//!
//! # Wire format
//!
//! | Line           | Meaning                                         |
//! |----------------|-------------------------------------------------|
//! | `play:`        | request a new game                              |
//! | `play_ack:m,n` | m = accepted, n = requester plays first         |
//! | `move:x,y`     | place a stone at column x, row y (0-based)      |
//! | `move_ack:x,y` | acknowledge the move above                      |
//! | `quit:`        | leave the current game                          |

// ---------------------------------------------------------------------------
// Module declarations
// ---------------------------------------------------------------------------

mod codec;
mod error;
mod types;

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

pub use codec::{Codec, ParsePolicy, TextCodec, decode, encode};
pub use error::ProtocolError;
pub use types::{Message, MessageKind, PlayAnswer};
