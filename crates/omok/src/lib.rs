//! # omok
//!
//! Peer-to-peer networking for two-player omok (five in a row).
//!
//! Two peers connect directly over TCP; one hosts, the other dials in.
//! Either side may then ask for a game, and the side that accepts always
//! lets the requester move first. This crate bundles the layers:
//!
//! - [`omok_protocol`]: the five-message text line format;
//! - [`omok_transport`]: the [`Channel`](prelude::Channel) that frames
//!   lines over a stream with a writer task and a receive loop;
//! - [`omok_session`]: the pairing/turn state machine that reports to
//!   your [`Controller`](prelude::Controller).
//!
//! Board rules and UI are yours: implement `Controller`, judge moves as
//! they arrive, and hand the turn over with `Session::set_turn`.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use omok::prelude::*;
//!
//! // Implement Controller for your UI, then:
//! // omok::init_tracing();
//! // let session = OmokPeerBuilder::new()
//! //     .listen(true)
//! //     .build(my_controller)
//! //     .await?;
//! // session.play()?;
//! ```

mod builder;
mod error;
mod logging;

pub use builder::OmokPeerBuilder;
pub use error::OmokError;
pub use logging::init_tracing;

pub use omok_protocol;
pub use omok_session;
pub use omok_transport;

pub mod prelude {
    pub use crate::{OmokError, OmokPeerBuilder, init_tracing};
    pub use omok_protocol::{
        Codec, Message, MessageKind, ParsePolicy, PlayAnswer, ProtocolError,
        TextCodec,
    };
    pub use omok_session::{
        Controller, DEFAULT_PORT, Role, Session, SessionConfig, SessionError,
        SessionState, Side,
    };
    pub use omok_transport::{
        Channel, ChannelId, Direction, MessageListener, TcpTransport,
        Transport, TransportError, WireTap,
    };
}
