//! The session: one peer, one channel, one game at a time.
//!
//! A [`Session`] sits on top of a [`Channel`] and turns raw messages into
//! game events. It owns the pairing/turn state and nothing else: rules,
//! board, and UI live behind the [`Controller`].
//!
//! # Who mutates the state
//!
//! Two kinds of callers touch the state machine:
//!
//! - the channel's receive loop, reacting to inbound messages;
//! - the local caller, through `play()`, `send_move()`, `quit()`, ...
//!
//! Both go through one mutex around the session core. The lock is held for the
//! transition and for queueing any reply (queueing never blocks), and is
//! always released before the controller is called.
//!
//! # Stale channels
//!
//! Every channel's listener carries that channel's id. A message from a
//! channel that is no longer the session's current one (it was shut down
//! or replaced after a disconnect) is dropped on the floor. This is what
//! makes `shutdown()` silent: the `Closed` produced by a local close
//! arrives after the channel was detached and never reaches the controller.

use std::fmt;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use omok_protocol::{Codec, Message, PlayAnswer, TextCodec};
use omok_transport::{
    Channel, ChannelId, TcpTransport, Transport, TransportError, WireTap,
};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::{Controller, Role, SessionConfig, SessionError, SessionState, Side};

/// Pause after a failed `accept()` before trying again.
const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(100);

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// A peer-to-peer omok session.
///
/// Cheap to clone: clones share the same state, channel, and controller.
///
/// # Example
///
/// ```rust,no_run
/// use omok_session::{Controller, Session, SessionConfig};
///
/// # struct Ui;
/// # impl Controller for Ui {
/// #     fn on_pairing_offer(&self) -> bool { true }
/// #     fn on_pairing_result(&self, _: bool, _: bool) {}
/// #     fn on_move_received(&self, _: i32, _: i32) {}
/// #     fn on_opponent_left(&self) {}
/// #     fn on_connection_terminated(&self) {}
/// # }
/// # async fn demo() -> Result<(), omok_session::SessionError> {
/// let session = Session::new(Ui);
/// session.connect("127.0.0.1:8001").await?;
/// session.play()?;
/// // ... the controller hears about the answer ...
/// session.shutdown().await;
/// # Ok(())
/// # }
/// ```
pub struct Session<C: Controller> {
    shared: Arc<Shared<C>>,
}

impl<C: Controller> Session<C> {
    /// Creates an idle session with the default configuration.
    pub fn new(controller: C) -> Self {
        Self::with_config(controller, SessionConfig::default())
    }

    /// Creates an idle session with the given configuration.
    pub fn with_config(controller: C, config: SessionConfig) -> Self {
        let codec: Arc<dyn Codec> = Arc::new(TextCodec::new(config.parse_policy));
        Self {
            shared: Arc::new(Shared {
                config,
                controller,
                codec,
                core: Mutex::new(Core::default()),
            }),
        }
    }

    /// Installs a [`WireTap`] on every channel created from now on.
    pub fn set_tap(&self, tap: Arc<dyn WireTap>) {
        self.shared.lock().tap = Some(tap);
    }

    /// Returns the session's configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.shared.config
    }

    /// Returns the controller this session reports to.
    pub fn controller(&self) -> &C {
        &self.shared.controller
    }

    // -- Connection setup ---------------------------------------------------

    /// Starts hosting: binds `config.bind_addr()` and accepts peers in the
    /// background. Returns the bound address (useful with port 0).
    ///
    /// The accept loop keeps running until [`shutdown`](Self::shutdown).
    /// A connection is adopted only while the session has no peer; any
    /// other connection is closed straight away.
    ///
    /// # Errors
    /// - [`SessionError::AlreadyListening`] if the accept loop is running.
    /// - [`SessionError::Transport`] if binding fails.
    pub async fn listen(&self) -> Result<SocketAddr, SessionError> {
        if self.shared.lock().acceptor.is_some() {
            return Err(SessionError::AlreadyListening);
        }

        let transport = TcpTransport::bind(&self.shared.config.bind_addr()).await?;
        let local_addr = transport.local_addr()?;

        let mut core = self.shared.lock();
        if core.acceptor.is_some() {
            return Err(SessionError::AlreadyListening);
        }
        let task = tokio::spawn(accept_loop(Arc::downgrade(&self.shared), transport));
        core.acceptor = Some(Acceptor { task, local_addr });
        if core.state.accepts_peer() {
            core.state = SessionState::Listening;
        }

        tracing::info!(%local_addr, "hosting omok session");
        Ok(local_addr)
    }

    /// Dials a host (`host:port`) and adopts the connection as the peer.
    /// Returns the peer's address.
    ///
    /// A session that is also listening may dial out; whichever link
    /// comes up first becomes the peer.
    ///
    /// # Errors
    /// - [`SessionError::AlreadyConnected`] if a peer is attached.
    /// - [`SessionError::Transport`] if the host can't be reached in
    ///   `config.connect_timeout`. No controller event fires.
    pub async fn connect(&self, addr: &str) -> Result<SocketAddr, SessionError> {
        if !self.state().accepts_peer() {
            return Err(SessionError::AlreadyConnected);
        }

        let stream =
            omok_transport::connect(addr, self.shared.config.connect_timeout).await?;
        let peer = stream.peer_addr().map_err(TransportError::Io)?;

        // An inbound peer may have been adopted while we were dialing.
        self.shared.adopt(stream, peer, Role::Guest)?;
        Ok(peer)
    }

    /// Attaches an already-connected stream as the peer.
    ///
    /// This is what `listen()` and `connect()` do once they have a stream;
    /// it's public so a session can run over any duplex transport.
    ///
    /// # Errors
    /// [`SessionError::AlreadyConnected`] if a peer is attached.
    ///
    /// # Panics
    /// Panics if called outside a Tokio runtime.
    pub fn attach<S>(&self, stream: S, peer: SocketAddr, role: Role) -> Result<(), SessionError>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        self.shared.adopt(stream, peer, role)
    }

    /// Tears everything down: closes the channel, stops the accept loop,
    /// and returns to [`SessionState::Idle`].
    ///
    /// Doesn't fire `on_connection_terminated`. Safe to call repeatedly.
    pub async fn shutdown(&self) {
        let (channel, acceptor) = {
            let mut core = self.shared.lock();
            core.state = SessionState::Idle;
            core.role = None;
            core.peer = None;
            (core.channel.take(), core.acceptor.take())
        };

        if let Some(acceptor) = acceptor {
            acceptor.task.abort();
            tracing::info!(local_addr = %acceptor.local_addr, "stopped hosting");
        }
        if let Some(channel) = channel {
            channel.close().await;
            tracing::info!(channel_id = %channel.id(), "session shut down");
        }
    }

    // -- Game operations ----------------------------------------------------

    /// Asks the peer for a game. The answer arrives through
    /// [`Controller::on_pairing_result`].
    ///
    /// # Errors
    /// - [`SessionError::NotConnected`] without a peer.
    /// - [`SessionError::PlayPending`] if our request is unanswered.
    /// - [`SessionError::GameInProgress`] during a game.
    pub fn play(&self) -> Result<(), SessionError> {
        let mut core = self.shared.lock();
        match core.state {
            SessionState::Connected => {}
            SessionState::PlayRequested => return Err(SessionError::PlayPending),
            SessionState::InGame { .. } => return Err(SessionError::GameInProgress),
            other => return Err(SessionError::NotConnected(other)),
        }

        core.channel()?.send(&Message::Play)?;
        core.state = SessionState::PlayRequested;
        tracing::debug!("play requested");
        Ok(())
    }

    /// Places a stone at (`col`, `row`).
    ///
    /// Doesn't hand the turn over: whoever judges the move calls
    /// [`set_turn`](Self::set_turn) or [`finish_game`](Self::finish_game).
    ///
    /// # Errors
    /// - [`SessionError::NotConnected`] without a peer.
    /// - [`SessionError::NoActiveGame`] outside a game.
    /// - [`SessionError::NotYourTurn`] while the peer holds the turn.
    pub fn send_move(&self, col: i32, row: i32) -> Result<(), SessionError> {
        let core = self.shared.lock();
        match core.state {
            SessionState::InGame { turn: Side::Local } => {}
            SessionState::InGame { turn: Side::Peer } => {
                return Err(SessionError::NotYourTurn);
            }
            state if state.is_connected() => return Err(SessionError::NoActiveGame),
            other => return Err(SessionError::NotConnected(other)),
        }

        core.channel()?.send(&Message::Move { col, row })?;
        tracing::debug!(col, row, "move sent");
        Ok(())
    }

    /// Leaves the current game (or withdraws a pending request). The
    /// connection stays up.
    ///
    /// Fires [`Controller::on_left_game`] once the `quit:` is queued.
    ///
    /// # Errors
    /// [`SessionError::NotConnected`] without a peer.
    pub fn quit(&self) -> Result<(), SessionError> {
        {
            let mut core = self.shared.lock();
            if !core.state.is_connected() {
                return Err(SessionError::NotConnected(core.state));
            }
            core.channel()?.send(&Message::Quit)?;
            core.state = SessionState::Connected;
        }

        tracing::info!("left the game");
        self.shared.controller.on_left_game();
        Ok(())
    }

    /// Hands the turn to `side`.
    ///
    /// # Errors
    /// [`SessionError::NoActiveGame`] outside a game.
    pub fn set_turn(&self, side: Side) -> Result<(), SessionError> {
        let mut core = self.shared.lock();
        if !core.state.is_game_active() {
            return Err(SessionError::NoActiveGame);
        }
        core.state = SessionState::InGame { turn: side };
        tracing::debug!(turn = %side, "turn changed");
        Ok(())
    }

    /// Ends the current game (someone won). Nothing is sent: both sides'
    /// rule engines reach the same verdict from the same moves.
    ///
    /// # Errors
    /// [`SessionError::NoActiveGame`] outside a game.
    pub fn finish_game(&self) -> Result<(), SessionError> {
        let mut core = self.shared.lock();
        if !core.state.is_game_active() {
            return Err(SessionError::NoActiveGame);
        }
        core.state = SessionState::Connected;
        tracing::info!("game finished");
        Ok(())
    }

    // -- Queries ------------------------------------------------------------

    /// Returns a snapshot of the current state.
    pub fn state(&self) -> SessionState {
        self.shared.lock().state
    }

    /// How the current peer was attached, if there is one.
    pub fn role(&self) -> Option<Role> {
        self.shared.lock().role
    }

    /// The current peer's address, if there is one.
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.shared.lock().peer
    }

    /// The address the accept loop is bound to, while hosting.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.shared.lock().acceptor.as_ref().map(|a| a.local_addr)
    }

    /// Returns `true` while a peer is attached.
    pub fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    /// Returns `true` while a game is running.
    pub fn is_game_active(&self) -> bool {
        self.state().is_game_active()
    }

    /// Who may move next, while a game is running.
    pub fn turn(&self) -> Option<Side> {
        self.state().turn()
    }
}

impl<C: Controller> Clone for Session<C> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<C: Controller> fmt::Debug for Session<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let core = self.shared.lock();
        f.debug_struct("Session")
            .field("state", &core.state)
            .field("role", &core.role)
            .field("peer", &core.peer)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

struct Acceptor {
    task: JoinHandle<()>,
    local_addr: SocketAddr,
}

#[derive(Default)]
struct Core {
    state: SessionState,
    role: Option<Role>,
    peer: Option<SocketAddr>,
    channel: Option<Arc<Channel>>,
    acceptor: Option<Acceptor>,
    tap: Option<Arc<dyn WireTap>>,
}

impl Core {
    /// The active channel, if `id` still names it.
    fn current(&self, id: ChannelId) -> Option<&Arc<Channel>> {
        self.channel.as_ref().filter(|channel| channel.id() == id)
    }

    fn channel(&self) -> Result<&Arc<Channel>, SessionError> {
        self.channel
            .as_ref()
            .ok_or(SessionError::NotConnected(self.state))
    }
}

struct Shared<C> {
    config: SessionConfig,
    controller: C,
    codec: Arc<dyn Codec>,
    core: Mutex<Core>,
}

impl<C: Controller> Shared<C> {
    fn lock(&self) -> MutexGuard<'_, Core> {
        self.core.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Wraps `stream` in a channel and makes it the session's peer.
    fn adopt<S>(
        self: &Arc<Self>,
        stream: S,
        peer: SocketAddr,
        role: Role,
    ) -> Result<(), SessionError>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let channel = {
            let mut core = self.lock();
            if !core.state.accepts_peer() || core.channel.is_some() {
                return Err(SessionError::AlreadyConnected);
            }

            let mut channel = Channel::with_codec(stream, Arc::clone(&self.codec));
            if let Some(tap) = &core.tap {
                channel = channel.with_tap(Arc::clone(tap));
            }
            let channel = Arc::new(channel);

            let session = Arc::downgrade(self);
            let channel_id = channel.id();
            channel.set_listener(move |message: Message| {
                if let Some(shared) = session.upgrade() {
                    shared.handle(channel_id, message);
                }
            });

            core.state = SessionState::Connected;
            core.role = Some(role);
            core.peer = Some(peer);
            core.channel = Some(Arc::clone(&channel));
            channel
        };

        tracing::info!(%role, %peer, channel_id = %channel.id(), "peer connected");
        self.controller.on_connected(role, peer);

        // Receiving starts after on_connected so no game event can beat it.
        if let Err(e) = channel.start_receiving() {
            tracing::debug!(
                channel_id = %channel.id(), error = %e,
                "channel detached before receiving started"
            );
        }
        Ok(())
    }

    // -- Inbound ------------------------------------------------------------

    fn handle(&self, channel_id: ChannelId, message: Message) {
        match message {
            Message::Play => self.on_play(channel_id),
            Message::PlayAck(answer) => self.on_play_ack(channel_id, answer),
            Message::Move { col, row } => self.on_move(channel_id, col, row),
            Message::MoveAck { col, row } => {
                if self.is_current(channel_id) {
                    tracing::debug!(col, row, "move acknowledged");
                    self.controller.on_move_acknowledged(col, row);
                }
            }
            Message::Quit => self.on_quit(channel_id),
            Message::Unknown => {
                if self.is_current(channel_id) {
                    tracing::debug!(%channel_id, "unrecognised line from peer");
                    self.controller.on_unknown_message();
                }
            }
            Message::Closed => self.on_closed(channel_id),
        }
    }

    fn on_play(&self, channel_id: ChannelId) {
        {
            let core = self.lock();
            let Some(channel) = core.current(channel_id) else {
                return;
            };
            if core.state != SessionState::Connected && self.config.auto_reject_when_busy {
                tracing::info!(state = %core.state, "busy, rejecting play offer");
                send(channel, &Message::PlayAck(PlayAnswer::Rejected));
                return;
            }
        }

        let accepted = self.controller.on_pairing_offer();

        let mut core = self.lock();
        let Some(channel) = core.current(channel_id).cloned() else {
            return;
        };
        if accepted {
            // The requester always moves first.
            send(
                &channel,
                &Message::PlayAck(PlayAnswer::Accepted { requester_first: true }),
            );
            core.state = SessionState::InGame { turn: Side::Peer };
            tracing::info!("play offer accepted, peer moves first");
        } else {
            send(&channel, &Message::PlayAck(PlayAnswer::Rejected));
            tracing::info!("play offer rejected");
        }
    }

    fn on_play_ack(&self, channel_id: ChannelId, answer: PlayAnswer) {
        {
            let mut core = self.lock();
            if core.current(channel_id).is_none() {
                return;
            }
            if core.state != SessionState::PlayRequested {
                tracing::warn!(state = %core.state, "unsolicited play_ack ignored");
                return;
            }
            core.state = match answer {
                PlayAnswer::Rejected => SessionState::Connected,
                PlayAnswer::Accepted { requester_first: true } => {
                    SessionState::InGame { turn: Side::Local }
                }
                PlayAnswer::Accepted { requester_first: false } => {
                    SessionState::InGame { turn: Side::Peer }
                }
            };
            tracing::info!(state = %core.state, "play request answered");
        }

        self.controller
            .on_pairing_result(answer.is_accepted(), answer.requester_first());
    }

    fn on_move(&self, channel_id: ChannelId, col: i32, row: i32) {
        {
            let core = self.lock();
            if core.current(channel_id).is_none() {
                return;
            }
            if !core.state.is_game_active() {
                tracing::warn!(col, row, state = %core.state, "move received outside a game");
            }
        }

        self.controller.on_move_received(col, row);

        // Acknowledged whether or not the move is legal.
        let core = self.lock();
        if let Some(channel) = core.current(channel_id) {
            send(channel, &Message::MoveAck { col, row });
        }
    }

    fn on_quit(&self, channel_id: ChannelId) {
        {
            let mut core = self.lock();
            if core.current(channel_id).is_none() {
                return;
            }
            core.state = SessionState::Connected;
        }

        tracing::info!("opponent left the game");
        self.controller.on_opponent_left();
    }

    fn on_closed(&self, channel_id: ChannelId) {
        let channel = {
            let mut core = self.lock();
            if core.current(channel_id).is_none() {
                return;
            }
            core.state = SessionState::Disconnected;
            core.role = None;
            core.peer = None;
            core.channel.take()
        };

        tracing::info!(%channel_id, "connection terminated");
        if let Some(channel) = channel {
            // Called from the receive loop, which can't await its own close.
            tokio::spawn(async move { channel.close().await });
        }
        self.controller.on_connection_terminated();
    }

    fn is_current(&self, channel_id: ChannelId) -> bool {
        self.lock().current(channel_id).is_some()
    }
}

impl<C> Drop for Shared<C> {
    fn drop(&mut self) {
        let core = self.core.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(acceptor) = core.acceptor.take() {
            acceptor.task.abort();
        }
        if let Some(channel) = core.channel.take() {
            if let Ok(runtime) = Handle::try_current() {
                runtime.spawn(async move { channel.close().await });
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Background tasks and helpers
// ---------------------------------------------------------------------------

async fn accept_loop<C: Controller>(session: Weak<Shared<C>>, mut transport: TcpTransport) {
    loop {
        let accepted = transport.accept().await;
        let Some(shared) = session.upgrade() else {
            break;
        };

        match accepted {
            Ok((stream, peer)) => {
                // Dropping the refused stream closes it.
                if let Err(e) = shared.adopt(stream, peer, Role::Host) {
                    tracing::info!(%peer, error = %e, "refusing extra peer");
                }
            }
            Err(e) => {
                drop(shared);
                tracing::warn!(error = %e, "accept failed");
                tokio::time::sleep(ACCEPT_RETRY_DELAY).await;
            }
        }
    }
    tracing::debug!("accept loop stopped");
}

/// Queues a reply. A failure here means the channel is already closing,
/// which the receive loop reports on its own.
fn send(channel: &Channel, message: &Message) {
    if let Err(e) = channel.send(message) {
        tracing::debug!(
            channel_id = %channel.id(), kind = %message.kind(), error = %e,
            "reply not queued"
        );
    }
}
