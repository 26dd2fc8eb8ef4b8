//! The channel: one duplex stream, one writer task, one receive loop.
//!
//! ```text
//!  send() ──→ [unbounded FIFO] ──→ writer task ──→ write half ──→ wire
//!
//!  wire ──→ read half ──→ receive loop ──→ Codec::decode ──→ listener
//! ```
//!
//! - Outbound: [`Channel::send`] encodes the message and pushes the line
//!   onto an unbounded queue, so it never blocks the caller. The writer
//!   task is spawned on the first send and writes one line + flush per
//!   message, strictly in queue order.
//! - Inbound: the receive loop reads one line at a time and hands each
//!   decoded message to the registered [`MessageListener`] *on the loop's
//!   own task*, before reading the next line. Delivery is therefore
//!   ordered and never interleaved.
//! - Termination: when the stream ends (peer close, local close, or an
//!   I/O fault on either half), the listener gets exactly one
//!   [`Message::Closed`] and the loop stops for good.

use std::mem;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::fmt;

use omok_protocol::{Codec, Message, TextCodec};
use tokio::io::{
    AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader,
};
use tokio::runtime::Handle;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::{ChannelId, TransportError};

/// Counter for generating unique channel IDs.
static NEXT_CHANNEL_ID: AtomicU64 = AtomicU64::new(1);

type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;
type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;
type ListenerSlot = RwLock<Option<Arc<dyn MessageListener>>>;

// ---------------------------------------------------------------------------
// Listener and wire tap
// ---------------------------------------------------------------------------

/// Receives every message the channel decodes, plus the final
/// [`Message::Closed`].
///
/// Called on the receive loop's task. The next line isn't read until
/// `on_message` returns, so implementations should hand slow work off
/// elsewhere instead of doing it inline.
///
/// Any `Fn(Message) + Send + Sync + 'static` closure is a listener.
pub trait MessageListener: Send + Sync + 'static {
    /// Handles one decoded message.
    fn on_message(&self, message: Message);
}

impl<F> MessageListener for F
where
    F: Fn(Message) + Send + Sync + 'static,
{
    fn on_message(&self, message: Message) {
        self(message)
    }
}

/// Which way a line travelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Read from the peer.
    Inbound,
    /// Queued for the peer.
    Outbound,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inbound => f.write_str("<"),
            Self::Outbound => f.write_str(">"),
        }
    }
}

/// Observes every line the channel sends or receives.
///
/// Purely diagnostic: a tap can't alter or drop lines. Every line is also
/// logged at `debug` level regardless of whether a tap is installed.
pub trait WireTap: Send + Sync + 'static {
    /// Records one line (without its trailing newline).
    fn record(&self, direction: Direction, line: &str);
}

// ---------------------------------------------------------------------------
// Channel
// ---------------------------------------------------------------------------

/// Where the write half lives over the channel's lifetime.
enum WriterSlot {
    /// No message sent yet; the writer task hasn't been spawned.
    Idle {
        writer: BoxedWriter,
        queue: mpsc::UnboundedReceiver<String>,
    },
    /// The writer task owns the write half.
    Running(JoinHandle<()>),
    /// `close()` has taken the write half.
    Closed,
}

/// A line-oriented message pipeline over one connected duplex stream.
///
/// The channel doesn't set up connections itself; hand it a stream that
/// is already connected (a `TcpStream`, one end of `tokio::io::duplex`,
/// ...). Share it between tasks behind an `Arc`; every method takes
/// `&self`.
///
/// # Example
///
/// ```rust,no_run
/// use omok_protocol::Message;
/// use omok_transport::Channel;
///
/// # async fn demo(stream: tokio::net::TcpStream) {
/// let channel = Channel::new(stream);
/// channel.set_listener(|msg: Message| println!("got {msg:?}"));
/// channel.start_receiving().expect("first start");
/// channel.send(&Message::Play).expect("channel open");
/// // ...
/// channel.close().await;
/// # }
/// ```
pub struct Channel {
    id: ChannelId,
    codec: Arc<dyn Codec>,
    tap: Option<Arc<dyn WireTap>>,
    listener: Arc<ListenerSlot>,
    outbound: mpsc::UnboundedSender<String>,
    writer: Mutex<WriterSlot>,
    reader: Mutex<Option<BoxedReader>>,
    /// Tells the writer task to shut its half down and exit.
    stop_writer: watch::Sender<bool>,
    /// Tells the receive loop to stop. Shared with the writer task so a
    /// write fault can end the channel too.
    stop_reader: Arc<watch::Sender<bool>>,
    closed: AtomicBool,
    runtime: Handle,
}

impl Channel {
    /// Wraps a connected stream using the default (permissive) text codec.
    ///
    /// # Panics
    /// Panics if called outside a Tokio runtime. The runtime is captured
    /// here so that [`send`](Self::send) can later be called from any
    /// thread.
    pub fn new<S>(stream: S) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        Self::with_codec(stream, Arc::new(TextCodec::default()))
    }

    /// Wraps a connected stream using the given codec.
    ///
    /// # Panics
    /// Panics if called outside a Tokio runtime.
    pub fn with_codec<S>(stream: S, codec: Arc<dyn Codec>) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (read_half, write_half) = tokio::io::split(stream);
        let (outbound, queue) = mpsc::unbounded_channel();
        let (stop_writer, _) = watch::channel(false);
        let (stop_reader, _) = watch::channel(false);

        let id = ChannelId::new(
            NEXT_CHANNEL_ID.fetch_add(1, Ordering::Relaxed),
        );
        tracing::debug!(channel_id = %id, "channel created");

        Self {
            id,
            codec,
            tap: None,
            listener: Arc::new(RwLock::new(None)),
            outbound,
            writer: Mutex::new(WriterSlot::Idle {
                writer: Box::new(write_half),
                queue,
            }),
            reader: Mutex::new(Some(Box::new(read_half))),
            stop_writer,
            stop_reader: Arc::new(stop_reader),
            closed: AtomicBool::new(false),
            runtime: Handle::current(),
        }
    }

    /// Installs a [`WireTap`] that sees every line in both directions.
    pub fn with_tap(mut self, tap: Arc<dyn WireTap>) -> Self {
        self.tap = Some(tap);
        self
    }

    /// Returns the unique identifier for this channel.
    pub fn id(&self) -> ChannelId {
        self.id
    }

    /// Returns `true` once [`close`](Self::close) has been called.
    ///
    /// A channel whose peer went away is not "closed" in this sense until
    /// someone closes it; the listener learns about the peer through
    /// [`Message::Closed`].
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Registers the receiver of decoded messages.
    ///
    /// Replaces any previous listener; the receive loop picks up the new
    /// one starting with the next message it dispatches.
    pub fn set_listener(&self, listener: impl MessageListener) {
        let listener: Arc<dyn MessageListener> = Arc::new(listener);
        *self
            .listener
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(listener);
    }

    /// Runs the receive loop on the caller's task until the stream ends.
    ///
    /// Returns after the listener has been given [`Message::Closed`].
    ///
    /// # Errors
    /// - [`TransportError::AlreadyReceiving`] if a receive loop was
    ///   already started for this channel.
    /// - [`TransportError::Closed`] if the channel was closed first.
    pub async fn receive(&self) -> Result<(), TransportError> {
        let reader = self.take_reader()?;
        self.receive_loop(reader).await;
        Ok(())
    }

    /// Spawns the receive loop as a background task and returns at once.
    ///
    /// # Errors
    /// Same as [`receive`](Self::receive).
    pub fn start_receiving(&self) -> Result<JoinHandle<()>, TransportError> {
        let reader = self.take_reader()?;
        Ok(self.runtime.spawn(self.receive_loop(reader)))
    }

    /// Queues a message for the peer and returns immediately.
    ///
    /// Messages from one caller reach the wire in call order. Delivery is
    /// best-effort: a write fault is not reported here, it ends the
    /// channel and shows up at the listener as [`Message::Closed`].
    ///
    /// # Errors
    /// - [`TransportError::Closed`] if the channel was closed.
    /// - [`TransportError::Encode`] for the local-only message kinds.
    pub fn send(&self, message: &Message) -> Result<(), TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        let line = self.codec.encode(message)?;
        record(self.id, self.tap.as_deref(), Direction::Outbound, &line);

        self.ensure_writer();
        self.outbound
            .send(line)
            .map_err(|_| TransportError::Closed)
    }

    /// Closes the channel. Safe to call more than once, and concurrently
    /// with in-flight sends or receives.
    ///
    /// The write half is shut down first. When both peers close at the
    /// same time, each one's pending read is released by the other's
    /// shutdown, so neither side waits on the other. Lines still queued
    /// at this point may be dropped; lines already flushed are not
    /// affected.
    ///
    /// Don't await this from inside a [`MessageListener`] callback; spawn
    /// it instead.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        tracing::debug!(channel_id = %self.id, "closing channel");

        let slot = mem::replace(&mut *lock(&self.writer), WriterSlot::Closed);
        match slot {
            WriterSlot::Idle { mut writer, .. } => {
                if let Err(e) = writer.shutdown().await {
                    tracing::debug!(
                        channel_id = %self.id, error = %e,
                        "shutting down write half failed"
                    );
                }
            }
            WriterSlot::Running(handle) => {
                self.stop_writer.send_replace(true);
                if let Err(e) = handle.await {
                    tracing::debug!(
                        channel_id = %self.id, error = %e,
                        "writer task ended abnormally"
                    );
                }
            }
            WriterSlot::Closed => {}
        }

        self.stop_reader.send_replace(true);
        // A read half nobody started receiving on is simply dropped.
        drop(lock(&self.reader).take());
    }

    fn take_reader(&self) -> Result<BoxedReader, TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        lock(&self.reader)
            .take()
            .ok_or(TransportError::AlreadyReceiving)
    }

    /// Spawns the writer task if it isn't running yet.
    fn ensure_writer(&self) {
        let mut slot = lock(&self.writer);
        if !matches!(*slot, WriterSlot::Idle { .. }) {
            return;
        }
        if let WriterSlot::Idle { writer, queue } =
            mem::replace(&mut *slot, WriterSlot::Closed)
        {
            let handle = self.runtime.spawn(write_loop(
                self.id,
                writer,
                queue,
                self.stop_writer.subscribe(),
                Arc::clone(&self.stop_reader),
            ));
            *slot = WriterSlot::Running(handle);
        }
    }

    /// Builds the receive-loop future. Owns everything it touches, so it
    /// can run inline or be spawned.
    fn receive_loop(
        &self,
        reader: BoxedReader,
    ) -> impl Future<Output = ()> + Send + use<> {
        receive_loop(
            self.id,
            reader,
            Arc::clone(&self.codec),
            self.tap.clone(),
            Arc::clone(&self.listener),
            self.stop_reader.subscribe(),
        )
    }
}

impl fmt::Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("id", &self.id)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Background loops
// ---------------------------------------------------------------------------

async fn receive_loop(
    channel_id: ChannelId,
    reader: BoxedReader,
    codec: Arc<dyn Codec>,
    tap: Option<Arc<dyn WireTap>>,
    listener: Arc<ListenerSlot>,
    mut stop: watch::Receiver<bool>,
) {
    tracing::debug!(%channel_id, "receive loop started");
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();

    loop {
        buf.clear();
        let read = tokio::select! {
            biased;
            _ = stop.wait_for(|stop| *stop) => {
                tracing::debug!(%channel_id, "receive loop stopped");
                break;
            }
            read = reader.read_until(b'\n', &mut buf) => read,
        };

        match read {
            Ok(0) => {
                tracing::debug!(%channel_id, "peer closed the stream");
                break;
            }
            Ok(_) => {
                // Invalid UTF-8 is a decode fault, not an I/O fault: the
                // replacement characters make the line decode as Unknown.
                let text = String::from_utf8_lossy(&buf);
                let line = text.trim_end_matches(['\n', '\r']);
                record(channel_id, tap.as_deref(), Direction::Inbound, line);
                dispatch(&listener, codec.decode(line));
            }
            Err(e) => {
                tracing::warn!(%channel_id, error = %e, "read failed");
                break;
            }
        }
    }

    dispatch(&listener, Message::Closed);
}

async fn write_loop(
    channel_id: ChannelId,
    mut writer: BoxedWriter,
    mut queue: mpsc::UnboundedReceiver<String>,
    mut stop: watch::Receiver<bool>,
    stop_reader: Arc<watch::Sender<bool>>,
) {
    tracing::debug!(%channel_id, "writer task started");

    loop {
        let line = tokio::select! {
            biased;
            _ = stop.wait_for(|stop| *stop) => break,
            line = queue.recv() => match line {
                Some(line) => line,
                None => break,
            },
        };

        let written = tokio::select! {
            biased;
            _ = stop.wait_for(|stop| *stop) => break,
            written = write_line(&mut writer, &line) => written,
        };

        if let Err(e) = written {
            tracing::warn!(%channel_id, error = %e, "write failed, ending channel");
            stop_reader.send_replace(true);
            break;
        }
    }

    if let Err(e) = writer.shutdown().await {
        tracing::debug!(%channel_id, error = %e, "shutting down write half failed");
    }
    tracing::debug!(%channel_id, "writer task stopped");
}

async fn write_line(
    writer: &mut BoxedWriter,
    line: &str,
) -> std::io::Result<()> {
    writer.write_all(line.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Hands a message to the current listener.
///
/// The listener is cloned out of the slot before it's called, so a
/// concurrent `set_listener` never waits on a running callback.
fn dispatch(listener: &ListenerSlot, message: Message) {
    let current = listener
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone();
    match current {
        Some(listener) => listener.on_message(message),
        None => tracing::debug!(
            kind = %message.kind(),
            "no listener registered, message dropped"
        ),
    }
}

fn record(
    channel_id: ChannelId,
    tap: Option<&dyn WireTap>,
    direction: Direction,
    line: &str,
) {
    tracing::debug!(%channel_id, direction = %direction, line, "wire");
    if let Some(tap) = tap {
        tap.record(direction, line);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
