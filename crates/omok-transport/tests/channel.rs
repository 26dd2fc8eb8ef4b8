//! Integration tests for the channel and the TCP transport.
//!
//! Most tests drive a [`Channel`] against one end of a
//! `tokio::io::duplex` pipe and play the peer by hand on the other end,
//! reading and writing raw lines. That keeps the wire format visible in
//! the assertions. The last few tests use real TCP sockets.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use omok_protocol::{Message, PlayAnswer, TextCodec};
use omok_transport::{
    Channel, Direction, Transport, TcpTransport, TransportError, WireTap,
    connect,
};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;

const WAIT: Duration = Duration::from_secs(2);

// =========================================================================
// Helpers
// =========================================================================

/// Installs a listener that forwards every message into a channel.
fn collect(channel: &Channel) -> mpsc::UnboundedReceiver<Message> {
    let (tx, rx) = mpsc::unbounded_channel();
    channel.set_listener(move |msg: Message| {
        let _ = tx.send(msg);
    });
    rx
}

async fn next(rx: &mut mpsc::UnboundedReceiver<Message>) -> Message {
    tokio::time::timeout(WAIT, rx.recv())
        .await
        .expect("message should arrive in time")
        .expect("listener should still be alive")
}

async fn read_line<R>(reader: &mut BufReader<R>) -> Option<String>
where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut line = String::new();
    let n = tokio::time::timeout(WAIT, reader.read_line(&mut line))
        .await
        .expect("line should arrive in time")
        .expect("read should succeed");
    (n > 0).then(|| line.trim_end().to_string())
}

#[derive(Default)]
struct RecordingTap {
    lines: Mutex<Vec<(Direction, String)>>,
}

impl WireTap for RecordingTap {
    fn record(&self, direction: Direction, line: &str) {
        self.lines
            .lock()
            .unwrap()
            .push((direction, line.to_string()));
    }
}

// =========================================================================
// Outbound
// =========================================================================

#[tokio::test]
async fn test_sends_reach_the_wire_in_call_order() {
    let (local, remote) = tokio::io::duplex(1024);
    let channel = Channel::new(local);
    let mut peer = BufReader::new(remote);

    channel.send(&Message::Play).unwrap();
    channel.send(&Message::Move { col: 3, row: 4 }).unwrap();
    channel.send(&Message::Quit).unwrap();

    assert_eq!(read_line(&mut peer).await.as_deref(), Some("play:"));
    assert_eq!(read_line(&mut peer).await.as_deref(), Some("move:3,4"));
    assert_eq!(read_line(&mut peer).await.as_deref(), Some("quit:"));
}

#[tokio::test]
async fn test_send_local_only_message_is_an_encode_error() {
    let (local, _remote) = tokio::io::duplex(64);
    let channel = Channel::new(local);

    let result = channel.send(&Message::Closed);

    assert!(
        matches!(result, Err(TransportError::Encode(_))),
        "Closed has no wire form, got {result:?}"
    );
}

#[tokio::test]
async fn test_many_sends_from_one_caller_stay_ordered() {
    let (local, remote) = tokio::io::duplex(64);
    let channel = Channel::new(local);
    let mut peer = BufReader::new(remote);

    // A small pipe forces the writer to block mid-queue; order must hold.
    for i in 0..50 {
        channel.send(&Message::Move { col: i, row: i + 1 }).unwrap();
    }
    for i in 0..50 {
        let expected = format!("move:{},{}", i, i + 1);
        assert_eq!(read_line(&mut peer).await, Some(expected));
    }
}

// =========================================================================
// Inbound
// =========================================================================

#[tokio::test]
async fn test_received_lines_are_decoded_in_order_then_closed() {
    let (local, mut remote) = tokio::io::duplex(1024);
    let channel = Channel::new(local);
    let mut rx = collect(&channel);
    channel.start_receiving().unwrap();

    remote
        .write_all(b"play:\nplay_ack:1,1\nmove:3,x\r\nbogus\n")
        .await
        .unwrap();
    remote.shutdown().await.unwrap();

    assert_eq!(next(&mut rx).await, Message::Play);
    assert_eq!(
        next(&mut rx).await,
        Message::PlayAck(PlayAnswer::Accepted {
            requester_first: true
        })
    );
    assert_eq!(next(&mut rx).await, Message::Move { col: 3, row: -1 });
    assert_eq!(next(&mut rx).await, Message::Unknown);
    assert_eq!(next(&mut rx).await, Message::Closed);
}

#[tokio::test]
async fn test_closed_is_delivered_exactly_once() {
    let (local, remote) = tokio::io::duplex(64);
    let channel = Channel::new(local);
    let mut rx = collect(&channel);
    let handle = channel.start_receiving().unwrap();

    drop(remote);
    assert_eq!(next(&mut rx).await, Message::Closed);

    // The loop has ended; closing afterwards must not produce another.
    tokio::time::timeout(WAIT, handle).await.unwrap().unwrap();
    channel.close().await;
    assert!(rx.try_recv().is_err(), "no message after Closed");
}

#[tokio::test]
async fn test_invalid_utf8_decodes_as_unknown() {
    let (local, mut remote) = tokio::io::duplex(64);
    let channel = Channel::new(local);
    let mut rx = collect(&channel);
    channel.start_receiving().unwrap();

    remote.write_all(b"\xff\xfe\nquit:\n").await.unwrap();

    assert_eq!(next(&mut rx).await, Message::Unknown);
    assert_eq!(next(&mut rx).await, Message::Quit);
}

#[tokio::test]
async fn test_strict_codec_is_used_for_decoding() {
    let (local, mut remote) = tokio::io::duplex(64);
    let channel = Channel::with_codec(local, Arc::new(TextCodec::strict()));
    let mut rx = collect(&channel);
    channel.start_receiving().unwrap();

    remote.write_all(b"move:3,x\nmove:3,4\n").await.unwrap();

    assert_eq!(next(&mut rx).await, Message::Unknown);
    assert_eq!(next(&mut rx).await, Message::Move { col: 3, row: 4 });
}

#[tokio::test]
async fn test_later_listener_replaces_earlier() {
    let (local, mut remote) = tokio::io::duplex(64);
    let channel = Channel::new(local);
    let mut first = collect(&channel);
    let mut second = collect(&channel);
    channel.start_receiving().unwrap();

    remote.write_all(b"quit:\n").await.unwrap();

    assert_eq!(next(&mut second).await, Message::Quit);
    // The first listener was dropped when it was replaced.
    assert!(first.recv().await.is_none());
}

#[tokio::test]
async fn test_receive_can_only_start_once() {
    let (local, _remote) = tokio::io::duplex(64);
    let channel = Channel::new(local);

    channel.start_receiving().unwrap();
    let second = channel.start_receiving();

    assert!(matches!(second, Err(TransportError::AlreadyReceiving)));
}

#[tokio::test]
async fn test_blocking_receive_returns_after_peer_closes() {
    let (local, mut remote) = tokio::io::duplex(64);
    let channel = Channel::new(local);
    let mut rx = collect(&channel);

    tokio::spawn(async move {
        remote.write_all(b"move_ack:1,2\n").await.unwrap();
        remote.shutdown().await.unwrap();
    });

    tokio::time::timeout(WAIT, channel.receive())
        .await
        .expect("receive should return once the peer is gone")
        .unwrap();

    assert_eq!(rx.recv().await, Some(Message::MoveAck { col: 1, row: 2 }));
    assert_eq!(rx.recv().await, Some(Message::Closed));
}

// =========================================================================
// Close
// =========================================================================

#[tokio::test]
async fn test_close_is_idempotent_and_shuts_the_write_side() {
    let (local, remote) = tokio::io::duplex(64);
    let channel = Channel::new(local);
    let mut peer = BufReader::new(remote);

    channel.send(&Message::Play).unwrap();
    assert_eq!(read_line(&mut peer).await.as_deref(), Some("play:"));

    channel.close().await;
    channel.close().await;

    assert!(channel.is_closed());
    // Peer sees end-of-stream.
    assert_eq!(read_line(&mut peer).await, None);
}

#[tokio::test]
async fn test_close_without_any_send_still_shuts_the_write_side() {
    let (local, mut remote) = tokio::io::duplex(64);
    let channel = Channel::new(local);

    channel.close().await;

    let mut buf = Vec::new();
    let n = tokio::time::timeout(WAIT, remote.read_to_end(&mut buf))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(n, 0);
}

#[tokio::test]
async fn test_local_close_ends_receive_loop_with_closed() {
    let (local, _remote) = tokio::io::duplex(64);
    let channel = Channel::new(local);
    let mut rx = collect(&channel);
    channel.start_receiving().unwrap();

    channel.close().await;

    assert_eq!(next(&mut rx).await, Message::Closed);
}

#[tokio::test]
async fn test_send_after_close_is_rejected() {
    let (local, _remote) = tokio::io::duplex(64);
    let channel = Channel::new(local);
    channel.close().await;

    assert!(matches!(
        channel.send(&Message::Quit),
        Err(TransportError::Closed)
    ));
    assert!(matches!(
        channel.start_receiving(),
        Err(TransportError::Closed)
    ));
}

#[tokio::test]
async fn test_simultaneous_close_does_not_deadlock() {
    let (a, b) = tokio::io::duplex(64);
    let left = Arc::new(Channel::new(a));
    let right = Arc::new(Channel::new(b));
    let mut left_rx = collect(&left);
    let mut right_rx = collect(&right);
    left.start_receiving().unwrap();
    right.start_receiving().unwrap();

    let (l, r) = (Arc::clone(&left), Arc::clone(&right));
    tokio::time::timeout(WAIT, async move {
        tokio::join!(l.close(), r.close());
    })
    .await
    .expect("both closes should finish");

    assert_eq!(next(&mut left_rx).await, Message::Closed);
    assert_eq!(next(&mut right_rx).await, Message::Closed);
}

// =========================================================================
// Wire tap
// =========================================================================

#[tokio::test]
async fn test_tap_sees_both_directions() {
    let (local, mut remote) = tokio::io::duplex(256);
    let tap = Arc::new(RecordingTap::default());
    let channel = Channel::new(local).with_tap(tap.clone());
    let mut rx = collect(&channel);
    channel.start_receiving().unwrap();

    channel.send(&Message::Move { col: 3, row: 4 }).unwrap();
    remote.write_all(b"move_ack:3,4\n").await.unwrap();
    assert_eq!(next(&mut rx).await, Message::MoveAck { col: 3, row: 4 });

    let lines = tap.lines.lock().unwrap().clone();
    assert!(lines.contains(&(Direction::Outbound, "move:3,4".into())));
    assert!(lines.contains(&(Direction::Inbound, "move_ack:3,4".into())));
}

#[test]
fn test_direction_display_matches_log_arrows() {
    assert_eq!(Direction::Inbound.to_string(), "<");
    assert_eq!(Direction::Outbound.to_string(), ">");
}

// =========================================================================
// TCP
// =========================================================================

#[tokio::test]
async fn test_tcp_accept_and_exchange() {
    let mut transport = TcpTransport::bind("127.0.0.1:0").await.unwrap();
    let addr = transport.local_addr().unwrap().to_string();

    let server = tokio::spawn(async move {
        let (stream, _) = transport.accept().await.expect("should accept");
        stream
    });
    let client_stream = connect(&addr, WAIT).await.expect("should connect");
    let server_stream = server.await.unwrap();

    let client = Channel::new(client_stream);
    let server = Channel::new(server_stream);
    let mut server_rx = collect(&server);
    let mut client_rx = collect(&client);
    server.start_receiving().unwrap();
    client.start_receiving().unwrap();

    client.send(&Message::Play).unwrap();
    assert_eq!(next(&mut server_rx).await, Message::Play);

    server
        .send(&Message::PlayAck(PlayAnswer::Rejected))
        .unwrap();
    assert_eq!(
        next(&mut client_rx).await,
        Message::PlayAck(PlayAnswer::Rejected)
    );

    client.close().await;
    assert_eq!(next(&mut server_rx).await, Message::Closed);
    assert_eq!(next(&mut client_rx).await, Message::Closed);
}

#[tokio::test]
async fn test_connect_to_unreachable_port_fails() {
    // Grab a free port, then release it so nothing is listening there.
    let transport = TcpTransport::bind("127.0.0.1:0").await.unwrap();
    let addr = transport.local_addr().unwrap().to_string();
    drop(transport);

    let result = connect(&addr, WAIT).await;

    assert!(
        matches!(result, Err(TransportError::Connect { .. })),
        "expected a connect error, got {result:?}"
    );
}

#[tokio::test]
async fn test_bind_failure_names_the_address() {
    let result = TcpTransport::bind("not-an-address").await;

    match result {
        Err(TransportError::Bind { addr, .. }) => {
            assert_eq!(addr, "not-an-address")
        }
        Err(other) => panic!("expected a bind error, got {other}"),
        Ok(_) => panic!("bind should fail"),
    }
}
