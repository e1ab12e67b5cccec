//! One WebSocket session: a writer task draining the connection's outbound
//! queue, and a read loop feeding decoded requests to the hub.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use parley_common::HubError;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use tracing::{debug, info, warn};

use super::TransportSettings;
use crate::connection::{CloseReason, Connection, Credentials};
use crate::hub::Hub;
use crate::protocol::{self, Frame, Request, ServerFrame};

type WsSink = SplitSink<WebSocketStream<TcpStream>, Message>;

/// How long a closing session may spend flushing already queued frames.
const FLUSH_TIMEOUT: Duration = Duration::from_secs(1);

fn close_frame(code: CloseCode, reason: &str) -> Message {
    Message::Close(Some(CloseFrame {
        code,
        reason: String::from(reason).into(),
    }))
}

fn close_code(reason: CloseReason) -> CloseCode {
    match reason {
        CloseReason::Normal => CloseCode::Normal,
        CloseReason::GoingAway | CloseReason::Idle => CloseCode::Away,
        CloseReason::Protocol => CloseCode::Protocol,
        CloseReason::SlowConsumer => CloseCode::Policy,
    }
}

/// Run a session to completion.
pub(crate) async fn run(
    hub: Hub,
    ws: WebSocketStream<TcpStream>,
    peer: SocketAddr,
    credentials: Credentials,
    settings: TransportSettings,
) {
    let (mut sink, mut stream) = ws.split();

    let (conn, rx) = match hub.connect(credentials) {
        Ok(accepted) => accepted,
        Err(e) => {
            warn!(peer = %peer, error = %e, "Connection refused");
            let refusal = ServerFrame::error(&e).encode();
            let goodbye = async {
                let _ = sink.send(Message::Text(refusal.to_string().into())).await;
                let _ = sink.send(close_frame(CloseCode::Again, &e.to_string())).await;
            };
            let _ = tokio::time::timeout(FLUSH_TIMEOUT, goodbye).await;
            return;
        }
    };
    info!(connection = %conn.id(), peer = %peer, role = ?conn.role(), "Session opened");

    let writer = tokio::spawn(write_loop(sink, rx, Arc::clone(&conn), settings.ping_interval));

    loop {
        let next = tokio::select! {
            _ = conn.closed() => break,
            next = tokio::time::timeout(settings.idle_timeout, stream.next()) => next,
        };
        let message = match next {
            Err(_) => {
                info!(connection = %conn.id(), "Idle timeout");
                hub.disconnect(conn.id(), CloseReason::Idle);
                break;
            }
            Ok(None) => break,
            Ok(Some(Err(e))) => {
                debug!(connection = %conn.id(), error = %e, "WS error");
                break;
            }
            Ok(Some(Ok(message))) => message,
        };

        let keep_going = match message {
            Message::Text(text) => handle_text(&hub, &conn, &text).await,
            Message::Binary(data) => match std::str::from_utf8(&data) {
                Ok(text) => handle_text(&hub, &conn, text).await,
                Err(_) => {
                    protocol_violation(&hub, &conn, HubError::Protocol("binary frame is not UTF-8".into()));
                    false
                }
            },
            Message::Close(_) => false,
            // Pings are answered by tungstenite; any traffic resets the idle timer.
            _ => true,
        };
        if !keep_going {
            break;
        }
    }

    hub.disconnect(conn.id(), CloseReason::Normal);
    let _ = writer.await;

    info!(
        connection = %conn.id(),
        peer = %peer,
        reason = conn.close_reason().unwrap_or(CloseReason::Normal).describe(),
        "Session closed"
    );
}

/// Decode and apply one text frame. Returns `false` when the session must end.
async fn handle_text(hub: &Hub, conn: &Arc<Connection>, text: &str) -> bool {
    let request = match protocol::decode(text) {
        Ok(request) => request,
        Err(err) => {
            protocol_violation(hub, conn, err);
            return false;
        }
    };

    let subscribe_channel = match &request {
        Request::Subscribe { channel } => Some(channel.clone()),
        _ => None,
    };
    let Err(err) = hub.handle(conn, request).await else {
        return true;
    };

    if let HubError::UnknownConnection(id) = &err {
        debug!(connection = %id, "Request raced with disconnect");
        return false;
    }
    debug!(connection = %conn.id(), error = %err, "Request rejected");
    hub.reject(conn, subscribe_channel.as_deref(), &err);
    if err.closes_connection() {
        hub.disconnect(conn.id(), CloseReason::Protocol);
        return false;
    }
    true
}

fn protocol_violation(hub: &Hub, conn: &Connection, err: HubError) {
    warn!(connection = %conn.id(), error = %err, "Malformed frame, closing");
    hub.reject(conn, None, &err);
    hub.disconnect(conn.id(), CloseReason::Protocol);
}

/// Outcome of one socket write.
enum Write {
    Sent,
    Failed,
    Closed,
}

/// Send `message` unless the connection is closed first. A peer that stops
/// reading must not keep the writer parked on a full socket.
async fn send_unless_closed(sink: &mut WsSink, conn: &Connection, message: Message) -> Write {
    tokio::select! {
        biased;

        _ = conn.closed() => Write::Closed,
        sent = sink.send(message) => match sent {
            Ok(()) => Write::Sent,
            Err(_) => Write::Failed,
        },
    }
}

/// Forward queued frames to the socket and keep it alive with pings.
async fn write_loop(
    mut sink: WsSink,
    mut rx: mpsc::Receiver<Frame>,
    conn: Arc<Connection>,
    ping_interval: Duration,
) {
    let mut ping = tokio::time::interval_at(Instant::now() + ping_interval, ping_interval);
    ping.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        let message = tokio::select! {
            biased;

            _ = conn.closed() => break,
            frame = rx.recv() => match frame {
                Some(frame) => Message::Text(frame.to_string().into()),
                None => break,
            },
            _ = ping.tick() => Message::Ping(Default::default()),
        };
        match send_unless_closed(&mut sink, &conn, message).await {
            Write::Sent => {}
            Write::Closed => break,
            Write::Failed => {
                conn.close(CloseReason::Normal);
                return;
            }
        }
    }

    let reason = conn.close_reason().unwrap_or(CloseReason::Normal);
    // A slow consumer is not going to drain its backlog now.
    if reason != CloseReason::SlowConsumer {
        let flush = async {
            while let Ok(frame) = rx.try_recv() {
                if sink.send(Message::Text(frame.to_string().into())).await.is_err() {
                    return;
                }
            }
        };
        let _ = tokio::time::timeout(FLUSH_TIMEOUT, flush).await;
    }
    drop(rx);

    let goodbye = async {
        let _ = sink.send(close_frame(close_code(reason), reason.describe())).await;
        let _ = sink.close().await;
    };
    if tokio::time::timeout(FLUSH_TIMEOUT, goodbye).await.is_err() {
        debug!(connection = %conn.id(), "Peer did not take the close frame");
    }
}

#[cfg(test)]
mod tests {
    use tokio::net::TcpListener;
    use tokio_tungstenite::{accept_async, connect_async};

    use super::*;
    use crate::connection::Role;

    /// A server-side socket whose client never reads.
    async fn stalled_pair() -> (
        WebSocketStream<TcpStream>,
        WebSocketStream<tokio_tungstenite::MaybeTlsStream<TcpStream>>,
    ) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = async {
            let (stream, _) = listener.accept().await.unwrap();
            accept_async(stream).await.unwrap()
        };
        let (server, client) = tokio::join!(server, connect_async(format!("ws://{addr}/")));
        (server, client.unwrap().0)
    }

    /// Enqueue large frames until the writer can no longer keep up.
    async fn fill_until_blocked(conn: &Connection) {
        let big = Frame::from("x".repeat(1 << 20));
        for _ in 0..1024 {
            match conn.enqueue(Arc::clone(&big)) {
                Ok(()) => tokio::time::sleep(Duration::from_millis(1)).await,
                Err(HubError::QueueOverflow(_)) => return,
                Err(e) => panic!("unexpected enqueue error: {e}"),
            }
        }
        panic!("socket never filled up");
    }

    #[tokio::test]
    async fn close_interrupts_a_send_stuck_on_the_socket() {
        let (server, _client) = stalled_pair().await;
        let (sink, _stream) = server.split();
        let (conn, rx) = Connection::new(Role::Subscriber, Credentials::default(), 4);
        let writer = tokio::spawn(write_loop(
            sink,
            rx,
            Arc::clone(&conn),
            Duration::from_secs(60),
        ));

        fill_until_blocked(&conn).await;
        assert!(!writer.is_finished());

        conn.close(CloseReason::SlowConsumer);
        tokio::time::timeout(Duration::from_secs(5), writer)
            .await
            .expect("writer still parked on the socket after close")
            .unwrap();
    }

    #[tokio::test]
    async fn writer_sends_close_frame_for_reason() {
        let (server, mut client) = stalled_pair().await;
        let (sink, _stream) = server.split();
        let (conn, rx) = Connection::new(Role::Subscriber, Credentials::default(), 4);
        let writer = tokio::spawn(write_loop(
            sink,
            rx,
            Arc::clone(&conn),
            Duration::from_secs(60),
        ));

        conn.enqueue(Frame::from("{\"event\":\"pong\"}")).unwrap();
        conn.close(CloseReason::GoingAway);
        writer.await.unwrap();

        let mut saw_close = None;
        while let Some(Ok(message)) = client.next().await {
            if let Message::Close(frame) = message {
                saw_close = frame.map(|f| f.code);
                break;
            }
        }
        assert_eq!(saw_close, Some(CloseCode::Away));
    }
}
