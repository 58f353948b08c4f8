//! Stream Collector
//!
//! Accumulates the upstream's streamed reply to a historical request until a
//! completion marker appears. A spawned reader task owns the socket; the
//! caller races its single-use result channel against the deadline and the
//! cancellation token. Whatever the outcome, the reader sends a close frame
//! before it exits; timing out or cancelling only tells it to stop reading.

use std::time::Duration;

use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::oneshot;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_util::sync::CancellationToken;

use super::codec::{FrameCodec, Packet};
use crate::application::ports::TransportError;

/// Substrings that mark a complete reply.
pub const COMPLETION_MARKERS: [&str; 2] = ["series_completed", "timescale_update"];

/// Upstream methods that end the attempt immediately.
pub const ERROR_METHODS: [&str; 4] = [
    "critical_error",
    "protocol_error",
    "symbol_error",
    "series_error",
];

/// Upper bound for sending the close frame once reading stops.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Lifecycle of a [`RawStreamBuffer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BufferState {
    /// Nothing received yet.
    #[default]
    Empty,
    /// Messages received, no completion marker yet.
    Accumulating,
    /// A completion marker was seen.
    Complete,
    /// The connection failed.
    Failed,
}

impl BufferState {
    /// Whether no further appends are accepted.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Failed)
    }
}

/// Raw text accumulated from one connection.
///
/// Moves forward only: appends after `Complete` or `Failed` are ignored.
#[derive(Debug, Default)]
pub struct RawStreamBuffer {
    text: String,
    messages: usize,
    state: BufferState,
}

impl RawStreamBuffer {
    /// Append one message followed by a newline and return the new state.
    pub fn push(&mut self, message: &str) -> BufferState {
        if self.state.is_terminal() {
            return self.state;
        }

        self.text.push_str(message);
        self.text.push('\n');
        self.messages += 1;
        self.state = if COMPLETION_MARKERS.iter().any(|m| message.contains(m)) {
            BufferState::Complete
        } else {
            BufferState::Accumulating
        };
        self.state
    }

    /// Mark the buffer failed unless it already completed.
    pub fn fail(&mut self) {
        if !self.state.is_terminal() {
            self.state = BufferState::Failed;
        }
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> BufferState {
        self.state
    }

    /// Whether any message has been received.
    #[must_use]
    pub const fn has_data(&self) -> bool {
        self.messages > 0
    }

    /// Number of messages appended.
    #[must_use]
    pub const fn messages(&self) -> usize {
        self.messages
    }

    /// Consume the buffer.
    #[must_use]
    pub fn into_string(self) -> String {
        self.text
    }
}

/// Collect messages from `stream` until a completion marker, the deadline,
/// or cancellation.
///
/// # Errors
///
/// - [`TransportError::StreamTimeout`] when `deadline` elapses first.
/// - [`TransportError::Cancelled`] when `cancel` fires first.
/// - Any error reported by the reader task.
pub async fn collect<S>(
    stream: S,
    deadline: Duration,
    cancel: &CancellationToken,
) -> Result<String, TransportError>
where
    S: Stream<Item = Result<Message, WsError>> + Sink<Message, Error = WsError> + Unpin + Send + 'static,
{
    let (result_tx, result_rx) = oneshot::channel();
    let stop = CancellationToken::new();
    let _stop_reader = stop.clone().drop_guard();

    tokio::spawn(async move {
        let mut stream = stream;
        tokio::select! {
            () = stop.cancelled() => {}
            result = read_until_complete(&mut stream, FrameCodec::new()) => {
                let _ = result_tx.send(result);
            }
        }
        close_quietly(&mut stream).await;
    });

    tokio::select! {
        () = cancel.cancelled() => {
            tracing::debug!("Collection cancelled");
            Err(TransportError::Cancelled)
        }
        () = tokio::time::sleep(deadline) => {
            tracing::debug!(deadline_ms = deadline.as_millis(), "Collection deadline elapsed");
            Err(TransportError::StreamTimeout(deadline))
        }
        result = result_rx => result.unwrap_or(Err(TransportError::ConnectionClosed)),
    }
}

async fn close_quietly<S>(stream: &mut S)
where
    S: Sink<Message, Error = WsError> + Unpin,
{
    match tokio::time::timeout(CLOSE_TIMEOUT, stream.close()).await {
        Ok(Ok(())) => tracing::trace!("Chart socket closed"),
        Ok(Err(e)) => tracing::debug!(error = %e, "Error closing chart socket"),
        Err(_) => tracing::debug!("Timed out closing chart socket"),
    }
}

async fn read_until_complete<S>(stream: &mut S, codec: FrameCodec) -> Result<String, TransportError>
where
    S: Stream<Item = Result<Message, WsError>> + Sink<Message, Error = WsError> + Unpin,
{
    let mut buffer = RawStreamBuffer::default();

    let error = loop {
        match stream.next().await {
            Some(Ok(Message::Text(text))) => {
                let text = text.as_str();
                if let Err(e) = handle_packets(stream, &codec, text).await {
                    break e;
                }

                if buffer.push(text) == BufferState::Complete {
                    tracing::debug!(messages = buffer.messages(), "Completion marker received");
                    return Ok(buffer.into_string());
                }
            }
            Some(Ok(Message::Ping(data))) => {
                if let Err(e) = stream.send(Message::Pong(data)).await {
                    break TransportError::Write(e.to_string());
                }
            }
            Some(Ok(Message::Close(frame))) => {
                let normal = frame.as_ref().is_none_or(|f| f.code == CloseCode::Normal);
                tracing::debug!(?frame, messages = buffer.messages(), "Server sent close frame");
                if normal && buffer.has_data() {
                    return Ok(buffer.into_string());
                }
                break TransportError::ConnectionClosed;
            }
            Some(Ok(_)) => {}
            Some(Err(e)) => break TransportError::Read(e.to_string()),
            None => {
                tracing::debug!("WebSocket stream ended");
                break TransportError::ConnectionClosed;
            }
        }
    };

    buffer.fail();
    tracing::debug!(
        state = ?buffer.state(),
        messages = buffer.messages(),
        error = %error,
        "Collection failed"
    );
    Err(error)
}

/// Echo heartbeats and surface upstream errors found in one text message.
async fn handle_packets<S>(
    stream: &mut S,
    codec: &FrameCodec,
    text: &str,
) -> Result<(), TransportError>
where
    S: Sink<Message, Error = WsError> + Unpin,
{
    let packets = match codec.decode(text) {
        Ok(packets) => packets,
        Err(e) => {
            tracing::trace!(error = %e, "Buffering undecodable text");
            return Ok(());
        }
    };

    for packet in &packets {
        match packet {
            Packet::Heartbeat(body) => {
                tracing::trace!(heartbeat = %body, "Echoing heartbeat");
                stream
                    .send(Message::text(codec.encode_raw(body)))
                    .await
                    .map_err(|e| TransportError::Write(e.to_string()))?;
            }
            Packet::Message(value) => {
                if let Some(method) = packet.method()
                    && ERROR_METHODS.contains(&method)
                {
                    let detail = value.get("p").map(ToString::to_string).unwrap_or_default();
                    tracing::warn!(method, detail = %detail, "Upstream reported an error");
                    return Err(TransportError::Protocol(format!("{method}: {detail}")));
                }
            }
            Packet::Text(_) => {}
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use tokio::io::DuplexStream;
    use tokio_tungstenite::WebSocketStream;
    use tokio_tungstenite::tungstenite::protocol::{CloseFrame, Role};

    use super::*;

    async fn socket_pair() -> (WebSocketStream<DuplexStream>, WebSocketStream<DuplexStream>) {
        let (client_io, server_io) = tokio::io::duplex(64 * 1024);
        let client = WebSocketStream::from_raw_socket(client_io, Role::Client, None).await;
        let server = WebSocketStream::from_raw_socket(server_io, Role::Server, None).await;
        (client, server)
    }

    fn framed(body: &str) -> Message {
        Message::text(FrameCodec::new().encode_raw(body))
    }

    /// Read until the client's close frame arrives.
    async fn expect_close(server: &mut WebSocketStream<DuplexStream>) {
        let wait = async {
            while let Some(Ok(message)) = server.next().await {
                if message.is_close() {
                    return true;
                }
            }
            false
        };
        assert!(
            tokio::time::timeout(Duration::from_secs(2), wait)
                .await
                .unwrap(),
            "client never sent a close frame"
        );
    }

    #[test]
    fn buffer_moves_forward_only() {
        let mut buffer = RawStreamBuffer::default();
        assert_eq!(buffer.state(), BufferState::Empty);
        assert!(!buffer.has_data());

        assert_eq!(buffer.push("~m~5~m~hello"), BufferState::Accumulating);
        assert_eq!(
            buffer.push(r#"{"m":"series_completed"}"#),
            BufferState::Complete
        );
        assert_eq!(buffer.push("trailing"), BufferState::Complete);
        buffer.fail();

        assert_eq!(buffer.state(), BufferState::Complete);
        assert_eq!(buffer.messages(), 2);
        assert_eq!(
            buffer.into_string(),
            "~m~5~m~hello\n{\"m\":\"series_completed\"}\n"
        );
    }

    #[test]
    fn failed_buffer_ignores_appends() {
        let mut buffer = RawStreamBuffer::default();
        buffer.push("partial");
        buffer.fail();
        assert_eq!(buffer.push("timescale_update"), BufferState::Failed);
        assert_eq!(buffer.messages(), 1);
    }

    #[tokio::test]
    async fn collects_until_marker_and_echoes_heartbeat() {
        let (client, mut server) = socket_pair().await;

        server.send(framed("~h~1")).await.unwrap();
        server
            .send(framed(r#"{"m":"du","p":["cs",{"s1":{"s":[]}}]}"#))
            .await
            .unwrap();
        server
            .send(framed(r#"{"m":"series_completed","p":["cs","s1"]}"#))
            .await
            .unwrap();

        let raw = collect(client, Duration::from_secs(5), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(raw.lines().count(), 3);
        assert!(raw.contains("series_completed"));

        let echo = server.next().await.unwrap().unwrap();
        assert_eq!(echo, framed("~h~1"));
    }

    #[tokio::test]
    async fn close_after_data_completes() {
        let (client, mut server) = socket_pair().await;

        server.send(framed("hello")).await.unwrap();
        server.close(None).await.unwrap();

        let raw = collect(client, Duration::from_secs(5), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(raw, "~m~5~m~hello\n");
    }

    #[tokio::test]
    async fn abnormal_close_after_data_is_an_error() {
        let (client, mut server) = socket_pair().await;

        server.send(framed("hello")).await.unwrap();
        server
            .close(Some(CloseFrame {
                code: CloseCode::Away,
                reason: "going away".into(),
            }))
            .await
            .unwrap();

        let err = collect(client, Duration::from_secs(5), &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err, TransportError::ConnectionClosed);
    }

    #[tokio::test]
    async fn completed_collection_closes_the_socket() {
        let (client, mut server) = socket_pair().await;
        server
            .send(framed(r#"{"m":"series_completed","p":["cs","s1"]}"#))
            .await
            .unwrap();

        collect(client, Duration::from_secs(5), &CancellationToken::new())
            .await
            .unwrap();

        expect_close(&mut server).await;
    }

    #[tokio::test]
    async fn upstream_error_closes_the_socket() {
        let (client, mut server) = socket_pair().await;
        server
            .send(framed(r#"{"m":"series_error","p":["cs","s1","bad resolution"]}"#))
            .await
            .unwrap();

        collect(client, Duration::from_secs(5), &CancellationToken::new())
            .await
            .unwrap_err();

        expect_close(&mut server).await;
    }

    #[tokio::test]
    async fn timed_out_collection_closes_the_socket() {
        let (client, mut server) = socket_pair().await;

        let err = collect(client, Duration::from_millis(50), &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err, TransportError::StreamTimeout(Duration::from_millis(50)));

        expect_close(&mut server).await;
    }

    #[tokio::test]
    async fn close_before_data_is_an_error() {
        let (client, mut server) = socket_pair().await;
        server.close(None).await.unwrap();

        let err = collect(client, Duration::from_secs(5), &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err, TransportError::ConnectionClosed);
    }

    #[tokio::test]
    async fn upstream_error_fails_fast() {
        let (client, mut server) = socket_pair().await;
        server
            .send(framed(r#"{"m":"symbol_error","p":["cs","symbol_1","invalid symbol"]}"#))
            .await
            .unwrap();

        let err = collect(client, Duration::from_secs(5), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Protocol(ref m) if m.starts_with("symbol_error")));
    }

    #[tokio::test]
    async fn silent_upstream_times_out() {
        let (client, _server) = socket_pair().await;

        let err = collect(client, Duration::from_millis(50), &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err, TransportError::StreamTimeout(Duration::from_millis(50)));
    }

    #[tokio::test]
    async fn cancellation_wins_over_deadline() {
        let (client, _server) = socket_pair().await;
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = collect(client, Duration::from_secs(5), &cancel)
            .await
            .unwrap_err();
        assert_eq!(err, TransportError::Cancelled);
    }
}
