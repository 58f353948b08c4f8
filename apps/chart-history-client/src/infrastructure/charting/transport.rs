//! WebSocket Transport
//!
//! `ChartConnector` adapter over `tokio-tungstenite`. Each `connect` dials a
//! fresh socket with the browser-style `Origin` and `User-Agent` headers the
//! upstream expects. Writes carry their own deadline; reads are handed to
//! the stream collector.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::{Sink, SinkExt, Stream};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::{ORIGIN, USER_AGENT};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

use super::codec::FrameCodec;
use super::collector;
use crate::application::ports::{ChartConnection, ChartConnector, TransportError};
use crate::domain::frame::WireFrame;

/// Browser user agent sent with the handshake.
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Socket dial settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WsConnectorConfig {
    /// WebSocket endpoint.
    pub url: String,
    /// `Origin` header value.
    pub origin: String,
    /// `User-Agent` header value.
    pub user_agent: String,
    /// Deadline for dial plus handshake.
    pub handshake_timeout: Duration,
    /// Deadline for each frame write.
    pub write_timeout: Duration,
}

impl WsConnectorConfig {
    /// Settings for `url` with default timeouts.
    #[must_use]
    pub fn new(url: impl Into<String>, origin: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            origin: origin.into(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            handshake_timeout: Duration::from_secs(10),
            write_timeout: Duration::from_secs(5),
        }
    }
}

/// Dials WebSocket connections to the charting socket.
#[derive(Debug, Clone)]
pub struct WsConnector {
    config: WsConnectorConfig,
}

impl WsConnector {
    /// Create a connector.
    #[must_use]
    pub const fn new(config: WsConnectorConfig) -> Self {
        Self { config }
    }

    /// Active settings.
    #[must_use]
    pub const fn config(&self) -> &WsConnectorConfig {
        &self.config
    }

    fn header(value: &str) -> Result<HeaderValue, TransportError> {
        HeaderValue::from_str(value)
            .map_err(|e| TransportError::Connect(format!("invalid header value: {e}")))
    }
}

#[async_trait]
impl ChartConnector for WsConnector {
    async fn connect(&self) -> Result<Box<dyn ChartConnection>, TransportError> {
        let mut request = self
            .config
            .url
            .as_str()
            .into_client_request()
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        let headers = request.headers_mut();
        headers.insert(ORIGIN, Self::header(&self.config.origin)?);
        headers.insert(USER_AGENT, Self::header(&self.config.user_agent)?);

        tracing::debug!(url = %self.config.url, "Connecting to chart socket");

        let (socket, response) = tokio::time::timeout(
            self.config.handshake_timeout,
            tokio_tungstenite::connect_async(request),
        )
        .await
        .map_err(|_| TransportError::HandshakeTimeout(self.config.handshake_timeout))?
        .map_err(|e| TransportError::Connect(e.to_string()))?;

        tracing::debug!(status = %response.status(), "Chart socket connected");

        Ok(Box::new(WsConnection::new(socket, self.config.write_timeout)))
    }
}

/// One live chart socket.
pub struct WsConnection<S = Socket> {
    socket: S,
    codec: FrameCodec,
    write_timeout: Duration,
}

impl<S> WsConnection<S> {
    /// Wrap an established WebSocket.
    #[must_use]
    pub const fn new(socket: S, write_timeout: Duration) -> Self {
        Self {
            socket,
            codec: FrameCodec::new(),
            write_timeout,
        }
    }
}

#[async_trait]
impl<S> ChartConnection for WsConnection<S>
where
    S: Stream<Item = Result<Message, WsError>> + Sink<Message, Error = WsError> + Unpin + Send + 'static,
{
    async fn send(&mut self, frame: &WireFrame) -> Result<(), TransportError> {
        let text = self
            .codec
            .encode(frame)
            .map_err(|e| TransportError::Encode(e.to_string()))?;

        tokio::time::timeout(self.write_timeout, self.socket.send(Message::text(text)))
            .await
            .map_err(|_| TransportError::WriteTimeout(self.write_timeout))?
            .map_err(|e| TransportError::Write(e.to_string()))
    }

    async fn collect(
        self: Box<Self>,
        deadline: Duration,
        cancel: &CancellationToken,
    ) -> Result<String, TransportError> {
        collector::collect(self.socket, deadline, cancel).await
    }

    async fn close(mut self: Box<Self>) {
        match tokio::time::timeout(self.write_timeout, self.socket.close()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::debug!(error = %e, "Error closing chart socket"),
            Err(_) => tracing::debug!("Timed out closing chart socket"),
        }
    }
}
