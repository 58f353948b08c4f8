//! Port Interfaces
//!
//! Driven ports for the upstream charting socket. The history service only
//! sees these traits; the WebSocket adapter lives in
//! `infrastructure::charting::transport`.
//!
//! A connection is single-use: frames are sent, then `collect` consumes it.
//! Any failure means the connection is discarded and a new one is dialed.

use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::domain::frame::WireFrame;

/// Errors raised by a chart transport.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// Dial or handshake failed.
    #[error("connection failed: {0}")]
    Connect(String),

    /// Handshake did not finish in time.
    #[error("handshake timed out after {0:?}")]
    HandshakeTimeout(Duration),

    /// A frame could not be encoded.
    #[error("frame encoding failed: {0}")]
    Encode(String),

    /// A frame write exceeded its deadline.
    #[error("write timed out after {0:?}")]
    WriteTimeout(Duration),

    /// Socket write failed.
    #[error("write failed: {0}")]
    Write(String),

    /// Socket read failed.
    #[error("read failed: {0}")]
    Read(String),

    /// The upstream closed the connection before any data arrived.
    #[error("connection closed before data was received")]
    ConnectionClosed,

    /// No completion marker arrived before the deadline.
    #[error("no completion marker within {0:?}")]
    StreamTimeout(Duration),

    /// The upstream reported a protocol-level error.
    #[error("upstream protocol error: {0}")]
    Protocol(String),

    /// The caller cancelled the operation.
    #[error("operation cancelled")]
    Cancelled,
}

/// Dials fresh connections to the upstream charting socket.
#[async_trait]
pub trait ChartConnector: Send + Sync {
    /// Open a new connection.
    async fn connect(&self) -> Result<Box<dyn ChartConnection>, TransportError>;
}

/// One live connection to the upstream charting socket.
#[async_trait]
pub trait ChartConnection: Send {
    /// Encode and write one frame under the write deadline.
    async fn send(&mut self, frame: &WireFrame) -> Result<(), TransportError>;

    /// Collect the streamed response until a completion marker.
    ///
    /// Consumes the connection and closes it whatever the outcome. Returns
    /// the raw accumulated text.
    async fn collect(
        self: Box<Self>,
        deadline: Duration,
        cancel: &CancellationToken,
    ) -> Result<String, TransportError>;

    /// Close the connection.
    async fn close(self: Box<Self>);
}
