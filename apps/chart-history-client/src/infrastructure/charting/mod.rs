//! Charting Upstream Adapters
//!
//! Everything that talks to the upstream charting service:
//!
//! - **auth**: REST sign-in with anonymous fallback
//! - **codec**: `~m~<N>~m~` frame encoding and decoding
//! - **transport**: WebSocket `ChartConnector` adapter
//! - **collector**: Streamed reply accumulation with deadline and cancellation
//! - **rest**: Symbol search and columnar history endpoints
//! - **client**: `ChartClient` facade

pub mod auth;
pub mod client;
pub mod codec;
pub mod collector;
pub mod rest;
pub mod transport;

pub use auth::SessionAuthenticator;
pub use client::{ChartClient, ClientError};
pub use codec::{CodecError, FrameCodec, Packet};
pub use collector::{BufferState, RawStreamBuffer};
pub use rest::{RestClient, RestError};
pub use transport::{WsConnection, WsConnector, WsConnectorConfig};
