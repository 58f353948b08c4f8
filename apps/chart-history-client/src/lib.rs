#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::needless_pass_by_value,
        clippy::items_after_statements
    )
)]

//! Chart History Client - Historical Market Data Acquisition
//!
//! Authenticates against an upstream charting service, opens a WebSocket
//! session speaking its length-prefixed frame protocol, collects the
//! streamed reply to a historical request and tolerantly parses it into
//! OHLCV bars. Plain REST endpoints cover symbol search and an alternate
//! columnar history source.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Bars, wire symbols, session identity, RPC frames, the series parser
//! - **Application**: Transport ports, retry policy, fetch orchestration
//! - **Infrastructure**: Sign-in, frame codec, WebSocket transport, stream
//!   collector, REST endpoints, configuration, metrics, telemetry
//!
//! # Data Flow
//!
//! ```text
//! sign-in ──► ClientSession ──┐
//!                             ▼
//! HistoryRequest ──► HistoryService ──► connect ──► send 4 frames ──► collect ──► parse_bars ──► Vec<Bar>
//!                        ▲                                                            │
//!                        └──────────────── retry on a fresh connection ◄──────────────┘
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Core market data types with no I/O.
pub mod domain;

/// Application layer - Use cases and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::bar::Bar;
pub use domain::request::{HistoryRequest, TradingSession};
pub use domain::search::{SearchParams, SearchResponse, SearchResult};
pub use domain::series::{SeriesParseError, parse_bars};
pub use domain::session::{ANONYMOUS_TOKEN, ClientSession, SessionIdentity};
pub use domain::symbol::format_symbol;

// Application services
pub use application::ports::{ChartConnection, ChartConnector, TransportError};
pub use application::services::{
    FetchError, HistoryError, HistoryPolicy, HistoryService, RetryConfig,
};

// Charting adapters
pub use infrastructure::charting::{ChartClient, ClientError, RestError};

// Infrastructure config
pub use infrastructure::config::{ClientConfig, ConfigError, Credentials};

// Metrics
pub use infrastructure::metrics::init_metrics;

// Telemetry
pub use infrastructure::telemetry::{TelemetryConfig, TelemetryGuard, init as init_telemetry};
