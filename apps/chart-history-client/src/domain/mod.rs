//! Domain Layer - Core market data types and parsing.
//!
//! Pure types and functions with no I/O: bars, wire symbols, session
//! identity, RPC frames and the series payload parser.

/// OHLCV bar and timestamp normalization.
pub mod bar;

/// Outbound RPC frames and the historical fetch sequence.
pub mod frame;

/// Historical fetch request parameters.
pub mod request;

/// Symbol search parameters and results.
pub mod search;

/// Tolerant series payload parser.
pub mod series;

/// Client session identity.
pub mod session;

/// Wire symbol formatting.
pub mod symbol;
