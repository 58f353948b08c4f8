//! Application Layer - Use cases and port definitions.
//!
//! This layer contains the historical fetch orchestration and the port
//! interfaces it drives.

/// Port interfaces for the upstream charting socket.
pub mod ports;

/// Application services for retry pacing and historical fetches.
pub mod services;
