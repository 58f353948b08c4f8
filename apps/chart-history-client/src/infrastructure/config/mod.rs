//! Configuration Module
//!
//! Configuration loading for the chart client.

mod settings;

pub use settings::{ClientConfig, ConfigError, Credentials, Endpoints, FetchSettings};
