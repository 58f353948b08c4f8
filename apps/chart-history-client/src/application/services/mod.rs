//! Application Services
//!
//! Services that orchestrate domain logic and coordinate between ports.
//!
//! - `HistoryService`: Bounded-retry historical fetch over a fresh connection per attempt
//! - `RetryPolicy`: Attempt bound and pacing

pub mod history;
pub mod retry;

pub use history::{FetchError, HistoryError, HistoryPolicy, HistoryService};
pub use retry::{RetryConfig, RetryPolicy};
