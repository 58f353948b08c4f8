//! Prometheus Metrics Module
//!
//! Records fetch activity in Prometheus format.
//!
//! # Metrics Categories
//!
//! - **Attempts**: Fetch attempts by path (socket, REST history, search)
//! - **Failures**: Failed socket attempts by pipeline stage
//! - **Bars**: Bars returned by path
//! - **Latency**: End-to-end fetch duration by path
//! - **Auth**: Sign-in outcomes
//!
//! Until [`init_metrics`] installs the recorder, every helper is a no-op.
//! The binary prints the rendered exposition to stderr on exit when
//! `CHART_METRICS_DUMP` is set.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

// =============================================================================
// Global Metrics Handle
// =============================================================================

static PROMETHEUS_HANDLE: Mutex<Option<PrometheusHandle>> = Mutex::new(None);

/// Initialize the Prometheus metrics recorder.
///
/// Later calls, concurrent ones included, return the handle installed by
/// the first one. Use [`PrometheusHandle::render`] to export the text
/// exposition format.
///
/// # Errors
///
/// Returns an error if another recorder is already installed.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    let mut slot = PROMETHEUS_HANDLE
        .lock()
        .unwrap_or_else(PoisonError::into_inner);
    if let Some(handle) = slot.as_ref() {
        return Ok(handle.clone());
    }

    let handle = PrometheusBuilder::new().install_recorder()?;
    register_metrics();
    *slot = Some(handle.clone());
    Ok(handle)
}

// =============================================================================
// Metric Registration
// =============================================================================

fn register_metrics() {
    describe_counter!(
        "chart_client_fetch_attempts_total",
        "Total historical fetch attempts by path"
    );
    describe_counter!(
        "chart_client_fetch_failures_total",
        "Total failed socket fetch attempts by stage"
    );
    describe_counter!("chart_client_bars_total", "Total bars returned by path");
    describe_histogram!(
        "chart_client_fetch_duration_seconds",
        "End-to-end duration of successful fetches"
    );
    describe_counter!("chart_client_auth_total", "Sign-in outcomes");
}

// =============================================================================
// Metric Labels
// =============================================================================

/// Which acquisition path served a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchPath {
    /// Streaming socket session.
    Socket,
    /// Columnar REST history endpoint.
    Rest,
    /// Symbol search endpoint.
    Search,
}

impl FetchPath {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Socket => "socket",
            Self::Rest => "rest",
            Self::Search => "search",
        }
    }
}

/// Socket pipeline stage where an attempt failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureStage {
    /// Dial or handshake.
    Connect,
    /// Frame encode or write.
    Send,
    /// Reading the streamed reply.
    Collect,
    /// Parsing the collected text.
    Parse,
}

impl FailureStage {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Connect => "connect",
            Self::Send => "send",
            Self::Collect => "collect",
            Self::Parse => "parse",
        }
    }
}

/// Result of a sign-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthOutcome {
    /// Token issued.
    SignedIn,
    /// No credentials configured.
    Anonymous,
    /// Sign-in failed; anonymous token used instead.
    Failed,
}

impl AuthOutcome {
    const fn as_str(self) -> &'static str {
        match self {
            Self::SignedIn => "signed_in",
            Self::Anonymous => "anonymous",
            Self::Failed => "failed",
        }
    }
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

/// Record one fetch attempt.
pub fn record_fetch_attempt(path: FetchPath) {
    counter!("chart_client_fetch_attempts_total", "path" => path.as_str()).increment(1);
}

/// Record a failed socket attempt.
pub fn record_fetch_failure(stage: FailureStage) {
    counter!("chart_client_fetch_failures_total", "stage" => stage.as_str()).increment(1);
}

/// Record bars returned to the caller.
pub fn record_bars(path: FetchPath, count: usize) {
    counter!("chart_client_bars_total", "path" => path.as_str()).increment(count as u64);
}

/// Record the duration of a successful fetch.
pub fn record_fetch_duration(path: FetchPath, duration: Duration) {
    histogram!("chart_client_fetch_duration_seconds", "path" => path.as_str())
        .record(duration.as_secs_f64());
}

/// Record a sign-in outcome.
pub fn record_auth(outcome: AuthOutcome) {
    counter!("chart_client_auth_total", "outcome" => outcome.as_str()).increment(1);
}
