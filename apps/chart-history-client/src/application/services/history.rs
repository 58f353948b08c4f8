//! Historical Fetch Orchestration
//!
//! Drives connect → send sequence → collect → parse, retrying the whole
//! pipeline on a brand-new connection after any failure. Upstream session
//! state is considered tainted once a step fails, so connections are never
//! reused across attempts.

use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use super::retry::{RetryConfig, RetryPolicy};
use crate::application::ports::{ChartConnection, ChartConnector, TransportError};
use crate::domain::bar::Bar;
use crate::domain::frame::WireFrame;
use crate::domain::request::HistoryRequest;
use crate::domain::series::{SeriesParseError, parse_bars};
use crate::domain::session::ClientSession;
use crate::infrastructure::metrics::{self, FailureStage, FetchPath};

/// Timing and retry settings for socket fetches.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryPolicy {
    /// Attempt bound and pacing.
    pub retry: RetryConfig,
    /// Pause between consecutive frames of the sequence.
    pub message_delay: Duration,
    /// Absolute deadline for collecting one response.
    pub collect_timeout: Duration,
}

impl Default for HistoryPolicy {
    fn default() -> Self {
        Self {
            retry: RetryConfig::default(),
            message_delay: Duration::from_millis(500),
            collect_timeout: Duration::from_secs(10),
        }
    }
}

/// Cause of one failed attempt.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    /// Connect, send or collect failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The collected stream held no usable bars.
    #[error(transparent)]
    Parse(#[from] SeriesParseError),
}

impl FetchError {
    const fn stage(&self) -> FailureStage {
        match self {
            Self::Transport(TransportError::Connect(_) | TransportError::HandshakeTimeout(_)) => {
                FailureStage::Connect
            }
            Self::Transport(
                TransportError::Encode(_)
                | TransportError::Write(_)
                | TransportError::WriteTimeout(_),
            ) => FailureStage::Send,
            Self::Transport(_) => FailureStage::Collect,
            Self::Parse(_) => FailureStage::Parse,
        }
    }
}

/// Errors returned to callers of [`HistoryService::fetch`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HistoryError {
    /// Every attempt failed.
    #[error("historical fetch failed after {attempts} attempts: {source}")]
    Exhausted {
        /// Attempts made.
        attempts: u32,
        /// Cause of the final attempt's failure.
        #[source]
        source: FetchError,
    },

    /// The frame sequence could not be built.
    #[error("failed to build request frames: {0}")]
    InvalidRequest(String),

    /// The caller cancelled the fetch.
    #[error("historical fetch cancelled")]
    Cancelled,
}

/// Bounded-retry historical fetcher over a [`ChartConnector`].
pub struct HistoryService<C> {
    connector: C,
    policy: HistoryPolicy,
}

impl<C: ChartConnector> HistoryService<C> {
    /// Create a service.
    #[must_use]
    pub const fn new(connector: C, policy: HistoryPolicy) -> Self {
        Self { connector, policy }
    }

    /// Active policy.
    #[must_use]
    pub const fn policy(&self) -> &HistoryPolicy {
        &self.policy
    }

    /// Fetch historical bars, retrying with fresh connections.
    ///
    /// # Errors
    ///
    /// - [`HistoryError::Exhausted`] once every attempt has failed.
    /// - [`HistoryError::Cancelled`] if `cancel` fires first.
    pub async fn fetch(
        &self,
        session: &ClientSession,
        request: &HistoryRequest,
        cancel: &CancellationToken,
    ) -> Result<Vec<Bar>, HistoryError> {
        let wire_symbol = request.wire_symbol();
        let frames = WireFrame::history_sequence(session, request, &wire_symbol)
            .map_err(|e| HistoryError::InvalidRequest(e.to_string()))?;

        let mut retry = RetryPolicy::new(self.policy.retry);
        let started = Instant::now();

        loop {
            if cancel.is_cancelled() {
                return Err(HistoryError::Cancelled);
            }

            let attempt = retry.current_attempt();
            metrics::record_fetch_attempt(FetchPath::Socket);
            tracing::debug!(
                attempt,
                max_attempts = retry.max_attempts(),
                symbol = %wire_symbol,
                interval = %request.interval,
                "Fetching historical bars"
            );

            let error = match self.attempt(&frames, &wire_symbol, cancel).await {
                Ok(bars) => {
                    metrics::record_bars(FetchPath::Socket, bars.len());
                    metrics::record_fetch_duration(FetchPath::Socket, started.elapsed());
                    tracing::info!(
                        attempt,
                        symbol = %wire_symbol,
                        bars = bars.len(),
                        "Historical bars fetched"
                    );
                    return Ok(bars);
                }
                Err(FetchError::Transport(TransportError::Cancelled)) => {
                    return Err(HistoryError::Cancelled);
                }
                Err(e) => e,
            };

            metrics::record_fetch_failure(error.stage());
            tracing::warn!(attempt, symbol = %wire_symbol, error = %error, "Fetch attempt failed");

            let Some(delay) = retry.next_delay() else {
                return Err(HistoryError::Exhausted {
                    attempts: retry.failures(),
                    source: error,
                });
            };

            tokio::select! {
                () = cancel.cancelled() => return Err(HistoryError::Cancelled),
                () = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// One pass of the pipeline on a fresh connection.
    async fn attempt(
        &self,
        frames: &[WireFrame],
        wire_symbol: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<Bar>, FetchError> {
        let mut connection = tokio::select! {
            () = cancel.cancelled() => return Err(TransportError::Cancelled.into()),
            result = self.connector.connect() => result?,
        };

        if let Err(e) = self.send_sequence(connection.as_mut(), frames, cancel).await {
            connection.close().await;
            return Err(e.into());
        }

        let raw = connection
            .collect(self.policy.collect_timeout, cancel)
            .await?;

        Ok(parse_bars(&raw, wire_symbol)?)
    }

    async fn send_sequence(
        &self,
        connection: &mut dyn ChartConnection,
        frames: &[WireFrame],
        cancel: &CancellationToken,
    ) -> Result<(), TransportError> {
        for (i, frame) in frames.iter().enumerate() {
            if i > 0 {
                tokio::select! {
                    () = cancel.cancelled() => return Err(TransportError::Cancelled),
                    () = tokio::time::sleep(self.policy.message_delay) => {}
                }
            }
            connection.send(frame).await?;
            tracing::trace!(method = %frame.method, "Frame sent");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;

    use super::*;

    const SERIES: &str = r#"{"m":"timescale_update","p":["cs",{"s1":{"s":[{"i":0,"v":[1700000000.0,1.0,2.0,0.5,1.5,10.0]}]}}]} series_completed"#;

    /// Scripted outcome of one connection.
    #[derive(Clone)]
    enum Script {
        RefuseConnect,
        FailWrite,
        Respond(&'static str),
        Hang,
    }

    #[derive(Default)]
    struct Log {
        connects: AtomicU32,
        closes: AtomicU32,
        sent: Mutex<Vec<String>>,
    }

    struct ScriptedConnector {
        scripts: Mutex<Vec<Script>>,
        log: Arc<Log>,
    }

    impl ScriptedConnector {
        fn new(scripts: Vec<Script>) -> (Self, Arc<Log>) {
            let log = Arc::new(Log::default());
            (
                Self {
                    scripts: Mutex::new(scripts),
                    log: Arc::clone(&log),
                },
                log,
            )
        }
    }

    struct ScriptedConnection {
        script: Script,
        log: Arc<Log>,
    }

    #[async_trait]
    impl ChartConnector for ScriptedConnector {
        async fn connect(&self) -> Result<Box<dyn ChartConnection>, TransportError> {
            self.log.connects.fetch_add(1, Ordering::SeqCst);
            let script = {
                let mut scripts = self.scripts.lock().unwrap();
                if scripts.len() > 1 {
                    scripts.remove(0)
                } else {
                    scripts[0].clone()
                }
            };
            match script {
                Script::RefuseConnect => Err(TransportError::Connect("refused".to_string())),
                script => Ok(Box::new(ScriptedConnection {
                    script,
                    log: Arc::clone(&self.log),
                })),
            }
        }
    }

    #[async_trait]
    impl ChartConnection for ScriptedConnection {
        async fn send(&mut self, frame: &WireFrame) -> Result<(), TransportError> {
            if matches!(self.script, Script::FailWrite) {
                return Err(TransportError::Write("broken pipe".to_string()));
            }
            self.log.sent.lock().unwrap().push(frame.method.clone());
            Ok(())
        }

        async fn collect(
            self: Box<Self>,
            deadline: Duration,
            cancel: &CancellationToken,
        ) -> Result<String, TransportError> {
            match self.script {
                Script::Respond(text) => Ok(text.to_string()),
                _ => tokio::select! {
                    () = cancel.cancelled() => Err(TransportError::Cancelled),
                    () = tokio::time::sleep(deadline) => Err(TransportError::StreamTimeout(deadline)),
                },
            }
        }

        async fn close(self: Box<Self>) {
            self.log.closes.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn fast_policy() -> HistoryPolicy {
        HistoryPolicy {
            retry: RetryConfig::fixed(3, Duration::from_millis(1)),
            message_delay: Duration::from_millis(1),
            collect_timeout: Duration::from_millis(20),
        }
    }

    fn request() -> HistoryRequest {
        HistoryRequest::new("BTCUSDT", "BINANCE", "60", 10)
    }

    #[tokio::test]
    async fn connect_failures_stop_at_three_attempts() {
        let (connector, log) = ScriptedConnector::new(vec![Script::RefuseConnect]);
        let service = HistoryService::new(connector, fast_policy());

        let err = service
            .fetch(&ClientSession::anonymous(), &request(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(log.connects.load(Ordering::SeqCst), 3);
        match err {
            HistoryError::Exhausted { attempts, source } => {
                assert_eq!(attempts, 3);
                assert!(matches!(
                    source,
                    FetchError::Transport(TransportError::Connect(_))
                ));
            }
            other => panic!("expected Exhausted, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn success_short_circuits() {
        let (connector, log) = ScriptedConnector::new(vec![Script::Respond(SERIES)]);
        let service = HistoryService::new(connector, fast_policy());

        let bars = service
            .fetch(&ClientSession::anonymous(), &request(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(bars.len(), 1);
        assert_eq!(bars[0].symbol, "BINANCE:BTCUSDT");
        assert_eq!(log.connects.load(Ordering::SeqCst), 1);
        assert_eq!(
            *log.sent.lock().unwrap(),
            [
                "set_auth_token",
                "chart_create_session",
                "resolve_symbol",
                "create_series"
            ]
        );
    }

    #[tokio::test]
    async fn write_failure_closes_and_retries_on_new_connection() {
        let (connector, log) =
            ScriptedConnector::new(vec![Script::FailWrite, Script::Respond(SERIES)]);
        let service = HistoryService::new(connector, fast_policy());

        let bars = service
            .fetch(&ClientSession::anonymous(), &request(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(bars.len(), 1);
        assert_eq!(log.connects.load(Ordering::SeqCst), 2);
        assert_eq!(log.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn parse_failure_is_retried_and_reported() {
        let (connector, log) = ScriptedConnector::new(vec![Script::Respond("series_completed")]);
        let service = HistoryService::new(connector, fast_policy());

        let err = service
            .fetch(&ClientSession::anonymous(), &request(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(log.connects.load(Ordering::SeqCst), 3);
        assert_eq!(
            err,
            HistoryError::Exhausted {
                attempts: 3,
                source: FetchError::Parse(SeriesParseError::NoSeries),
            }
        );
    }

    #[tokio::test]
    async fn timeout_then_success() {
        let (connector, _log) = ScriptedConnector::new(vec![Script::Hang, Script::Respond(SERIES)]);
        let service = HistoryService::new(connector, fast_policy());

        let bars = service
            .fetch(&ClientSession::anonymous(), &request(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(bars.len(), 1);
    }

    #[tokio::test]
    async fn cancellation_stops_without_retry() {
        let (connector, log) = ScriptedConnector::new(vec![Script::Hang]);
        let policy = HistoryPolicy {
            collect_timeout: Duration::from_secs(30),
            ..fast_policy()
        };
        let service = HistoryService::new(connector, policy);
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let err = service
            .fetch(&ClientSession::anonymous(), &request(), &cancel)
            .await
            .unwrap_err();

        assert_eq!(err, HistoryError::Cancelled);
        assert_eq!(log.connects.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn already_cancelled_never_connects() {
        let (connector, log) = ScriptedConnector::new(vec![Script::Respond(SERIES)]);
        let service = HistoryService::new(connector, fast_policy());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = service
            .fetch(&ClientSession::anonymous(), &request(), &cancel)
            .await
            .unwrap_err();

        assert_eq!(err, HistoryError::Cancelled);
        assert_eq!(log.connects.load(Ordering::SeqCst), 0);
    }
}
