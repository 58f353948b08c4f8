//! Client Configuration Settings
//!
//! Configuration types for the chart client, loaded from environment
//! variables.

use std::time::Duration;

use crate::application::services::{HistoryPolicy, RetryConfig};
use crate::infrastructure::charting::transport::{DEFAULT_USER_AGENT, WsConnectorConfig};

/// Sign-in credentials for the charting site.
///
/// Empty credentials mean the client runs anonymously.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    /// Create new credentials.
    #[must_use]
    pub const fn new(username: String, password: String) -> Self {
        Self { username, password }
    }

    /// Get the username.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Get the password.
    #[must_use]
    pub fn password(&self) -> &str {
        &self.password
    }

    /// Whether either half is missing.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.username.is_empty() || self.password.is_empty()
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Upstream endpoint roots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    /// Streaming socket URL.
    pub ws_url: String,
    /// Site root, used for sign-in and as the `Origin` header.
    pub site_url: String,
    /// Symbol search host.
    pub search_url: String,
    /// Columnar history host.
    pub history_url: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            ws_url: "wss://data.tradingview.com/socket.io/websocket".to_string(),
            site_url: "https://www.tradingview.com".to_string(),
            search_url: "https://symbol-search.tradingview.com".to_string(),
            history_url: "https://www.tradingview.com".to_string(),
        }
    }
}

impl Endpoints {
    /// Sign-in endpoint.
    #[must_use]
    pub fn signin_url(&self) -> String {
        format!("{}/accounts/signin/", self.site_url.trim_end_matches('/'))
    }

    /// Symbol search endpoint.
    #[must_use]
    pub fn search_endpoint(&self) -> String {
        format!(
            "{}/symbol_search/v3/",
            self.search_url.trim_end_matches('/')
        )
    }

    /// Columnar history endpoint.
    #[must_use]
    pub fn history_endpoint(&self) -> String {
        format!(
            "{}/chart/data-server/",
            self.history_url.trim_end_matches('/')
        )
    }

    /// `Origin` header value.
    #[must_use]
    pub fn origin(&self) -> &str {
        self.site_url.trim_end_matches('/')
    }
}

/// Timing and retry settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchSettings {
    /// Socket fetch attempts, including the first.
    pub max_attempts: u32,
    /// Pause between socket attempts.
    pub retry_delay: Duration,
    /// Pause between consecutive frames.
    pub message_delay: Duration,
    /// Deadline for collecting one reply.
    pub collect_timeout: Duration,
    /// Deadline for each frame write.
    pub write_timeout: Duration,
    /// Deadline for dial plus handshake.
    pub handshake_timeout: Duration,
    /// Per-request timeout for REST calls.
    pub http_timeout: Duration,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_delay: Duration::from_secs(1),
            message_delay: Duration::from_millis(500),
            collect_timeout: Duration::from_secs(10),
            write_timeout: Duration::from_secs(5),
            handshake_timeout: Duration::from_secs(10),
            http_timeout: Duration::from_secs(10),
        }
    }
}

/// Complete client configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientConfig {
    /// Sign-in credentials.
    pub credentials: Credentials,
    /// Upstream endpoints.
    pub endpoints: Endpoints,
    /// Timing and retry settings.
    pub fetch: FetchSettings,
    /// Print the Prometheus exposition to stderr on exit.
    pub dump_metrics: bool,
}

impl ClientConfig {
    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a value is out of range.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary key lookup.
    ///
    /// Unparsable numbers fall back to their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if a value is out of range.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let credentials = Credentials::new(
            lookup("CHART_USERNAME").unwrap_or_default(),
            lookup("CHART_PASSWORD").unwrap_or_default(),
        );

        let defaults = Endpoints::default();
        let endpoints = Endpoints {
            ws_url: lookup("CHART_WS_URL").unwrap_or(defaults.ws_url),
            site_url: lookup("CHART_SITE_URL").unwrap_or(defaults.site_url),
            search_url: lookup("CHART_SEARCH_URL").unwrap_or(defaults.search_url),
            history_url: lookup("CHART_HISTORY_URL").unwrap_or(defaults.history_url),
        };

        let defaults = FetchSettings::default();
        let fetch = FetchSettings {
            max_attempts: parse_u32(&lookup, "CHART_MAX_ATTEMPTS", defaults.max_attempts),
            retry_delay: parse_duration_millis(&lookup, "CHART_RETRY_DELAY_MS", defaults.retry_delay),
            message_delay: parse_duration_millis(
                &lookup,
                "CHART_MESSAGE_DELAY_MS",
                defaults.message_delay,
            ),
            collect_timeout: parse_duration_secs(
                &lookup,
                "CHART_COLLECT_TIMEOUT_SECS",
                defaults.collect_timeout,
            ),
            write_timeout: parse_duration_secs(
                &lookup,
                "CHART_WRITE_TIMEOUT_SECS",
                defaults.write_timeout,
            ),
            handshake_timeout: parse_duration_secs(
                &lookup,
                "CHART_HANDSHAKE_TIMEOUT_SECS",
                defaults.handshake_timeout,
            ),
            http_timeout: parse_duration_secs(
                &lookup,
                "CHART_HTTP_TIMEOUT_SECS",
                defaults.http_timeout,
            ),
        };

        if fetch.max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                key: "CHART_MAX_ATTEMPTS".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        let dump_metrics = lookup("CHART_METRICS_DUMP")
            .is_some_and(|v| matches!(v.trim().to_lowercase().as_str(), "true" | "1" | "yes"));

        Ok(Self {
            credentials,
            endpoints,
            fetch,
            dump_metrics,
        })
    }

    /// Retry and pacing policy for socket fetches.
    #[must_use]
    pub const fn history_policy(&self) -> HistoryPolicy {
        HistoryPolicy {
            retry: RetryConfig::fixed(self.fetch.max_attempts, self.fetch.retry_delay),
            message_delay: self.fetch.message_delay,
            collect_timeout: self.fetch.collect_timeout,
        }
    }

    /// Dial settings for the streaming socket.
    #[must_use]
    pub fn connector_config(&self) -> WsConnectorConfig {
        WsConnectorConfig {
            url: self.endpoints.ws_url.clone(),
            origin: self.endpoints.origin().to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            handshake_timeout: self.fetch.handshake_timeout,
            write_timeout: self.fetch.write_timeout,
        }
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A value is present but unusable.
    #[error("invalid value for {key}: {reason}")]
    InvalidValue {
        /// Environment variable name.
        key: String,
        /// What is wrong with it.
        reason: String,
    },
}

fn parse_u32<F>(lookup: &F, key: &str, default: u32) -> u32
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn parse_duration_secs<F>(lookup: &F, key: &str, default: Duration) -> Duration
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map_or(default, Duration::from_secs)
}

fn parse_duration_millis<F>(lookup: &F, key: &str, default: Duration) -> Duration
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map_or(default, Duration::from_millis)
}
