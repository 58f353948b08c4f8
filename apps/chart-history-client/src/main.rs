//! Chart History Client Binary
//!
//! Fetches historical bars or searches symbols and prints the result as
//! JSON on stdout.
//!
//! # Usage
//!
//! ```bash
//! CHART_SYMBOL=BTCUSDT CHART_EXCHANGE=BINANCE cargo run --bin chart-history-client
//! ```
//!
//! # Environment Variables
//!
//! ## Request
//! - `CHART_MODE`: history | rest | search (default: history)
//! - `CHART_SYMBOL`, `CHART_EXCHANGE`: Instrument (required for history and rest)
//! - `CHART_INTERVAL`: Bar interval (default: 1D)
//! - `CHART_BARS`: Number of bars (default: 100)
//! - `CHART_CONTRACT`: Futures contract number (optional)
//! - `CHART_EXTENDED`: Include extended hours (default: false)
//! - `CHART_SEARCH_TEXT`, `CHART_SEARCH_START`: Search query and offset
//!
//! ## Client
//! - `CHART_USERNAME`, `CHART_PASSWORD`: Sign-in credentials (default: anonymous)
//! - `CHART_WS_URL`, `CHART_SITE_URL`, `CHART_SEARCH_URL`, `CHART_HISTORY_URL`
//! - `CHART_MAX_ATTEMPTS`, `CHART_RETRY_DELAY_MS`, `CHART_MESSAGE_DELAY_MS`
//! - `CHART_COLLECT_TIMEOUT_SECS`, `CHART_WRITE_TIMEOUT_SECS`,
//!   `CHART_HANDSHAKE_TIMEOUT_SECS`, `CHART_HTTP_TIMEOUT_SECS`
//! - `CHART_METRICS_DUMP`: Print Prometheus metrics to stderr on exit (default: false)
//! - `OTEL_ENABLED`: Export spans over OTLP (default: false)
//! - `RUST_LOG`: Log filter (default: `chart_history_client=info`)

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::panic))]

use anyhow::{Context, bail};
use chart_history_client::{
    ChartClient, ClientConfig, HistoryRequest, SearchParams, init_metrics, init_telemetry,
};
use tokio::signal;
use tokio_util::sync::CancellationToken;

/// What the binary was asked to do.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    History(HistoryRequest),
    Rest {
        symbol: String,
        exchange: String,
        interval: String,
        bars: u32,
    },
    Search(SearchParams),
}

impl Command {
    fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mode = lookup("CHART_MODE").unwrap_or_else(|| "history".to_string());
        let interval = lookup("CHART_INTERVAL").unwrap_or_else(|| "1D".to_string());
        let bars = lookup("CHART_BARS")
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(100);
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.is_empty())
                .with_context(|| format!("{key} is required in {mode} mode"))
        };

        match mode.to_lowercase().as_str() {
            "history" => {
                let contract = lookup("CHART_CONTRACT").and_then(|v| v.trim().parse().ok());
                let extended = lookup("CHART_EXTENDED")
                    .is_some_and(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"));
                Ok(Self::History(
                    HistoryRequest::new(
                        required("CHART_SYMBOL")?,
                        required("CHART_EXCHANGE")?,
                        interval,
                        bars,
                    )
                    .with_contract(contract)
                    .extended(extended),
                ))
            }
            "rest" => Ok(Self::Rest {
                symbol: required("CHART_SYMBOL")?,
                exchange: required("CHART_EXCHANGE")?,
                interval,
                bars,
            }),
            "search" => {
                let start = lookup("CHART_SEARCH_START")
                    .and_then(|v| v.trim().parse().ok())
                    .unwrap_or(0);
                let params = SearchParams::new(required("CHART_SEARCH_TEXT")?)
                    .with_exchange(lookup("CHART_EXCHANGE").unwrap_or_default());
                let limit = params.limit;
                Ok(Self::Search(params.with_page(start, limit)))
            }
            other => bail!("unknown CHART_MODE {other:?} (expected history, rest or search)"),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("failed to install rustls crypto provider"))?;

    load_dotenv();

    let _telemetry_guard = init_telemetry().context("failed to initialize telemetry")?;
    let metrics_handle = init_metrics().context("failed to initialize metrics")?;

    let config = ClientConfig::from_env()?;
    log_config(&config);

    let command = Command::from_lookup(|key| std::env::var(key).ok())?;

    let cancel = CancellationToken::new();
    let watcher = tokio::spawn(cancel_on_ctrl_c(cancel.clone()));

    let result = run(&config, command, &cancel).await;
    watcher.abort();

    if config.dump_metrics {
        eprint!("{}", metrics_handle.render());
    }

    println!("{}", result?);
    Ok(())
}

/// Execute one command and render its result as JSON.
async fn run(
    config: &ClientConfig,
    command: Command,
    cancel: &CancellationToken,
) -> anyhow::Result<String> {
    let client = ChartClient::connect(config).await?;

    let output = match command {
        Command::History(request) => {
            let bars = client.get_historical_data(&request, cancel).await?;
            serde_json::to_string_pretty(&bars)?
        }
        Command::Rest {
            symbol,
            exchange,
            interval,
            bars,
        } => {
            let bars = client
                .get_historical_data_rest(&symbol, &exchange, &interval, bars)
                .await?;
            serde_json::to_string_pretty(&bars)?
        }
        Command::Search(params) => {
            let response = client.search_symbol(&params).await?;
            serde_json::to_string_pretty(&response)?
        }
    };

    Ok(output)
}

/// Load .env from the current directory or any ancestor directory.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Log the parsed configuration.
fn log_config(config: &ClientConfig) {
    tracing::info!(
        anonymous = config.credentials.is_empty(),
        max_attempts = config.fetch.max_attempts,
        collect_timeout_secs = config.fetch.collect_timeout.as_secs(),
        "Configuration loaded"
    );
    tracing::debug!(
        ws_url = %config.endpoints.ws_url,
        site_url = %config.endpoints.site_url,
        search_url = %config.endpoints.search_endpoint(),
        history_url = %config.endpoints.history_endpoint(),
        "Upstream endpoints"
    );
}

/// Cancel in-flight work on Ctrl+C.
async fn cancel_on_ctrl_c(cancel: CancellationToken) {
    match signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C, cancelling");
            cancel.cancel();
        }
        Err(e) => tracing::warn!(error = %e, "Failed to listen for Ctrl+C"),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use chart_history_client::TradingSession;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn history_is_the_default_mode() {
        let command = Command::from_lookup(lookup_from(&[
            ("CHART_SYMBOL", "ES"),
            ("CHART_EXCHANGE", "CME"),
            ("CHART_CONTRACT", "1"),
            ("CHART_EXTENDED", "true"),
        ]))
        .unwrap();

        let Command::History(request) = command else {
            panic!("expected history command");
        };
        assert_eq!(request.wire_symbol(), "CME:ES1!");
        assert_eq!(request.interval, "1D");
        assert_eq!(request.bars, 100);
        assert_eq!(request.session, TradingSession::Extended);
    }

    #[test]
    fn search_mode_pages() {
        let command = Command::from_lookup(lookup_from(&[
            ("CHART_MODE", "search"),
            ("CHART_SEARCH_TEXT", "btc"),
            ("CHART_SEARCH_START", "50"),
        ]))
        .unwrap();

        let Command::Search(params) = command else {
            panic!("expected search command");
        };
        assert_eq!(params.start, 50);
        assert_eq!(params.limit, 50);
    }

    #[test]
    fn missing_symbol_is_reported() {
        let err = Command::from_lookup(lookup_from(&[("CHART_MODE", "rest")])).unwrap_err();
        assert!(err.to_string().contains("CHART_SYMBOL"));
    }

    #[test]
    fn unknown_mode_is_rejected() {
        assert!(Command::from_lookup(lookup_from(&[("CHART_MODE", "stream")])).is_err());
    }
}
