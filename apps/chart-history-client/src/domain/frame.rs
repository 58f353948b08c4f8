//! Outbound RPC Frames
//!
//! Every upstream call is a method name plus positional parameters,
//! serialized as `{"m": <method>, "p": [<params>]}`.
//!
//! A historical fetch is exactly four calls, in this order:
//!
//! ```text
//! set_auth_token(token)
//! chart_create_session(chart_session, "")
//! resolve_symbol(chart_session, "symbol_1", "={...}")
//! create_series(chart_session, "s1", "s1", "symbol_1", interval, bars)
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::request::{HistoryRequest, TradingSession};
use super::session::ClientSession;

/// Symbol alias used by `resolve_symbol` and `create_series`.
pub const SYMBOL_ALIAS: &str = "symbol_1";

/// Series identifier used by `create_series`.
pub const SERIES_ID: &str = "s1";

/// One outbound RPC call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireFrame {
    /// Function name.
    #[serde(rename = "m")]
    pub method: String,
    /// Positional arguments.
    #[serde(rename = "p")]
    pub params: Vec<Value>,
}

/// Body of the `resolve_symbol` spec string.
#[derive(Debug, Serialize)]
struct ResolvedSymbol<'a> {
    symbol: &'a str,
    adjustment: &'a str,
    session: &'a str,
}

impl WireFrame {
    /// Create a frame from a method and parameters.
    #[must_use]
    pub fn new(method: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            method: method.into(),
            params,
        }
    }

    /// `set_auth_token(token)`.
    #[must_use]
    pub fn set_auth_token(token: &str) -> Self {
        Self::new("set_auth_token", vec![Value::from(token)])
    }

    /// `chart_create_session(chart_session, "")`.
    #[must_use]
    pub fn chart_create_session(chart_session: &str) -> Self {
        Self::new(
            "chart_create_session",
            vec![Value::from(chart_session), Value::from("")],
        )
    }

    /// `resolve_symbol(chart_session, "symbol_1", "={...}")`.
    ///
    /// # Errors
    ///
    /// Returns an error if the nested symbol spec cannot be serialized.
    pub fn resolve_symbol(
        chart_session: &str,
        wire_symbol: &str,
        session: TradingSession,
    ) -> Result<Self, serde_json::Error> {
        let spec = serde_json::to_string(&ResolvedSymbol {
            symbol: wire_symbol,
            adjustment: "splits",
            session: session.as_str(),
        })?;

        Ok(Self::new(
            "resolve_symbol",
            vec![
                Value::from(chart_session),
                Value::from(SYMBOL_ALIAS),
                Value::from(format!("={spec}")),
            ],
        ))
    }

    /// `create_series(chart_session, "s1", "s1", "symbol_1", interval, bars)`.
    #[must_use]
    pub fn create_series(chart_session: &str, interval: &str, bars: u32) -> Self {
        Self::new(
            "create_series",
            vec![
                Value::from(chart_session),
                Value::from(SERIES_ID),
                Value::from(SERIES_ID),
                Value::from(SYMBOL_ALIAS),
                Value::from(interval),
                Value::from(bars),
            ],
        )
    }

    /// The ordered four-frame sequence for a historical fetch.
    ///
    /// # Errors
    ///
    /// Returns an error if the `resolve_symbol` spec cannot be serialized.
    pub fn history_sequence(
        session: &ClientSession,
        request: &HistoryRequest,
        wire_symbol: &str,
    ) -> Result<Vec<Self>, serde_json::Error> {
        let chart_session = session.chart_session();
        Ok(vec![
            Self::set_auth_token(session.auth_token()),
            Self::chart_create_session(chart_session),
            Self::resolve_symbol(chart_session, wire_symbol, request.session)?,
            Self::create_series(chart_session, &request.interval, request.bars),
        ])
    }
}
