//! REST Endpoints
//!
//! Request/response helpers for the two plain-HTTP endpoints: symbol search
//! and the columnar history server. Neither call is retried.

use std::time::Duration;

use reqwest::Client;
use reqwest::header::ORIGIN;
use serde::Deserialize;

use crate::domain::bar::Bar;
use crate::domain::search::{SearchParams, SearchResponse};
use crate::domain::symbol::format_symbol;

/// Errors from the REST endpoints.
#[derive(Debug, thiserror::Error)]
pub enum RestError {
    /// Request could not be sent or the body could not be read.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Upstream answered with a non-200 status.
    #[error("unexpected status {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body.
        body: String,
    },

    /// Body was not the expected JSON.
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// Columnar arrays had different lengths.
    #[error("column length mismatch: t={t} o={o} h={h} l={l} c={c} v={v}")]
    ColumnMismatch {
        /// Timestamps.
        t: usize,
        /// Opens.
        o: usize,
        /// Highs.
        h: usize,
        /// Lows.
        l: usize,
        /// Closes.
        c: usize,
        /// Volumes.
        v: usize,
    },
}

/// Parallel-array bar envelope from the history server.
#[derive(Debug, Deserialize)]
struct ColumnarBars {
    t: Vec<i64>,
    o: Vec<f64>,
    h: Vec<f64>,
    l: Vec<f64>,
    c: Vec<f64>,
    v: Vec<f64>,
}

impl ColumnarBars {
    fn into_bars(self, symbol: &str) -> Result<Vec<Bar>, RestError> {
        let n = self.t.len();
        if [self.o.len(), self.h.len(), self.l.len(), self.c.len(), self.v.len()]
            .iter()
            .any(|&len| len != n)
        {
            return Err(RestError::ColumnMismatch {
                t: n,
                o: self.o.len(),
                h: self.h.len(),
                l: self.l.len(),
                c: self.c.len(),
                v: self.v.len(),
            });
        }

        Ok((0..n)
            .map(|i| Bar {
                timestamp: self.t[i],
                symbol: symbol.to_string(),
                open: self.o[i],
                high: self.h[i],
                low: self.l[i],
                close: self.c[i],
                volume: self.v[i],
            })
            .collect())
    }
}

/// Client for the search and columnar history endpoints.
#[derive(Debug, Clone)]
pub struct RestClient {
    client: Client,
    search_url: String,
    history_url: String,
    origin: String,
    timeout: Duration,
}

impl RestClient {
    /// Create a client sharing `client`.
    #[must_use]
    pub fn new(
        client: Client,
        search_url: impl Into<String>,
        history_url: impl Into<String>,
        origin: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            search_url: search_url.into(),
            history_url: history_url.into(),
            origin: origin.into(),
            timeout,
        }
    }

    /// Search for symbols.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure, a non-200 status or an
    /// undecodable body.
    pub async fn search_symbol(&self, params: &SearchParams) -> Result<SearchResponse, RestError> {
        let start = params.start.to_string();
        let limit = params.limit.to_string();
        let query = [
            ("text", params.text.as_str()),
            ("exchange", params.exchange.as_str()),
            ("start", start.as_str()),
            ("limit", limit.as_str()),
            ("search_type", params.search_type.as_str()),
            ("lang", params.lang.as_str()),
            ("domain", params.domain.as_str()),
            ("sort_by_country", params.sort_by_country.as_str()),
            ("hl", "1"),
        ];

        let body = self.get_text(&self.search_url, &query).await?;
        let response: SearchResponse = serde_json::from_str(&strip_emphasis(&body))?;

        tracing::debug!(
            text = %params.text,
            start = params.start,
            results = response.symbols.len(),
            remaining = response.symbols_remaining,
            "Symbol search complete"
        );
        Ok(response)
    }

    /// Fetch bars from the columnar history endpoint.
    ///
    /// Timestamps are taken as whole seconds.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure, a non-200 status, an
    /// undecodable body or unequal column lengths.
    pub async fn fetch_history(
        &self,
        symbol: &str,
        exchange: &str,
        interval: &str,
        bars: u32,
    ) -> Result<Vec<Bar>, RestError> {
        let wire_symbol = format_symbol(symbol, exchange, None);
        let limit = bars.to_string();
        let query = [
            ("symbol", wire_symbol.as_str()),
            ("resolution", interval),
            ("limit", limit.as_str()),
        ];

        let body = self.get_text(&self.history_url, &query).await?;
        let columns: ColumnarBars = serde_json::from_str(&body)?;
        let bars = columns.into_bars(&wire_symbol)?;

        tracing::debug!(symbol = %wire_symbol, bars = bars.len(), "Columnar history fetched");
        Ok(bars)
    }

    async fn get_text(&self, url: &str, query: &[(&str, &str)]) -> Result<String, RestError> {
        let response = self
            .client
            .get(url)
            .header(ORIGIN, &self.origin)
            .query(query)
            .timeout(self.timeout)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if status != reqwest::StatusCode::OK {
            tracing::warn!(url, status = status.as_u16(), "REST request rejected");
            return Err(RestError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }
}

/// Remove the `<em>` highlighting the search endpoint wraps around matches.
fn strip_emphasis(body: &str) -> String {
    body.replace("<em>", "").replace("</em>", "")
}
