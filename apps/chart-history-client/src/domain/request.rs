//! Historical Data Requests

use serde::{Deserialize, Serialize};

use super::symbol::format_symbol;

/// Trading session window requested from the upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradingSession {
    /// Regular trading hours only.
    #[default]
    Regular,
    /// Regular plus pre/post-market hours.
    Extended,
}

impl TradingSession {
    /// Map the `extended` flag used by callers.
    #[must_use]
    pub const fn from_extended(extended: bool) -> Self {
        if extended { Self::Extended } else { Self::Regular }
    }

    /// Wire name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Regular => "regular",
            Self::Extended => "extended",
        }
    }
}

/// Parameters of one historical bar fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryRequest {
    /// Ticker, or an already-qualified wire symbol.
    pub symbol: String,
    /// Exchange prefix.
    pub exchange: String,
    /// Bar resolution in upstream syntax (`"1"`, `"60"`, `"1D"`, ...).
    pub interval: String,
    /// Number of bars to request.
    pub bars: u32,
    /// Futures contract number, if any.
    pub contract: Option<u32>,
    /// Session window.
    pub session: TradingSession,
}

impl HistoryRequest {
    /// Create a request for a spot symbol in the regular session.
    #[must_use]
    pub fn new(
        symbol: impl Into<String>,
        exchange: impl Into<String>,
        interval: impl Into<String>,
        bars: u32,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            exchange: exchange.into(),
            interval: interval.into(),
            bars,
            contract: None,
            session: TradingSession::Regular,
        }
    }

    /// Request a specific futures contract.
    #[must_use]
    pub const fn with_contract(mut self, contract: Option<u32>) -> Self {
        self.contract = contract;
        self
    }

    /// Include extended hours.
    #[must_use]
    pub const fn extended(mut self, extended: bool) -> Self {
        self.session = TradingSession::from_extended(extended);
        self
    }

    /// Wire symbol for this request.
    #[must_use]
    pub fn wire_symbol(&self) -> String {
        format_symbol(&self.symbol, &self.exchange, self.contract)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_contract_and_session() {
        let request = HistoryRequest::new("ES", "CME", "60", 10)
            .with_contract(Some(1))
            .extended(true);
        assert_eq!(request.wire_symbol(), "CME:ES1!");
        assert_eq!(request.session, TradingSession::Extended);
        assert_eq!(request.session.as_str(), "extended");
    }

    #[test]
    fn defaults_to_regular_session() {
        let request = HistoryRequest::new("AAPL", "NASDAQ", "1D", 100);
        assert_eq!(request.session, TradingSession::Regular);
        assert_eq!(request.wire_symbol(), "NASDAQ:AAPL");
    }
}
