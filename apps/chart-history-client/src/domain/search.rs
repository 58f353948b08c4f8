//! Symbol Search Types

use serde::{Deserialize, Serialize};

/// Default page size.
pub const DEFAULT_SEARCH_LIMIT: u32 = 50;

/// Query parameters for a symbol search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchParams {
    /// Free-text query.
    pub text: String,
    /// Exchange filter (empty for all).
    pub exchange: String,
    /// Offset of the first result.
    pub start: u32,
    /// Page size.
    pub limit: u32,
    /// Instrument class filter.
    pub search_type: String,
    /// Response language.
    pub lang: String,
    /// Upstream search domain.
    pub domain: String,
    /// Country used to rank results.
    pub sort_by_country: String,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            text: String::new(),
            exchange: String::new(),
            start: 0,
            limit: DEFAULT_SEARCH_LIMIT,
            search_type: "crypto".to_string(),
            lang: "en".to_string(),
            domain: "production".to_string(),
            sort_by_country: "US".to_string(),
        }
    }
}

impl SearchParams {
    /// Search for `text` with default filters.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    /// Restrict to one exchange.
    #[must_use]
    pub fn with_exchange(mut self, exchange: impl Into<String>) -> Self {
        self.exchange = exchange.into();
        self
    }

    /// Select a page.
    #[must_use]
    pub const fn with_page(mut self, start: u32, limit: u32) -> Self {
        self.start = start;
        self.limit = limit;
        self
    }

    /// Change the instrument class filter.
    #[must_use]
    pub fn with_search_type(mut self, search_type: impl Into<String>) -> Self {
        self.search_type = search_type.into();
        self
    }
}

/// Data source metadata attached to a result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchSource {
    /// Source id.
    #[serde(default)]
    pub id: String,
    /// Source name.
    #[serde(default)]
    pub name: String,
    /// Source description.
    #[serde(default)]
    pub description: String,
}

/// One matched symbol.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Ticker.
    pub symbol: String,
    /// Fully qualified name, when the upstream provides one.
    #[serde(default)]
    pub full_name: Option<String>,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// Listing exchange.
    #[serde(default)]
    pub exchange: String,
    /// Instrument type (`spot`, `futures`, `stock`, ...).
    #[serde(default, rename = "type")]
    pub instrument_type: String,
    /// Quote currency.
    #[serde(default)]
    pub currency_code: Option<String>,
    /// Exchange prefix used in wire symbols.
    #[serde(default)]
    pub prefix: Option<String>,
    /// Data provider id.
    #[serde(default)]
    pub provider_id: Option<String>,
    /// Data source.
    #[serde(default)]
    pub source2: Option<SearchSource>,
    /// Data source id.
    #[serde(default)]
    pub source_id: Option<String>,
    /// Instrument tags.
    #[serde(default)]
    pub typespecs: Vec<String>,
}

/// One page of search results.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResponse {
    /// Matches not included in this page.
    #[serde(default)]
    pub symbols_remaining: i64,
    /// Matches in this page.
    #[serde(default)]
    pub symbols: Vec<SearchResult>,
}
