//! Wire Symbol Formatting
//!
//! The upstream addresses instruments as `EXCHANGE:TICKER`, with futures
//! contracts written as `EXCHANGE:TICKER<N>!`.

/// Separator between exchange and ticker in a wire symbol.
pub const WIRE_SEPARATOR: char = ':';

/// Format a ticker into the upstream wire symbol syntax.
///
/// Symbols that already contain [`WIRE_SEPARATOR`] are returned unchanged.
#[must_use]
pub fn format_symbol(symbol: &str, exchange: &str, contract: Option<u32>) -> String {
    if symbol.contains(WIRE_SEPARATOR) {
        return symbol.to_string();
    }

    match contract {
        Some(n) => format!("{exchange}{WIRE_SEPARATOR}{symbol}{n}!"),
        None => format!("{exchange}{WIRE_SEPARATOR}{symbol}"),
    }
}
