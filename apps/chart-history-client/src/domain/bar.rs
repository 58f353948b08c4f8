//! OHLCV Bar
//!
//! The canonical price/volume observation returned by every fetch path.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Raw timestamps above this value are treated as milliseconds.
pub const MILLISECOND_THRESHOLD: i64 = 10_000_000_000;

/// One open/high/low/close/volume observation for a symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    /// Seconds since the Unix epoch, UTC.
    pub timestamp: i64,
    /// Wire symbol the bar belongs to.
    pub symbol: String,
    /// Opening price.
    pub open: f64,
    /// Highest price.
    pub high: f64,
    /// Lowest price.
    pub low: f64,
    /// Closing price.
    pub close: f64,
    /// Traded volume.
    pub volume: f64,
}

impl Bar {
    /// Bar open time as a UTC datetime.
    ///
    /// Returns `None` when the timestamp is outside chrono's range.
    #[must_use]
    pub fn datetime(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.timestamp, 0)
    }
}

/// Normalize an upstream timestamp to whole seconds.
///
/// Values greater than [`MILLISECOND_THRESHOLD`] are millisecond-scale and
/// are divided by 1000; everything else is already in seconds.
#[must_use]
pub const fn normalize_timestamp(raw: i64) -> i64 {
    if raw > MILLISECOND_THRESHOLD {
        raw / 1000
    } else {
        raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn seconds_pass_through() {
        assert_eq!(normalize_timestamp(1_700_000_000), 1_700_000_000);
        assert_eq!(normalize_timestamp(MILLISECOND_THRESHOLD), MILLISECOND_THRESHOLD);
    }

    #[test]
    fn milliseconds_are_scaled_down() {
        assert_eq!(normalize_timestamp(1_700_000_000_123), 1_700_000_000);
    }

    #[test]
    fn datetime_conversion() {
        let bar = Bar {
            timestamp: 0,
            symbol: "BINANCE:BTCUSDT".to_string(),
            open: 1.0,
            high: 1.0,
            low: 1.0,
            close: 1.0,
            volume: 0.0,
        };
        assert_eq!(bar.datetime().unwrap().timestamp(), 0);
    }

    proptest! {
        #[test]
        fn normalization_matches_threshold_rule(ts in any::<i64>()) {
            let expected = if ts > MILLISECOND_THRESHOLD { ts / 1000 } else { ts };
            prop_assert_eq!(normalize_timestamp(ts), expected);
        }
    }
}
