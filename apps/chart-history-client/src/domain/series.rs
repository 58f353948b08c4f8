//! Series Payload Parser
//!
//! The collected stream is not well-formed JSON: it is a concatenation of
//! framed protocol messages, one of which embeds the requested bars as
//! `"s":[{"i":0,"v":[ts,o,h,l,c,v]}, ...]`.
//!
//! # Point grammar
//!
//! ```text
//! section := '"s":[' point (',' point)* ']'
//! point   := '{' ... '}'                     top-level brace group
//! tokens  := point split on [ ] { } : , and whitespace, empties dropped
//! valid   := len(tokens) >= 9
//!            tokens[3]    timestamp  (f64, seconds or milliseconds)
//!            tokens[4..9] open high low close volume  (f64)
//! ```
//!
//! Invalid points are skipped; they never abort the batch.

use thiserror::Error;

use super::bar::{Bar, normalize_timestamp};

/// Marker that opens the series section.
pub const SERIES_MARKER: &str = "\"s\":[";

/// Minimum token count for an accepted point.
pub const MIN_POINT_TOKENS: usize = 9;

const TIMESTAMP_TOKEN: usize = 3;
const OPEN_TOKEN: usize = 4;

/// Structural outcome of parsing a collected stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SeriesParseError {
    /// The series section is absent entirely.
    #[error("no data found: stream contains no series payload")]
    NoSeries,

    /// The section exists but not a single point parsed.
    #[error("no valid data points found")]
    NoValidPoints,
}

/// Parse bars out of accumulated stream text.
///
/// Bars keep the order in which points appear.
///
/// # Errors
///
/// - [`SeriesParseError::NoSeries`] if [`SERIES_MARKER`] is absent.
/// - [`SeriesParseError::NoValidPoints`] if every point was malformed.
pub fn parse_bars(raw: &str, symbol: &str) -> Result<Vec<Bar>, SeriesParseError> {
    let section = series_section(raw).ok_or(SeriesParseError::NoSeries)?;

    let mut bars = Vec::new();
    let mut skipped = 0_usize;

    for point in split_points(section) {
        match parse_point(point, symbol) {
            Some(bar) => bars.push(bar),
            None => skipped += 1,
        }
    }

    if skipped > 0 {
        tracing::debug!(skipped, parsed = bars.len(), symbol, "Skipped malformed points");
    }

    if bars.is_empty() {
        return Err(SeriesParseError::NoValidPoints);
    }

    Ok(bars)
}

/// Contents of the first series array, without its outer brackets.
///
/// Brackets inside string literals are not counted. A truncated stream
/// yields everything after the marker.
fn series_section(raw: &str) -> Option<&str> {
    let start = raw.find(SERIES_MARKER)? + SERIES_MARKER.len();
    let body = &raw[start..];

    let mut depth = 1_usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, byte) in body.bytes().enumerate() {
        if in_string {
            match byte {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match byte {
            b'"' => in_string = true,
            b'[' => depth += 1,
            b']' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&body[..i]);
                }
            }
            _ => {}
        }
    }

    Some(body)
}

/// Split a section into its top-level `{...}` groups.
fn split_points(section: &str) -> Vec<&str> {
    let mut points = Vec::new();
    let mut depth = 0_usize;
    let mut start = None;
    let mut in_string = false;
    let mut escaped = false;

    for (i, byte) in section.bytes().enumerate() {
        if in_string {
            match byte {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match byte {
            b'"' => in_string = true,
            b'{' => {
                if depth == 0 {
                    start = Some(i);
                }
                depth += 1;
            }
            b'}' if depth > 0 => {
                depth -= 1;
                if depth == 0
                    && let Some(s) = start.take()
                {
                    points.push(&section[s..=i]);
                }
            }
            _ => {}
        }
    }

    if let Some(s) = start {
        points.push(&section[s..]);
    }

    points
}

fn tokenize(point: &str) -> Vec<&str> {
    point
        .split(|c: char| matches!(c, '[' | ']' | '{' | '}' | ':' | ',') || c.is_whitespace())
        .filter(|t| !t.is_empty())
        .collect()
}

fn parse_number(token: &str) -> Option<f64> {
    token.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn parse_point(point: &str, symbol: &str) -> Option<Bar> {
    let tokens = tokenize(point);
    if tokens.len() < MIN_POINT_TOKENS {
        return None;
    }

    let raw_ts = parse_number(tokens[TIMESTAMP_TOKEN])?;
    let mut ohlcv = [0.0_f64; 5];
    for (slot, token) in ohlcv.iter_mut().zip(&tokens[OPEN_TOKEN..OPEN_TOKEN + 5]) {
        *slot = parse_number(token)?;
    }
    let [open, high, low, close, volume] = ohlcv;

    #[allow(clippy::cast_possible_truncation)]
    let timestamp = normalize_timestamp(raw_ts.trunc() as i64);

    Some(Bar {
        timestamp,
        symbol: symbol.to_string(),
        open,
        high,
        low,
        close,
        volume,
    })
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    const SYMBOL: &str = "BINANCE:BTCUSDT";

    fn point(i: usize, ts: i64) -> String {
        format!(
            r#"{{"i":{i},"v":[{ts}.0,{o}.0,{h}.0,{l}.0,{c}.5,{v}.0]}}"#,
            o = 100 + i,
            h = 110 + i,
            l = 90 + i,
            c = 105 + i,
            v = 1000 + i
        )
    }

    fn stream(points: &[String]) -> String {
        format!(
            "~m~52~m~{{\"m\":\"series_loading\",\"p\":[\"cs_abc\",\"s1\"]}}\n\
             ~m~900~m~{{\"m\":\"timescale_update\",\"p\":[\"cs_abc\",{{\"s1\":{{\"node\":\"x\",\"s\":[{}],\"ns\":{{\"d\":\"\"}},\"t\":\"s1_1\"}}}}]}}\n",
            points.join(",")
        )
    }

    #[test]
    fn parses_well_formed_points_in_order() {
        let points: Vec<String> = (0..3).map(|i| point(i, 1_700_000_000 + i as i64 * 60)).collect();
        let bars = parse_bars(&stream(&points), SYMBOL).unwrap();

        assert_eq!(bars.len(), 3);
        assert_eq!(bars[0].timestamp, 1_700_000_000);
        assert_eq!(bars[2].timestamp, 1_700_000_120);
        assert_eq!(bars[1].open, 101.0);
        assert_eq!(bars[1].high, 111.0);
        assert_eq!(bars[1].low, 91.0);
        assert_eq!(bars[1].close, 106.5);
        assert_eq!(bars[1].volume, 1001.0);
        assert!(bars.iter().all(|b| b.symbol == SYMBOL));
    }

    #[test]
    fn skips_short_point_without_failing() {
        let mut points: Vec<String> = (0..5).map(|i| point(i, 1_700_000_000 + i as i64)).collect();
        // six tokens: "i" 5 "v" 1 2 3
        points.insert(2, r#"{"i":5,"v":[1,2,3]}"#.to_string());

        let bars = parse_bars(&stream(&points), SYMBOL).unwrap();
        assert_eq!(bars.len(), 5);
        let timestamps: Vec<i64> = bars.iter().map(|b| b.timestamp).collect();
        assert_eq!(
            timestamps,
            [
                1_700_000_000,
                1_700_000_001,
                1_700_000_002,
                1_700_000_003,
                1_700_000_004
            ]
        );
    }

    #[test]
    fn skips_non_numeric_field() {
        let points = vec![
            point(0, 1_700_000_000),
            r#"{"i":1,"v":[1700000060.0,"abc",2.0,0.5,1.5,10.0]}"#.to_string(),
            point(2, 1_700_000_120),
        ];
        let bars = parse_bars(&stream(&points), SYMBOL).unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[1].timestamp, 1_700_000_120);
    }

    #[test]
    fn millisecond_timestamps_are_normalized() {
        let points = vec![point(0, 1_700_000_000_000)];
        let bars = parse_bars(&stream(&points), SYMBOL).unwrap();
        assert_eq!(bars[0].timestamp, 1_700_000_000);
    }

    #[test]
    fn missing_marker_is_structural_error() {
        let raw = "~m~40~m~{\"m\":\"series_completed\",\"p\":[\"cs\"]}";
        assert_eq!(parse_bars(raw, SYMBOL), Err(SeriesParseError::NoSeries));
    }

    #[test]
    fn marker_without_valid_points_is_empty_error() {
        let points = vec![r#"{"i":0,"v":[]}"#.to_string()];
        assert_eq!(
            parse_bars(&stream(&points), SYMBOL),
            Err(SeriesParseError::NoValidPoints)
        );
        assert_eq!(
            parse_bars(r#"{"s":[]}"#, SYMBOL),
            Err(SeriesParseError::NoValidPoints)
        );
    }

    #[test]
    fn truncated_section_keeps_complete_points() {
        let raw = format!(r#"{{"s":[{},{{"i":1,"v":[17000"#, point(0, 1_700_000_000));
        let bars = parse_bars(&raw, SYMBOL).unwrap();
        assert_eq!(bars.len(), 1);
    }

    #[test]
    fn only_first_section_is_used() {
        let raw = format!(
            r#"{{"s":[{}]}} {{"s":[{}]}}"#,
            point(0, 1_700_000_000),
            point(1, 1_700_000_060)
        );
        let bars = parse_bars(&raw, SYMBOL).unwrap();
        assert_eq!(bars.len(), 1);
        assert_eq!(bars[0].timestamp, 1_700_000_000);
    }

    #[test]
    fn braces_inside_strings_do_not_split_points() {
        let points = vec![format!(
            r#"{{"i":0,"v":[1700000000.0,1.0,2.0,0.5,1.5,10.0],"note":"{{x}}"}}"#
        )];
        let bars = parse_bars(&stream(&points), SYMBOL).unwrap();
        assert_eq!(bars.len(), 1);
    }

    #[test]
    fn brackets_inside_strings_do_not_end_the_section() {
        let raw = format!(
            r#"{{"s":[{{"i":0,"v":[1700000000.0,1.0,2.0,0.5,1.5,10.0],"n":"a]b"}},{}]}}"#,
            point(1, 1_700_000_060)
        );
        let bars = parse_bars(&raw, SYMBOL).unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[1].timestamp, 1_700_000_060);
    }

    #[test]
    fn escaped_quote_keeps_string_open() {
        let raw = format!(
            r#"{{"s":[{{"i":0,"v":[1700000000.0,1.0,2.0,0.5,1.5,10.0],"n":"say \"]\""}},{}]}}"#,
            point(1, 1_700_000_060)
        );
        let bars = parse_bars(&raw, SYMBOL).unwrap();
        assert_eq!(bars.len(), 2);
    }

    proptest! {
        #[test]
        fn arbitrary_text_never_panics(raw in ".{0,200}") {
            let _ = parse_bars(&raw, SYMBOL);
        }

        #[test]
        fn anything_after_the_marker_is_a_section(tail in "[^\\]]{0,100}") {
            let raw = format!("{SERIES_MARKER}{tail}");
            prop_assert_ne!(parse_bars(&raw, SYMBOL), Err(SeriesParseError::NoSeries));
        }
    }
}
