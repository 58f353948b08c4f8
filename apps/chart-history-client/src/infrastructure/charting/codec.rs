//! Frame Codec
//!
//! Length-prefixed text framing used by the charting socket:
//!
//! ```text
//! ~m~<N>~m~<body>
//! ```
//!
//! `<N>` is the byte length of `<body>`. Several frames may be concatenated
//! in one socket message. Bodies are either JSON RPC calls
//! (`{"m": ..., "p": [...]}`) or heartbeats (`~h~<n>`), which must be
//! echoed back to keep the session alive.

use serde_json::Value;

use crate::domain::frame::WireFrame;

/// Frame delimiter.
pub const FRAME_MARKER: &str = "~m~";

/// Prefix of heartbeat bodies.
pub const HEARTBEAT_PREFIX: &str = "~h~";

/// Codec errors.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// JSON encoding/decoding failed.
    #[error("JSON codec error: {0}")]
    Json(#[from] serde_json::Error),

    /// Text did not start with a valid `~m~<N>~m~` header.
    #[error("malformed frame header near: {0}")]
    MalformedHeader(String),

    /// Declared body length runs past the end of the text.
    #[error("frame declares {declared} bytes but only {available} remain")]
    LengthOutOfBounds {
        /// Declared body length.
        declared: usize,
        /// Bytes left after the header.
        available: usize,
    },
}

/// One decoded frame body.
#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    /// Heartbeat body including its `~h~` prefix.
    Heartbeat(String),
    /// JSON body.
    Message(Value),
    /// Any other body.
    Text(String),
}

impl Packet {
    /// RPC method of a JSON packet.
    #[must_use]
    pub fn method(&self) -> Option<&str> {
        match self {
            Self::Message(value) => value.get("m").and_then(Value::as_str),
            Self::Heartbeat(_) | Self::Text(_) => None,
        }
    }
}

/// Encoder/decoder for the charting socket framing.
#[derive(Debug, Default, Clone, Copy)]
pub struct FrameCodec;

impl FrameCodec {
    /// Create a new codec.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Serialize an RPC frame and wrap it in a length prefix.
    ///
    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn encode(&self, frame: &WireFrame) -> Result<String, CodecError> {
        let json = serde_json::to_string(frame)?;
        Ok(self.encode_raw(&json))
    }

    /// Wrap an arbitrary body in a length prefix.
    #[must_use]
    pub fn encode_raw(&self, body: &str) -> String {
        format!("{FRAME_MARKER}{}{FRAME_MARKER}{body}", body.len())
    }

    /// Split text into packets along frame boundaries.
    ///
    /// ASCII whitespace between frames is skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if a header is malformed, a declared length runs
    /// past the end of the text, or a JSON-looking body fails to parse.
    pub fn decode(&self, text: &str) -> Result<Vec<Packet>, CodecError> {
        let mut packets = Vec::new();
        let mut rest = text;

        loop {
            rest = rest.trim_start_matches(|c: char| c.is_ascii_whitespace());
            if rest.is_empty() {
                return Ok(packets);
            }

            let after_marker = rest
                .strip_prefix(FRAME_MARKER)
                .ok_or_else(|| CodecError::MalformedHeader(snippet(rest)))?;
            let len_end = after_marker
                .find(FRAME_MARKER)
                .ok_or_else(|| CodecError::MalformedHeader(snippet(rest)))?;
            let declared: usize = after_marker[..len_end]
                .parse()
                .map_err(|_| CodecError::MalformedHeader(snippet(rest)))?;

            let body_and_rest = &after_marker[len_end + FRAME_MARKER.len()..];
            let body = body_and_rest
                .get(..declared)
                .ok_or(CodecError::LengthOutOfBounds {
                    declared,
                    available: body_and_rest.len(),
                })?;

            packets.push(classify(body)?);
            rest = &body_and_rest[declared..];
        }
    }
}

fn classify(body: &str) -> Result<Packet, CodecError> {
    if body.starts_with(HEARTBEAT_PREFIX) {
        return Ok(Packet::Heartbeat(body.to_string()));
    }
    if body.starts_with('{') || body.starts_with('[') {
        return Ok(Packet::Message(serde_json::from_str(body)?));
    }
    Ok(Packet::Text(body.to_string()))
}

fn snippet(text: &str) -> String {
    text.chars().take(32).collect()
}
