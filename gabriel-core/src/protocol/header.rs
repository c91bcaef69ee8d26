//! Frame and response headers.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ClientError;

/// Header key carrying the frame id on the video stream.
pub const JSON_KEY_FRAME_ID: &str = "frame_id";
/// Header key announcing the size of the trailing payload.
pub const JSON_KEY_DATA_SIZE: &str = "data_size";
/// Header key carrying the inline payload in legacy mode.
pub const JSON_KEY_RESULT: &str = "result";

// ── FrameHeader ──────────────────────────────────────────────────

/// Sent ahead of every encoded image.
///
/// The id travels as a decimal string, which is what the service parses.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FrameHeader {
    pub frame_id: String,
}

impl FrameHeader {
    pub fn new(frame_id: u64) -> Self {
        Self {
            frame_id: frame_id.to_string(),
        }
    }

    /// Serialize to JSON bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, ClientError> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Deserialize from JSON bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ClientError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// The numeric frame id, if the string parses.
    pub fn id(&self) -> Option<u64> {
        self.frame_id.parse().ok()
    }
}

// ── OutboundFrame ────────────────────────────────────────────────

/// One unit of work on the video stream: an id and the encoded image.
#[derive(Debug, Clone)]
pub struct OutboundFrame {
    pub frame_id: u64,
    pub payload: Bytes,
}

// ── Response ─────────────────────────────────────────────────────

/// A fully framed response from the result stream.
///
/// `header` is the JSON header as received (non-legacy) or with the
/// `result` field stripped (legacy). `payload` is the result body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub header: Bytes,
    pub payload: Bytes,
}

impl Response {
    /// Decode the header into a JSON object.
    pub fn header_json(&self) -> Result<Map<String, Value>, ClientError> {
        match serde_json::from_slice(&self.header)? {
            Value::Object(map) => Ok(map),
            _ => Err(ClientError::HeaderNotObject),
        }
    }

    /// The `frame_id` echoed back by the service, if any.
    ///
    /// Accepts both the string form the client sends and a bare number.
    pub fn frame_id(&self) -> Option<u64> {
        let header = self.header_json().ok()?;
        match header.get(JSON_KEY_FRAME_ID)? {
            Value::String(s) => s.parse().ok(),
            Value::Number(n) => n.as_u64(),
            _ => None,
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────
