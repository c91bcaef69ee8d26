//! Domain-specific error types for the Gabriel streaming client.
//!
//! All fallible operations return `Result<T, ClientError>`.
//! Errors raised inside a pipeline unit never cross the task boundary as
//! panics; the unit converts them into a terminal [`Reply::Error`].
//!
//! [`Reply::Error`]: crate::message::Reply::Error

use std::time::Duration;
use thiserror::Error;

/// The canonical error type for the streaming client.
#[derive(Debug, Error)]
pub enum ClientError {
    // ── Framing Errors ───────────────────────────────────────────
    /// The 4-byte length prefix announced a header beyond the codec limit.
    #[error("response header too large: {size} bytes (max {max})")]
    HeaderTooLarge { size: usize, max: usize },

    /// The header's `data_size` announced a payload beyond the codec limit.
    #[error("response payload too large: {size} bytes (max {max})")]
    PayloadTooLarge { size: u64, max: usize },

    /// The response header was valid JSON but not an object.
    #[error("response header is not a JSON object")]
    HeaderNotObject,

    /// A required header field was absent.
    #[error("response header missing field `{0}`")]
    MissingField(&'static str),

    /// A header field was present but had the wrong shape.
    #[error("invalid header field `{field}`: {reason}")]
    InvalidField {
        field: &'static str,
        reason: &'static str,
    },

    /// The stream ended part-way through a framed response.
    #[error("connection closed mid-frame ({buffered} bytes buffered)")]
    TruncatedFrame { buffered: usize },

    // ── Connection Errors ────────────────────────────────────────
    /// The TCP/IO layer reported an error.
    #[error("connection error: {0}")]
    Connection(#[from] std::io::Error),

    /// A network command arrived before the unit was connected.
    #[error("{unit} unit is not connected")]
    NotConnected { unit: &'static str },

    /// The peer closed the connection between frames.
    #[error("connection closed by peer")]
    ConnectionClosed,

    /// An mpsc channel was closed unexpectedly.
    #[error("channel closed")]
    ChannelClosed,

    /// An operation exceeded its deadline.
    #[error("timeout after {0:?}")]
    Timeout(Duration),

    /// A unit received a command it does not handle.
    #[error("{unit} unit does not handle `{command}` commands")]
    UnsupportedCommand {
        unit: &'static str,
        command: &'static str,
    },

    // ── Serialization Errors ─────────────────────────────────────
    /// JSON encoding or decoding failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Base64 decoding of a guidance image failed.
    #[error("base64 error: {0}")]
    Base64(#[from] base64::DecodeError),

    // ── Media Errors ─────────────────────────────────────────────
    /// The frame source could not be opened or read.
    #[error("frame source error: {0}")]
    Source(String),

    /// A frame buffer did not match its declared geometry.
    #[error("invalid frame: expected {expected} bytes, got {actual}")]
    InvalidFrame { expected: usize, actual: usize },

    /// Image encoding or decoding failed.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    // ── Lifecycle ────────────────────────────────────────────────
    /// The operation was interrupted by session shutdown.
    #[error("cancelled")]
    Cancelled,
}

// ── Channel conversion ───────────────────────────────────────────

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for ClientError {
    fn from(_: tokio::sync::mpsc::error::SendError<T>) -> Self {
        ClientError::ChannelClosed
    }
}
