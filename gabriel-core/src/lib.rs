//! # gabriel-core
//!
//! Streaming transport for a Gabriel cognitive-assistance client.
//!
//! This crate contains:
//! - **Client**: `Client` orchestrates one streaming session end to end
//! - **Flow control**: `TokenManager`, a bounded window of frames in flight
//! - **Pipeline**: capture, stream, and receive units plus frame sources
//!   and encoders
//! - **Codec**: `FrameCodec` / `ResponseCodec` for framed TCP I/O via `tokio_util`
//! - **Protocol**: frame headers, responses, and guidance extraction
//! - **Messages**: the `Command` / `Reply` contract between client and units
//! - **Error**: `ClientError`, a `thiserror`-based error hierarchy

pub mod client;
pub mod codec;
pub mod error;
pub mod message;
pub mod network;
pub mod pipeline;
pub mod presenter;
pub mod protocol;
pub mod token;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use client::{
    Client, ClientConfig, DEFAULT_RESULT_PORT, DEFAULT_VIDEO_PORT, SessionEnd, SessionSummary,
};
pub use codec::{FrameCodec, ResponseCodec};
pub use error::ClientError;
pub use message::{Command, Reply};
pub use network::{ConnectionInfo, connect};
pub use pipeline::{
    CaptureUnit, DEFAULT_CAPTURE_FPS, DEFAULT_JPEG_QUALITY, Frame, FrameEncoder, FrameSource,
    ImageSequenceSource, JpegEncoder, PixelFormat, ReceiveUnit, StreamUnit, SyntheticSource,
    open_source,
};
pub use presenter::{NoopPresenter, Presenter};
pub use protocol::{Guidance, OutboundFrame, ParsedResponse, Response, parse};
pub use token::{DEFAULT_TOKEN_CAPACITY, TokenManager};
