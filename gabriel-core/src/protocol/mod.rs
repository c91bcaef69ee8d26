//! Wire-level payload definitions for the Gabriel service.
//!
//! # Wire Protocol
//!
//! Two TCP connections per session, one per direction.
//!
//! ## Video stream (client → service)
//! ```text
//! Client ──[FrameHeader JSON]──[encoded image]──► Service   (repeated)
//!   FrameHeader: {"frame_id": "<n>"}, no length prefix
//! ```
//!
//! ## Results (service → client)
//! ```text
//! Service ──[u32 BE header_size][header JSON][payload]──► Client
//!   non-legacy: payload is `data_size` bytes following the header
//!   legacy:     no trailing payload, header["result"] carries it
//! ```
//!
//! Framing itself lives in [`crate::codec`]; this module holds the types
//! that are framed and the decoding of result payloads into guidance.

pub mod guidance;
pub mod header;

pub use guidance::{Guidance, ParsedResponse, parse};
pub use header::{
    FrameHeader, JSON_KEY_DATA_SIZE, JSON_KEY_FRAME_ID, JSON_KEY_RESULT, OutboundFrame, Response,
};
