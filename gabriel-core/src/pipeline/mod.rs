//! # Streaming pipeline
//!
//! Three cooperating units move frames out and guidance back in:
//!
//! ```text
//! FrameSource ─► CaptureUnit ─► [latest-frame slot] ─► StreamUnit ──TCP──► service
//!                                                          ▲ acquire
//!                                                     TokenManager
//!                                                          │ release
//! Client ◄── reply queue ◄── ReceiveUnit ◄─────────────TCP─┘ ◄── service
//! ```
//!
//! ## Sub-modules
//!
//! | Module    | Purpose                                                |
//! |-----------|--------------------------------------------------------|
//! | `types`   | Raw frame and pixel format types                       |
//! | `slot`    | Single-slot overwrite buffer between capture and send  |
//! | `source`  | `FrameSource` trait, synthetic and image-file sources  |
//! | `encoder` | `FrameEncoder` trait and the JPEG encoder              |
//! | `capture` | Fixed-cadence capture loop                             |
//! | `stream`  | Token-gated frame sender                               |
//! | `receive` | Response reader that returns tokens                    |

pub mod capture;
pub mod encoder;
pub mod receive;
pub mod slot;
pub mod source;
pub mod stream;
pub mod types;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::message::Reply;

// ── Re-exports ───────────────────────────────────────────────────

pub use capture::{CaptureUnit, DEFAULT_CAPTURE_FPS};
pub use encoder::{DEFAULT_JPEG_QUALITY, FrameEncoder, JpegEncoder};
pub use receive::ReceiveUnit;
pub use slot::{SlotReader, SlotWriter, frame_slot};
pub use source::{FrameSource, ImageSequenceSource, SyntheticSource, open_source};
pub use stream::StreamUnit;
pub use types::{Frame, PixelFormat};

/// Depth of each unit's inbound command queue.
pub const COMMAND_QUEUE_DEPTH: usize = 16;

/// Deliver a reply unless the session is shutting down.
///
/// Returns `false` if the reply could not be delivered; the caller should
/// stop.
pub(crate) async fn deliver(
    replies: &mpsc::Sender<Reply>,
    cancel: &CancellationToken,
    reply: Reply,
) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        sent = replies.send(reply) => sent.is_ok(),
    }
}
