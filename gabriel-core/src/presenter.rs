//! Extension points for a presentation layer.
//!
//! A [`Presenter`] is handed to the [`Client`](crate::Client) at
//! construction. Every method has a no-op default, so implementors only
//! override what they display.
//!
//! Methods are called from pipeline tasks and must return quickly:
//! `on_frame` runs inside the timed capture loop and any time it takes is
//! taken from the capture cadence.

use crate::pipeline::types::Frame;
use crate::protocol::ParsedResponse;

pub trait Presenter: Send + Sync + 'static {
    /// A frame was captured. Always RGB.
    fn on_frame(&self, _frame: &Frame) {}

    /// A response arrived and was parsed.
    fn on_response(&self, _response: &ParsedResponse) {}

    /// The response carried a non-empty instruction.
    fn on_instruction(&self, _instruction: &str) {}

    /// The response carried a guidance image (encoded, usually JPEG).
    fn on_guidance(&self, _image: &[u8]) {}
}

/// Presenter that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopPresenter;

impl Presenter for NoopPresenter {}
