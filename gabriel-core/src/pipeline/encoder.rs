//! Frame encoder: raw [`Frame`] in, compressed image bytes out.
//!
//! The stream unit owns one [`FrameEncoder`] and calls it once per send
//! cycle. The encoded buffer lives only for that cycle.

use bytes::Bytes;
use image::ExtendedColorType;
use image::codecs::jpeg;

use crate::error::ClientError;
use crate::pipeline::types::Frame;

/// Default JPEG quality (1..=100).
pub const DEFAULT_JPEG_QUALITY: u8 = 80;

/// Turns a raw frame into the image bytes sent after each frame header.
pub trait FrameEncoder: Send + 'static {
    fn encode(&mut self, frame: &Frame) -> Result<Bytes, ClientError>;
}

// ── JpegEncoder ──────────────────────────────────────────────────

/// Baseline JPEG encoder; what the Gabriel service expects.
#[derive(Debug, Clone)]
pub struct JpegEncoder {
    quality: u8,
    frame_count: u64,
}

impl JpegEncoder {
    /// Create an encoder with the given quality, clamped to `1..=100`.
    pub fn new(quality: u8) -> Self {
        Self {
            quality: quality.clamp(1, 100),
            frame_count: 0,
        }
    }

    /// Current quality setting.
    pub fn quality(&self) -> u8 {
        self.quality
    }

    /// Number of frames encoded so far.
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }
}

impl Default for JpegEncoder {
    fn default() -> Self {
        Self::new(DEFAULT_JPEG_QUALITY)
    }
}

impl FrameEncoder for JpegEncoder {
    fn encode(&mut self, frame: &Frame) -> Result<Bytes, ClientError> {
        // JPEG has no alpha and expects RGB order.
        let rgb = frame.to_rgb();
        let mut out = Vec::with_capacity(rgb.byte_len() / 8);
        jpeg::JpegEncoder::new_with_quality(&mut out, self.quality).encode(
            &rgb.data,
            rgb.width,
            rgb.height,
            ExtendedColorType::Rgb8,
        )?;
        self.frame_count += 1;
        Ok(Bytes::from(out))
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::types::PixelFormat;

    fn test_frame(w: u32, h: u32, format: PixelFormat) -> Frame {
        let len = (w * h) as usize * format.bytes_per_pixel();
        Frame::new(w, h, format, vec![0x80; len]).unwrap()
    }

    #[test]
    fn encodes_jpeg_markers() {
        let mut enc = JpegEncoder::default();
        let data = enc.encode(&test_frame(32, 32, PixelFormat::Rgb8)).unwrap();
        assert_eq!(&data[..2], &[0xFF, 0xD8]);
        assert_eq!(&data[data.len() - 2..], &[0xFF, 0xD9]);
        assert_eq!(enc.frame_count(), 1);
    }

    #[test]
    fn flat_frame_compresses() {
        let mut enc = JpegEncoder::new(50);
        let frame = test_frame(128, 128, PixelFormat::Bgr8);
        let data = enc.encode(&frame).unwrap();
        assert!(data.len() < frame.byte_len());
    }

    #[test]
    fn rgba_input_is_accepted() {
        let mut enc = JpegEncoder::default();
        assert!(enc.encode(&test_frame(16, 16, PixelFormat::Rgba8)).is_ok());
    }

    #[test]
    fn quality_is_clamped() {
        assert_eq!(JpegEncoder::new(0).quality(), 1);
        assert_eq!(JpegEncoder::new(250).quality(), 100);
    }

    #[test]
    fn decodes_back_to_same_size() {
        let mut enc = JpegEncoder::default();
        let data = enc.encode(&test_frame(40, 24, PixelFormat::Rgb8)).unwrap();
        let img = image::load_from_memory(&data).unwrap();
        assert_eq!(img.to_rgb8().dimensions(), (40, 24));
    }
}
