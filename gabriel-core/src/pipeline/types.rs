//! Shared frame types used between pipeline stages.
//!
//! A [`Frame`] is the raw, uncompressed image the capture unit pulls from a
//! [`FrameSource`](crate::pipeline::source::FrameSource). It is distinct
//! from the encoded payload that actually crosses the wire.

use std::time::Instant;

use bytes::Bytes;

use crate::error::ClientError;

// ── PixelFormat ──────────────────────────────────────────────────

/// Pixel layout for raw captured frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// 3 bytes per pixel: Blue, Green, Red (typical camera order).
    Bgr8,
    /// 3 bytes per pixel: Red, Green, Blue.
    Rgb8,
    /// 4 bytes per pixel: Red, Green, Blue, Alpha.
    Rgba8,
}

impl PixelFormat {
    /// Bytes consumed by a single pixel in this format.
    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Bgr8 | PixelFormat::Rgb8 => 3,
            PixelFormat::Rgba8 => 4,
        }
    }
}

// ── Frame ────────────────────────────────────────────────────────

/// A raw frame, tightly packed (`width * bpp` bytes per row).
///
/// Pixel data lives in [`Bytes`], so cloning a frame into the latest-frame
/// slot or handing it to a presenter does not copy the bitmap.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Pixel layout.
    pub format: PixelFormat,
    /// Raw pixel data, `width * height * bpp` bytes.
    pub data: Bytes,
    /// Monotonic capture timestamp.
    pub timestamp: Instant,
}

impl Frame {
    /// Build a frame, checking that `data` matches the declared geometry.
    pub fn new(
        width: u32,
        height: u32,
        format: PixelFormat,
        data: impl Into<Bytes>,
    ) -> Result<Self, ClientError> {
        let data = data.into();
        let expected = width as usize * height as usize * format.bytes_per_pixel();
        if data.len() != expected {
            return Err(ClientError::InvalidFrame {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            format,
            data,
            timestamp: Instant::now(),
        })
    }

    /// Total byte size of the bitmap.
    pub fn byte_len(&self) -> usize {
        self.data.len()
    }

    /// Returns the pixel bytes at `(x, y)`.
    ///
    /// # Panics
    ///
    /// Panics if `(x, y)` is out of bounds.
    pub fn pixel(&self, x: u32, y: u32) -> &[u8] {
        let bpp = self.format.bytes_per_pixel();
        let offset = (y as usize * self.width as usize + x as usize) * bpp;
        &self.data[offset..offset + bpp]
    }

    /// A copy of this frame in [`PixelFormat::Rgb8`].
    ///
    /// Already-RGB frames are returned without copying the bitmap.
    pub fn to_rgb(&self) -> Frame {
        let data = match self.format {
            PixelFormat::Rgb8 => self.data.clone(),
            PixelFormat::Bgr8 => self
                .data
                .chunks_exact(3)
                .flat_map(|px| [px[2], px[1], px[0]])
                .collect::<Vec<u8>>()
                .into(),
            PixelFormat::Rgba8 => self
                .data
                .chunks_exact(4)
                .flat_map(|px| [px[0], px[1], px[2]])
                .collect::<Vec<u8>>()
                .into(),
        };
        Frame {
            width: self.width,
            height: self.height,
            format: PixelFormat::Rgb8,
            data,
            timestamp: self.timestamp,
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────
