//! Raw frame sources.
//!
//! The capture unit pulls frames through the [`FrameSource`] trait and
//! does not care where they come from. Two sources ship with the crate:
//!
//! - [`SyntheticSource`]: generated gradient frames, optionally limited to
//!   a fixed count (tests, smoke runs against a live service).
//! - [`ImageSequenceSource`]: still images from a directory (sorted by file
//!   name) or a single image file, decoded with the `image` crate.
//!
//! Camera devices plug in by implementing [`FrameSource`].

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::ClientError;
use crate::pipeline::types::{Frame, PixelFormat};

/// Input identifier used when none is configured.
pub const DEFAULT_INPUT: &str = "synthetic";

/// Something that produces raw frames on demand.
///
/// `read` is called from the capture unit's timed loop; it may block for
/// up to one capture interval. `Ok(None)` means the source is exhausted
/// and the stream ends gracefully.
pub trait FrameSource: Send + 'static {
    /// Pull the next frame.
    fn read(&mut self) -> Result<Option<Frame>, ClientError>;

    /// Release the underlying handle. Called once when capture stops.
    fn release(&mut self) {}

    /// Short human-readable description for logs.
    fn describe(&self) -> String;
}

/// Open a source from an input identifier.
///
/// - `synthetic`: endless generated frames.
/// - `synthetic:<n>`: exactly `n` generated frames.
/// - anything else: a directory of images or a single image file.
pub fn open_source(input: &str) -> Result<Box<dyn FrameSource>, ClientError> {
    let input = input.trim();
    if input == "synthetic" {
        return Ok(Box::new(SyntheticSource::new(640, 480)));
    }
    if let Some(count) = input.strip_prefix("synthetic:") {
        let count: u64 = count
            .parse()
            .map_err(|_| ClientError::Source(format!("invalid frame count in `{input}`")))?;
        return Ok(Box::new(SyntheticSource::new(640, 480).with_limit(count)));
    }
    if input.contains("://") {
        return Err(ClientError::Source(format!(
            "unsupported input `{input}`: only local paths and synthetic sources are available"
        )));
    }
    Ok(Box::new(ImageSequenceSource::open(input)?))
}

// ── SyntheticSource ──────────────────────────────────────────────

/// Generates moving RGB gradients.
#[derive(Debug, Clone)]
pub struct SyntheticSource {
    width: u32,
    height: u32,
    limit: Option<u64>,
    produced: u64,
}

impl SyntheticSource {
    /// Endless source of `width x height` frames.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            limit: None,
            produced: 0,
        }
    }

    /// Stop after `limit` frames.
    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Frames produced so far.
    pub fn produced(&self) -> u64 {
        self.produced
    }

    fn pixels(&self) -> Vec<u8> {
        let shift = self.produced;
        let mut data = Vec::with_capacity(self.width as usize * self.height as usize * 3);
        for y in 0..self.height as u64 {
            for x in 0..self.width as u64 {
                data.push(((x + shift) % 256) as u8);
                data.push(((y + shift) % 256) as u8);
                data.push(((x + y) % 256) as u8);
            }
        }
        data
    }
}

impl FrameSource for SyntheticSource {
    fn read(&mut self) -> Result<Option<Frame>, ClientError> {
        if self.limit.is_some_and(|limit| self.produced >= limit) {
            return Ok(None);
        }
        let frame = Frame::new(self.width, self.height, PixelFormat::Rgb8, self.pixels())?;
        self.produced += 1;
        Ok(Some(frame))
    }

    fn describe(&self) -> String {
        match self.limit {
            Some(limit) => format!("synthetic {}x{} ({limit} frames)", self.width, self.height),
            None => format!("synthetic {}x{}", self.width, self.height),
        }
    }
}

// ── ImageSequenceSource ──────────────────────────────────────────

/// Plays a fixed list of image files once, in order.
#[derive(Debug)]
pub struct ImageSequenceSource {
    origin: PathBuf,
    files: Vec<PathBuf>,
    next: usize,
}

impl ImageSequenceSource {
    /// Open a directory (all `.jpg`, `.jpeg` and `.png` files, sorted) or
    /// a single image file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ClientError> {
        let origin = path.as_ref().to_path_buf();
        let files = if origin.is_dir() {
            let mut files = Vec::new();
            for entry in std::fs::read_dir(&origin)? {
                let path = entry?.path();
                if path.is_file() && is_image(&path) {
                    files.push(path);
                }
            }
            files.sort();
            files
        } else if origin.is_file() {
            vec![origin.clone()]
        } else {
            return Err(ClientError::Source(format!(
                "{} is neither a directory nor a file",
                origin.display()
            )));
        };

        if files.is_empty() {
            return Err(ClientError::Source(format!(
                "no images found in {}",
                origin.display()
            )));
        }
        info!("image source: {} file(s) from {}", files.len(), origin.display());
        Ok(Self {
            origin,
            files,
            next: 0,
        })
    }

    /// Number of frames this source will produce in total.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Whether the source has no frames at all.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl FrameSource for ImageSequenceSource {
    fn read(&mut self) -> Result<Option<Frame>, ClientError> {
        let Some(path) = self.files.get(self.next) else {
            return Ok(None);
        };
        self.next += 1;
        let image = image::open(path)?.into_rgb8();
        let (width, height) = image.dimensions();
        debug!("decoded {} ({width}x{height})", path.display());
        Frame::new(width, height, PixelFormat::Rgb8, image.into_raw()).map(Some)
    }

    fn release(&mut self) {
        self.next = self.files.len();
    }

    fn describe(&self) -> String {
        format!("images from {}", self.origin.display())
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| matches!(ext.to_ascii_lowercase().as_str(), "jpg" | "jpeg" | "png"))
        .unwrap_or(false)
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synthetic_limit_exhausts() {
        let mut src = SyntheticSource::new(8, 8).with_limit(3);
        for _ in 0..3 {
            let frame = src.read().unwrap().unwrap();
            assert_eq!(frame.byte_len(), 8 * 8 * 3);
        }
        assert!(src.read().unwrap().is_none());
        assert_eq!(src.produced(), 3);
    }

    #[test]
    fn synthetic_frames_change() {
        let mut src = SyntheticSource::new(4, 4);
        let a = src.read().unwrap().unwrap();
        let b = src.read().unwrap().unwrap();
        assert_ne!(a.data, b.data);
    }

    #[test]
    fn open_source_parses_identifiers() {
        let src = open_source("synthetic:5").unwrap();
        assert!(src.describe().contains("5 frames"));
        assert!(open_source("synthetic").is_ok());
        assert!(matches!(
            open_source("synthetic:lots"),
            Err(ClientError::Source(_))
        ));
        assert!(matches!(
            open_source("rtsp://camera/stream"),
            Err(ClientError::Source(_))
        ));
    }

    #[test]
    fn missing_path_is_rejected() {
        assert!(matches!(
            open_source("/definitely/not/here"),
            Err(ClientError::Source(_))
        ));
    }

    #[test]
    fn directory_plays_sorted_images_once() {
        let dir = tempfile::tempdir().unwrap();
        image::RgbImage::from_pixel(6, 4, image::Rgb([10, 20, 30]))
            .save(dir.path().join("b.png"))
            .unwrap();
        image::RgbImage::from_pixel(3, 2, image::Rgb([1, 2, 3]))
            .save(dir.path().join("a.png"))
            .unwrap();
        std::fs::write(dir.path().join("notes.txt"), "not an image").unwrap();

        let mut src = ImageSequenceSource::open(dir.path()).unwrap();
        assert_eq!(src.len(), 2);

        let first = src.read().unwrap().unwrap();
        assert_eq!((first.width, first.height), (3, 2));
        assert_eq!(first.pixel(0, 0), &[1, 2, 3]);
        let second = src.read().unwrap().unwrap();
        assert_eq!((second.width, second.height), (6, 4));
        assert!(src.read().unwrap().is_none());
    }

    #[test]
    fn empty_directory_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            ImageSequenceSource::open(dir.path()),
            Err(ClientError::Source(_))
        ));
    }

    #[test]
    fn image_extensions() {
        assert!(is_image(Path::new("a/frame.JPG")));
        assert!(is_image(Path::new("frame.png")));
        assert!(!is_image(Path::new("notes.txt")));
        assert!(!is_image(Path::new("noext")));
    }
}
