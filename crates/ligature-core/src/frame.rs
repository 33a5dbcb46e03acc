//! RGB frame buffer produced by `Environment::render`.
//!
//! [`Frame`] holds one frame of tightly packed RGB8 pixel data. It is what
//! the video writer consumes, what the still-image dump saves, and what the
//! RGB trajectory handler downsamples.

use std::path::Path;

use image::imageops::{self, FilterType};
use image::RgbImage;

use crate::error::FrameError;

const BYTES_PER_PIXEL: usize = 3;

// ---------------------------------------------------------------------------
// Frame
// ---------------------------------------------------------------------------

/// A single rendered RGB8 image.
///
/// # Example
///
/// ```
/// use ligature_core::frame::Frame;
///
/// let frame = Frame::new(4, 2);
/// assert_eq!(frame.width(), 4);
/// assert_eq!(frame.height(), 2);
/// assert_eq!(frame.data().len(), 4 * 2 * 3);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl Frame {
    /// Create a black frame.
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0; Self::byte_len(width, height)],
        }
    }

    /// Wrap existing RGB8 bytes.
    pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> Result<Self, FrameError> {
        let expected = Self::byte_len(width, height);
        if data.len() != expected {
            return Err(FrameError::SizeMismatch {
                width,
                height,
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Raw pixel data, row-major RGB.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// Set one pixel. Out-of-bounds coordinates are ignored.
    pub fn put_pixel(&mut self, x: i64, y: i64, rgb: [u8; 3]) {
        if x < 0 || y < 0 || x >= i64::from(self.width) || y >= i64::from(self.height) {
            return;
        }
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let offset = (y as usize * self.width as usize + x as usize) * BYTES_PER_PIXEL;
        self.data[offset..offset + BYTES_PER_PIXEL].copy_from_slice(&rgb);
    }

    /// Fill every pixel with one colour.
    pub fn fill(&mut self, rgb: [u8; 3]) {
        for px in self.data.chunks_exact_mut(BYTES_PER_PIXEL) {
            px.copy_from_slice(&rgb);
        }
    }

    /// Downsample (or upsample) to `width` x `height`.
    #[must_use]
    pub fn resized(&self, width: u32, height: u32) -> Self {
        if width == self.width && height == self.height {
            return self.clone();
        }
        let resized = imageops::resize(&self.as_image(), width, height, FilterType::Triangle);
        Self {
            width,
            height,
            data: resized.into_raw(),
        }
    }

    /// Write the frame as a PNG file.
    pub fn save_png(&self, path: impl AsRef<Path>) -> Result<(), FrameError> {
        self.as_image().save(path)?;
        Ok(())
    }

    fn as_image(&self) -> RgbImage {
        // The invariant data.len() == width * height * 3 holds for every
        // constructor, so from_raw cannot fail here.
        RgbImage::from_raw(self.width, self.height, self.data.clone())
            .unwrap_or_else(|| RgbImage::new(self.width, self.height))
    }

    const fn byte_len(width: u32, height: u32) -> usize {
        width as usize * height as usize * BYTES_PER_PIXEL
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
