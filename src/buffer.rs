//! RGBA pixel buffers and image dimensions
//!
//! A [`PixelBuffer`] is the unit of work passed from the extractor to the
//! scaler: row-major RGBA bytes with the invariant
//! `pixels.len() == width * height * 4`.

use image::RgbaImage;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of bytes per pixel (R, G, B, A)
pub const CHANNELS: usize = 4;

/// Width and height of an image in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Parse a `WxH` string such as `"64x32"`.
    pub fn parse(s: &str) -> Option<Self> {
        let (w, h) = s.trim().split_once(['x', 'X'])?;
        Some(Self { width: w.trim().parse().ok()?, height: h.trim().parse().ok()? })
    }
}

impl std::fmt::Display for Dimensions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl From<(u32, u32)> for Dimensions {
    fn from((width, height): (u32, u32)) -> Self {
        Self { width, height }
    }
}

/// Raised when pixel data does not match the declared dimensions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Pixel data length {actual} does not match {width}x{height} RGBA (expected {expected})")]
pub struct BufferSizeError {
    pub width: u32,
    pub height: u32,
    pub expected: usize,
    pub actual: usize,
}

/// Decoded RGBA pixels in row-major order (row 0 first, left to right).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl PixelBuffer {
    /// Wrap raw RGBA bytes, checking the length invariant.
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self, BufferSizeError> {
        let expected = byte_len(width, height);
        if pixels.len() != expected {
            return Err(BufferSizeError { width, height, expected, actual: pixels.len() });
        }
        Ok(Self { width, height, pixels })
    }

    /// A fully transparent buffer.
    pub fn transparent(width: u32, height: u32) -> Self {
        Self { width, height, pixels: vec![0; byte_len(width, height)] }
    }

    /// Build a buffer by evaluating `f(x, y)` for every pixel.
    pub fn from_fn(width: u32, height: u32, mut f: impl FnMut(u32, u32) -> [u8; 4]) -> Self {
        let mut pixels = Vec::with_capacity(byte_len(width, height));
        for y in 0..height {
            for x in 0..width {
                pixels.extend_from_slice(&f(x, y));
            }
        }
        Self { width, height, pixels }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> Dimensions {
        Dimensions::new(self.width, self.height)
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn into_pixels(self) -> Vec<u8> {
        self.pixels
    }

    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    /// RGBA quadruple at `(x, y)`, or `None` when out of bounds.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = (y as usize * self.width as usize + x as usize) * CHANNELS;
        let px = &self.pixels[offset..offset + CHANNELS];
        Some([px[0], px[1], px[2], px[3]])
    }

    /// One row of pixel bytes.
    pub fn row(&self, y: u32) -> &[u8] {
        let stride = self.width as usize * CHANNELS;
        let start = y as usize * stride;
        &self.pixels[start..start + stride]
    }
}

impl From<RgbaImage> for PixelBuffer {
    fn from(image: RgbaImage) -> Self {
        let (width, height) = image.dimensions();
        Self { width, height, pixels: image.into_raw() }
    }
}

impl From<PixelBuffer> for RgbaImage {
    fn from(buffer: PixelBuffer) -> Self {
        // The length invariant guarantees from_raw succeeds.
        RgbaImage::from_raw(buffer.width, buffer.height, buffer.pixels)
            .unwrap_or_else(|| RgbaImage::new(0, 0))
    }
}

fn byte_len(width: u32, height: u32) -> usize {
    width as usize * height as usize * CHANNELS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_wrong_length() {
        let err = PixelBuffer::new(2, 2, vec![0; 15]).unwrap_err();
        assert_eq!(err.expected, 16);
        assert_eq!(err.actual, 15);
    }

    #[test]
    fn test_new_accepts_exact_length() {
        let buffer = PixelBuffer::new(3, 1, vec![7; 12]).unwrap();
        assert_eq!(buffer.dimensions(), Dimensions::new(3, 1));
        assert_eq!(buffer.pixel(2, 0), Some([7, 7, 7, 7]));
    }

    #[test]
    fn test_zero_sized_buffer() {
        let buffer = PixelBuffer::new(0, 5, vec![]).unwrap();
        assert!(buffer.is_empty());
        assert_eq!(buffer.pixel(0, 0), None);
    }

    #[test]
    fn test_from_fn_row_major() {
        let buffer = PixelBuffer::from_fn(2, 2, |x, y| [x as u8, y as u8, 0, 255]);
        assert_eq!(buffer.pixels(), &[0, 0, 0, 255, 1, 0, 0, 255, 0, 1, 0, 255, 1, 1, 0, 255]);
        assert_eq!(buffer.row(1), &[0, 1, 0, 255, 1, 1, 0, 255]);
    }

    #[test]
    fn test_rgba_image_conversion() {
        let mut image = RgbaImage::new(2, 1);
        image.put_pixel(1, 0, image::Rgba([1, 2, 3, 4]));
        let buffer = PixelBuffer::from(image.clone());
        assert_eq!(buffer.pixel(1, 0), Some([1, 2, 3, 4]));
        assert_eq!(RgbaImage::from(buffer), image);
    }

    #[test]
    fn test_dimensions_parse() {
        assert_eq!(Dimensions::parse("64x32"), Some(Dimensions::new(64, 32)));
        assert_eq!(Dimensions::parse(" 8 X 8 "), Some(Dimensions::new(8, 8)));
        assert_eq!(Dimensions::parse("64"), None);
        assert_eq!(Dimensions::parse("ax2"), None);
        assert_eq!(Dimensions::new(3, 4).to_string(), "3x4");
    }
}
