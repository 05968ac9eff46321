//! Pixel extraction from decoded images
//!
//! The [`Surface`] is an off-screen RGBA drawing surface that starts from a
//! transparent canvas on every call. The source image is drawn at 1:1 with its top-left
//! corner at the origin, so no resampling ever happens here.

use image::{DynamicImage, RgbaImage};

use crate::buffer::{PixelBuffer, CHANNELS};

/// Off-screen drawing surface.
///
/// Each call draws onto a fresh canvas that becomes the returned buffer, so
/// nothing is copied after drawing and no contents survive between calls.
/// The surface remembers the largest canvas it has handed out and allocates
/// that much up front.
#[derive(Debug, Default)]
pub struct Surface {
    high_water: usize,
}

impl Surface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read back the pixels of `image` into a `width` x `height` buffer.
    ///
    /// Pixels outside the source image are transparent; source pixels outside
    /// the requested area are cropped.
    pub fn extract(&mut self, image: &DynamicImage, width: u32, height: u32) -> PixelBuffer {
        let len = width as usize * height as usize * CHANNELS;
        let mut canvas = Vec::with_capacity(len.max(self.high_water));
        canvas.resize(len, 0);

        let mut surface = match RgbaImage::from_raw(width, height, canvas) {
            Some(surface) => surface,
            None => RgbaImage::new(width, height),
        };
        match image.as_rgba8() {
            Some(source) => image::imageops::replace(&mut surface, source, 0, 0),
            None => image::imageops::replace(&mut surface, &image.to_rgba8(), 0, 0),
        }

        let canvas = surface.into_raw();
        self.high_water = self.high_water.max(canvas.capacity());
        // The canvas is always sized to width * height * 4.
        PixelBuffer::new(width, height, canvas)
            .unwrap_or_else(|_| PixelBuffer::transparent(width, height))
    }

    /// Largest canvas allocated so far, in bytes.
    pub fn capacity(&self) -> usize {
        self.high_water
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn checker(width: u32, height: u32) -> DynamicImage {
        let image = RgbaImage::from_fn(width, height, |x, y| {
            if (x + y) % 2 == 0 {
                Rgba([255, 0, 0, 255])
            } else {
                Rgba([0, 0, 255, 128])
            }
        });
        DynamicImage::ImageRgba8(image)
    }

    #[test]
    fn test_extract_natural_size_is_exact_copy() {
        let mut surface = Surface::new();
        let source = checker(3, 2);
        let buffer = surface.extract(&source, 3, 2);
        assert_eq!(buffer.dimensions(), (3, 2).into());
        assert_eq!(buffer.pixels(), source.to_rgba8().as_raw().as_slice());
    }

    #[test]
    fn test_extract_larger_area_pads_transparent() {
        let mut surface = Surface::new();
        let buffer = surface.extract(&checker(1, 1), 2, 2);
        assert_eq!(buffer.pixel(0, 0), Some([255, 0, 0, 255]));
        assert_eq!(buffer.pixel(1, 1), Some([0, 0, 0, 0]));
    }

    #[test]
    fn test_extract_smaller_area_crops() {
        let mut surface = Surface::new();
        let buffer = surface.extract(&checker(4, 4), 1, 2);
        assert_eq!(buffer.dimensions(), (1, 2).into());
        assert_eq!(buffer.pixel(0, 1), Some([0, 0, 255, 128]));
    }

    #[test]
    fn test_surface_does_not_leak_previous_contents() {
        let mut surface = Surface::new();
        surface.extract(&checker(4, 4), 4, 4);
        let empty = DynamicImage::ImageRgba8(RgbaImage::new(0, 0));
        let buffer = surface.extract(&empty, 2, 2);
        assert!(buffer.pixels().iter().all(|&b| b == 0));
        assert!(surface.capacity() >= 64);
    }

    #[test]
    fn test_extracted_buffers_are_independent() {
        let mut surface = Surface::new();
        let first = surface.extract(&checker(2, 2), 2, 2);
        let snapshot = first.pixels().to_vec();

        let red = DynamicImage::ImageRgba8(RgbaImage::from_pixel(2, 2, Rgba([255, 0, 0, 255])));
        let second = surface.extract(&red, 2, 2);
        assert_eq!(first.pixels(), snapshot.as_slice());
        assert_eq!(second.pixel(0, 1), Some([255, 0, 0, 255]));
        assert_ne!(first.pixel(0, 1), second.pixel(0, 1));
    }

    #[test]
    fn test_extract_converts_non_rgba_sources() {
        let gray = DynamicImage::ImageLuma8(image::GrayImage::from_pixel(1, 1, image::Luma([9])));
        let mut surface = Surface::new();
        let buffer = surface.extract(&gray, 1, 1);
        assert_eq!(buffer.pixel(0, 0), Some([9, 9, 9, 255]));
    }
}
