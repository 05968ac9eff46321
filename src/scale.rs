//! Nearest-neighbor scaling by an integer factor.
//!
//! Every source pixel `(col, row)` becomes a `factor x factor` block of
//! identical color whose top-left corner sits at `(col * factor, row * factor)`.
//! Equivalently, output pixel `(x, y)` equals source pixel
//! `(x / factor, y / factor)`. Nothing is blended or interpolated.
//!
//! # Example
//!
//! ```
//! use nosmooth::buffer::PixelBuffer;
//! use nosmooth::scale::{scale, ScaleFactor};
//!
//! let source = PixelBuffer::from_fn(2, 1, |x, _| [x as u8, 0, 0, 255]);
//! let scaled = scale(&source, ScaleFactor::new(3).unwrap()).unwrap();
//! assert_eq!(scaled.dimensions(), (6, 3).into());
//! assert_eq!(scaled.pixel(5, 2), Some([1, 0, 0, 255]));
//! ```

use std::num::NonZeroU32;

use thiserror::Error;

use crate::buffer::{PixelBuffer, CHANNELS};

/// Errors raised by the scaler
#[derive(Debug, Clone, PartialEq, Error)]
#[non_exhaustive]
pub enum ScaleError {
    /// Factor is zero, negative or fractional
    #[error("Invalid scale factor {0}: must be a positive integer")]
    InvalidScaleFactor(String),
    /// Scaled dimensions do not fit in memory
    #[error("Scaling {width}x{height} by {factor} overflows the addressable size")]
    DimensionsOverflow { width: u32, height: u32, factor: u32 },
}

/// Positive integer scale factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScaleFactor(NonZeroU32);

impl ScaleFactor {
    /// Identity factor
    pub const ONE: ScaleFactor = ScaleFactor(NonZeroU32::MIN);

    /// Returns `None` for zero.
    pub fn new(factor: u32) -> Option<Self> {
        NonZeroU32::new(factor).map(Self)
    }

    pub fn get(self) -> u32 {
        self.0.get()
    }
}

impl std::fmt::Display for ScaleFactor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<u32> for ScaleFactor {
    type Error = ScaleError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value).ok_or_else(|| ScaleError::InvalidScaleFactor(value.to_string()))
    }
}

impl TryFrom<i64> for ScaleFactor {
    type Error = ScaleError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        u32::try_from(value)
            .ok()
            .and_then(Self::new)
            .ok_or_else(|| ScaleError::InvalidScaleFactor(value.to_string()))
    }
}

impl TryFrom<i32> for ScaleFactor {
    type Error = ScaleError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        Self::try_from(i64::from(value))
    }
}

impl TryFrom<f64> for ScaleFactor {
    type Error = ScaleError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        let invalid = || ScaleError::InvalidScaleFactor(value.to_string());
        if !value.is_finite() || value.fract() != 0.0 || value < 1.0 || value > u32::MAX as f64 {
            return Err(invalid());
        }
        Self::new(value as u32).ok_or_else(invalid)
    }
}

impl std::str::FromStr for ScaleFactor {
    type Err = ScaleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s.parse::<i64>() {
            Ok(value) => Self::try_from(value),
            Err(_) => Err(ScaleError::InvalidScaleFactor(s.to_string())),
        }
    }
}

/// Scale `buffer` by any value convertible to a [`ScaleFactor`].
///
/// Invalid factors are rejected before any allocation.
pub fn scale_by<F>(buffer: &PixelBuffer, factor: F) -> Result<PixelBuffer, ScaleError>
where
    F: TryInto<ScaleFactor, Error = ScaleError>,
{
    scale(buffer, factor.try_into()?)
}

/// Nearest-neighbor magnification of `buffer` by `factor`.
pub fn scale(buffer: &PixelBuffer, factor: ScaleFactor) -> Result<PixelBuffer, ScaleError> {
    let s = factor.get();
    let (width, height) = (buffer.width(), buffer.height());
    let overflow = || ScaleError::DimensionsOverflow { width, height, factor: s };

    let out_width = width.checked_mul(s).ok_or_else(overflow)?;
    let out_height = height.checked_mul(s).ok_or_else(overflow)?;
    let out_stride = (out_width as usize).checked_mul(CHANNELS).ok_or_else(overflow)?;
    let out_len = out_stride.checked_mul(out_height as usize).ok_or_else(overflow)?;

    let s = s as usize;
    let mut out = Vec::with_capacity(out_len);

    // One replicated output row is built per source row, then copied down
    // the remaining s - 1 rows of the block.
    for row in 0..height {
        let row_start = out.len();
        for src_pixel in buffer.row(row).chunks_exact(CHANNELS) {
            for _ in 0..s {
                out.extend_from_slice(src_pixel);
            }
        }
        for _ in 1..s {
            out.extend_from_within(row_start..row_start + out_stride);
        }
    }

    PixelBuffer::new(out_width, out_height, out).map_err(|_| overflow())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad() -> PixelBuffer {
        let colors = [[255, 0, 0, 255], [0, 255, 0, 255], [0, 0, 255, 255], [10, 20, 30, 40]];
        PixelBuffer::from_fn(2, 2, |x, y| colors[(y * 2 + x) as usize])
    }

    #[test]
    fn test_scale_2x2_by_3_follows_floor_law() {
        let source = quad();
        let scaled = scale_by(&source, 3u32).unwrap();
        assert_eq!(scaled.dimensions(), (6, 6).into());
        for y in 0..6 {
            for x in 0..6 {
                assert_eq!(
                    scaled.pixel(x, y),
                    source.pixel(x / 3, y / 3),
                    "pixel ({}, {}) should come from ({}, {})",
                    x,
                    y,
                    x / 3,
                    y / 3
                );
            }
        }
    }

    #[test]
    fn test_scale_by_one_is_identity() {
        let source = quad();
        let scaled = scale(&source, ScaleFactor::ONE).unwrap();
        assert_eq!(scaled, source);
    }

    #[test]
    fn test_output_length_matches_dimensions() {
        for (w, h) in [(0, 0), (1, 1), (3, 5), (7, 2), (0, 4)] {
            let source = PixelBuffer::transparent(w, h);
            for f in 1..=5u32 {
                let scaled = scale_by(&source, f).unwrap();
                assert_eq!(scaled.pixels().len(), (w * f * h * f * 4) as usize);
            }
        }
    }

    #[test]
    fn test_non_square_buffer() {
        let source = PixelBuffer::from_fn(3, 1, |x, _| [x as u8 * 50, 0, 0, 255]);
        let scaled = scale_by(&source, 2u32).unwrap();
        assert_eq!(scaled.dimensions(), (6, 2).into());
        assert_eq!(scaled.row(0), scaled.row(1));
        assert_eq!(scaled.pixel(4, 1), Some([100, 0, 0, 255]));
    }

    #[test]
    fn test_invalid_factors_rejected() {
        let source = quad();
        assert!(matches!(scale_by(&source, 0i64), Err(ScaleError::InvalidScaleFactor(_))));
        assert!(matches!(scale_by(&source, -1i64), Err(ScaleError::InvalidScaleFactor(_))));
        assert!(matches!(scale_by(&source, 1.5f64), Err(ScaleError::InvalidScaleFactor(_))));
        assert!(matches!(scale_by(&source, 0u32), Err(ScaleError::InvalidScaleFactor(_))));
        assert!(matches!(scale_by(&source, f64::NAN), Err(ScaleError::InvalidScaleFactor(_))));
    }

    #[test]
    fn test_integral_float_factor_accepted() {
        let scaled = scale_by(&quad(), 2.0f64).unwrap();
        assert_eq!(scaled.dimensions(), (4, 4).into());
    }

    #[test]
    fn test_factor_from_str() {
        assert_eq!("4".parse::<ScaleFactor>().unwrap().get(), 4);
        assert!("0".parse::<ScaleFactor>().is_err());
        assert!("-2".parse::<ScaleFactor>().is_err());
        assert!("1.5".parse::<ScaleFactor>().is_err());
    }

    #[test]
    fn test_overflow_detected() {
        let wide = PixelBuffer::transparent(2, 0);
        assert!(matches!(
            scale_by(&wide, u32::MAX),
            Err(ScaleError::DimensionsOverflow { width: 2, .. })
        ));
    }
}
