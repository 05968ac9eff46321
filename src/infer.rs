//! Scale-factor inference from rendered and natural dimensions

use crate::buffer::Dimensions;
use crate::scale::ScaleFactor;

/// Rendered and natural sizes within this many pixels count as native.
pub const DEFAULT_TOLERANCE: u32 = 1;

/// Outcome of comparing an image's rendered size with its natural size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleDecision {
    /// Displayed at (close to) its natural size
    Native,
    /// Scale by the given integer factor
    Scale(ScaleFactor),
    /// Scaling is needed but no integer factor >= 1 fits
    Unachievable,
}

impl std::fmt::Display for ScaleDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScaleDecision::Native => write!(f, "skip"),
            ScaleDecision::Scale(factor) => write!(f, "scale {}", factor),
            ScaleDecision::Unachievable => write!(f, "unachievable"),
        }
    }
}

/// Decide whether and by how much an image should be scaled.
///
/// Skips when both axes differ by at most `tolerance` pixels. Otherwise the
/// factor is the larger of `rendered / natural` per axis (integer division),
/// so a non-uniformly stretched image is never under-scaled.
pub fn infer_scale(rendered: Dimensions, natural: Dimensions, tolerance: u32) -> ScaleDecision {
    let delta_width = rendered.width.abs_diff(natural.width);
    let delta_height = rendered.height.abs_diff(natural.height);
    if delta_width <= tolerance && delta_height <= tolerance {
        return ScaleDecision::Native;
    }

    let width_factor = rendered.width.checked_div(natural.width).unwrap_or(0);
    let height_factor = rendered.height.checked_div(natural.height).unwrap_or(0);

    match ScaleFactor::new(width_factor.max(height_factor)) {
        Some(factor) => ScaleDecision::Scale(factor),
        None => ScaleDecision::Unachievable,
    }
}
