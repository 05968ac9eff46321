//! nosmooth - Crisp nearest-neighbor upscaling for pixel art
//!
//! This library provides functionality to:
//! - Decide whether an image displayed larger than its natural size should be
//!   rescaled, and by which integer factor
//! - Extract an image's pixels at natural size and replicate each pixel into
//!   a `factor x factor` block, with no smoothing
//! - Orchestrate that over a host document, once or in watch mode

pub mod buffer;
pub mod cli;
pub mod config;
pub mod encode;
pub mod extract;
pub mod host;
pub mod infer;
pub mod memory;
pub mod orchestrator;
pub mod page;
pub mod scale;
pub mod watch;

pub use buffer::{Dimensions, PixelBuffer};
pub use host::{Document, ImageId, ImageResource};
pub use infer::{infer_scale, ScaleDecision};
pub use orchestrator::{ImageState, Mode, NoSmoothing, Options, ScanReport};
pub use scale::{scale, scale_by, ScaleError, ScaleFactor};
