//! Interfaces to the host document
//!
//! The orchestrator never walks a document tree or decodes files itself. A
//! host provides three collaborators through the [`Document`] trait:
//!
//! - a scanner listing the image resources currently present,
//! - a resource loader reporting decode completion and exposing rendered and
//!   natural sizes (plus a secondary path for natural sizes),
//! - a renderer that swaps an image's visible content for an encoded image.

use image::DynamicImage;
use thiserror::Error;

use crate::buffer::Dimensions;

/// Stable identity of an image resource within one document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ImageId(pub u64);

impl std::fmt::Display for ImageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// An image encoded as an opaque string (a `data:` URL).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage(pub String);

impl EncodedImage {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Result of the secondary natural-size lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NaturalSizeProbe {
    /// The secondary load completed immediately
    Complete(Dimensions),
    /// The secondary load did not complete
    Incomplete,
}

/// Errors reported by a host
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum HostError {
    /// The image is no longer part of the document
    #[error("Image {0} is not in the document")]
    UnknownImage(ImageId),
    /// The encoded replacement could not be presented
    #[error("Cannot present image {id}: {message}")]
    Present { id: ImageId, message: String },
    /// IO error while reading or writing host resources
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// An image resource as seen by the resource loader.
pub trait ImageResource {
    /// Source reference (URL or path); empty when the image has no source.
    fn source(&self) -> &str;

    /// Per-image opt-out flag.
    fn opted_out(&self) -> bool {
        false
    }

    /// Whether the resource has finished decoding.
    fn is_complete(&self) -> bool;

    /// Size at which the image is displayed.
    fn rendered_size(&self) -> Dimensions;

    /// Intrinsic size, if the loader has populated it.
    fn natural_size(&self) -> Option<Dimensions>;

    /// Decoded pixels at natural resolution, once complete.
    fn decoded(&self) -> Option<&DynamicImage>;
}

/// A host document: scanner, resource loader and renderer.
pub trait Document {
    type Image: ImageResource;

    /// Image resources currently present, in document order.
    fn scan(&mut self) -> Vec<ImageId>;

    /// Look up an image resource by id.
    fn image(&self, id: ImageId) -> Option<&Self::Image>;

    /// Cheap value that changes whenever the document content changes.
    fn content_fingerprint(&mut self) -> u64;

    /// Drain ids of images that finished decoding since the last call.
    fn take_loaded(&mut self) -> Vec<ImageId> {
        Vec::new()
    }

    /// Secondary natural-size lookup used when [`ImageResource::natural_size`]
    /// is unavailable.
    fn probe_natural_size(&mut self, id: ImageId) -> NaturalSizeProbe;

    /// Replace the visible content of `id` with `encoded`.
    fn replace_content(&mut self, id: ImageId, encoded: EncodedImage) -> Result<(), HostError>;
}
