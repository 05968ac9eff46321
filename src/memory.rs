//! In-memory document host
//!
//! Holds already-decoded images. Replacing an image's content decodes the
//! encoded result and fires a fresh load notification, the way a browser
//! reloads an image element whose source changed.

use std::collections::{BTreeMap, HashMap};

use image::{DynamicImage, GenericImageView};

use crate::buffer::Dimensions;
use crate::encode::decode_data_url;
use crate::host::{Document, EncodedImage, HostError, ImageId, ImageResource, NaturalSizeProbe};

/// An image held by a [`MemoryDocument`]
#[derive(Debug, Clone)]
pub struct MemoryImage {
    source: String,
    opted_out: bool,
    complete: bool,
    rendered: Dimensions,
    natural: Option<Dimensions>,
    pixels: Option<DynamicImage>,
}

impl MemoryImage {
    /// A fully loaded image displayed at its natural size.
    pub fn new(source: impl Into<String>, pixels: DynamicImage) -> Self {
        let natural = Dimensions::from(pixels.dimensions());
        Self {
            source: source.into(),
            opted_out: false,
            complete: true,
            rendered: natural,
            natural: Some(natural),
            pixels: Some(pixels),
        }
    }

    /// Set the displayed size.
    pub fn with_rendered(mut self, width: u32, height: u32) -> Self {
        self.rendered = Dimensions::new(width, height);
        self
    }

    /// Mark as still decoding; completes via [`MemoryDocument::finish_loading`].
    pub fn loading(mut self) -> Self {
        self.complete = false;
        self
    }

    /// Set the per-image opt-out flag.
    pub fn with_opt_out(mut self) -> Self {
        self.opted_out = true;
        self
    }

    /// Hide the natural size from the primary lookup.
    pub fn without_natural_size(mut self) -> Self {
        self.natural = None;
        self
    }
}

impl ImageResource for MemoryImage {
    fn source(&self) -> &str {
        &self.source
    }

    fn opted_out(&self) -> bool {
        self.opted_out
    }

    fn is_complete(&self) -> bool {
        self.complete
    }

    fn rendered_size(&self) -> Dimensions {
        self.rendered
    }

    fn natural_size(&self) -> Option<Dimensions> {
        self.natural
    }

    fn decoded(&self) -> Option<&DynamicImage> {
        if self.complete {
            self.pixels.as_ref()
        } else {
            None
        }
    }
}

/// A document whose images live in memory.
#[derive(Debug, Default)]
pub struct MemoryDocument {
    images: BTreeMap<ImageId, MemoryImage>,
    next_id: u64,
    revision: u64,
    loaded: Vec<ImageId>,
    probes: HashMap<ImageId, NaturalSizeProbe>,
    replacements: HashMap<ImageId, Vec<EncodedImage>>,
}

impl MemoryDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an image; returns its id.
    pub fn insert(&mut self, image: MemoryImage) -> ImageId {
        let id = ImageId(self.next_id);
        self.next_id += 1;
        self.images.insert(id, image);
        self.revision += 1;
        id
    }

    /// Remove an image from the document.
    pub fn remove(&mut self, id: ImageId) -> Option<MemoryImage> {
        let removed = self.images.remove(&id);
        if removed.is_some() {
            self.revision += 1;
        }
        removed
    }

    /// Complete a loading image and queue its load notification.
    pub fn finish_loading(&mut self, id: ImageId) -> bool {
        match self.images.get_mut(&id) {
            Some(image) if !image.complete => {
                image.complete = true;
                self.loaded.push(id);
                true
            }
            _ => false,
        }
    }

    /// Queue a load notification without completing the image.
    pub fn notify_loaded(&mut self, id: ImageId) {
        self.loaded.push(id);
    }

    /// Override the result of the secondary natural-size lookup.
    pub fn set_probe(&mut self, id: ImageId, probe: NaturalSizeProbe) {
        self.probes.insert(id, probe);
    }

    /// Most recent replacement content for `id`.
    pub fn replaced(&self, id: ImageId) -> Option<&EncodedImage> {
        self.replacements.get(&id).and_then(|r| r.last())
    }

    /// How many times `id` had its content replaced.
    pub fn replacement_count(&self, id: ImageId) -> usize {
        self.replacements.get(&id).map_or(0, Vec::len)
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}

impl Document for MemoryDocument {
    type Image = MemoryImage;

    fn scan(&mut self) -> Vec<ImageId> {
        self.images.keys().copied().collect()
    }

    fn image(&self, id: ImageId) -> Option<&MemoryImage> {
        self.images.get(&id)
    }

    fn content_fingerprint(&mut self) -> u64 {
        self.revision
    }

    fn take_loaded(&mut self) -> Vec<ImageId> {
        std::mem::take(&mut self.loaded)
    }

    fn probe_natural_size(&mut self, id: ImageId) -> NaturalSizeProbe {
        if let Some(probe) = self.probes.get(&id) {
            return *probe;
        }
        match self.images.get(&id).and_then(|i| i.decoded()) {
            Some(pixels) => NaturalSizeProbe::Complete(pixels.dimensions().into()),
            None => NaturalSizeProbe::Incomplete,
        }
    }

    fn replace_content(&mut self, id: ImageId, encoded: EncodedImage) -> Result<(), HostError> {
        let image = self.images.get_mut(&id).ok_or(HostError::UnknownImage(id))?;
        let pixels = decode_data_url(&encoded)
            .map_err(|e| HostError::Present { id, message: e.to_string() })?;

        image.natural = Some(pixels.dimensions().into());
        image.pixels = Some(pixels);
        self.replacements.entry(id).or_default().push(encoded);
        self.loaded.push(id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbaImage;

    fn pixels(w: u32, h: u32) -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::new(w, h))
    }

    #[test]
    fn test_insert_changes_fingerprint() {
        let mut doc = MemoryDocument::new();
        let before = doc.content_fingerprint();
        doc.insert(MemoryImage::new("a.png", pixels(1, 1)));
        assert_ne!(doc.content_fingerprint(), before);
        assert_eq!(doc.scan().len(), 1);
    }

    #[test]
    fn test_finish_loading_queues_notification_once() {
        let mut doc = MemoryDocument::new();
        let id = doc.insert(MemoryImage::new("a.png", pixels(1, 1)).loading());
        assert!(doc.image(id).unwrap().decoded().is_none());
        assert!(doc.finish_loading(id));
        assert!(!doc.finish_loading(id));
        assert_eq!(doc.take_loaded(), vec![id]);
        assert!(doc.take_loaded().is_empty());
    }

    #[test]
    fn test_probe_defaults_to_decoded_size() {
        let mut doc = MemoryDocument::new();
        let id = doc.insert(MemoryImage::new("a.png", pixels(3, 5)).without_natural_size());
        assert_eq!(doc.probe_natural_size(id), NaturalSizeProbe::Complete(Dimensions::new(3, 5)));

        doc.set_probe(id, NaturalSizeProbe::Incomplete);
        assert_eq!(doc.probe_natural_size(id), NaturalSizeProbe::Incomplete);
    }

    #[test]
    fn test_replace_rejects_non_data_url() {
        let mut doc = MemoryDocument::new();
        let id = doc.insert(MemoryImage::new("a.png", pixels(1, 1)));
        let result = doc.replace_content(id, EncodedImage("a.png".to_string()));
        assert!(matches!(result, Err(HostError::Present { .. })));
        assert_eq!(doc.replacement_count(id), 0);
    }

    #[test]
    fn test_replace_unknown_image() {
        let mut doc = MemoryDocument::new();
        let result = doc.replace_content(ImageId(42), EncodedImage(String::new()));
        assert!(matches!(result, Err(HostError::UnknownImage(ImageId(42)))));
    }
}
