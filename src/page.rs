//! File-backed document described by a JSON page manifest
//!
//! ```json
//! {
//!   "nosmoothing": "watch",
//!   "images": [
//!     { "src": "sprites/hero.png", "width": 64, "height": 64 },
//!     { "src": "photo.png", "nosmoothing": false }
//!   ]
//! }
//! ```
//!
//! `width`/`height` are the rendered size and default to the natural size.
//! Image sources are paths relative to the manifest and double as image
//! identity. Images are decoded lazily by [`Document::take_loaded`];
//! replaced content is written under `out_dir`, mirroring the source's
//! directory (see [`page_output_path`]). Two sources that would land on the
//! same file get a `~N` suffix instead of overwriting each other.

use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, HashMap};
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

use image::{DynamicImage, GenericImageView};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::buffer::Dimensions;
use crate::encode::{decode_data_url, page_output_path, save_png};
use crate::host::{Document, EncodedImage, HostError, ImageId, ImageResource, NaturalSizeProbe};
use crate::orchestrator::Mode;

/// Errors reading a page manifest
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PageError {
    #[error("Cannot read page '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid page manifest '{}': {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Parsed page manifest
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Manifest {
    /// Document-level mode
    #[serde(default)]
    pub nosmoothing: Option<Mode>,
    #[serde(default)]
    pub images: Vec<ManifestImage>,
}

/// One image entry of a manifest
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ManifestImage {
    #[serde(default)]
    pub src: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// `false` opts the image out
    #[serde(default)]
    pub nosmoothing: Option<Mode>,
}

impl Manifest {
    pub fn parse(contents: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(contents)
    }
}

#[derive(Debug)]
enum LoadState {
    Pending,
    Loaded(DynamicImage),
    Failed(String),
}

/// An image entry of a [`Page`]
#[derive(Debug)]
pub struct PageImage {
    source: String,
    path: PathBuf,
    width: Option<u32>,
    height: Option<u32>,
    opted_out: bool,
    load: LoadState,
}

impl PageImage {
    fn from_entry(base_dir: &Path, entry: &ManifestImage) -> Self {
        Self {
            source: entry.src.clone(),
            path: base_dir.join(&entry.src),
            width: entry.width,
            height: entry.height,
            opted_out: entry.nosmoothing == Some(Mode::Off),
            load: LoadState::Pending,
        }
    }

    /// File path of the image source.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ImageResource for PageImage {
    fn source(&self) -> &str {
        &self.source
    }

    fn opted_out(&self) -> bool {
        self.opted_out
    }

    fn is_complete(&self) -> bool {
        matches!(self.load, LoadState::Loaded(_))
    }

    fn rendered_size(&self) -> Dimensions {
        let natural = self.natural_size().unwrap_or_default();
        Dimensions::new(self.width.unwrap_or(natural.width), self.height.unwrap_or(natural.height))
    }

    fn natural_size(&self) -> Option<Dimensions> {
        self.decoded().map(|pixels| pixels.dimensions().into())
    }

    fn decoded(&self) -> Option<&DynamicImage> {
        match &self.load {
            LoadState::Loaded(pixels) => Some(pixels),
            _ => None,
        }
    }
}

/// A page manifest on disk plus its images.
#[derive(Debug)]
pub struct Page {
    manifest_path: PathBuf,
    base_dir: PathBuf,
    out_dir: PathBuf,
    mode: Option<Mode>,
    images: BTreeMap<ImageId, PageImage>,
    ids: HashMap<String, ImageId>,
    order: Vec<ImageId>,
    written: Vec<PathBuf>,
    outputs: HashMap<ImageId, PathBuf>,
    last_fingerprint: u64,
}

impl Page {
    /// Read the manifest at `manifest_path`; scaled images go to `out_dir`.
    pub fn open(manifest_path: &Path, out_dir: &Path) -> Result<Self, PageError> {
        let base_dir = manifest_path.parent().map(Path::to_path_buf).unwrap_or_default();
        let mut page = Self {
            manifest_path: manifest_path.to_path_buf(),
            base_dir,
            out_dir: out_dir.to_path_buf(),
            mode: None,
            images: BTreeMap::new(),
            ids: HashMap::new(),
            order: Vec::new(),
            written: Vec::new(),
            outputs: HashMap::new(),
            last_fingerprint: 0,
        };
        page.reload()?;
        Ok(page)
    }

    /// Mode requested by the manifest, if it names one.
    pub fn mode(&self) -> Option<Mode> {
        self.mode
    }

    pub fn manifest_path(&self) -> &Path {
        &self.manifest_path
    }

    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    /// Files written by `replace_content`, in order.
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }

    /// Output file of an image, once its content has been replaced.
    pub fn output_of(&self, id: ImageId) -> Option<&Path> {
        self.outputs.get(&id).map(PathBuf::as_path)
    }

    /// Reserve the output file for `id`; an image keeps its file on later writes.
    fn claim_output(&mut self, id: ImageId, source: &str) -> PathBuf {
        if let Some(path) = self.outputs.get(&id) {
            return path.clone();
        }
        let base = page_output_path(&self.out_dir, source);
        let stem = base.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
        let taken = |path: &PathBuf| self.outputs.values().any(|p| p == path);

        let mut path = base.clone();
        let mut n = 2;
        while taken(&path) {
            path = base.with_file_name(format!("{}~{}.png", stem, n));
            n += 1;
        }
        if path != base {
            debug!(source, path = %path.display(), "output name taken, using suffix");
        }
        self.outputs.insert(id, path.clone());
        path
    }

    /// Look up an image id by its source.
    pub fn id_of(&self, source: &str) -> Option<ImageId> {
        self.ids.get(source).copied()
    }

    /// Images whose file could not be decoded, with the reason.
    pub fn load_failures(&self) -> Vec<(&str, &str)> {
        self.order
            .iter()
            .filter_map(|id| self.images.get(id))
            .filter_map(|image| match &image.load {
                LoadState::Failed(reason) => Some((image.source.as_str(), reason.as_str())),
                _ => None,
            })
            .collect()
    }

    /// Number of images still waiting to be decoded.
    pub fn pending_loads(&self) -> usize {
        self.images
            .values()
            .filter(|i| !i.source.is_empty() && matches!(i.load, LoadState::Pending))
            .count()
    }

    /// Re-read the manifest and register images not seen before.
    pub fn reload(&mut self) -> Result<(), PageError> {
        let contents = std::fs::read_to_string(&self.manifest_path)
            .map_err(|source| PageError::Io { path: self.manifest_path.clone(), source })?;
        let manifest = Manifest::parse(&contents)
            .map_err(|source| PageError::Parse { path: self.manifest_path.clone(), source })?;

        self.last_fingerprint = fingerprint(&contents);
        self.mode = manifest.nosmoothing;
        self.order.clear();

        for entry in &manifest.images {
            let id = match self.ids.get(&entry.src) {
                Some(id) => *id,
                None => {
                    let id = ImageId(self.ids.len() as u64);
                    self.ids.insert(entry.src.clone(), id);
                    self.images.insert(id, PageImage::from_entry(&self.base_dir, entry));
                    id
                }
            };
            if !self.order.contains(&id) {
                self.order.push(id);
            }
        }
        Ok(())
    }
}

fn fingerprint(contents: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    contents.hash(&mut hasher);
    hasher.finish()
}

impl Document for Page {
    type Image = PageImage;

    fn scan(&mut self) -> Vec<ImageId> {
        if let Err(error) = self.reload() {
            warn!(%error, "keeping previous page contents");
        }
        self.order.clone()
    }

    fn image(&self, id: ImageId) -> Option<&PageImage> {
        self.images.get(&id)
    }

    fn content_fingerprint(&mut self) -> u64 {
        match std::fs::read_to_string(&self.manifest_path) {
            Ok(contents) => fingerprint(&contents),
            Err(_) => self.last_fingerprint,
        }
    }

    fn take_loaded(&mut self) -> Vec<ImageId> {
        let mut loaded = Vec::new();
        for (id, entry) in self.images.iter_mut() {
            if !matches!(entry.load, LoadState::Pending) || entry.source.is_empty() {
                continue;
            }
            match image::open(&entry.path) {
                Ok(pixels) => {
                    debug!(source = %entry.source, "decoded");
                    entry.load = LoadState::Loaded(pixels);
                    loaded.push(*id);
                }
                Err(error) => {
                    warn!(source = %entry.source, %error, "cannot decode image");
                    entry.load = LoadState::Failed(error.to_string());
                }
            }
        }
        loaded
    }

    fn probe_natural_size(&mut self, id: ImageId) -> NaturalSizeProbe {
        match self.images.get(&id).map(|i| image::image_dimensions(&i.path)) {
            Some(Ok(size)) => NaturalSizeProbe::Complete(size.into()),
            _ => NaturalSizeProbe::Incomplete,
        }
    }

    fn replace_content(&mut self, id: ImageId, encoded: EncodedImage) -> Result<(), HostError> {
        let source = self.images.get(&id).ok_or(HostError::UnknownImage(id))?.source.clone();
        let present = |message: String| HostError::Present { id, message };

        let pixels = decode_data_url(&encoded).map_err(|e| present(e.to_string()))?;
        let path = self.claim_output(id, &source);
        save_png(&pixels.to_rgba8(), &path).map_err(|e| present(e.to_string()))?;

        if let Some(image) = self.images.get_mut(&id) {
            image.load = LoadState::Loaded(pixels);
        }
        self.written.push(path);
        Ok(())
    }
}
