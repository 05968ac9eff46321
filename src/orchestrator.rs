//! Scale orchestration over a host document
//!
//! [`NoSmoothing`] owns all mutable state of one session: the off-screen
//! surface, the per-image state map (whose terminal entries form the
//! processed set) and the watch flag. Each image moves through
//! `Unseen -> [AwaitingLoad ->] Evaluating -> Skipped | Scaled` and never
//! leaves a terminal state.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::buffer::Dimensions;
use crate::encode::{to_data_url, EncodeError};
use crate::extract::Surface;
use crate::host::{Document, HostError, ImageId, ImageResource, NaturalSizeProbe};
use crate::infer::{infer_scale, ScaleDecision, DEFAULT_TOLERANCE};
use crate::scale::{scale, ScaleError, ScaleFactor};

/// Default interval between watch-mode polls
pub const DEFAULT_WATCH_INTERVAL: Duration = Duration::from_millis(800);

/// Predicate over an image source; `true` means leave the image alone.
pub type SkipPredicate = Box<dyn Fn(&str) -> bool>;

/// Document-level behavior selected once the document is ready
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Do nothing
    Off,
    /// Scan once
    #[default]
    Once,
    /// Scan once, then keep re-scanning periodically
    Watch,
}

impl Mode {
    /// Parse a mode value; anything unrecognized selects the default.
    pub fn parse(value: &str) -> Self {
        match value.trim() {
            "false" => Mode::Off,
            "watch" => Mode::Watch,
            _ => Mode::Once,
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::Off => write!(f, "false"),
            Mode::Once => write!(f, "true"),
            Mode::Watch => write!(f, "watch"),
        }
    }
}

/// Construction-time settings for a [`NoSmoothing`] context
pub struct Options {
    /// Interval between watch-mode polls
    pub watch_interval: Duration,
    /// Pixel tolerance for the native-size check
    pub tolerance: u32,
    /// Sources matching this predicate are never scaled
    pub skip: Option<SkipPredicate>,
}

impl Default for Options {
    fn default() -> Self {
        Self { watch_interval: DEFAULT_WATCH_INTERVAL, tolerance: DEFAULT_TOLERANCE, skip: None }
    }
}

impl std::fmt::Debug for Options {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Options")
            .field("watch_interval", &self.watch_interval)
            .field("tolerance", &self.tolerance)
            .field("skip", &self.skip.as_ref().map(|_| "<predicate>"))
            .finish()
    }
}

impl Options {
    pub fn with_watch_interval(mut self, interval: Duration) -> Self {
        self.watch_interval = interval;
        self
    }

    pub fn with_tolerance(mut self, tolerance: u32) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_skip(mut self, skip: impl Fn(&str) -> bool + 'static) -> Self {
        self.skip = Some(Box::new(skip));
        self
    }
}

/// Why an image was left unscaled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Opt-out flag or skip predicate
    OptedOut,
    /// Displayed at its natural size
    Native,
    /// No integer factor >= 1 fits
    Unachievable,
    /// Processing failed; the image stays as it was
    Failed,
}

/// Per-image processing state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageState {
    Unseen,
    /// Scanned, waiting for its decode-completion notification
    AwaitingLoad,
    Evaluating,
    Skipped(SkipReason),
    Scaled(ScaleFactor),
}

impl ImageState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ImageState::Skipped(_) | ImageState::Scaled(_))
    }
}

/// Errors scoped to a single image
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProcessError {
    /// Evaluated before its decode-completion notification
    #[error("Image {0} has not finished loading")]
    ResourceNotReady(ImageId),
    /// The secondary natural-size lookup disagrees about completion
    #[error("Image {0} reported complete but its natural size could not be loaded")]
    InconsistentResourceState(ImageId),
    /// The document no longer contains the image
    #[error("Image {0} is not in the document")]
    UnknownImage(ImageId),
    /// Complete resource without decoded pixels
    #[error("Image {0} has no decoded pixel data")]
    MissingPixels(ImageId),
    #[error(transparent)]
    Scale(#[from] ScaleError),
    #[error(transparent)]
    Encode(#[from] EncodeError),
    #[error(transparent)]
    Host(#[from] HostError),
}

/// A failure recorded during a scan
#[derive(Debug)]
pub struct ImageFailure {
    pub id: ImageId,
    pub source: String,
    pub error: ProcessError,
}

impl std::fmt::Display for ImageFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.source.is_empty() {
            write!(f, "{}", self.error)
        } else {
            write!(f, "{}: {}", self.source, self.error)
        }
    }
}

/// Summary of one scan, load pump or watch tick
#[derive(Debug, Default)]
pub struct ScanReport {
    /// Newly seen images with a source
    pub candidates: usize,
    /// Images scaled
    pub scaled: usize,
    /// Images that reached `Skipped`
    pub skipped: usize,
    /// Images waiting for their load notification
    pub deferred: usize,
    /// Per-image failures (processing continued)
    pub failures: Vec<ImageFailure>,
    pub duration: Duration,
}

impl ScanReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when no image failed
    pub fn success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Fold another report into this one
    pub fn merge(&mut self, other: ScanReport) {
        self.candidates += other.candidates;
        self.scaled += other.scaled;
        self.skipped += other.skipped;
        self.deferred += other.deferred;
        self.failures.extend(other.failures);
        self.duration += other.duration;
    }

    fn record(&mut self, state: ImageState) {
        match state {
            ImageState::Scaled(_) => self.scaled += 1,
            ImageState::Skipped(_) => self.skipped += 1,
            ImageState::AwaitingLoad => self.deferred += 1,
            ImageState::Unseen | ImageState::Evaluating => {}
        }
    }
}

/// Result of one watch-mode tick
#[derive(Debug)]
pub enum TickOutcome {
    /// Watch mode is off; the poll timer should be released
    Stopped,
    /// Document unchanged; only pending loads were handled
    Idle(ScanReport),
    /// Document changed and was re-scanned
    Rescanned(ScanReport),
}

/// Orchestrates detection and nearest-neighbor rescaling for one document.
pub struct NoSmoothing<D: Document> {
    document: D,
    options: Options,
    surface: Surface,
    states: HashMap<ImageId, ImageState>,
    watching: bool,
    ready: bool,
    last_fingerprint: Option<u64>,
}

impl<D: Document> NoSmoothing<D> {
    pub fn new(document: D, options: Options) -> Self {
        Self {
            document,
            options,
            surface: Surface::new(),
            states: HashMap::new(),
            watching: false,
            ready: false,
            last_fingerprint: None,
        }
    }

    pub fn document(&self) -> &D {
        &self.document
    }

    pub fn document_mut(&mut self) -> &mut D {
        &mut self.document
    }

    pub fn into_document(self) -> D {
        self.document
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Current state of `id`.
    pub fn state(&self, id: ImageId) -> ImageState {
        self.states.get(&id).copied().unwrap_or(ImageState::Unseen)
    }

    /// Whether `id` reached a terminal state.
    pub fn is_processed(&self, id: ImageId) -> bool {
        self.state(id).is_terminal()
    }

    /// Number of images in a terminal state.
    pub fn processed_count(&self) -> usize {
        self.states.values().filter(|s| s.is_terminal()).count()
    }

    /// Apply the document-level mode once the document is ready.
    ///
    /// Only the first call has any effect.
    pub fn ready(&mut self, mode: Mode) -> Option<ScanReport> {
        if self.ready {
            return None;
        }
        self.ready = true;
        debug!(%mode, "document ready");

        match mode {
            Mode::Off => None,
            Mode::Once => Some(self.run()),
            Mode::Watch => {
                let report = self.run();
                self.watch();
                Some(report)
            }
        }
    }

    /// Scan the document once and scale every eligible, unprocessed image.
    pub fn run(&mut self) -> ScanReport {
        let fingerprint = self.document.content_fingerprint();
        self.scan(fingerprint)
    }

    fn scan(&mut self, fingerprint: u64) -> ScanReport {
        let start = Instant::now();
        self.last_fingerprint = Some(fingerprint);

        let mut report = ScanReport::new();
        for id in self.document.scan() {
            self.consider(id, &mut report);
        }
        report.duration = start.elapsed();

        info!(
            candidates = report.candidates,
            scaled = report.scaled,
            skipped = report.skipped,
            deferred = report.deferred,
            failures = report.failures.len(),
            "scan complete"
        );
        report
    }

    fn consider(&mut self, id: ImageId, report: &mut ScanReport) {
        if self.state(id) != ImageState::Unseen {
            return;
        }
        let Some(image) = self.document.image(id) else {
            return;
        };
        if image.source().is_empty() {
            return;
        }
        report.candidates += 1;

        let skipped_by_predicate = self.options.skip.as_ref().is_some_and(|skip| skip(image.source()));
        if image.opted_out() || skipped_by_predicate {
            debug!(%id, source = image.source(), "opted out");
            self.states.insert(id, ImageState::Skipped(SkipReason::OptedOut));
            report.record(ImageState::Skipped(SkipReason::OptedOut));
        } else if image.is_complete() {
            self.evaluate(id, report);
        } else {
            debug!(%id, source = image.source(), "waiting for load");
            self.states.insert(id, ImageState::AwaitingLoad);
            report.record(ImageState::AwaitingLoad);
        }
    }

    /// Decode-completion notification for `id`.
    ///
    /// Only images waiting for their load are evaluated; notifications for
    /// processed images (for example after their content was replaced) are
    /// ignored.
    pub fn on_image_loaded(&mut self, id: ImageId) -> ScanReport {
        let mut report = ScanReport::new();
        if self.state(id) == ImageState::AwaitingLoad {
            let start = Instant::now();
            self.evaluate(id, &mut report);
            report.duration = start.elapsed();
        }
        report
    }

    /// Forward every pending load notification from the host.
    pub fn pump_loads(&mut self) -> ScanReport {
        let mut report = ScanReport::new();
        for id in self.document.take_loaded() {
            report.merge(self.on_image_loaded(id));
        }
        report
    }

    /// Pump load notifications until no image reaches a terminal state.
    pub fn settle(&mut self) -> ScanReport {
        let mut report = ScanReport::new();
        loop {
            let pumped = self.pump_loads();
            let progressed = pumped.scaled + pumped.skipped > 0;
            report.merge(pumped);
            if !progressed {
                return report;
            }
        }
    }

    /// Change notification from the host: handle loads and re-scan.
    pub fn on_new_candidates_available(&mut self) -> ScanReport {
        let mut report = self.pump_loads();
        report.merge(self.run());
        report
    }

    fn evaluate(&mut self, id: ImageId, report: &mut ScanReport) {
        self.states.insert(id, ImageState::Evaluating);

        let state = match self.try_evaluate(id) {
            Ok(state) => state,
            Err(error) => {
                let source =
                    self.document.image(id).map(|i| i.source().to_string()).unwrap_or_default();
                warn!(%id, %source, %error, "image left unscaled");
                // Not-ready images may still receive their real notification.
                let state = match error {
                    ProcessError::ResourceNotReady(_) => ImageState::AwaitingLoad,
                    _ => ImageState::Skipped(SkipReason::Failed),
                };
                report.failures.push(ImageFailure { id, source, error });
                state
            }
        };

        self.states.insert(id, state);
        report.record(state);
    }

    fn try_evaluate(&mut self, id: ImageId) -> Result<ImageState, ProcessError> {
        let image = self.document.image(id).ok_or(ProcessError::UnknownImage(id))?;
        if !image.is_complete() {
            return Err(ProcessError::ResourceNotReady(id));
        }
        let rendered = image.rendered_size();
        let natural = self.natural_size(id)?;

        let decision = infer_scale(rendered, natural, self.options.tolerance);
        debug!(%id, %rendered, %natural, %decision, "evaluated");

        match decision {
            ScaleDecision::Native => Ok(ImageState::Skipped(SkipReason::Native)),
            ScaleDecision::Unachievable => Ok(ImageState::Skipped(SkipReason::Unachievable)),
            ScaleDecision::Scale(factor) => {
                self.render_scaled(id, natural, factor)?;
                Ok(ImageState::Scaled(factor))
            }
        }
    }

    /// Natural size from the loader, falling back to the secondary lookup.
    fn natural_size(&mut self, id: ImageId) -> Result<Dimensions, ProcessError> {
        let image = self.document.image(id).ok_or(ProcessError::UnknownImage(id))?;
        if let Some(natural) = image.natural_size() {
            return Ok(natural);
        }

        debug!(%id, "natural size unavailable, probing");
        match self.document.probe_natural_size(id) {
            NaturalSizeProbe::Complete(natural) => Ok(natural),
            NaturalSizeProbe::Incomplete => Err(ProcessError::InconsistentResourceState(id)),
        }
    }

    /// Extract at natural size, scale, and hand the result to the renderer.
    fn render_scaled(
        &mut self,
        id: ImageId,
        natural: Dimensions,
        factor: ScaleFactor,
    ) -> Result<(), ProcessError> {
        let image = self.document.image(id).ok_or(ProcessError::UnknownImage(id))?;
        let pixels = image.decoded().ok_or(ProcessError::MissingPixels(id))?;

        let buffer = self.surface.extract(pixels, natural.width, natural.height);
        let scaled = scale(&buffer, factor)?;
        let encoded = to_data_url(&scaled)?;
        self.document.replace_content(id, encoded)?;

        debug!(%id, %factor, size = %scaled.dimensions(), "scaled");
        Ok(())
    }

    /// Scale one image in place by an explicit factor, bypassing inference.
    ///
    /// On success the image is marked `Scaled`, so later scans leave it alone.
    pub fn scale_one(&mut self, id: ImageId, factor: ScaleFactor) -> Result<(), ProcessError> {
        let image = self.document.image(id).ok_or(ProcessError::UnknownImage(id))?;
        if !image.is_complete() {
            return Err(ProcessError::ResourceNotReady(id));
        }
        let natural = self.natural_size(id)?;
        self.render_scaled(id, natural, factor)?;
        self.states.insert(id, ImageState::Scaled(factor));
        Ok(())
    }

    /// [`scale_one`](Self::scale_one) with an unchecked factor such as `2`,
    /// `-1` or `1.5`. The factor is validated before anything else happens.
    pub fn scale_one_by<F>(&mut self, id: ImageId, factor: F) -> Result<(), ProcessError>
    where
        F: TryInto<ScaleFactor, Error = ScaleError>,
    {
        self.scale_one(id, factor.try_into()?)
    }

    /// Start periodic re-scanning. Returns `false` if already watching.
    pub fn watch(&mut self) -> bool {
        if self.watching {
            return false;
        }
        self.watching = true;
        debug!(interval_ms = self.options.watch_interval.as_millis() as u64, "watch started");
        true
    }

    /// Stop periodic re-scanning. Returns `false` if not watching.
    pub fn unwatch(&mut self) -> bool {
        if !self.watching {
            return false;
        }
        self.watching = false;
        debug!("watch stopped");
        true
    }

    pub fn is_watching(&self) -> bool {
        self.watching
    }

    pub fn watch_interval(&self) -> Duration {
        self.options.watch_interval
    }

    /// One poll of watch mode.
    ///
    /// Pending loads are always handled; the document is re-scanned only
    /// when its fingerprint changed since the previous scan.
    pub fn tick(&mut self) -> TickOutcome {
        if !self.watching {
            return TickOutcome::Stopped;
        }

        let mut report = self.pump_loads();
        let fingerprint = self.document.content_fingerprint();
        if self.last_fingerprint == Some(fingerprint) {
            return TickOutcome::Idle(report);
        }

        report.merge(self.scan(fingerprint));
        TickOutcome::Rescanned(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryDocument, MemoryImage};
    use image::{DynamicImage, RgbaImage};

    fn sprite(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_fn(width, height, |x, y| {
            image::Rgba([((x * 40) % 256) as u8, ((y * 40) % 256) as u8, 200, 255])
        }))
    }

    #[test]
    fn test_mode_parse() {
        assert_eq!(Mode::parse("false"), Mode::Off);
        assert_eq!(Mode::parse("true"), Mode::Once);
        assert_eq!(Mode::parse("watch"), Mode::Watch);
        assert_eq!(Mode::parse("bogus"), Mode::Once);
        assert_eq!(Mode::parse(""), Mode::Once);
    }

    #[test]
    fn test_options_builder() {
        let options = Options::default()
            .with_tolerance(3)
            .with_watch_interval(Duration::from_millis(5))
            .with_skip(|src| src.ends_with(".jpg"));
        assert_eq!(options.tolerance, 3);
        assert_eq!(options.watch_interval, Duration::from_millis(5));
        assert!(options.skip.as_ref().is_some_and(|skip| skip("a.jpg")));
        assert!(format!("{:?}", options).contains("<predicate>"));
    }

    #[test]
    fn test_scaled_image_replaced_with_exact_size() {
        let mut doc = MemoryDocument::new();
        let id = doc.insert(MemoryImage::new("hero.png", sprite(4, 3)).with_rendered(12, 9));
        let mut ctx = NoSmoothing::new(doc, Options::default());

        let report = ctx.run();
        assert_eq!(report.scaled, 1);
        assert_eq!(ctx.state(id), ImageState::Scaled(ScaleFactor::new(3).unwrap()));

        let image = ctx.document().image(id).unwrap();
        assert_eq!(image.natural_size(), Some(Dimensions::new(12, 9)));
    }

    #[test]
    fn test_unachievable_marks_skipped() {
        let mut doc = MemoryDocument::new();
        let id = doc.insert(MemoryImage::new("big.png", sprite(8, 8)).with_rendered(4, 4));
        let mut ctx = NoSmoothing::new(doc, Options::default());

        ctx.run();
        assert_eq!(ctx.state(id), ImageState::Skipped(SkipReason::Unachievable));
        assert_eq!(ctx.document().replacement_count(id), 0);
    }

    #[test]
    fn test_source_less_images_are_ignored() {
        let mut doc = MemoryDocument::new();
        let id = doc.insert(MemoryImage::new("", sprite(2, 2)).with_rendered(4, 4));
        let mut ctx = NoSmoothing::new(doc, Options::default());

        let report = ctx.run();
        assert_eq!(report.candidates, 0);
        assert_eq!(ctx.state(id), ImageState::Unseen);
    }

    #[test]
    fn test_watch_and_unwatch_are_idempotent() {
        let mut ctx = NoSmoothing::new(MemoryDocument::new(), Options::default());
        assert!(ctx.watch());
        assert!(!ctx.watch());
        assert!(ctx.is_watching());
        assert!(ctx.unwatch());
        assert!(!ctx.unwatch());
        assert!(matches!(ctx.tick(), TickOutcome::Stopped));
    }

    #[test]
    fn test_report_merge() {
        let mut a = ScanReport { candidates: 1, scaled: 1, ..Default::default() };
        let b = ScanReport { candidates: 2, skipped: 2, deferred: 1, ..Default::default() };
        a.merge(b);
        assert_eq!((a.candidates, a.scaled, a.skipped, a.deferred), (3, 1, 2, 1));
        assert!(a.success());
    }
}
