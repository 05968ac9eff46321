//! Watch-mode drivers
//!
//! The orchestrator only knows how to [`tick`](NoSmoothing::tick); these
//! drivers decide when. [`poll`] runs a fixed-interval timer, [`watch_path`]
//! reacts to debounced filesystem notifications instead. Both run on the
//! calling thread and return once watch mode is switched off.

use notify::RecursiveMode;
use notify_debouncer_mini::{new_debouncer, DebouncedEventKind};
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, RecvTimeoutError};
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

use crate::host::Document;
use crate::orchestrator::{NoSmoothing, ScanReport, TickOutcome};

/// Error during watch mode
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum WatchError {
    /// Failed to initialize file watcher
    #[error("Failed to initialize file watcher: {0}")]
    WatcherInit(notify::Error),
    /// Failed to add watch path
    #[error("Failed to watch path: {0}")]
    WatchPath(notify::Error),
    /// Channel receive error
    #[error("Watch channel error: {0}")]
    ChannelError(String),
    /// Watched path does not exist
    #[error("Watch path not found: {}", .0.display())]
    SourceNotFound(PathBuf),
}

/// Run the poll timer until watch mode stops or `on_tick` breaks.
///
/// Sleeps for the context's watch interval before every tick. Ticks never
/// overlap; a tick already running always finishes its scan.
pub fn poll<D, F>(ctx: &mut NoSmoothing<D>, mut on_tick: F)
where
    D: Document,
    F: FnMut(&mut NoSmoothing<D>, &TickOutcome) -> ControlFlow<()>,
{
    while ctx.is_watching() {
        std::thread::sleep(ctx.watch_interval());
        let outcome = ctx.tick();
        if matches!(outcome, TickOutcome::Stopped) {
            break;
        }
        if on_tick(ctx, &outcome).is_break() {
            break;
        }
    }
}

/// Re-scan whenever a relevant file under `path` changes.
///
/// Between notifications the context ticks every watch interval, which
/// handles pending loads and any change whose event was missed. `on_scan`
/// receives every report with activity and may stop the loop.
pub fn watch_path<D, F>(
    ctx: &mut NoSmoothing<D>,
    path: &Path,
    debounce: Duration,
    mut on_scan: F,
) -> Result<(), WatchError>
where
    D: Document,
    F: FnMut(&mut NoSmoothing<D>, &ScanReport) -> ControlFlow<()>,
{
    if !path.exists() {
        return Err(WatchError::SourceNotFound(path.to_path_buf()));
    }

    let (tx, rx) = channel();
    let mut debouncer = new_debouncer(debounce, tx).map_err(WatchError::WatcherInit)?;
    debouncer.watcher().watch(path, RecursiveMode::Recursive).map_err(WatchError::WatchPath)?;

    while ctx.is_watching() {
        let report = match rx.recv_timeout(ctx.watch_interval()) {
            Ok(Ok(events)) => {
                let relevant = events.iter().any(|e| {
                    matches!(e.kind, DebouncedEventKind::Any) && is_relevant_file(&e.path)
                });
                if !relevant {
                    continue;
                }
                let mut report = ctx.on_new_candidates_available();
                report.merge(ctx.settle());
                report
            }
            Ok(Err(error)) => {
                // Non-fatal, keep watching
                warn!(?error, "watch error");
                continue;
            }
            Err(RecvTimeoutError::Timeout) => {
                // Catch up on loads and on changes whose event was missed.
                let mut report = match ctx.tick() {
                    TickOutcome::Stopped => break,
                    TickOutcome::Idle(report) | TickOutcome::Rescanned(report) => report,
                };
                report.merge(ctx.settle());
                if report.candidates + report.scaled + report.skipped == 0 && report.success() {
                    continue;
                }
                report
            }
            Err(RecvTimeoutError::Disconnected) => {
                return Err(WatchError::ChannelError("watcher disconnected".to_string()));
            }
        };

        if on_scan(ctx, &report).is_break() {
            break;
        }
    }
    Ok(())
}

/// Check if a file change can affect the document
pub fn is_relevant_file(path: &Path) -> bool {
    if let Some(ext) = path.extension() {
        let ext = ext.to_string_lossy().to_lowercase();
        matches!(
            ext.as_str(),
            "json" | "png" | "gif" | "bmp" | "jpg" | "jpeg" | "webp" | "ico" | "tga"
        )
    } else {
        false
    }
}

/// Clear the terminal screen
pub fn clear_screen() {
    // ANSI escape code to clear screen and move cursor to top-left
    print!("\x1B[2J\x1B[1;1H");
}

/// Format duration for display
pub fn format_duration(duration: Duration) -> String {
    let millis = duration.as_millis();
    if millis < 1000 {
        format!("{}ms", millis)
    } else {
        format!("{:.2}s", duration.as_secs_f64())
    }
}

/// Get current timestamp for logging
pub fn timestamp() -> String {
    use std::time::SystemTime;
    let now = SystemTime::now().duration_since(SystemTime::UNIX_EPOCH).unwrap_or_default();
    let secs = now.as_secs() % 86400; // seconds since midnight
    let hours = (secs / 3600) % 24;
    let minutes = (secs / 60) % 60;
    let seconds = secs % 60;
    format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
}
