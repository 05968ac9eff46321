//! Run command: scale the images of a page manifest, optionally watching it

use std::collections::HashSet;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::config::{build_options, find_config, load_config, merge_cli_overrides, CliOverrides};
use crate::orchestrator::{NoSmoothing, ScanReport, TickOutcome};
use crate::page::Page;
use crate::watch::{self, format_duration, timestamp};

use super::{EXIT_ERROR, EXIT_INVALID_ARGS, EXIT_SUCCESS};

/// Options of the run command
pub struct RunArgs {
    pub out: Option<PathBuf>,
    pub mode: Option<crate::orchestrator::Mode>,
    pub interval_ms: Option<u32>,
    pub tolerance: Option<u32>,
    pub notify: bool,
    pub config: Option<PathBuf>,
    pub verbose: bool,
}

/// What a run has shown the user so far, and whether anything failed
#[derive(Default)]
struct Session {
    written: usize,
    load_failures: HashSet<String>,
    clear: bool,
    failed: bool,
}

impl Session {
    fn new(clear: bool) -> Self {
        Self { clear, ..Self::default() }
    }

    /// Print a report that came out of a watch step, if anything happened.
    fn show(&mut self, ctx: &NoSmoothing<Page>, report: &ScanReport) {
        if !has_activity(report) && !self.has_new_load_failures(ctx) {
            return;
        }
        if self.clear {
            watch::clear_screen();
        }
        self.record(ctx, report);
    }

    /// Print a report and fold its failures into the exit status.
    fn record(&mut self, ctx: &NoSmoothing<Page>, report: &ScanReport) {
        self.failed |= !report.success();
        print_report(ctx, report, self);
        self.failed |= !self.load_failures.is_empty();
    }

    fn has_new_load_failures(&self, ctx: &NoSmoothing<Page>) -> bool {
        ctx.document()
            .load_failures()
            .iter()
            .any(|(source, _)| !self.load_failures.contains(*source))
    }
}

/// Run the run command
pub fn run_page(page_path: &Path, args: RunArgs) -> ExitCode {
    let config_path = args.config.clone().or_else(find_config);
    if args.verbose {
        match &config_path {
            Some(path) => println!("Using config: {}", path.display()),
            None => println!("No nosmooth.toml found, using defaults"),
        }
    }

    let mut config = match load_config(config_path.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading config: {}", e);
            return ExitCode::from(EXIT_ERROR);
        }
    };

    let overrides = CliOverrides {
        mode: args.mode,
        tolerance: args.tolerance,
        interval_ms: args.interval_ms,
        notify: args.notify.then_some(true),
        out: args.out,
    };
    merge_cli_overrides(&mut config, &overrides);

    let options = match build_options(&config) {
        Ok(options) => options,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(EXIT_INVALID_ARGS);
        }
    };

    let page = match Page::open(page_path, &config.output.dir) {
        Ok(page) => page,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(EXIT_ERROR);
        }
    };

    // An explicit flag beats the manifest, which beats nosmooth.toml.
    let mode = args.mode.or(page.mode()).unwrap_or(config.scan.mode);
    let mut ctx = NoSmoothing::new(page, options);

    let Some(mut report) = ctx.ready(mode) else {
        println!("nosmoothing is off for {}", page_path.display());
        return ExitCode::from(EXIT_SUCCESS);
    };
    report.merge(ctx.settle());

    let mut session = Session::new(config.watch.clear_screen);
    session.record(&ctx, &report);

    if !ctx.is_watching() {
        return exit_code(session.failed);
    }

    println!();
    println!("Watching {} (press Ctrl+C to stop)", page_path.display());

    if config.watch.notify {
        let dir = match page_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let result = watch::watch_path(&mut ctx, &dir, config.watch.debounce(), |ctx, report| {
            session.show(ctx, report);
            ControlFlow::Continue(())
        });
        if let Err(e) = result {
            eprintln!("Watch error: {}", e);
            return ExitCode::from(EXIT_ERROR);
        }
    } else {
        watch::poll(&mut ctx, |ctx, outcome| {
            if let TickOutcome::Idle(report) | TickOutcome::Rescanned(report) = outcome {
                session.show(ctx, report);
            }
            ControlFlow::Continue(())
        });
    }

    exit_code(session.failed)
}

fn exit_code(failed: bool) -> ExitCode {
    if failed {
        ExitCode::from(EXIT_ERROR)
    } else {
        ExitCode::from(EXIT_SUCCESS)
    }
}

fn has_activity(report: &ScanReport) -> bool {
    report.candidates + report.scaled + report.skipped > 0 || !report.success()
}

fn print_report(ctx: &NoSmoothing<Page>, report: &ScanReport, printed: &mut Session) {
    println!(
        "[{}] {} candidate(s): {} scaled, {} skipped, {} waiting ({})",
        timestamp(),
        report.candidates,
        report.scaled,
        report.skipped,
        ctx.document().pending_loads(),
        format_duration(report.duration)
    );

    let written = ctx.document().written();
    for path in written.iter().skip(printed.written) {
        println!("  wrote {}", path.display());
    }
    printed.written = written.len();

    for failure in &report.failures {
        eprintln!("  Error: {}", failure);
    }

    for (source, reason) in ctx.document().load_failures() {
        if printed.load_failures.insert(source.to_string()) {
            eprintln!("  Error: cannot load {}: {}", source, reason);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::ImageId;
    use crate::orchestrator::{ImageFailure, Mode, Options, ProcessError};
    use std::fs;
    use tempfile::TempDir;

    fn context(temp: &TempDir, manifest: &str) -> NoSmoothing<Page> {
        let path = temp.path().join("page.json");
        fs::write(&path, manifest).unwrap();
        let page = Page::open(&path, &temp.path().join("out")).unwrap();
        NoSmoothing::new(page, Options::default())
    }

    #[test]
    fn test_watch_report_failure_marks_session_failed() {
        let temp = TempDir::new().unwrap();
        let ctx = context(&temp, r#"{"images": []}"#);
        let mut session = Session::new(false);

        session.show(&ctx, &ScanReport::new());
        assert!(!session.failed);

        let mut report = ScanReport::new();
        report.failures.push(ImageFailure {
            id: ImageId(0),
            source: "hero.png".to_string(),
            error: ProcessError::MissingPixels(ImageId(0)),
        });
        session.show(&ctx, &report);
        assert!(session.failed);
    }

    #[test]
    fn test_load_failure_found_while_watching_marks_session_failed() {
        let temp = TempDir::new().unwrap();
        let mut ctx = context(&temp, r#"{"images": []}"#);
        let mut session = Session::new(false);
        let report = ctx.ready(Mode::Watch).unwrap();
        session.record(&ctx, &report);
        assert!(!session.failed);

        fs::write(temp.path().join("broken.png"), b"not a png").unwrap();
        fs::write(
            temp.path().join("page.json"),
            r#"{"images": [{"src": "broken.png", "width": 8, "height": 8}]}"#,
        )
        .unwrap();
        // The first tick registers the image, the second tries to decode it.
        for _ in 0..2 {
            let report = match ctx.tick() {
                TickOutcome::Idle(report) | TickOutcome::Rescanned(report) => report,
                TickOutcome::Stopped => panic!("context should still be watching"),
            };
            session.show(&ctx, &report);
        }
        assert!(session.failed);
        assert!(session.load_failures.contains("broken.png"));
    }
}
