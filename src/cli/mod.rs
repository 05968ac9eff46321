//! Command-line interface implementation
//!
//! This module provides the CLI entry point and dispatches to submodules
//! for specific command implementations.

mod infer;
mod run;
mod scale;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use crate::orchestrator::Mode;

/// Exit codes
pub(crate) const EXIT_SUCCESS: u8 = 0;
pub(crate) const EXIT_ERROR: u8 = 1;
pub(crate) const EXIT_INVALID_ARGS: u8 = 2;

/// nosmooth - Crisp nearest-neighbor upscaling for pixel art
#[derive(Parser)]
#[command(name = "nosmooth")]
#[command(about = "nosmooth - Upscale pixel art displayed at integer multiples without smoothing")]
#[command(version)]
pub struct Cli {
    /// Show debug diagnostics (overrides RUST_LOG)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Scale every image listed in a page manifest
    Run {
        /// Page manifest (JSON) listing images and their rendered sizes
        page: PathBuf,

        /// Output directory for scaled images (default from nosmooth.toml)
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Document mode: false, true or watch
        #[arg(long, value_parser = parse_mode)]
        mode: Option<Mode>,

        /// Watch-mode poll interval in milliseconds
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
        interval: Option<u32>,

        /// Native-size tolerance in pixels
        #[arg(long)]
        tolerance: Option<u32>,

        /// React to filesystem notifications instead of polling
        #[arg(long)]
        notify: bool,

        /// Explicit path to nosmooth.toml
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Scale a single image by an explicit factor
    Scale {
        /// Input image
        input: PathBuf,

        /// Integer scale factor (>= 1)
        #[arg(short, long, allow_hyphen_values = true)]
        factor: String,

        /// Output file or directory.
        /// If omitted: {input}@{factor}x.png next to the input
        /// If directory (ends with /): dir/{input}@{factor}x.png
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print the scale decision for a rendered and natural size
    Infer {
        /// Rendered size (e.g., "64x64")
        #[arg(long)]
        rendered: String,

        /// Natural size (e.g., "16x16")
        #[arg(long)]
        natural: String,

        /// Native-size tolerance in pixels
        #[arg(long, default_value_t = crate::infer::DEFAULT_TOLERANCE)]
        tolerance: u32,
    },
}

fn parse_mode(value: &str) -> Result<Mode, String> {
    match value {
        "false" | "off" => Ok(Mode::Off),
        "true" | "once" => Ok(Mode::Once),
        "watch" => Ok(Mode::Watch),
        other => Err(format!("unknown mode '{}' (expected false, true or watch)", other)),
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("nosmooth=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    // A subscriber may already be installed when embedded.
    let _ = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).try_init();
}

/// Run the CLI application
pub fn run() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Run { page, out, mode, interval, tolerance, notify, config } => {
            run::run_page(&page, run::RunArgs {
                out,
                mode,
                interval_ms: interval,
                tolerance,
                notify,
                config,
                verbose: cli.verbose,
            })
        }
        Commands::Scale { input, factor, output } => {
            scale::run_scale(&input, &factor, output.as_deref())
        }
        Commands::Infer { rendered, natural, tolerance } => {
            infer::run_infer(&rendered, &natural, tolerance)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_mode() {
        assert_eq!(parse_mode("false"), Ok(Mode::Off));
        assert_eq!(parse_mode("true"), Ok(Mode::Once));
        assert_eq!(parse_mode("watch"), Ok(Mode::Watch));
        assert!(parse_mode("sometimes").is_err());
    }

    #[test]
    fn test_parse_run_arguments() {
        let cli = Cli::try_parse_from([
            "nosmooth", "run", "page.json", "-o", "dist", "--mode", "watch", "--interval", "50",
        ])
        .expect("should parse run arguments");
        match cli.command {
            Commands::Run { page, out, mode, interval, .. } => {
                assert_eq!(page, PathBuf::from("page.json"));
                assert_eq!(out, Some(PathBuf::from("dist")));
                assert_eq!(mode, Some(Mode::Watch));
                assert_eq!(interval, Some(50));
            }
            _ => panic!("expected run command"),
        }
    }

    #[test]
    fn test_zero_interval_rejected() {
        assert!(Cli::try_parse_from(["nosmooth", "run", "p.json", "--interval", "0"]).is_err());
    }
}
