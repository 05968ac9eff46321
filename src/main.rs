//! nosmooth - Command-line tool for crisp nearest-neighbor upscaling of pixel art

use std::process::ExitCode;

use nosmooth::cli;

fn main() -> ExitCode {
    cli::run()
}
