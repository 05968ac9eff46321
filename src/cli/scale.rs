//! Scale command: one image, explicit factor

use std::path::Path;
use std::process::ExitCode;

use crate::encode::{decode_data_url, save_png, scaled_output_path};
use crate::memory::{MemoryDocument, MemoryImage};
use crate::orchestrator::{NoSmoothing, Options};
use crate::scale::ScaleFactor;

use super::{EXIT_ERROR, EXIT_INVALID_ARGS, EXIT_SUCCESS};

/// Run the scale command
pub fn run_scale(input: &Path, factor: &str, output: Option<&Path>) -> ExitCode {
    let factor: ScaleFactor = match factor.parse() {
        Ok(factor) => factor,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(EXIT_INVALID_ARGS);
        }
    };

    let pixels = match image::open(input) {
        Ok(pixels) => pixels,
        Err(e) => {
            eprintln!("Error: Cannot open {}: {}", input.display(), e);
            return ExitCode::from(EXIT_ERROR);
        }
    };

    let mut document = MemoryDocument::new();
    let id = document.insert(MemoryImage::new(input.display().to_string(), pixels));
    let mut ctx = NoSmoothing::new(document, Options::default());

    if let Err(e) = ctx.scale_one(id, factor) {
        eprintln!("Error: {}", e);
        return ExitCode::from(EXIT_ERROR);
    }

    let Some(encoded) = ctx.document().replaced(id) else {
        eprintln!("Error: {} was not replaced", input.display());
        return ExitCode::from(EXIT_ERROR);
    };

    let scaled = match decode_data_url(encoded) {
        Ok(scaled) => scaled.to_rgba8(),
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(EXIT_ERROR);
        }
    };

    let path = scaled_output_path(input, factor, output);
    if let Err(e) = save_png(&scaled, &path) {
        eprintln!("Error: Cannot write {}: {}", path.display(), e);
        return ExitCode::from(EXIT_ERROR);
    }

    println!("Saved: {} ({}x{})", path.display(), scaled.width(), scaled.height());
    ExitCode::from(EXIT_SUCCESS)
}
