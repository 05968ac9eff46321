//! Infer command: print the scale decision for two sizes

use std::process::ExitCode;

use crate::buffer::Dimensions;
use crate::infer::infer_scale;

use super::{EXIT_INVALID_ARGS, EXIT_SUCCESS};

/// Run the infer command
pub fn run_infer(rendered: &str, natural: &str, tolerance: u32) -> ExitCode {
    let Some(rendered) = Dimensions::parse(rendered) else {
        eprintln!("Error: Invalid rendered size '{}' (expected WxH, e.g. 64x64)", rendered);
        return ExitCode::from(EXIT_INVALID_ARGS);
    };
    let Some(natural) = Dimensions::parse(natural) else {
        eprintln!("Error: Invalid natural size '{}' (expected WxH, e.g. 16x16)", natural);
        return ExitCode::from(EXIT_INVALID_ARGS);
    };

    println!("{}", infer_scale(rendered, natural, tolerance));
    ExitCode::from(EXIT_SUCCESS)
}
