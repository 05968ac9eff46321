//! PNG encoding, data URLs and output paths

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use image::codecs::png::PngEncoder;
use image::{ColorType, DynamicImage, ImageEncoder, RgbaImage};
use std::ffi::OsString;
use std::io;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

use crate::buffer::PixelBuffer;
use crate::host::EncodedImage;
use crate::scale::ScaleFactor;

const PNG_DATA_URL_PREFIX: &str = "data:image/png;base64,";

/// Error type for encoding and output operations
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EncodeError {
    /// IO error during file operations
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    /// Image encoding or decoding error
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
    /// Not a base64 PNG data URL
    #[error("Not a PNG data URL")]
    NotDataUrl,
    /// Invalid base64 payload
    #[error("Invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),
}

/// Encode a buffer as PNG bytes.
pub fn encode_png(buffer: &PixelBuffer) -> Result<Vec<u8>, EncodeError> {
    let mut bytes = Vec::new();
    PngEncoder::new(&mut bytes).write_image(
        buffer.pixels(),
        buffer.width(),
        buffer.height(),
        ColorType::Rgba8,
    )?;
    Ok(bytes)
}

/// Serialize a buffer into an opaque `data:image/png;base64,...` string.
pub fn to_data_url(buffer: &PixelBuffer) -> Result<EncodedImage, EncodeError> {
    let png = encode_png(buffer)?;
    Ok(EncodedImage(format!("{}{}", PNG_DATA_URL_PREFIX, STANDARD.encode(png))))
}

/// Decode a PNG data URL produced by [`to_data_url`].
pub fn decode_data_url(encoded: &EncodedImage) -> Result<DynamicImage, EncodeError> {
    let payload =
        encoded.as_str().strip_prefix(PNG_DATA_URL_PREFIX).ok_or(EncodeError::NotDataUrl)?;
    let bytes = STANDARD.decode(payload)?;
    Ok(image::load_from_memory_with_format(&bytes, image::ImageFormat::Png)?)
}

/// Save an RGBA image to a PNG file, creating parent directories.
pub fn save_png(image: &RgbaImage, path: &Path) -> Result<(), EncodeError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }

    image.save_with_format(path, image::ImageFormat::Png)?;
    Ok(())
}

/// Output path for a page image.
///
/// The source's directory is mirrored under `out_dir`, without root, `.` or
/// `..` components. PNG sources keep their stem; other formats keep their
/// whole file name (`hero.gif` becomes `hero.gif.png`).
pub fn page_output_path(out_dir: &Path, source: &str) -> PathBuf {
    let source = Path::new(source);
    let mut path = out_dir.to_path_buf();
    if let Some(parent) = source.parent() {
        for component in parent.components() {
            if let Component::Normal(part) = component {
                path.push(part);
            }
        }
    }

    let mut file_name = match source.file_name() {
        Some(name) => {
            let is_png = source.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("png"));
            match source.file_stem() {
                Some(stem) if is_png => stem.to_os_string(),
                _ => name.to_os_string(),
            }
        }
        None => OsString::from("image"),
    };
    file_name.push(".png");
    path.push(file_name);
    path
}

/// Output path for a single scaled image.
///
/// | Scenario | Output |
/// |----------|--------|
/// | No `-o` | `{input_stem}@{factor}x.png` next to the input |
/// | `-o dir/` | `dir/{input_stem}@{factor}x.png` |
/// | `-o file.png` | `file.png` |
pub fn scaled_output_path(input: &Path, factor: ScaleFactor, output_arg: Option<&Path>) -> PathBuf {
    let stem = input.file_stem().and_then(|s| s.to_str()).unwrap_or("output");
    let file_name = format!("{}@{}x.png", stem, factor);

    match output_arg {
        Some(output) => {
            let is_dir = output.as_os_str().to_string_lossy().ends_with('/') || output.is_dir();
            if is_dir {
                output.join(file_name)
            } else {
                output.to_path_buf()
            }
        }
        None => {
            let parent = input.parent().unwrap_or(Path::new(""));
            if parent.as_os_str().is_empty() {
                PathBuf::from(file_name)
            } else {
                parent.join(file_name)
            }
        }
    }
}
