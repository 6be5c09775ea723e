use std::fs;
use std::path::Path;

use image::RgbImage;

use crate::error::{Result, ScanError};

/// Decode a still image into an RGB buffer.
pub fn load_image(path: &Path) -> Result<RgbImage> {
    let image = image::open(path).map_err(|e| {
        ScanError::source_open(path.display().to_string(), e.to_string())
    })?;
    log::debug!(
        "loaded {} ({}x{})",
        path.display(),
        image.width(),
        image.height()
    );
    Ok(image.to_rgb8())
}

/// Encode `image` to `path`, creating parent directories as needed.
///
/// The format follows the file extension.
pub fn save_image(image: &RgbImage, path: &Path) -> Result<()> {
    let output_error = |reason: String| ScanError::Output {
        path: path.to_path_buf(),
        reason,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| output_error(e.to_string()))?;
    }
    image.save(path).map_err(|e| output_error(e.to_string()))
}
