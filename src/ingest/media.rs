use std::path::Path;

use crate::error::{Result, ScanError};

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp"];
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mov", "mkv"];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    /// Classify a source path by extension. `stub://` sources are video.
    pub fn from_path(path: &str) -> Result<Self> {
        if path.starts_with("stub://") {
            return Ok(Self::Video);
        }
        let ext = Path::new(path)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            Ok(Self::Image)
        } else if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
            Ok(Self::Video)
        } else {
            Err(ScanError::source_open(
                path,
                format!("unsupported media type '{ext}'"),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_by_extension() {
        assert_eq!(MediaKind::from_path("a/b/shot.JPG").unwrap(), MediaKind::Image);
        assert_eq!(MediaKind::from_path("scan.bmp").unwrap(), MediaKind::Image);
        assert_eq!(MediaKind::from_path("mall.mkv").unwrap(), MediaKind::Video);
        assert_eq!(MediaKind::from_path("stub://clip").unwrap(), MediaKind::Video);
    }

    #[test]
    fn rejects_unknown_extensions() {
        assert!(matches!(
            MediaKind::from_path("notes.txt"),
            Err(ScanError::SourceOpenFailed { .. })
        ));
        assert!(MediaKind::from_path("no_extension").is_err());
    }
}
