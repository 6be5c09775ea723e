//! Frame ingestion sources.
//!
//! This module provides the sources frames come from:
//! - Still images (jpg, jpeg, png, bmp)
//! - Local video files (feature: ingest-file-ffmpeg)
//! - Synthetic `stub://` video (testing)
//!
//! Video sources are owned by exactly one reader at a time. Opening a source
//! claims its path; the claim is released when the source is dropped.

pub mod file;
#[cfg(feature = "ingest-file-ffmpeg")]
pub(crate) mod file_ffmpeg;
mod lease;
pub mod media;
pub mod still;

pub use file::{preview_first_frame, VideoSource};
pub use lease::is_source_open;
pub use media::MediaKind;
pub use still::{load_image, save_image};
