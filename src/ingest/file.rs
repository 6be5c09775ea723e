//! Video frame source.
//!
//! `VideoSource` covers the open / read-next / release contract for video
//! input:
//! - `open` claims the path exclusively and prepares the decoder
//! - `next_frame` yields RGB frames in order and `Ok(None)` at end of stream
//! - dropping (or `release`) closes the decoder and frees the path
//!
//! Local files decode through FFmpeg (feature: ingest-file-ffmpeg).
//! `stub://` URIs produce synthetic frames for tests and demos.

use std::path::Path;

use image::{Rgb, RgbImage};

#[cfg(feature = "ingest-file-ffmpeg")]
use super::file_ffmpeg::FfmpegFileSource;
use super::lease::SourceLease;
use crate::error::{Result, ScanError};

/// Video frame source.
pub struct VideoSource {
    backend: VideoBackend,
    path: String,
    frames_read: u64,
    // Declared last so the decoder closes before the path is released.
    _lease: SourceLease,
}

enum VideoBackend {
    Synthetic(SyntheticVideo),
    #[cfg(feature = "ingest-file-ffmpeg")]
    Ffmpeg(FfmpegFileSource),
}

impl VideoSource {
    pub fn open(path: &str) -> Result<Self> {
        if path.trim().is_empty() {
            return Err(ScanError::source_open(path, "empty source path"));
        }
        let lease = SourceLease::acquire(path)?;

        let backend = if path.starts_with("stub://") {
            VideoBackend::Synthetic(SyntheticVideo::parse(path)?)
        } else {
            open_file_backend(path)?
        };

        let source = Self {
            backend,
            path: path.to_string(),
            frames_read: 0,
            _lease: lease,
        };
        let (width, height) = source.dimensions();
        log::info!(
            "VideoSource: opened {} ({}x{}x{}, {} frames)",
            source.path,
            width,
            height,
            source.channels(),
            source
                .total_frames()
                .map(|n| n.to_string())
                .unwrap_or_else(|| "unknown".to_string())
        );
        Ok(source)
    }

    /// Read the next frame, or `None` once the stream is exhausted.
    pub fn next_frame(&mut self) -> Result<Option<RgbImage>> {
        let frame = match &mut self.backend {
            VideoBackend::Synthetic(source) => Ok::<_, String>(source.next_frame()),
            #[cfg(feature = "ingest-file-ffmpeg")]
            VideoBackend::Ffmpeg(source) => source.next_frame(),
        }
        .map_err(|reason| ScanError::SourceRead {
            path: self.path.clone(),
            index: self.frames_read,
            reason,
        })?;
        if frame.is_some() {
            self.frames_read += 1;
        }
        Ok(frame)
    }

    /// Total frame count from container metadata, if known and positive.
    pub fn total_frames(&self) -> Option<u64> {
        let total = match &self.backend {
            VideoBackend::Synthetic(source) => source.reported_total(),
            #[cfg(feature = "ingest-file-ffmpeg")]
            VideoBackend::Ffmpeg(source) => source.total_frames(),
        };
        total.filter(|n| *n > 0)
    }

    pub fn dimensions(&self) -> (u32, u32) {
        match &self.backend {
            VideoBackend::Synthetic(source) => (source.width, source.height),
            #[cfg(feature = "ingest-file-ffmpeg")]
            VideoBackend::Ffmpeg(source) => source.dimensions(),
        }
    }

    /// Frames are always decoded to packed RGB.
    pub fn channels(&self) -> u8 {
        3
    }

    pub fn frames_read(&self) -> u64 {
        self.frames_read
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Close the decoder and release the path.
    pub fn release(self) {
        log::debug!(
            "VideoSource: released {} after {} frames",
            self.path,
            self.frames_read
        );
    }
}

fn open_file_backend(path: &str) -> Result<VideoBackend> {
    if path.contains("://") {
        return Err(ScanError::source_open(
            path,
            "only local files and stub:// sources are supported",
        ));
    }
    if !Path::new(path).is_file() {
        return Err(ScanError::source_open(path, "file does not exist"));
    }
    #[cfg(feature = "ingest-file-ffmpeg")]
    {
        Ok(VideoBackend::Ffmpeg(FfmpegFileSource::open(path)?))
    }
    #[cfg(not(feature = "ingest-file-ffmpeg"))]
    {
        Err(ScanError::source_open(
            path,
            "video decoding requires the ingest-file-ffmpeg feature",
        ))
    }
}

/// Open a video, read its first frame and release it again.
pub fn preview_first_frame(path: &str) -> Result<Option<RgbImage>> {
    let mut source = VideoSource::open(path)?;
    let frame = source.next_frame()?;
    source.release();
    Ok(frame)
}

// ----------------------------------------------------------------------------
// Synthetic source (stub://) for tests
// ----------------------------------------------------------------------------

/// `stub://<name>?frames=N&width=W&height=H&total=known|unknown|<count>`
///
/// A numeric `total` is reported as-is, whatever `frames` says.
struct SyntheticVideo {
    frames: u64,
    width: u32,
    height: u32,
    report_total: TotalReport,
    produced: u64,
}

enum TotalReport {
    Exact,
    Unknown,
    Fixed(u64),
}

impl SyntheticVideo {
    fn parse(uri: &str) -> Result<Self> {
        let rest = uri.trim_start_matches("stub://");
        let query = rest.split_once('?').map(|(_, q)| q).unwrap_or("");
        let mut video = Self {
            frames: 30,
            width: 64,
            height: 48,
            report_total: TotalReport::Exact,
            produced: 0,
        };

        for pair in query.split('&').filter(|p| !p.is_empty()) {
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| ScanError::source_open(uri, format!("malformed option '{pair}'")))?;
            let number = || {
                value
                    .parse::<u64>()
                    .map_err(|_| ScanError::source_open(uri, format!("invalid {key} '{value}'")))
            };
            match key {
                "frames" => video.frames = number()?,
                "width" => video.width = number()?.clamp(1, 8192) as u32,
                "height" => video.height = number()?.clamp(1, 8192) as u32,
                "total" => {
                    video.report_total = match value {
                        "known" => TotalReport::Exact,
                        "unknown" => TotalReport::Unknown,
                        _ => TotalReport::Fixed(number()?),
                    }
                }
                _ => {
                    return Err(ScanError::source_open(
                        uri,
                        format!("unsupported option '{key}'"),
                    ))
                }
            }
        }
        Ok(video)
    }

    fn reported_total(&self) -> Option<u64> {
        match self.report_total {
            TotalReport::Exact => Some(self.frames),
            TotalReport::Unknown => None,
            TotalReport::Fixed(total) => Some(total),
        }
    }

    fn next_frame(&mut self) -> Option<RgbImage> {
        if self.produced >= self.frames {
            return None;
        }
        let index = self.produced;
        self.produced += 1;
        Some(RgbImage::from_fn(self.width, self.height, |x, y| {
            let base = (x as u64 + y as u64 + index) % 256;
            Rgb([base as u8, (base / 2) as u8, 255 - base as u8])
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synthetic_source_reads_until_exhausted() {
        let mut source = VideoSource::open("stub://unit-read?frames=3&width=8&height=6").unwrap();
        assert_eq!(source.total_frames(), Some(3));
        assert_eq!(source.dimensions(), (8, 6));

        let mut count = 0;
        while let Some(frame) = source.next_frame().unwrap() {
            assert_eq!(frame.dimensions(), (8, 6));
            count += 1;
        }
        assert_eq!(count, 3);
        assert_eq!(source.frames_read(), 3);
        assert!(source.next_frame().unwrap().is_none());
    }

    #[test]
    fn unknown_and_zero_totals_are_none() {
        let source = VideoSource::open("stub://unit-unknown?frames=4&total=unknown").unwrap();
        assert_eq!(source.total_frames(), None);
        drop(source);

        let source = VideoSource::open("stub://unit-zero?frames=0").unwrap();
        assert_eq!(source.total_frames(), None);
        drop(source);

        let source = VideoSource::open("stub://unit-fixed?frames=2&total=0").unwrap();
        assert_eq!(source.total_frames(), None);
        drop(source);

        let source = VideoSource::open("stub://unit-fixed?frames=2&total=9").unwrap();
        assert_eq!(source.total_frames(), Some(9));
    }

    #[test]
    fn open_holds_the_path_until_release() {
        let path = "stub://unit-exclusive?frames=2";
        let source = VideoSource::open(path).unwrap();
        assert!(VideoSource::open(path).is_err());
        source.release();
        assert!(VideoSource::open(path).is_ok());
    }

    #[test]
    fn rejects_bad_paths_and_options() {
        assert!(matches!(
            VideoSource::open("/definitely/not/here.mp4"),
            Err(ScanError::SourceOpenFailed { .. })
        ));
        assert!(VideoSource::open("rtsp://camera/stream").is_err());
        assert!(VideoSource::open("stub://unit-bad?frames=lots").is_err());
        assert!(VideoSource::open("stub://unit-bad?fps=3").is_err());
        assert!(VideoSource::open("stub://unit-bad?total=some").is_err());
        assert!(VideoSource::open("").is_err());
    }

    #[test]
    fn preview_reads_first_frame_and_releases() {
        let path = "stub://unit-preview?frames=5&width=4&height=4";
        let frame = preview_first_frame(path).unwrap().unwrap();
        assert_eq!(frame.get_pixel(0, 0), &Rgb([0, 0, 255]));
        assert!(!crate::ingest::is_source_open(path));

        assert!(preview_first_frame("stub://unit-preview-empty?frames=0")
            .unwrap()
            .is_none());
    }
}
