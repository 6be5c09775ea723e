//! Anomaly scan
//!
//! Runs an object detector over still images and video, drawing labelled
//! boxes on each frame.
//!
//! # Architecture
//!
//! - `detect`: the `DetectorBackend` seam, detections, class names, backends
//! - `overlay`: `FrameAnnotationPipeline` (detect, then draw boxes and labels)
//! - `ingest`: still images and exclusive video sources
//! - `scan`: `VideoScanWorker`, a background thread with cooperative cancel
//! - `config`: file + environment configuration
//!
//! Still images are annotated synchronously on the caller's thread. Videos
//! are scanned by one worker that streams frame, progress and terminal
//! events over a channel.

pub mod config;
pub mod detect;
pub mod error;
pub mod ingest;
pub mod overlay;
pub mod report;
pub mod scan;

pub use config::{FrameErrorPolicy, ModelSettings, OverlaySettings, ScanConfig, ScanSettings};
pub use detect::{
    open_backend, BoundingBox, ClassTable, Detection, DetectorBackend, SharedBackend, StubBackend,
};
pub use error::{Result, ScanError};
pub use ingest::{load_image, preview_first_frame, save_image, MediaKind, VideoSource};
pub use overlay::{AnnotatedFrame, FrameAnnotationPipeline, LabelRenderer, Overlay};
pub use report::detection_summary;
pub use scan::{
    CancelToken, FrameEvent, ScanEvent, ScanHandle, ScanOptions, ScanOutcome, ScanProgress,
    ScanState, VideoScanWorker,
};

/// Build a pipeline from configuration, loading the configured model.
pub fn pipeline_from_config(config: &ScanConfig) -> Result<FrameAnnotationPipeline> {
    let backend = open_backend(&config.model)?;
    Ok(FrameAnnotationPipeline::new(
        backend,
        config.classes.clone(),
        &config.overlay,
    ))
}
