//! Video scanning on a background thread.

mod progress;
mod worker;

pub use crate::config::FrameErrorPolicy;
pub use progress::ScanProgress;
pub use worker::{
    CancelToken, FrameEvent, ScanEvent, ScanHandle, ScanOptions, ScanOutcome, ScanState,
    VideoScanWorker,
};
