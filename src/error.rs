//! Error taxonomy for detection requests and video scans.
//!
//! End-of-stream and cancellation are not errors: a source signals
//! exhaustion with `Ok(None)` and a cancelled scan finishes with
//! `ScanOutcome::Cancelled`.

use std::path::PathBuf;

use thiserror::Error;

/// Result alias used throughout the library.
pub type Result<T> = std::result::Result<T, ScanError>;

#[derive(Debug, Error)]
pub enum ScanError {
    /// The model could not be loaded or initialized.
    #[error("detection backend unavailable: {0}")]
    BackendUnavailable(String),

    /// A single `detect()` call failed.
    #[error("inference failed: {0}")]
    InferenceFailed(String),

    /// An image or video could not be opened or decoded.
    #[error("failed to open source '{path}': {reason}")]
    SourceOpenFailed { path: String, reason: String },

    /// A frame could not be decoded after the source was opened.
    #[error("failed to read frame {index} from '{path}': {reason}")]
    SourceRead {
        path: String,
        index: u64,
        reason: String,
    },

    /// An annotated frame could not be written.
    #[error("failed to write '{}': {reason}", path.display())]
    Output { path: PathBuf, reason: String },

    #[error("scan worker thread panicked")]
    WorkerPanicked,
}

impl ScanError {
    pub fn backend_unavailable<S: Into<String>>(msg: S) -> Self {
        Self::BackendUnavailable(msg.into())
    }

    pub fn inference<S: Into<String>>(msg: S) -> Self {
        Self::InferenceFailed(msg.into())
    }

    pub fn source_open<P: Into<String>, S: Into<String>>(path: P, reason: S) -> Self {
        Self::SourceOpenFailed {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
