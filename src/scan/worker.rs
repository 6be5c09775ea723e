//! Background video scan.
//!
//! `VideoScanWorker::start` spawns one thread that opens the source, runs
//! every frame through the annotation pipeline and reports on a channel:
//!
//! ```text
//! Frame(0) Progress(1) Frame(1) Progress(2) ... Finished(outcome)
//! ```
//!
//! Exactly one `Finished` event is sent per scan, after the source has been
//! released. Cancellation is cooperative and observed between frames.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use super::progress::ScanProgress;
use crate::config::{FrameErrorPolicy, ScanSettings};
use crate::error::{Result, ScanError};
use crate::ingest::VideoSource;
use crate::overlay::{AnnotatedFrame, FrameAnnotationPipeline};

/// Shared stop request, checked by the worker between frames.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum ScanState {
    Idle = 0,
    Running = 1,
    Completed = 2,
    Cancelled = 3,
    Failed = 4,
}

impl ScanState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Idle,
            1 => Self::Running,
            2 => Self::Completed,
            3 => Self::Cancelled,
            _ => Self::Failed,
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Idle | Self::Running)
    }
}

/// Terminal status of a scan.
#[derive(Debug)]
pub enum ScanOutcome {
    /// The source was exhausted.
    Completed { frames_processed: u64 },
    Cancelled { frames_processed: u64 },
    Failed {
        frames_processed: u64,
        error: ScanError,
    },
}

impl ScanOutcome {
    pub fn frames_processed(&self) -> u64 {
        match self {
            Self::Completed { frames_processed }
            | Self::Cancelled { frames_processed }
            | Self::Failed {
                frames_processed, ..
            } => *frames_processed,
        }
    }

    pub fn state(&self) -> ScanState {
        match self {
            Self::Completed { .. } => ScanState::Completed,
            Self::Cancelled { .. } => ScanState::Cancelled,
            Self::Failed { .. } => ScanState::Failed,
        }
    }

    pub fn error(&self) -> Option<&ScanError> {
        match self {
            Self::Failed { error, .. } => Some(error),
            _ => None,
        }
    }
}

impl fmt::Display for ScanOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed { frames_processed } => {
                write!(f, "completed after {frames_processed} frames")
            }
            Self::Cancelled { frames_processed } => {
                write!(f, "cancelled after {frames_processed} frames")
            }
            Self::Failed {
                frames_processed,
                error,
            } => write!(f, "failed after {frames_processed} frames: {error}"),
        }
    }
}

#[derive(Debug)]
pub struct FrameEvent {
    /// Zero-based position in the source.
    pub index: u64,
    pub frame: AnnotatedFrame,
}

#[derive(Debug)]
pub enum ScanEvent {
    Frame(FrameEvent),
    Progress(ScanProgress),
    Finished(ScanOutcome),
}

#[derive(Clone, Debug, Default)]
pub struct ScanOptions {
    /// Pause after each frame; zero disables pacing.
    pub frame_delay: Duration,
    pub on_frame_error: FrameErrorPolicy,
}

impl From<&ScanSettings> for ScanOptions {
    fn from(settings: &ScanSettings) -> Self {
        Self {
            frame_delay: settings.frame_delay,
            on_frame_error: settings.on_frame_error,
        }
    }
}

pub struct VideoScanWorker {
    source_path: String,
    pipeline: FrameAnnotationPipeline,
    options: ScanOptions,
    state: Arc<AtomicU8>,
}

impl VideoScanWorker {
    pub fn new(
        source_path: impl Into<String>,
        pipeline: FrameAnnotationPipeline,
        options: ScanOptions,
    ) -> Self {
        Self {
            source_path: source_path.into(),
            pipeline,
            options,
            state: Arc::new(AtomicU8::new(ScanState::Idle as u8)),
        }
    }

    pub fn state(&self) -> ScanState {
        ScanState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// Spawn the scan thread. The source is opened on that thread; an open
    /// failure arrives as `Finished(Failed)` with zero frames processed.
    pub fn start(self) -> ScanHandle {
        let (tx, rx) = mpsc::channel();
        let token = CancelToken::new();
        let state = self.state.clone();
        state.store(ScanState::Running as u8, Ordering::SeqCst);

        let thread_token = token.clone();
        let join = std::thread::spawn(move || self.run(thread_token, tx));

        ScanHandle {
            events: rx,
            token,
            state,
            join: Some(join),
        }
    }

    fn run(mut self, token: CancelToken, tx: Sender<ScanEvent>) {
        let mut frames_processed = 0;
        let outcome = match panic::catch_unwind(AssertUnwindSafe(|| {
            self.scan(&token, &tx, &mut frames_processed)
        })) {
            Ok(outcome) => outcome,
            Err(_) => ScanOutcome::Failed {
                frames_processed,
                error: ScanError::WorkerPanicked,
            },
        };

        match &outcome {
            ScanOutcome::Failed { .. } => {
                log::error!("VideoScanWorker: {} {}", self.source_path, outcome)
            }
            _ => log::info!("VideoScanWorker: {} {}", self.source_path, outcome),
        }
        self.state.store(outcome.state() as u8, Ordering::SeqCst);
        let _ = tx.send(ScanEvent::Finished(outcome));
    }

    /// Runs until exhaustion, failure or cancellation. The source is dropped
    /// before this returns.
    fn scan(
        &mut self,
        token: &CancelToken,
        tx: &Sender<ScanEvent>,
        frames_processed: &mut u64,
    ) -> ScanOutcome {
        let mut source = match VideoSource::open(&self.source_path) {
            Ok(source) => source,
            Err(error) => {
                return ScanOutcome::Failed {
                    frames_processed: 0,
                    error,
                }
            }
        };
        let total_frames = source.total_frames();
        if total_frames.is_none() {
            log::warn!(
                "VideoScanWorker: {} does not report a frame count; progress percentage unknown",
                self.source_path
            );
        }

        loop {
            if token.is_cancelled() {
                return ScanOutcome::Cancelled {
                    frames_processed: *frames_processed,
                };
            }

            let frame = match source.next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => break,
                Err(error) => {
                    return ScanOutcome::Failed {
                        frames_processed: *frames_processed,
                        error,
                    }
                }
            };
            let index = *frames_processed;

            match self.pipeline.annotate(&frame) {
                Ok(frame) => {
                    let _ = tx.send(ScanEvent::Frame(FrameEvent { index, frame }));
                }
                Err(error) => match self.options.on_frame_error {
                    FrameErrorPolicy::Abort => {
                        return ScanOutcome::Failed {
                            frames_processed: *frames_processed,
                            error,
                        }
                    }
                    FrameErrorPolicy::Skip => {
                        log::warn!("VideoScanWorker: skipping frame {index}: {error}")
                    }
                },
            }

            *frames_processed += 1;
            let progress = ScanProgress::new(*frames_processed, total_frames);
            let _ = tx.send(ScanEvent::Progress(progress));

            if !self.options.frame_delay.is_zero() {
                std::thread::sleep(self.options.frame_delay);
            }
        }

        // Metadata may over-report the frame count; close at 100%.
        if let Some(total) = total_frames {
            if *frames_processed > 0 && *frames_processed < total {
                log::warn!(
                    "VideoScanWorker: {} ended after {} of {} reported frames",
                    self.source_path,
                    frames_processed,
                    total
                );
                let progress = ScanProgress::new(*frames_processed, Some(*frames_processed));
                let _ = tx.send(ScanEvent::Progress(progress));
            }
        }

        source.release();
        ScanOutcome::Completed {
            frames_processed: *frames_processed,
        }
    }
}

/// Handle to a running scan.
///
/// Dropping the handle cancels the scan and waits for the thread.
pub struct ScanHandle {
    events: Receiver<ScanEvent>,
    token: CancelToken,
    state: Arc<AtomicU8>,
    join: Option<JoinHandle<()>>,
}

impl ScanHandle {
    /// Events in emission order; the iterator ends after `Finished`.
    pub fn events(&self) -> &Receiver<ScanEvent> {
        &self.events
    }

    /// Token for requesting cancellation from another thread.
    pub fn cancel_token(&self) -> CancelToken {
        self.token.clone()
    }

    pub fn state(&self) -> ScanState {
        ScanState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// Request cancellation and block until the worker has stopped and the
    /// source is released.
    pub fn cancel(&mut self) -> Result<()> {
        self.token.cancel();
        self.wait()
    }

    /// Block until the worker thread exits.
    pub fn wait(&mut self) -> Result<()> {
        if let Some(join) = self.join.take() {
            join.join().map_err(|_| ScanError::WorkerPanicked)?;
        }
        Ok(())
    }
}

impl Drop for ScanHandle {
    fn drop(&mut self) {
        if let Err(err) = self.cancel() {
            log::error!("VideoScanWorker: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OverlaySettings;
    use crate::detect::{ClassTable, StubBackend};
    use crate::overlay::LabelRenderer;

    fn pipeline(backend: StubBackend) -> FrameAnnotationPipeline {
        FrameAnnotationPipeline::with_label_renderer(
            Box::new(backend),
            ClassTable::default(),
            &OverlaySettings::default(),
            LabelRenderer::builtin(12.0),
        )
    }

    fn collect(handle: &ScanHandle) -> Vec<ScanEvent> {
        handle.events().iter().collect()
    }

    #[test]
    fn worker_is_idle_until_started() {
        let worker = VideoScanWorker::new(
            "stub://worker-idle?frames=1",
            pipeline(StubBackend::new()),
            ScanOptions::default(),
        );
        assert_eq!(worker.state(), ScanState::Idle);
        let mut handle = worker.start();
        let events = collect(&handle);
        handle.wait().unwrap();
        assert_eq!(handle.state(), ScanState::Completed);
        assert_eq!(events.len(), 3);
    }

    #[test]
    fn over_reported_total_closes_at_100() {
        let worker = VideoScanWorker::new(
            "stub://worker-over?frames=4&total=10",
            pipeline(StubBackend::new()),
            ScanOptions::default(),
        );
        let handle = worker.start();
        let percents: Vec<Option<u8>> = collect(&handle)
            .iter()
            .filter_map(|e| match e {
                ScanEvent::Progress(p) => Some(p.percent()),
                _ => None,
            })
            .collect();
        assert_eq!(
            percents,
            vec![Some(10), Some(20), Some(30), Some(40), Some(100)]
        );
    }

    #[test]
    fn skip_policy_counts_failed_frames() {
        let worker = VideoScanWorker::new(
            "stub://worker-skip?frames=3",
            pipeline(StubBackend::new().failing_at(1)),
            ScanOptions {
                on_frame_error: FrameErrorPolicy::Skip,
                ..ScanOptions::default()
            },
        );
        let handle = worker.start();
        let events = collect(&handle);
        let frames: Vec<u64> = events
            .iter()
            .filter_map(|e| match e {
                ScanEvent::Frame(f) => Some(f.index),
                _ => None,
            })
            .collect();
        assert_eq!(frames, vec![0, 2]);
        let last_percent = events.iter().rev().find_map(|e| match e {
            ScanEvent::Progress(p) => p.percent(),
            _ => None,
        });
        assert_eq!(last_percent, Some(100));
        assert!(matches!(
            events.last(),
            Some(ScanEvent::Finished(ScanOutcome::Completed {
                frames_processed: 3
            }))
        ));
    }

    #[test]
    fn dropping_the_handle_cancels_and_releases() {
        let worker = VideoScanWorker::new(
            "stub://worker-drop?frames=1000",
            pipeline(StubBackend::new()),
            ScanOptions {
                frame_delay: Duration::from_millis(1),
                ..ScanOptions::default()
            },
        );
        let handle = worker.start();
        drop(handle);
        assert!(!crate::ingest::is_source_open("stub://worker-drop?frames=1000"));
    }
}
