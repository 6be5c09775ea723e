//! scan_video - run the detector over every frame of a video
//!
//! Frames are processed on a background worker. Progress is shown on stderr;
//! Ctrl-C cancels the scan between frames and waits for the worker to
//! release the video.

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::io::IsTerminal;
use std::path::PathBuf;

use anomaly_scan::{
    pipeline_from_config, preview_first_frame, save_image, MediaKind, ScanConfig, ScanEvent,
    ScanOptions, ScanOutcome, VideoScanWorker,
};

#[path = "../ui.rs"]
mod ui;

#[derive(Parser, Debug)]
#[command(name = "scan_video", about = "Detect anomalies across a video")]
struct Args {
    /// Video to scan (mp4, avi, mov, mkv, or stub://...)
    input: String,

    /// Model file or stub:// model (overrides configuration)
    #[arg(long)]
    model: Option<String>,

    /// Configuration file (.toml or .json); defaults to $ANOMALY_SCAN_CONFIG
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Write annotated frames to this directory
    #[arg(long, value_name = "DIR")]
    frames_out: Option<PathBuf>,

    /// With --frames-out, keep every Nth frame
    #[arg(long, default_value_t = 1, value_name = "N")]
    every: u64,

    /// Write the first (unannotated) frame here before scanning
    #[arg(long, value_name = "PATH")]
    preview: Option<PathBuf>,

    /// UI mode for stderr progress (auto|plain|pretty)
    #[arg(long, default_value = "auto", value_name = "MODE")]
    ui: String,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    if args.every == 0 {
        return Err(anyhow!("--every must be >= 1"));
    }
    let is_tty = std::io::stderr().is_terminal();
    let stdout_is_tty = std::io::stdout().is_terminal();
    let ui = ui::Ui::from_args(Some(&args.ui), is_tty, !stdout_is_tty);

    if MediaKind::from_path(&args.input)? != MediaKind::Video {
        return Err(anyhow!("{} is a still image; use detect_image", args.input));
    }

    let mut config = match &args.config {
        Some(path) => ScanConfig::load_from(Some(path.as_path()))?,
        None => ScanConfig::load()?,
    };
    if let Some(model) = args.model {
        config.model.path = model;
    }

    if let Some(preview) = &args.preview {
        let _stage = ui.stage("Preview first frame");
        match preview_first_frame(&args.input)? {
            Some(frame) => save_image(&frame, preview)?,
            None => log::warn!("{} has no frames to preview", args.input),
        }
    }

    let pipeline = {
        let _stage = ui.stage("Load model");
        let mut pipeline = pipeline_from_config(&config)?;
        pipeline.warm_up()?;
        pipeline
    };

    let worker = VideoScanWorker::new(&args.input, pipeline, ScanOptions::from(&config.scan));
    let mut handle = worker.start();

    let token = handle.cancel_token();
    ctrlc::set_handler(move || {
        eprintln!("cancelling scan…");
        token.cancel();
    })
    .context("failed to install Ctrl-C handler")?;

    let mut bar = ui.scan_progress(&format!("Scan {}", args.input));
    let mut frames_with_detections = 0u64;
    let mut total_detections = 0usize;
    let mut outcome = None;

    for event in handle.events().iter() {
        match event {
            ScanEvent::Frame(event) => {
                if !event.frame.detections.is_empty() {
                    frames_with_detections += 1;
                    total_detections += event.frame.detections.len();
                }
                if let Some(dir) = &args.frames_out {
                    if event.index % args.every == 0 {
                        let path = dir.join(format!("frame_{:06}.png", event.index));
                        save_image(&event.frame.pixels, &path)?;
                    }
                }
            }
            ScanEvent::Progress(progress) => bar.update(progress),
            ScanEvent::Finished(finished) => outcome = Some(finished),
        }
    }
    handle.wait()?;

    let outcome = outcome.ok_or_else(|| anyhow!("scan worker exited without reporting"))?;
    bar.finish(&format!("Scan {outcome}"));
    println!(
        "{}: {} detections in {} frames",
        args.input, total_detections, frames_with_detections
    );

    match outcome {
        ScanOutcome::Failed { error, .. } => Err(error.into()),
        ScanOutcome::Completed { .. } | ScanOutcome::Cancelled { .. } => Ok(()),
    }
}
