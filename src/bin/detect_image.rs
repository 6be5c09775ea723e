//! detect_image - annotate one still image with detected regions
//!
//! Loads the configured model, draws boxes and labels on the image, writes
//! the annotated copy and prints the detection summary on stdout.

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use anomaly_scan::{
    detection_summary, load_image, pipeline_from_config, save_image, MediaKind, ScanConfig,
};

#[path = "../ui.rs"]
#[allow(dead_code)]
mod ui;

#[derive(Parser, Debug)]
#[command(name = "detect_image", about = "Detect anomalies in a still image")]
struct Args {
    /// Image to annotate (jpg, jpeg, png, bmp)
    input: PathBuf,

    /// Model file or stub:// model (overrides configuration)
    #[arg(long)]
    model: Option<String>,

    /// Configuration file (.toml or .json); defaults to $ANOMALY_SCAN_CONFIG
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Where to write the annotated image (default: <input>_annotated.<ext>)
    #[arg(long, value_name = "PATH")]
    out: Option<PathBuf>,

    /// UI mode for stderr progress (auto|plain|pretty)
    #[arg(long, default_value = "auto", value_name = "MODE")]
    ui: String,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let is_tty = std::io::stderr().is_terminal();
    let stdout_is_tty = std::io::stdout().is_terminal();
    let ui = ui::Ui::from_args(Some(&args.ui), is_tty, !stdout_is_tty);

    let input = args
        .input
        .to_str()
        .ok_or_else(|| anyhow!("input path is not valid UTF-8"))?;
    if MediaKind::from_path(input)? != MediaKind::Image {
        return Err(anyhow!("{input} is a video; use scan_video"));
    }

    let mut config = match &args.config {
        Some(path) => ScanConfig::load_from(Some(path.as_path()))?,
        None => ScanConfig::load()?,
    };
    if let Some(model) = args.model {
        config.model.path = model;
    }

    let mut pipeline = {
        let _stage = ui.stage("Load model");
        pipeline_from_config(&config)?
    };
    let image = {
        let _stage = ui.stage("Read image");
        load_image(&args.input)?
    };
    let annotated = {
        let _stage = ui.stage("Detect");
        pipeline.annotate(&image)?
    };

    let out = args.out.unwrap_or_else(|| annotated_path(&args.input));
    {
        let _stage = ui.stage("Write annotated image");
        save_image(&annotated.pixels, &out)
            .with_context(|| format!("writing {}", out.display()))?;
    }

    println!("{}", detection_summary(&annotated.detections, pipeline.classes()));
    println!("annotated image: {}", out.display());
    Ok(())
}

fn annotated_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    let ext = input
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_else(|| "png".to_string());
    input.with_file_name(format!("{stem}_annotated.{ext}"))
}
