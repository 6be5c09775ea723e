use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::detect::ClassTable;

const DEFAULT_MODEL_PATH: &str = "best.onnx";
const DEFAULT_INPUT_SIZE: u32 = 640;
const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.25;
const DEFAULT_IOU_THRESHOLD: f32 = 0.45;
const DEFAULT_BOX_COLOR: [u8; 3] = [0, 255, 0];
const DEFAULT_STROKE_WIDTH: u32 = 2;
const DEFAULT_TEXT_SIZE: f32 = 25.0;
const MAX_TEXT_SIZE: f32 = 512.0;
const DEFAULT_LABEL_OFFSET: i32 = 35;
const DEFAULT_FRAME_DELAY_MS: u64 = 10;
/// Key in the `classes` section that sets the unknown-id template.
const UNKNOWN_CLASS_KEY: &str = "unknown";
const DEFAULT_FONTS: &[&str] = &[
    "/usr/share/fonts/opentype/noto/NotoSansCJK-Regular.ttc",
    "/usr/share/fonts/noto-cjk/NotoSansCJK-Regular.ttc",
    "/usr/share/fonts/truetype/wqy/wqy-microhei.ttc",
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/System/Library/Fonts/PingFang.ttc",
    "C:\\Windows\\Fonts\\simhei.ttf",
    "C:\\Windows\\Fonts\\msyh.ttc",
    "C:\\Windows\\Fonts\\simsun.ttc",
];

#[derive(Debug, Deserialize, Default)]
struct ScanConfigFile {
    model: Option<ModelConfigFile>,
    classes: Option<BTreeMap<String, String>>,
    overlay: Option<OverlayConfigFile>,
    scan: Option<ScanLoopConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct ModelConfigFile {
    path: Option<String>,
    input_width: Option<u32>,
    input_height: Option<u32>,
    confidence_threshold: Option<f32>,
    iou_threshold: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
struct OverlayConfigFile {
    box_color: Option<[u8; 3]>,
    stroke_width: Option<u32>,
    label_color: Option<[u8; 3]>,
    text_size: Option<f32>,
    label_offset: Option<i32>,
    fonts: Option<Vec<PathBuf>>,
}

#[derive(Debug, Deserialize, Default)]
struct ScanLoopConfigFile {
    frame_delay_ms: Option<u64>,
    on_frame_error: Option<FrameErrorPolicy>,
}

/// What a scan does when one frame fails inside the pipeline.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameErrorPolicy {
    /// Terminate the scan as failed.
    #[default]
    Abort,
    /// Log, count the frame as processed and continue.
    Skip,
}

impl FromStr for FrameErrorPolicy {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "abort" => Ok(Self::Abort),
            "skip" => Ok(Self::Skip),
            other => Err(anyhow!("unknown frame error policy '{other}' (abort|skip)")),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ScanConfig {
    pub model: ModelSettings,
    pub classes: ClassTable,
    pub overlay: OverlaySettings,
    pub scan: ScanSettings,
}

#[derive(Debug, Clone)]
pub struct ModelSettings {
    /// Model file path, or a `stub://` model name.
    pub path: String,
    pub input_width: u32,
    pub input_height: u32,
    pub confidence_threshold: f32,
    pub iou_threshold: f32,
}

#[derive(Debug, Clone)]
pub struct OverlaySettings {
    pub box_color: [u8; 3],
    pub stroke_width: u32,
    pub label_color: [u8; 3],
    pub text_size: f32,
    /// Pixels between the label's top edge and the box's top edge.
    pub label_offset: i32,
    /// Font files tried in order; empty means built-in glyphs only.
    pub fonts: Vec<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct ScanSettings {
    pub frame_delay: Duration,
    pub on_frame_error: FrameErrorPolicy,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            path: DEFAULT_MODEL_PATH.to_string(),
            input_width: DEFAULT_INPUT_SIZE,
            input_height: DEFAULT_INPUT_SIZE,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            iou_threshold: DEFAULT_IOU_THRESHOLD,
        }
    }
}

impl Default for OverlaySettings {
    fn default() -> Self {
        Self {
            box_color: DEFAULT_BOX_COLOR,
            stroke_width: DEFAULT_STROKE_WIDTH,
            label_color: DEFAULT_BOX_COLOR,
            text_size: DEFAULT_TEXT_SIZE,
            label_offset: DEFAULT_LABEL_OFFSET,
            fonts: DEFAULT_FONTS.iter().map(PathBuf::from).collect(),
        }
    }
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            frame_delay: Duration::from_millis(DEFAULT_FRAME_DELAY_MS),
            on_frame_error: FrameErrorPolicy::default(),
        }
    }
}

impl ScanConfig {
    /// Load from `ANOMALY_SCAN_CONFIG` (if set), then apply env overrides.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("ANOMALY_SCAN_CONFIG")
            .ok()
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from);
        Self::load_from(config_path.as_deref())
    }

    /// Load from an explicit file (if any), then apply env overrides.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let file_cfg = match path {
            Some(path) => read_config_file(path)?,
            None => ScanConfigFile::default(),
        };
        let mut cfg = Self::from_file(file_cfg)?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: ScanConfigFile) -> Result<Self> {
        let defaults = Self::default();

        let model = match file.model {
            Some(model) => ModelSettings {
                path: model.path.unwrap_or(defaults.model.path),
                input_width: model.input_width.unwrap_or(defaults.model.input_width),
                input_height: model.input_height.unwrap_or(defaults.model.input_height),
                confidence_threshold: model
                    .confidence_threshold
                    .unwrap_or(defaults.model.confidence_threshold),
                iou_threshold: model.iou_threshold.unwrap_or(defaults.model.iou_threshold),
            },
            None => defaults.model,
        };

        let classes = match file.classes {
            Some(names) => {
                let mut parsed = Vec::with_capacity(names.len());
                let mut unknown = None;
                for (id, name) in names {
                    if id.trim() == UNKNOWN_CLASS_KEY {
                        unknown = Some(name);
                        continue;
                    }
                    let id: u32 = id
                        .trim()
                        .parse()
                        .map_err(|_| anyhow!("class id '{id}' must be a non-negative integer"))?;
                    parsed.push((id, name));
                }
                let table = ClassTable::new(parsed);
                match unknown {
                    Some(template) => table.with_unknown_template(template),
                    None => table,
                }
            }
            None => defaults.classes,
        };

        let overlay = match file.overlay {
            Some(overlay) => OverlaySettings {
                box_color: overlay.box_color.unwrap_or(defaults.overlay.box_color),
                stroke_width: overlay.stroke_width.unwrap_or(defaults.overlay.stroke_width),
                label_color: overlay.label_color.unwrap_or(defaults.overlay.label_color),
                text_size: overlay.text_size.unwrap_or(defaults.overlay.text_size),
                label_offset: overlay.label_offset.unwrap_or(defaults.overlay.label_offset),
                fonts: overlay.fonts.unwrap_or(defaults.overlay.fonts),
            },
            None => defaults.overlay,
        };

        let scan = ScanSettings {
            frame_delay: file
                .scan
                .as_ref()
                .and_then(|scan| scan.frame_delay_ms)
                .map(Duration::from_millis)
                .unwrap_or(defaults.scan.frame_delay),
            on_frame_error: file
                .scan
                .and_then(|scan| scan.on_frame_error)
                .unwrap_or(defaults.scan.on_frame_error),
        };

        Ok(Self {
            model,
            classes,
            overlay,
            scan,
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(path) = std::env::var("ANOMALY_SCAN_MODEL") {
            if !path.trim().is_empty() {
                self.model.path = path;
            }
        }
        if let Ok(delay) = std::env::var("ANOMALY_SCAN_FRAME_DELAY_MS") {
            let millis: u64 = delay.trim().parse().map_err(|_| {
                anyhow!("ANOMALY_SCAN_FRAME_DELAY_MS must be an integer number of milliseconds")
            })?;
            self.scan.frame_delay = Duration::from_millis(millis);
        }
        if let Ok(policy) = std::env::var("ANOMALY_SCAN_ON_FRAME_ERROR") {
            self.scan.on_frame_error = policy
                .parse()
                .context("invalid ANOMALY_SCAN_ON_FRAME_ERROR")?;
        }
        if let Ok(fonts) = std::env::var("ANOMALY_SCAN_FONTS") {
            let parsed = split_csv(&fonts);
            if !parsed.is_empty() {
                self.overlay.fonts = parsed.into_iter().map(PathBuf::from).collect();
            }
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.model.path.trim().is_empty() {
            return Err(anyhow!("model path must not be empty"));
        }
        if self.model.input_width == 0 || self.model.input_height == 0 {
            return Err(anyhow!("model input dimensions must be greater than zero"));
        }
        if !(0.0..=1.0).contains(&self.model.confidence_threshold) {
            return Err(anyhow!("confidence_threshold must be within [0, 1]"));
        }
        if !(0.0..=1.0).contains(&self.model.iou_threshold) {
            return Err(anyhow!("iou_threshold must be within [0, 1]"));
        }
        if self.overlay.stroke_width == 0 {
            return Err(anyhow!("stroke_width must be at least 1"));
        }
        let text_size = self.overlay.text_size;
        if !text_size.is_finite() || text_size <= 0.0 || text_size > MAX_TEXT_SIZE {
            return Err(anyhow!("text_size must be within (0, {MAX_TEXT_SIZE}]"));
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<ScanConfigFile> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    let is_toml = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("toml"));
    let cfg = if is_toml {
        toml::from_str(&raw)
            .with_context(|| format!("invalid config file {}", path.display()))?
    } else {
        serde_json::from_str(&raw)
            .with_context(|| format!("invalid config file {}", path.display()))?
    };
    Ok(cfg)
}

fn split_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|entry| entry.trim())
        .filter(|entry| !entry.is_empty())
        .map(|entry| entry.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_parses_case_insensitively() {
        assert_eq!("SKIP".parse::<FrameErrorPolicy>().unwrap(), FrameErrorPolicy::Skip);
        assert_eq!(" abort ".parse::<FrameErrorPolicy>().unwrap(), FrameErrorPolicy::Abort);
        assert!("retry".parse::<FrameErrorPolicy>().is_err());
    }

    #[test]
    fn partial_sections_keep_defaults() {
        let file: ScanConfigFile = serde_json::from_str(
            r#"{ "overlay": { "stroke_width": 4 }, "classes": { "0": "异常", "3": "loitering" } }"#,
        )
        .unwrap();
        let cfg = ScanConfig::from_file(file).unwrap();
        assert_eq!(cfg.overlay.stroke_width, 4);
        assert_eq!(cfg.overlay.box_color, DEFAULT_BOX_COLOR);
        assert_eq!(cfg.overlay.label_offset, DEFAULT_LABEL_OFFSET);
        assert_eq!(cfg.model.path, DEFAULT_MODEL_PATH);
        assert_eq!(cfg.classes.name(0), "异常");
        assert_eq!(cfg.classes.name(3), "loitering");
        assert_eq!(cfg.classes.name(1), "class 1");
    }

    #[test]
    fn rejects_non_numeric_class_ids() {
        let file: ScanConfigFile =
            serde_json::from_str(r#"{ "classes": { "zero": "anomaly" } }"#).unwrap();
        assert!(ScanConfig::from_file(file).is_err());
    }

    #[test]
    fn unknown_key_sets_the_fallback_template() {
        let file: ScanConfigFile = serde_json::from_str(
            r#"{ "classes": { "0": "anomaly", "unknown": "id-{id}" } }"#,
        )
        .unwrap();
        let cfg = ScanConfig::from_file(file).unwrap();
        assert_eq!(cfg.classes.name(0), "anomaly");
        assert_eq!(cfg.classes.name(7), "id-7");
        assert_eq!(cfg.classes.len(), 1);
    }

    #[test]
    fn validate_bounds_text_size() {
        let mut cfg = ScanConfig::default();
        for bad in [0.0, -3.0, f32::NAN, f32::INFINITY, 1e9, MAX_TEXT_SIZE + 1.0] {
            cfg.overlay.text_size = bad;
            assert!(cfg.validate().is_err(), "text_size {bad} accepted");
        }
        cfg.overlay.text_size = MAX_TEXT_SIZE;
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn validate_rejects_zero_stroke() {
        let mut cfg = ScanConfig::default();
        cfg.overlay.stroke_width = 0;
        assert!(cfg.validate().is_err());
    }
}
