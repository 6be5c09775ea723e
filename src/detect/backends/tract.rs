#![cfg(feature = "backend-tract")]

use std::path::Path;

use image::{imageops, imageops::FilterType, Rgb, RgbImage};
use tract_onnx::prelude::*;

use crate::config::ModelSettings;
use crate::detect::backend::DetectorBackend;
use crate::detect::postprocess::{decode_yolo_head, DecodeConfig, Letterbox};
use crate::detect::result::Detection;
use crate::error::{Result, ScanError};

type OnnxPlan = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

const LETTERBOX_FILL: Rgb<u8> = Rgb([114, 114, 114]);

/// Tract-based backend for YOLO-style ONNX detectors.
///
/// Loads a local model file once and runs it on letterboxed RGB frames.
pub struct TractBackend {
    model: OnnxPlan,
    width: u32,
    height: u32,
    decode: DecodeConfig,
}

impl TractBackend {
    /// Load an ONNX model from disk and prepare it for inference.
    pub fn new<P: AsRef<Path>>(model_path: P, settings: &ModelSettings) -> Result<Self> {
        let model_path = model_path.as_ref();
        let unavailable = |stage: &str, err: TractError| {
            ScanError::backend_unavailable(format!(
                "{stage} for {}: {err}",
                model_path.display()
            ))
        };
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .map_err(|e| unavailable("failed to load ONNX model", e))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(
                    f32::datum_type(),
                    tvec!(1, 3, settings.input_height as usize, settings.input_width as usize),
                ),
            )
            .map_err(|e| unavailable("failed to set input fact", e))?
            .into_optimized()
            .map_err(|e| unavailable("failed to optimize ONNX model", e))?
            .into_runnable()
            .map_err(|e| unavailable("failed to build runnable ONNX model", e))?;

        Ok(Self {
            model,
            width: settings.input_width,
            height: settings.input_height,
            decode: DecodeConfig {
                confidence_threshold: settings.confidence_threshold,
                iou_threshold: settings.iou_threshold,
            },
        })
    }

    fn build_input(&self, frame: &RgbImage) -> (Tensor, Letterbox) {
        let letterbox = Letterbox::fit(frame.width(), frame.height(), self.width, self.height);
        let new_w = ((frame.width() as f32 * letterbox.scale).round() as u32).clamp(1, self.width);
        let new_h = ((frame.height() as f32 * letterbox.scale).round() as u32).clamp(1, self.height);
        let resized = imageops::resize(frame, new_w, new_h, FilterType::Triangle);

        let mut canvas = RgbImage::from_pixel(self.width, self.height, LETTERBOX_FILL);
        imageops::overlay(
            &mut canvas,
            &resized,
            letterbox.pad_x as i64,
            letterbox.pad_y as i64,
        );

        let input = tract_ndarray::Array4::from_shape_fn(
            (1, 3, self.height as usize, self.width as usize),
            |(_, channel, y, x)| canvas.get_pixel(x as u32, y as u32)[channel] as f32 / 255.0,
        );
        (input.into_tensor(), letterbox)
    }
}

impl DetectorBackend for TractBackend {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn detect(&mut self, frame: &RgbImage) -> Result<Vec<Detection>> {
        if frame.width() == 0 || frame.height() == 0 {
            return Err(ScanError::inference("frame has zero dimensions"));
        }
        let (input, letterbox) = self.build_input(frame);
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .map_err(|e| ScanError::inference(format!("ONNX inference failed: {e}")))?;
        let output = outputs
            .first()
            .ok_or_else(|| ScanError::inference("model produced no outputs"))?;

        let (attrs, anchors) = match output.shape() {
            [1, attrs, anchors] => (*attrs, *anchors),
            [attrs, anchors] => (*attrs, *anchors),
            other => {
                return Err(ScanError::inference(format!(
                    "unexpected detector output shape {other:?}"
                )))
            }
        };
        let data = output
            .as_slice::<f32>()
            .map_err(|e| ScanError::inference(format!("model output is not f32: {e}")))?;

        decode_yolo_head(data, attrs, anchors, letterbox, &self.decode)
    }

    fn warm_up(&mut self) -> Result<()> {
        let blank = RgbImage::from_pixel(self.width, self.height, LETTERBOX_FILL);
        self.detect(&blank).map(|_| ())
    }
}
