//! Frame annotation pipeline.
//!
//! `FrameAnnotationPipeline::annotate` runs the detector on one frame and
//! returns a drawn-on copy of it:
//! - one hollow box per detection, in detector order
//! - one `"{name}: {confidence:.2}"` label above each box, kept on-frame
//!
//! The caller's frame is never modified. Detector failures propagate
//! unchanged and nothing is drawn.

mod glyphs;
mod text;

pub use text::LabelRenderer;

use image::{Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;

use crate::config::OverlaySettings;
use crate::detect::{BoundingBox, ClassTable, Detection, DetectorBackend};
use crate::error::Result;

/// Result of annotating one frame.
#[derive(Clone, Debug)]
pub struct AnnotatedFrame {
    /// Copy of the input frame with overlays drawn.
    pub pixels: RgbImage,
    /// Detections in detector order, boxes clamped to the frame.
    pub detections: Vec<Detection>,
    /// What was drawn, one entry per detection.
    pub overlays: Vec<Overlay>,
}

/// One drawn box and its label.
#[derive(Clone, Debug, PartialEq)]
pub struct Overlay {
    pub bbox: BoundingBox,
    pub text: String,
    /// Top-left corner of the label.
    pub anchor: (i32, i32),
}

#[derive(Clone, Copy, Debug)]
struct Style {
    box_color: Rgb<u8>,
    stroke_width: u32,
    label_color: Rgb<u8>,
    label_offset: i32,
}

pub struct FrameAnnotationPipeline {
    backend: Box<dyn DetectorBackend>,
    classes: ClassTable,
    style: Style,
    labels: LabelRenderer,
}

impl FrameAnnotationPipeline {
    /// Build a pipeline; fonts are resolved from `overlay.fonts` once here.
    pub fn new(
        backend: Box<dyn DetectorBackend>,
        classes: ClassTable,
        overlay: &OverlaySettings,
    ) -> Self {
        let labels = LabelRenderer::load(&overlay.fonts, overlay.text_size);
        Self::with_label_renderer(backend, classes, overlay, labels)
    }

    pub fn with_label_renderer(
        backend: Box<dyn DetectorBackend>,
        classes: ClassTable,
        overlay: &OverlaySettings,
        labels: LabelRenderer,
    ) -> Self {
        Self {
            backend,
            classes,
            style: Style {
                box_color: Rgb(overlay.box_color),
                stroke_width: overlay.stroke_width.max(1),
                label_color: Rgb(overlay.label_color),
                label_offset: overlay.label_offset,
            },
            labels,
        }
    }

    pub fn classes(&self) -> &ClassTable {
        &self.classes
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn warm_up(&mut self) -> Result<()> {
        self.backend.warm_up()
    }

    pub fn annotate(&mut self, frame: &RgbImage) -> Result<AnnotatedFrame> {
        let (width, height) = frame.dimensions();
        let detections: Vec<Detection> = self
            .backend
            .detect(frame)?
            .into_iter()
            .map(|det| det.normalized(width, height))
            .collect();
        log::debug!(
            "{}: {} detections in {}x{} frame",
            self.backend.name(),
            detections.len(),
            width,
            height
        );

        let mut pixels = frame.clone();
        let mut overlays = Vec::with_capacity(detections.len());
        for det in &detections {
            self.draw_box(&mut pixels, det.bbox);
            let text = self.classes.label(det);
            let anchor = self.label_anchor(&text, det.bbox, width, height);
            self.labels
                .draw(&mut pixels, &text, anchor.0, anchor.1, self.style.label_color);
            overlays.push(Overlay {
                bbox: det.bbox,
                text,
                anchor,
            });
        }

        Ok(AnnotatedFrame {
            pixels,
            detections,
            overlays,
        })
    }

    /// Stroke grows inward from the box edge.
    fn draw_box(&self, image: &mut RgbImage, bbox: BoundingBox) {
        let (w, h) = (bbox.width(), bbox.height());
        for inset in 0..self.style.stroke_width {
            let (Some(iw), Some(ih)) = (
                w.checked_sub(2 * inset).filter(|v| *v > 0),
                h.checked_sub(2 * inset).filter(|v| *v > 0),
            ) else {
                break;
            };
            let rect = Rect::at(bbox.x1 + inset as i32, bbox.y1 + inset as i32).of_size(iw, ih);
            draw_hollow_rect_mut(image, rect, self.style.box_color);
        }
    }

    fn label_anchor(&self, text: &str, bbox: BoundingBox, width: u32, height: u32) -> (i32, i32) {
        let (text_w, text_h) = self.labels.measure(text);
        let max_x = width.saturating_sub(text_w) as i32;
        let max_y = height.saturating_sub(text_h) as i32;
        let x = bbox.x1.clamp(0, max_x);
        let y = (bbox.y1 - self.style.label_offset).clamp(0, max_y);
        (x, y)
    }
}
