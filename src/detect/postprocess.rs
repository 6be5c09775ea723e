//! Decoding of YOLO-style detector heads.
//!
//! The head is a `[4 + classes, anchors]` matrix: rows 0..4 hold the box
//! centre and size in model-input pixels, the remaining rows hold one score
//! per class. Decoding keeps the best class per anchor, filters by score,
//! runs per-class NMS and maps boxes back through the letterbox transform.

use std::cmp::Ordering;

use crate::detect::result::{BoundingBox, Detection};
use crate::error::{Result, ScanError};

/// Letterbox transform applied to the frame before inference.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Letterbox {
    pub scale: f32,
    pub pad_x: f32,
    pub pad_y: f32,
}

impl Letterbox {
    /// Fit a `src_w` x `src_h` frame into a `dst_w` x `dst_h` input, centred.
    pub fn fit(src_w: u32, src_h: u32, dst_w: u32, dst_h: u32) -> Self {
        let scale = (dst_w as f32 / src_w.max(1) as f32).min(dst_h as f32 / src_h.max(1) as f32);
        let new_w = (src_w as f32 * scale).round();
        let new_h = (src_h as f32 * scale).round();
        Self {
            scale,
            pad_x: ((dst_w as f32 - new_w) / 2.0).floor(),
            pad_y: ((dst_h as f32 - new_h) / 2.0).floor(),
        }
    }

    fn unmap(&self, x: f32, y: f32) -> (f32, f32) {
        let scale = if self.scale > 0.0 { self.scale } else { 1.0 };
        ((x - self.pad_x) / scale, (y - self.pad_y) / scale)
    }
}

#[derive(Clone, Copy, Debug)]
pub struct DecodeConfig {
    pub confidence_threshold: f32,
    pub iou_threshold: f32,
}

#[derive(Clone, Copy, Debug)]
struct Candidate {
    x1: f32,
    y1: f32,
    x2: f32,
    y2: f32,
    score: f32,
    class_id: u32,
}

impl Candidate {
    fn area(&self) -> f32 {
        (self.x2 - self.x1).max(0.0) * (self.y2 - self.y1).max(0.0)
    }

    fn iou(&self, other: &Self) -> f32 {
        let w = (self.x2.min(other.x2) - self.x1.max(other.x1)).max(0.0);
        let h = (self.y2.min(other.y2) - self.y1.max(other.y1)).max(0.0);
        let intersection = w * h;
        if intersection <= 0.0 {
            return 0.0;
        }
        let union = self.area() + other.area() - intersection;
        if union <= 0.0 {
            0.0
        } else {
            intersection / union
        }
    }
}

/// Decode a row-major `[attrs, anchors]` head into detections.
pub fn decode_yolo_head(
    data: &[f32],
    attrs: usize,
    anchors: usize,
    letterbox: Letterbox,
    config: &DecodeConfig,
) -> Result<Vec<Detection>> {
    if attrs < 5 {
        return Err(ScanError::inference(format!(
            "detector head must have at least 5 rows, got {attrs}"
        )));
    }
    let expected = attrs
        .checked_mul(anchors)
        .ok_or_else(|| ScanError::inference("detector head dimensions overflow"))?;
    if data.len() != expected {
        return Err(ScanError::inference(format!(
            "detector head holds {} values, expected {}",
            data.len(),
            expected
        )));
    }

    let at = |row: usize, anchor: usize| data[row * anchors + anchor];
    let mut candidates = Vec::new();
    for anchor in 0..anchors {
        let (class_id, score) = (4..attrs)
            .map(|row| ((row - 4) as u32, at(row, anchor)))
            .fold((0u32, f32::NEG_INFINITY), |best, cur| {
                if cur.1 > best.1 {
                    cur
                } else {
                    best
                }
            });
        if !score.is_finite() || score < config.confidence_threshold {
            continue;
        }
        let (cx, cy, w, h) = (at(0, anchor), at(1, anchor), at(2, anchor), at(3, anchor));
        if w <= 0.0 || h <= 0.0 {
            continue;
        }
        let (x1, y1) = letterbox.unmap(cx - w / 2.0, cy - h / 2.0);
        let (x2, y2) = letterbox.unmap(cx + w / 2.0, cy + h / 2.0);
        candidates.push(Candidate {
            x1,
            y1,
            x2,
            y2,
            score,
            class_id,
        });
    }

    candidates.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    let kept = non_max_suppression(candidates, config.iou_threshold);

    Ok(kept
        .into_iter()
        .map(|c| {
            Detection::new(
                BoundingBox::new(
                    c.x1.round() as i32,
                    c.y1.round() as i32,
                    c.x2.round() as i32,
                    c.y2.round() as i32,
                ),
                c.score,
                c.class_id,
            )
        })
        .collect())
}

/// Greedy per-class NMS over score-sorted candidates.
fn non_max_suppression(candidates: Vec<Candidate>, threshold: f32) -> Vec<Candidate> {
    if threshold <= 0.0 {
        return candidates;
    }
    let mut kept: Vec<Candidate> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        let suppressed = kept
            .iter()
            .any(|k| k.class_id == candidate.class_id && k.iou(&candidate) > threshold);
        if !suppressed {
            kept.push(candidate);
        }
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: DecodeConfig = DecodeConfig {
        confidence_threshold: 0.25,
        iou_threshold: 0.45,
    };

    fn head(columns: &[[f32; 6]]) -> Vec<f32> {
        // columns are (cx, cy, w, h, score0, score1); head is row-major [6, n].
        let n = columns.len();
        let mut data = vec![0.0; 6 * n];
        for (anchor, col) in columns.iter().enumerate() {
            for (row, value) in col.iter().enumerate() {
                data[row * n + anchor] = *value;
            }
        }
        data
    }

    #[test]
    fn letterbox_centres_wide_frames() {
        let lb = Letterbox::fit(1280, 720, 640, 640);
        assert_eq!(lb.scale, 0.5);
        assert_eq!(lb.pad_x, 0.0);
        assert_eq!(lb.pad_y, 140.0);
    }

    #[test]
    fn decodes_best_class_and_unmaps_boxes() {
        let data = head(&[[320.0, 320.0, 100.0, 50.0, 0.1, 0.9]]);
        let lb = Letterbox::fit(1280, 720, 640, 640);
        let dets = decode_yolo_head(&data, 6, 1, lb, &CONFIG).unwrap();
        assert_eq!(dets.len(), 1);
        assert_eq!(dets[0].class_id, 1);
        assert_eq!(dets[0].bbox, BoundingBox::new(540, 310, 740, 410));
    }

    #[test]
    fn drops_low_scores_and_overlaps() {
        let data = head(&[
            [100.0, 100.0, 40.0, 40.0, 0.80, 0.0],
            [102.0, 101.0, 40.0, 40.0, 0.70, 0.0],
            [102.0, 101.0, 40.0, 40.0, 0.0, 0.60],
            [400.0, 400.0, 40.0, 40.0, 0.10, 0.05],
        ]);
        let lb = Letterbox::fit(640, 640, 640, 640);
        let dets = decode_yolo_head(&data, 6, 4, lb, &CONFIG).unwrap();
        assert_eq!(dets.len(), 2);
        assert_eq!(dets[0].class_id, 0);
        assert!((dets[0].confidence - 0.80).abs() < 1e-6);
        // Same box, different class survives per-class NMS.
        assert_eq!(dets[1].class_id, 1);
    }

    #[test]
    fn rejects_mismatched_head() {
        let lb = Letterbox::fit(10, 10, 10, 10);
        let err = decode_yolo_head(&[0.0; 5], 6, 1, lb, &CONFIG).unwrap_err();
        assert!(matches!(err, ScanError::InferenceFailed(_)));
    }
}
