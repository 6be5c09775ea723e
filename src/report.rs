//! Plain-text summary of one frame's detections.

use std::fmt::Write;

use crate::detect::{ClassTable, Detection};

pub const NO_DETECTIONS: &str = "No targets detected";

/// One line per detection, numbered from 1, in detector order.
pub fn detection_summary(detections: &[Detection], classes: &ClassTable) -> String {
    if detections.is_empty() {
        return NO_DETECTIONS.to_string();
    }
    let mut out = String::from("Detected the following:");
    for (i, det) in detections.iter().enumerate() {
        let _ = write!(
            out,
            "\n- target {}: {}, confidence {:.2}",
            i + 1,
            classes.name(det.class_id),
            det.confidence
        );
    }
    out
}
