/// Axis-aligned box in pixel coordinates, corners inclusive.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BoundingBox {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl BoundingBox {
    pub fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn width(&self) -> u32 {
        (self.x2 - self.x1).unsigned_abs() + 1
    }

    pub fn height(&self) -> u32 {
        (self.y2 - self.y1).unsigned_abs() + 1
    }

    /// Orders the corners and clamps them into a `width` x `height` frame.
    pub fn clamped(self, width: u32, height: u32) -> Self {
        let max_x = width.saturating_sub(1).min(i32::MAX as u32) as i32;
        let max_y = height.saturating_sub(1).min(i32::MAX as u32) as i32;
        let (x1, x2) = (self.x1.min(self.x2), self.x1.max(self.x2));
        let (y1, y2) = (self.y1.min(self.y2), self.y1.max(self.y2));
        Self {
            x1: x1.clamp(0, max_x),
            y1: y1.clamp(0, max_y),
            x2: x2.clamp(0, max_x),
            y2: y2.clamp(0, max_y),
        }
    }
}

/// One detected region in one frame.
#[derive(Clone, Debug, PartialEq)]
pub struct Detection {
    pub bbox: BoundingBox,
    /// Confidence in `[0, 1]`.
    pub confidence: f32,
    /// Key into the class table.
    pub class_id: u32,
}

impl Detection {
    pub fn new(bbox: BoundingBox, confidence: f32, class_id: u32) -> Self {
        Self {
            bbox,
            confidence,
            class_id,
        }
    }

    /// Clamps the box into the frame and the confidence into `[0, 1]`.
    pub(crate) fn normalized(self, width: u32, height: u32) -> Self {
        let confidence = if self.confidence.is_finite() {
            self.confidence.clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self {
            bbox: self.bbox.clamped(width, height),
            confidence,
            class_id: self.class_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamped_orders_and_bounds_corners() {
        let bbox = BoundingBox::new(90, -5, 10, 200).clamped(64, 48);
        assert_eq!(bbox, BoundingBox::new(10, 0, 63, 47));
        assert_eq!(bbox.width(), 54);
        assert_eq!(bbox.height(), 48);
    }

    #[test]
    fn normalized_clamps_confidence() {
        let det = Detection::new(BoundingBox::new(0, 0, 4, 4), 1.7, 0).normalized(10, 10);
        assert_eq!(det.confidence, 1.0);

        let det = Detection::new(BoundingBox::new(0, 0, 4, 4), f32::NAN, 1).normalized(10, 10);
        assert_eq!(det.confidence, 0.0);
        assert_eq!(det.class_id, 1);
    }
}
