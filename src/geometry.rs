use crate::error::{PipelineError, Result};

/// Axis-aligned box in image pixel coordinates.
///
/// Fields are private so a box cannot change after the detector produced it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    x1: f32,
    y1: f32,
    x2: f32,
    y2: f32,
}

impl BoundingBox {
    /// Builds a box, rejecting inverted or non-finite coordinates.
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Result<Self> {
        if ![x1, y1, x2, y2].iter().all(|v| v.is_finite()) {
            return Err(PipelineError::InvalidBox(format!(
                "box coordinates must be finite: ({x1}, {y1}, {x2}, {y2})"
            )));
        }
        if x1 > x2 || y1 > y2 {
            return Err(PipelineError::InvalidBox(format!(
                "box corners are inverted: ({x1}, {y1}, {x2}, {y2})"
            )));
        }
        Ok(Self { x1, y1, x2, y2 })
    }

    /// Builds a box without validation. The caller guarantees `x1 <= x2` and `y1 <= y2`.
    pub fn from_corners(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn corners(&self) -> [f32; 4] {
        [self.x1, self.y1, self.x2, self.y2]
    }

    /// False when any corner is NaN or infinite; such a box has no pixel position.
    pub fn is_finite(&self) -> bool {
        self.corners().iter().all(|v| v.is_finite())
    }

    pub fn area(&self) -> f32 {
        (self.x2 - self.x1).max(0.0) * (self.y2 - self.y1).max(0.0)
    }

    pub fn intersection_area(&self, other: &BoundingBox) -> f32 {
        let w = (self.x2.min(other.x2) - self.x1.max(other.x1)).max(0.0);
        let h = (self.y2.min(other.y2) - self.y1.max(other.y1)).max(0.0);
        w * h
    }
}

/// Intersection over union of two boxes, in `[0, 1]`.
///
/// Returns 0 for disjoint boxes and whenever the union has zero area.
pub fn iou(a: &BoundingBox, b: &BoundingBox) -> f32 {
    let intersection = a.intersection_area(b);
    if intersection <= 0.0 {
        return 0.0;
    }
    let union = a.area() + b.area() - intersection;
    if union > 0.0 {
        (intersection / union).clamp(0.0, 1.0)
    } else {
        0.0
    }
}
