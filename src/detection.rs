use crate::geometry::BoundingBox;

/// One kept detection: the atomic unit written to the detection log.
///
/// Built by the selector and never mutated afterwards.
#[derive(Clone, Debug, PartialEq)]
pub struct Detection {
    frame_id: String,
    class_label: String,
    bbox: BoundingBox,
    score: f32,
    features: Vec<f32>,
}

impl Detection {
    pub fn new(
        frame_id: impl Into<String>,
        class_label: impl Into<String>,
        bbox: BoundingBox,
        score: f32,
        features: Vec<f32>,
    ) -> Self {
        Self {
            frame_id: frame_id.into(),
            class_label: class_label.into(),
            bbox,
            score,
            features,
        }
    }

    pub fn frame_id(&self) -> &str {
        &self.frame_id
    }

    pub fn class_label(&self) -> &str {
        &self.class_label
    }

    pub fn bbox(&self) -> &BoundingBox {
        &self.bbox
    }

    pub fn score(&self) -> f32 {
        self.score
    }

    pub fn features(&self) -> &[f32] {
        &self.features
    }
}
