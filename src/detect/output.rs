use ndarray::{s, Array2, ArrayView1};
use thiserror::Error;

use crate::geometry::BoundingBox;

/// Raw detector output for one frame.
///
/// Rows are regions (proposals). `scores` has one column per class, `boxes` four
/// columns per class (`x1 y1 x2 y2`), and `features` one pooled vector per region.
/// The feature vector belongs to the region, not to any class.
#[derive(Clone, Debug)]
pub struct RegionOutputs {
    scores: Array2<f32>,
    boxes: Array2<f32>,
    features: Array2<f32>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ShapeError {
    #[error("region count mismatch: scores={scores}, boxes={boxes}, features={features}")]
    RegionMismatch {
        scores: usize,
        boxes: usize,
        features: usize,
    },
    #[error("expected {expected} box columns for {classes} classes, found {found}")]
    BoxColumns {
        classes: usize,
        expected: usize,
        found: usize,
    },
}

impl RegionOutputs {
    pub fn new(
        scores: Array2<f32>,
        boxes: Array2<f32>,
        features: Array2<f32>,
    ) -> Result<Self, ShapeError> {
        if scores.nrows() != boxes.nrows() || scores.nrows() != features.nrows() {
            return Err(ShapeError::RegionMismatch {
                scores: scores.nrows(),
                boxes: boxes.nrows(),
                features: features.nrows(),
            });
        }
        let classes = scores.ncols();
        if boxes.ncols() != classes * 4 {
            return Err(ShapeError::BoxColumns {
                classes,
                expected: classes * 4,
                found: boxes.ncols(),
            });
        }
        Ok(Self {
            scores,
            boxes,
            features,
        })
    }

    pub fn num_regions(&self) -> usize {
        self.scores.nrows()
    }

    pub fn num_classes(&self) -> usize {
        self.scores.ncols()
    }

    pub fn feature_dim(&self) -> usize {
        self.features.ncols()
    }

    /// Score column of one class across all regions.
    pub fn class_scores(&self, class: usize) -> ArrayView1<'_, f32> {
        self.scores.column(class)
    }

    /// Boxes regressed for one class, one per region.
    pub fn class_boxes(&self, class: usize) -> Vec<BoundingBox> {
        let cols = self.boxes.slice(s![.., 4 * class..4 * class + 4]);
        cols.rows()
            .into_iter()
            .map(|row| BoundingBox::from_corners(row[0], row[1], row[2], row[3]))
            .collect()
    }

    /// Pooled feature vector of a region.
    pub fn region_features(&self, region: usize) -> ArrayView1<'_, f32> {
        self.features.row(region)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn accepts_aligned_outputs() {
        let scores = array![[0.1, 0.9], [0.5, 0.5]];
        let boxes = array![
            [0.0, 0.0, 1.0, 1.0, 10.0, 20.0, 30.0, 40.0],
            [0.0, 0.0, 1.0, 1.0, 50.0, 60.0, 70.0, 80.0]
        ];
        let features = array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]];
        let out = RegionOutputs::new(scores, boxes, features).unwrap();

        assert_eq!(out.num_regions(), 2);
        assert_eq!(out.num_classes(), 2);
        assert_eq!(out.feature_dim(), 3);
        assert_eq!(out.class_scores(1).to_vec(), vec![0.9, 0.5]);
        assert_eq!(out.class_boxes(1)[1].corners(), [50.0, 60.0, 70.0, 80.0]);
        assert_eq!(out.region_features(1).to_vec(), vec![4.0, 5.0, 6.0]);
    }

    #[test]
    fn rejects_region_mismatch() {
        let err = RegionOutputs::new(
            Array2::zeros((3, 2)),
            Array2::zeros((3, 8)),
            Array2::zeros((2, 4)),
        )
        .unwrap_err();
        assert_eq!(
            err,
            ShapeError::RegionMismatch {
                scores: 3,
                boxes: 3,
                features: 2
            }
        );
    }

    #[test]
    fn rejects_wrong_box_width() {
        let err = RegionOutputs::new(
            Array2::zeros((3, 2)),
            Array2::zeros((3, 4)),
            Array2::zeros((3, 4)),
        )
        .unwrap_err();
        assert_eq!(
            err,
            ShapeError::BoxColumns {
                classes: 2,
                expected: 8,
                found: 4
            }
        );
    }
}
