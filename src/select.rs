//! Per-class selection of a frame's detections.
//!
//! For every declared class except background (index 0), the class's boxes and
//! scores across all regions go through NMS first; only the kept indices are then
//! filtered by the confidence threshold. Each survivor carries the pooled feature
//! vector of its original region.

use crate::detect::RegionOutputs;
use crate::detection::Detection;
use crate::error::{PipelineError, Result};
use crate::geometry::BoundingBox;
use crate::nms::non_max_suppress;

/// Selection settings. Every value is supplied by the caller.
#[derive(Clone, Debug, PartialEq)]
pub struct SelectionParams {
    classes: Vec<String>,
    nms_iou_threshold: f32,
    confidence_threshold: f32,
}

impl SelectionParams {
    /// `classes` is the ordered label list; index 0 is background and is never emitted.
    pub fn new(
        classes: Vec<String>,
        nms_iou_threshold: f32,
        confidence_threshold: f32,
    ) -> Result<Self> {
        if classes.len() < 2 {
            return Err(PipelineError::Config(
                "class list needs background plus at least one class".to_string(),
            ));
        }
        check_unit_interval("nms IoU threshold", nms_iou_threshold)?;
        check_unit_interval("confidence threshold", confidence_threshold)?;
        Ok(Self {
            classes,
            nms_iou_threshold,
            confidence_threshold,
        })
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn nms_iou_threshold(&self) -> f32 {
        self.nms_iou_threshold
    }

    pub fn confidence_threshold(&self) -> f32 {
        self.confidence_threshold
    }
}

fn check_unit_interval(name: &str, value: f32) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(PipelineError::Config(format!(
            "{name} must be within [0, 1], got {value}"
        )))
    }
}

/// Boxes and scores of one class for one frame, index-aligned with the regions.
#[derive(Clone, Debug)]
pub struct ClassCandidateSet<'a> {
    pub class_index: usize,
    pub label: &'a str,
    pub boxes: Vec<BoundingBox>,
    pub scores: Vec<f32>,
}

impl<'a> ClassCandidateSet<'a> {
    pub fn from_outputs(outputs: &RegionOutputs, class_index: usize, label: &'a str) -> Self {
        Self {
            class_index,
            label,
            boxes: outputs.class_boxes(class_index),
            scores: outputs.class_scores(class_index).to_vec(),
        }
    }

    /// Region indices that survive NMS and then the confidence threshold, in NMS order.
    pub fn select(&self, nms_iou_threshold: f32, confidence_threshold: f32) -> Vec<usize> {
        let kept = non_max_suppress(&self.boxes, &self.scores, nms_iou_threshold);
        kept.into_iter()
            .filter(|&region| self.scores[region] >= confidence_threshold)
            .collect()
    }
}

/// Kept region indices for a single class.
pub fn select_class(
    outputs: &RegionOutputs,
    class_index: usize,
    params: &SelectionParams,
) -> Result<Vec<usize>> {
    check_class_count(outputs, params)?;
    let label = params.classes.get(class_index).ok_or_else(|| {
        PipelineError::Config(format!(
            "class index {} is out of range for {} classes",
            class_index,
            params.classes.len()
        ))
    })?;
    Ok(ClassCandidateSet::from_outputs(outputs, class_index, label)
        .select(params.nms_iou_threshold, params.confidence_threshold))
}

fn check_class_count(outputs: &RegionOutputs, params: &SelectionParams) -> Result<()> {
    if outputs.num_classes() != params.classes.len() {
        return Err(PipelineError::Config(format!(
            "detector produced {} classes but {} are configured",
            outputs.num_classes(),
            params.classes.len()
        )));
    }
    Ok(())
}

/// Selects every detection of one frame, in class-list order then NMS order.
///
/// A frame with no survivors yields an empty vector. A surviving box with a
/// non-finite corner makes the whole frame a [`PipelineError::CorruptFrame`].
pub fn select_frame(
    frame_id: &str,
    outputs: &RegionOutputs,
    params: &SelectionParams,
) -> Result<Vec<Detection>> {
    check_class_count(outputs, params)?;

    let mut detections = Vec::new();
    for (class_index, label) in params.classes.iter().enumerate().skip(1) {
        let candidates = ClassCandidateSet::from_outputs(outputs, class_index, label);
        let survivors = candidates.select(params.nms_iou_threshold, params.confidence_threshold);
        if !survivors.is_empty() {
            log::debug!(
                "frame {}: class '{}' kept {} of {} regions",
                frame_id,
                label,
                survivors.len(),
                candidates.scores.len()
            );
        }
        for region in survivors {
            let bbox = candidates.boxes[region];
            if !bbox.is_finite() {
                return Err(PipelineError::CorruptFrame {
                    frame_id: frame_id.to_string(),
                    reason: format!(
                        "class '{}' region {} has a non-finite box {:?}",
                        label,
                        region,
                        bbox.corners()
                    ),
                });
            }
            detections.push(Detection::new(
                frame_id,
                label.as_str(),
                bbox,
                candidates.scores[region],
                outputs.region_features(region).to_vec(),
            ));
        }
    }
    Ok(detections)
}
