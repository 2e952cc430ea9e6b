//! Greedy non-maximum suppression over a single class's candidates.

use std::cmp::Ordering;

use crate::geometry::{iou, BoundingBox};

/// Returns the indices of the candidates that survive suppression, highest score first.
///
/// Candidates are visited by descending score; equal scores keep their original
/// relative order, so the earlier index wins a tie. Each accepted candidate removes
/// every remaining candidate whose IoU with it is strictly greater than
/// `iou_threshold`. NaN scores are ranked below every finite score.
///
/// `boxes` and `scores` must be index-aligned.
pub fn non_max_suppress(boxes: &[BoundingBox], scores: &[f32], iou_threshold: f32) -> Vec<usize> {
    debug_assert_eq!(boxes.len(), scores.len(), "boxes and scores must be aligned");
    let n = boxes.len().min(scores.len());
    if n == 0 {
        return Vec::new();
    }

    let mut order: Vec<usize> = (0..n).collect();
    // `sort_by` is stable: ties stay in ascending index order.
    order.sort_by(|&a, &b| {
        rank_key(scores[b])
            .partial_cmp(&rank_key(scores[a]))
            .unwrap_or(Ordering::Equal)
    });

    let mut suppressed = vec![false; n];
    let mut keep = Vec::new();

    for (pos, &current) in order.iter().enumerate() {
        if suppressed[current] {
            continue;
        }
        keep.push(current);

        for &candidate in &order[pos + 1..] {
            if suppressed[candidate] {
                continue;
            }
            if iou(&boxes[current], &boxes[candidate]) > iou_threshold {
                suppressed[candidate] = true;
            }
        }
    }

    keep
}

fn rank_key(score: f32) -> f32 {
    if score.is_nan() {
        f32::NEG_INFINITY
    } else {
        score
    }
}
