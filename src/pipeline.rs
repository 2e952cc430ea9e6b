//! Per-frame detection stage and the run loop around it.
//!
//! Each frame goes through `Detector::infer` -> `select_frame` -> `FrameWriter`.
//! The selector finishes before anything is written, and the writer commits a
//! frame in one write, so a frame that fails leaves no lines behind.
//! Aggregation is a separate call made once the loop is done.

use std::time::Instant;

use serde::Serialize;

use crate::detect::Detector;
use crate::error::{PipelineError, Result};
use crate::frames::Frame;
use crate::select::{select_frame, SelectionParams};
use crate::writer::FrameWriter;

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct SkippedFrame {
    pub frame_id: String,
    pub reason: String,
}

#[derive(Clone, Debug, Default, Serialize, PartialEq, Eq)]
pub struct RunSummary {
    pub frames_total: usize,
    pub frames_processed: usize,
    pub detections_written: u64,
    pub skipped_frames: Vec<SkippedFrame>,
}

/// What happened to one frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FrameOutcome {
    Written(usize),
    Skipped(String),
}

pub struct Pipeline<D: Detector> {
    detector: D,
    params: SelectionParams,
    feature_dim: usize,
    writer: FrameWriter,
}

impl<D: Detector> Pipeline<D> {
    pub fn new(
        detector: D,
        params: SelectionParams,
        feature_dim: usize,
        writer: FrameWriter,
    ) -> Result<Self> {
        if feature_dim == 0 {
            return Err(PipelineError::Config(
                "feature dimensionality must be greater than zero".to_string(),
            ));
        }
        Ok(Self {
            detector,
            params,
            feature_dim,
            writer,
        })
    }

    /// Detects, selects and writes one frame. Returns the number of lines appended.
    pub fn process_frame(&mut self, frame: &Frame) -> Result<usize> {
        let started = Instant::now();
        let outputs = self.detector.infer(frame)?;
        log::info!(
            "frame {}: {} took {:.3}s for {} object proposals",
            frame.id(),
            self.detector.name(),
            started.elapsed().as_secs_f64(),
            outputs.num_regions()
        );

        if outputs.feature_dim() != self.feature_dim {
            return Err(PipelineError::Config(format!(
                "detector produced {}-dimensional features but {} are configured",
                outputs.feature_dim(),
                self.feature_dim
            )));
        }

        let detections = select_frame(frame.id(), &outputs, &self.params)?;
        self.writer.write_frame(&detections)
    }

    /// Processes frames in order. Missing or unreadable frames are skipped and
    /// reported; any other failure stops the run.
    pub fn run(&mut self, frames: &[Frame]) -> Result<RunSummary> {
        self.run_with(frames, |_, _| {})
    }

    /// Like [`Pipeline::run`], calling `observer` after every frame.
    pub fn run_with<F>(&mut self, frames: &[Frame], mut observer: F) -> Result<RunSummary>
    where
        F: FnMut(&Frame, &FrameOutcome),
    {
        self.detector.warm_up()?;

        let mut summary = RunSummary {
            frames_total: frames.len(),
            ..RunSummary::default()
        };

        for frame in frames {
            let outcome = match self.process_frame(frame) {
                Ok(lines) => {
                    summary.frames_processed += 1;
                    summary.detections_written += lines as u64;
                    FrameOutcome::Written(lines)
                }
                Err(err) if err.is_recoverable() => {
                    log::warn!("skipping frame {}: {}", frame.id(), err);
                    summary.skipped_frames.push(SkippedFrame {
                        frame_id: frame.id().to_string(),
                        reason: err.to_string(),
                    });
                    FrameOutcome::Skipped(err.to_string())
                }
                Err(err) => return Err(err),
            };
            observer(frame, &outcome);
        }

        log::info!(
            "processed {}/{} frames, {} detections written to {} ({} lines since open)",
            summary.frames_processed,
            summary.frames_total,
            summary.detections_written,
            self.writer.path().display(),
            self.writer.lines_written()
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::RegionOutputs;
    use ndarray::Array2;
    use std::collections::HashMap;

    /// Detector backed by a map of frame id -> outputs; unknown ids are missing.
    struct MapDetector {
        outputs: HashMap<String, RegionOutputs>,
        corrupt: Vec<String>,
    }

    impl Detector for MapDetector {
        fn name(&self) -> &'static str {
            "map"
        }

        fn infer(&mut self, frame: &Frame) -> Result<RegionOutputs> {
            if self.corrupt.iter().any(|id| id == frame.id()) {
                return Err(PipelineError::CorruptFrame {
                    frame_id: frame.id().to_string(),
                    reason: "truncated image".to_string(),
                });
            }
            self.outputs
                .get(frame.id())
                .cloned()
                .ok_or_else(|| PipelineError::input_not_found(frame.path()))
        }
    }

    fn outputs(score: f32, feature_dim: usize) -> RegionOutputs {
        let mut scores = Array2::<f32>::zeros((1, 2));
        scores[[0, 1]] = score;
        let mut boxes = Array2::<f32>::zeros((1, 8));
        boxes[[0, 6]] = 10.0;
        boxes[[0, 7]] = 10.0;
        RegionOutputs::new(scores, boxes, Array2::from_elem((1, feature_dim), 0.5)).unwrap()
    }

    fn params() -> SelectionParams {
        SelectionParams::new(vec!["__background__".into(), "shirt".into()], 0.3, 0.8).unwrap()
    }

    fn frames(ids: &[&str]) -> Vec<Frame> {
        ids.iter()
            .map(|id| Frame::from_path(format!("{id}.jpg")).unwrap())
            .collect()
    }

    #[test]
    fn skips_missing_and_corrupt_frames() {
        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("det.txt");
        let detector = MapDetector {
            outputs: HashMap::from([
                ("1".to_string(), outputs(0.9, 3)),
                ("3".to_string(), outputs(0.95, 3)),
                ("4".to_string(), outputs(0.1, 3)),
            ]),
            corrupt: vec!["3".to_string()],
        };
        let writer = FrameWriter::open(&log_path).unwrap();
        let mut pipeline = Pipeline::new(detector, params(), 3, writer).unwrap();

        let mut seen = Vec::new();
        let summary = pipeline
            .run_with(&frames(&["1", "2", "3", "4"]), |frame, outcome| {
                seen.push((frame.id().to_string(), outcome.clone()));
            })
            .unwrap();

        assert_eq!(summary.frames_total, 4);
        assert_eq!(summary.frames_processed, 2);
        assert_eq!(summary.detections_written, 1);
        let skipped: Vec<&str> = summary
            .skipped_frames
            .iter()
            .map(|s| s.frame_id.as_str())
            .collect();
        assert_eq!(skipped, vec!["2", "3"]);
        assert_eq!(seen[0].1, FrameOutcome::Written(1));
        assert_eq!(seen[3].1, FrameOutcome::Written(0));

        let content = std::fs::read_to_string(&log_path).unwrap();
        assert_eq!(content, "1 -1 0 0 10 10 0.90 -1 -1 -1 0.50 0.50 0.50\n");
    }

    #[test]
    fn frame_with_non_finite_box_is_skipped_without_output() {
        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("det.txt");
        let mut scores = Array2::<f32>::zeros((1, 2));
        scores[[0, 1]] = 0.9;
        let mut boxes = Array2::<f32>::zeros((1, 8));
        boxes[[0, 4]] = f32::NAN;
        boxes[[0, 6]] = 10.0;
        boxes[[0, 7]] = 10.0;
        let broken = RegionOutputs::new(scores, boxes, Array2::zeros((1, 2))).unwrap();

        let detector = MapDetector {
            outputs: HashMap::from([
                ("5".to_string(), broken),
                ("6".to_string(), outputs(0.9, 2)),
            ]),
            corrupt: Vec::new(),
        };
        let writer = FrameWriter::open(&log_path).unwrap();
        let mut pipeline = Pipeline::new(detector, params(), 2, writer).unwrap();
        let summary = pipeline.run(&frames(&["5", "6"])).unwrap();

        assert_eq!(summary.frames_processed, 1);
        assert_eq!(summary.skipped_frames[0].frame_id, "5");
        let content = std::fs::read_to_string(&log_path).unwrap();
        assert_eq!(content, "6 -1 0 0 10 10 0.90 -1 -1 -1 0.50 0.50\n");
    }

    #[test]
    fn feature_dim_mismatch_aborts_the_run() {
        let dir = tempfile::tempdir().unwrap();
        let detector = MapDetector {
            outputs: HashMap::from([("1".to_string(), outputs(0.9, 5))]),
            corrupt: Vec::new(),
        };
        let writer = FrameWriter::open(dir.path().join("det.txt")).unwrap();
        let mut pipeline = Pipeline::new(detector, params(), 3, writer).unwrap();

        let err = pipeline.run(&frames(&["1"])).unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));
        assert_eq!(std::fs::read_to_string(dir.path().join("det.txt")).unwrap(), "");
    }

    #[test]
    fn zero_feature_dim_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let detector = MapDetector {
            outputs: HashMap::new(),
            corrupt: Vec::new(),
        };
        let writer = FrameWriter::open(dir.path().join("det.txt")).unwrap();
        assert!(Pipeline::new(detector, params(), 0, writer).is_err());
    }
}
