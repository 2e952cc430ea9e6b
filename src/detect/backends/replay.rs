//! Replay backend: serves detector outputs that were computed ahead of time.
//!
//! Each frame `<dir>/<frame_id>.npz` holds three `f32` arrays as written by
//! `numpy.savez`: `scores` `[regions, classes]`, `boxes` `[regions, classes * 4]`
//! and `features` `[regions, feature_dim]`.

use std::fs::File;
use std::io::{Read, Seek};
use std::path::{Path, PathBuf};

use ndarray::Array2;
use ndarray_npy::NpzReader;

use crate::detect::backend::Detector;
use crate::detect::output::RegionOutputs;
use crate::error::{PipelineError, Result};
use crate::frames::Frame;

pub const SCORES_ARRAY: &str = "scores";
pub const BOXES_ARRAY: &str = "boxes";
pub const FEATURES_ARRAY: &str = "features";

pub struct ReplayDetector {
    outputs_dir: PathBuf,
    require_frame_file: bool,
}

impl ReplayDetector {
    pub fn new(outputs_dir: impl Into<PathBuf>) -> Self {
        Self {
            outputs_dir: outputs_dir.into(),
            require_frame_file: true,
        }
    }

    /// Serve outputs even when the frame image itself is gone.
    pub fn without_frame_check(mut self) -> Self {
        self.require_frame_file = false;
        self
    }

    pub fn outputs_path(&self, frame: &Frame) -> PathBuf {
        self.outputs_dir.join(format!("{}.npz", frame.id()))
    }
}

impl Detector for ReplayDetector {
    fn name(&self) -> &'static str {
        "replay"
    }

    fn infer(&mut self, frame: &Frame) -> Result<RegionOutputs> {
        if self.require_frame_file && !frame.path().is_file() {
            return Err(PipelineError::input_not_found(frame.path()));
        }
        let path = self.outputs_path(frame);
        let file = File::open(&path).map_err(|e| PipelineError::io(&path, e))?;
        read_outputs(file, frame.id(), &path)
    }
}

fn read_outputs<R: Read + Seek>(reader: R, frame_id: &str, path: &Path) -> Result<RegionOutputs> {
    let corrupt = |reason: String| PipelineError::CorruptFrame {
        frame_id: frame_id.to_string(),
        reason: format!("{}: {}", path.display(), reason),
    };

    let mut npz = NpzReader::new(reader).map_err(|e| corrupt(e.to_string()))?;
    let names = npz.names().map_err(|e| corrupt(e.to_string()))?;

    let mut load = |array: &str| -> Result<Array2<f32>> {
        let entry = names
            .iter()
            .find(|name| {
                name.as_str() == array || name.strip_suffix(".npy") == Some(array)
            })
            .ok_or_else(|| corrupt(format!("missing array '{array}'")))?;
        npz.by_name(entry)
            .map_err(|e| corrupt(format!("array '{array}': {e}")))
    };

    let scores = load(SCORES_ARRAY)?;
    let boxes = load(BOXES_ARRAY)?;
    let features = load(FEATURES_ARRAY)?;

    RegionOutputs::new(scores, boxes, features).map_err(|e| corrupt(e.to_string()))
}
