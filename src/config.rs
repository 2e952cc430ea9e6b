use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::aggregate::{default_outputs, AggregateRequest};
use crate::frames::FrameOptions;
use crate::select::SelectionParams;

const DEFAULT_NMS_IOU: f32 = 0.3;
const DEFAULT_CONFIDENCE: f32 = 0.8;

/// Label set of the clothing detector the log format was first used with.
pub const CLOTHING_CLASSES: &[&str] = &[
    "__background__",
    "sunglasses",
    "pants",
    "jeans",
    "shirt",
    "tie",
    "suit",
    "shoes",
    "skirt",
    "jacket",
    "dress",
    "coat",
    "shorts",
];

#[derive(Debug, Deserialize, Default)]
struct PipelineConfigFile {
    classes: Option<Vec<String>>,
    feature_dim: Option<usize>,
    log_path: Option<PathBuf>,
    thresholds: Option<ThresholdsConfigFile>,
    frames: Option<FramesConfigFile>,
    aggregate: Option<AggregateConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct ThresholdsConfigFile {
    nms_iou: Option<f32>,
    confidence: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
struct FramesConfigFile {
    sort: Option<bool>,
    extensions: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, Default)]
struct AggregateConfigFile {
    table_path: Option<PathBuf>,
    projection_path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub classes: Vec<String>,
    pub feature_dim: usize,
    pub log_path: PathBuf,
    pub nms_iou_threshold: f32,
    pub confidence_threshold: f32,
    pub frames: FrameOptions,
    pub table_path: Option<PathBuf>,
    pub projection_path: Option<PathBuf>,
}

impl PipelineConfig {
    /// Loads the config file named by `path`, or by `DETFEAT_CONFIG` when `path` is
    /// `None`, then applies environment overrides and validates the result.
    ///
    /// `classes`, `feature_dim` and `log_path` have no defaults; they must come from
    /// the file or the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let cfg = Self::resolve(path)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// File and environment layers without validation. Callers with further
    /// overrides (command-line flags) apply them and then call [`Self::validate`].
    pub fn resolve(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(path) => Some(path.to_path_buf()),
            None => std::env::var("DETFEAT_CONFIG").ok().map(PathBuf::from),
        };
        let file_cfg = match config_path.as_deref() {
            Some(path) => read_config_file(path)?,
            None => PipelineConfigFile::default(),
        };
        let mut cfg = Self::from_file(file_cfg);
        cfg.apply_env()?;
        Ok(cfg)
    }

    fn from_file(file: PipelineConfigFile) -> Self {
        let thresholds = file.thresholds.unwrap_or_default();
        let frames = file.frames.unwrap_or_default();
        let frame_defaults = FrameOptions::default();
        let aggregate = file.aggregate.unwrap_or_default();
        Self {
            classes: file.classes.unwrap_or_default(),
            feature_dim: file.feature_dim.unwrap_or(0),
            log_path: file.log_path.unwrap_or_default(),
            nms_iou_threshold: thresholds.nms_iou.unwrap_or(DEFAULT_NMS_IOU),
            confidence_threshold: thresholds.confidence.unwrap_or(DEFAULT_CONFIDENCE),
            frames: FrameOptions {
                sort: frames.sort.unwrap_or(frame_defaults.sort),
                extensions: frames.extensions.unwrap_or(frame_defaults.extensions),
            },
            table_path: aggregate.table_path,
            projection_path: aggregate.projection_path,
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(path) = std::env::var("DETFEAT_LOG_PATH") {
            if !path.trim().is_empty() {
                self.log_path = PathBuf::from(path);
            }
        }
        if let Ok(classes) = std::env::var("DETFEAT_CLASSES") {
            let parsed = split_csv(&classes);
            if !parsed.is_empty() {
                self.classes = parsed;
            }
        }
        if let Ok(dim) = std::env::var("DETFEAT_FEATURE_DIM") {
            self.feature_dim = dim
                .trim()
                .parse()
                .map_err(|_| anyhow!("DETFEAT_FEATURE_DIM must be a positive integer"))?;
        }
        if let Ok(value) = std::env::var("DETFEAT_NMS_IOU") {
            self.nms_iou_threshold = value
                .trim()
                .parse()
                .map_err(|_| anyhow!("DETFEAT_NMS_IOU must be a number"))?;
        }
        if let Ok(value) = std::env::var("DETFEAT_CONFIDENCE") {
            self.confidence_threshold = value
                .trim()
                .parse()
                .map_err(|_| anyhow!("DETFEAT_CONFIDENCE must be a number"))?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.classes.is_empty() {
            return Err(anyhow!("classes must be configured (index 0 is background)"));
        }
        if self.feature_dim == 0 {
            return Err(anyhow!("feature_dim must be greater than zero"));
        }
        if self.log_path.as_os_str().is_empty() {
            return Err(anyhow!("log_path must be configured"));
        }
        self.selection_params()?;
        Ok(())
    }

    pub fn selection_params(&self) -> Result<SelectionParams> {
        Ok(SelectionParams::new(
            self.classes.clone(),
            self.nms_iou_threshold,
            self.confidence_threshold,
        )?)
    }

    pub fn aggregate_request(&self) -> AggregateRequest {
        let (table, projection) = default_outputs(&self.log_path);
        AggregateRequest {
            log_path: self.log_path.clone(),
            table_path: self.table_path.clone().unwrap_or(table),
            projection_path: self.projection_path.clone().unwrap_or(projection),
            feature_dim: self.feature_dim,
        }
    }
}

fn read_config_file(path: &Path) -> Result<PipelineConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = toml::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}

fn split_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|entry| entry.trim())
        .filter(|entry| !entry.is_empty())
        .map(|entry| entry.to_string())
        .collect()
}
