//! Detection post-processing for multi-object tracking.
//!
//! Turns raw per-frame detector output (per-class scores, per-class box
//! regressions, per-region pooled features) into an append-only detection log
//! in the tracking-challenge layout, and afterwards into a dense `.npy` table.
//!
//! # Module Structure
//!
//! - `geometry`: `BoundingBox` and IoU
//! - `nms`: greedy non-maximum suppression
//! - `select`: per-class NMS then confidence filtering for one frame
//! - `writer`: the append-only detection log
//! - `aggregate`: log -> dense table + 10-column projection
//! - `detect`: the `Detector` seam and the replay backend
//! - `frames`: frame directory enumeration
//! - `pipeline`: the per-frame loop with typed skip/abort handling
//! - `config`: TOML configuration with environment overrides

pub mod aggregate;
pub mod config;
pub mod detect;
pub mod detection;
pub mod error;
pub mod frames;
pub mod geometry;
pub mod nms;
pub mod pipeline;
pub mod select;
pub mod writer;

pub use aggregate::{aggregate, load_table, AggregateRequest, AggregateSummary};
pub use config::PipelineConfig;
pub use detect::{Detector, RegionOutputs, ReplayDetector};
pub use detection::Detection;
pub use error::PipelineError;
pub use frames::{frame_number, scan_frames, Frame, FrameOptions};
pub use geometry::{iou, BoundingBox};
pub use nms::non_max_suppress;
pub use pipeline::{FrameOutcome, Pipeline, RunSummary, SkippedFrame};
pub use select::{select_class, select_frame, ClassCandidateSet, SelectionParams};
pub use writer::{format_record, FrameWriter, FIXED_COLUMNS};
