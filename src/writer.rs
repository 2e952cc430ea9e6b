//! Append-only detection log in the tracking-challenge detection layout:
//!
//! ```text
//! <frame> -1 <x1> <y1> <x2> <y2> <score> -1 -1 -1 <f0> ... <fD-1>
//! ```
//!
//! The `-1` fields hold columns reserved for the tracker (track id and world
//! coordinates). Trackers address fields by position, so they are always written.

use std::fmt::Write as _;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::detection::Detection;
use crate::error::{PipelineError, Result};

/// Number of leading fields before the feature vector.
pub const FIXED_COLUMNS: usize = 10;

const TRACK_ID_PLACEHOLDER: &str = "-1";
const WORLD_COORDS_PLACEHOLDER: &str = "-1 -1 -1";

/// Renders one log line, without the trailing newline.
///
/// Box corners are truncated toward zero; score and features use two decimals.
pub fn format_record(detection: &Detection) -> String {
    let mut line = String::with_capacity(64 + detection.features().len() * 6);
    let [x1, y1, x2, y2] = detection.bbox().corners();
    // Writing into a String cannot fail.
    let _ = write!(
        line,
        "{} {} {} {} {} {} {:.2} {}",
        detection.frame_id(),
        TRACK_ID_PLACEHOLDER,
        x1 as i64,
        y1 as i64,
        x2 as i64,
        y2 as i64,
        detection.score(),
        WORLD_COORDS_PLACEHOLDER,
    );
    for value in detection.features() {
        let _ = write!(line, " {:.2}", value);
    }
    line
}

/// Appends frames of detections to the shared log.
pub struct FrameWriter {
    path: PathBuf,
    file: File,
    lines_written: u64,
}

impl FrameWriter {
    /// Opens `path` for appending, creating it and its parent directories if needed.
    /// Existing content is never truncated.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| PipelineError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| PipelineError::Io {
                path: path.clone(),
                source: e,
            })?;
        Ok(Self {
            path,
            file,
            lines_written: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Lines appended through this writer since it was opened.
    pub fn lines_written(&self) -> u64 {
        self.lines_written
    }

    /// Appends one line per detection and returns how many were written.
    ///
    /// The whole frame is rendered first and handed to the file in a single write.
    pub fn write_frame(&mut self, detections: &[Detection]) -> Result<usize> {
        if detections.is_empty() {
            return Ok(0);
        }
        let mut buf = String::new();
        for detection in detections {
            buf.push_str(&format_record(detection));
            buf.push('\n');
        }
        self.file
            .write_all(buf.as_bytes())
            .and_then(|_| self.file.flush())
            .map_err(|e| PipelineError::Io {
                path: self.path.clone(),
                source: e,
            })?;
        self.lines_written += detections.len() as u64;
        Ok(detections.len())
    }
}
