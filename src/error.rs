use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors raised by the detection pipeline.
///
/// Per-frame failures are classified by [`PipelineError::is_recoverable`]; the
/// pipeline skips recoverable frames and aborts on everything else.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("input not found: {}", path.display())]
    InputNotFound { path: PathBuf },

    #[error("frame {frame_id} is unreadable: {reason}")]
    CorruptFrame { frame_id: String, reason: String },

    #[error("{}:{line}: malformed record: {reason}", path.display())]
    MalformedRecord {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("invalid bounding box: {0}")]
    InvalidBox(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("i/o error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("npy error: {0}")]
    Npy(String),
}

impl PipelineError {
    pub fn input_not_found(path: impl Into<PathBuf>) -> Self {
        Self::InputNotFound { path: path.into() }
    }

    pub fn io(path: &Path, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::NotFound {
            return Self::input_not_found(path);
        }
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    /// True when the failure is confined to a single frame and the run may continue.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::InputNotFound { .. } | Self::CorruptFrame { .. })
    }
}

pub type Result<T, E = PipelineError> = std::result::Result<T, E>;
