//! Frame directory enumeration.
//!
//! Frames are plain image files in one directory. The identifier of a frame is its
//! file name with the extension stripped (`000123.jpg` -> `000123`); that identifier
//! is what the detection log records. It must be a run of ASCII digits, because the
//! aggregated table stores it as a number in column 0. Decoding the image is the
//! detector's job.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{PipelineError, Result};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    id: String,
    number: u64,
    path: PathBuf,
}

/// Numeric value of a frame id. Only plain digit runs qualify (`000123` -> 123).
pub fn frame_number(id: &str) -> Option<u64> {
    if id.is_empty() || !id.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    id.parse().ok()
}

impl Frame {
    /// Derives the frame identifier from the file name. The file need not exist yet.
    pub fn from_path(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let id = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .filter(|stem| !stem.is_empty())
            .ok_or_else(|| {
                PipelineError::Config(format!(
                    "cannot derive a frame id from {}",
                    path.display()
                ))
            })?
            .to_string();
        let number = frame_number(&id).ok_or_else(|| {
            PipelineError::Config(format!("frame id '{id}' is not a frame number"))
        })?;
        Ok(Self { id, number, path })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn number(&self) -> u64 {
        self.number
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// How a frame directory is enumerated.
#[derive(Clone, Debug)]
pub struct FrameOptions {
    /// Sort frames by file name. When false, file-system order is kept.
    pub sort: bool,
    /// Accepted extensions, compared case-insensitively. Empty accepts every file.
    pub extensions: Vec<String>,
}

impl Default for FrameOptions {
    fn default() -> Self {
        Self {
            sort: true,
            extensions: vec!["jpg".into(), "jpeg".into(), "png".into()],
        }
    }
}

/// Lists the frames of a directory.
///
/// Hidden files, subdirectories and files with other extensions are ignored.
/// Files whose stem is not a frame number are skipped with a warning, as is any
/// file whose number was already taken (`5.jpg` next to `000005.png`); the first
/// one in scan order wins.
pub fn scan_frames(dir: &Path, options: &FrameOptions) -> Result<Vec<Frame>> {
    if !dir.is_dir() {
        return Err(PipelineError::input_not_found(dir));
    }
    let entries = std::fs::read_dir(dir).map_err(|e| PipelineError::io(dir, e))?;

    let mut frames = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| PipelineError::io(dir, e))?;
        let path = entry.path();
        if !path.is_file() || is_hidden(&path) || !has_accepted_extension(&path, options) {
            continue;
        }
        match Frame::from_path(&path) {
            Ok(frame) => frames.push(frame),
            Err(e) => log::warn!("ignoring {}: {}", path.display(), e),
        }
    }

    if options.sort {
        frames.sort_by(|a, b| a.path.file_name().cmp(&b.path.file_name()));
    }

    let mut seen: HashMap<u64, PathBuf> = HashMap::new();
    frames.retain(|frame| match seen.get(&frame.number) {
        Some(first) => {
            log::warn!(
                "ignoring {}: frame number {} already used by {}",
                frame.path.display(),
                frame.number,
                first.display()
            );
            false
        }
        None => {
            seen.insert(frame.number, frame.path.clone());
            true
        }
    });
    Ok(frames)
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.starts_with('.'))
}

fn has_accepted_extension(path: &Path, options: &FrameOptions) -> bool {
    if options.extensions.is_empty() {
        return true;
    }
    let Some(ext) = path.extension().and_then(|ext| ext.to_str()) else {
        return false;
    };
    options
        .extensions
        .iter()
        .any(|accepted| accepted.trim_start_matches('.').eq_ignore_ascii_case(ext))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_id_strips_extension() {
        let frame = Frame::from_path("/data/video/000123.jpg").unwrap();
        assert_eq!(frame.id(), "000123");
        assert_eq!(frame.path(), Path::new("/data/video/000123.jpg"));

        assert_eq!(frame.number(), 123);
    }

    #[test]
    fn non_numeric_frame_ids_are_rejected() {
        for name in ["street.jpg", "frame 01.jpg", "cam1_0005.jpg", "+5.jpg", "1.5.png"] {
            assert!(Frame::from_path(name).is_err(), "{name}");
        }
        assert_eq!(frame_number("0"), Some(0));
        assert_eq!(frame_number(""), None);
    }

    #[test]
    fn scan_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        for name in [
            "000003.jpg",
            "000001.JPG",
            "000002.png",
            "notes.txt",
            ".hidden.jpg",
            "street.jpg",
        ] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        std::fs::create_dir(dir.path().join("res.jpg")).unwrap();

        let frames = scan_frames(dir.path(), &FrameOptions::default()).unwrap();
        let ids: Vec<&str> = frames.iter().map(Frame::id).collect();
        assert_eq!(ids, vec!["000001", "000002", "000003"]);
    }

    #[test]
    fn empty_extension_list_accepts_everything() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("2.bin"), b"x").unwrap();
        std::fs::write(dir.path().join("1.txt"), b"x").unwrap();

        let options = FrameOptions {
            sort: true,
            extensions: Vec::new(),
        };
        let frames = scan_frames(dir.path(), &options).unwrap();
        let ids: Vec<&str> = frames.iter().map(Frame::id).collect();
        assert_eq!(ids, vec!["1", "2"]);
    }

    #[test]
    fn colliding_frame_numbers_keep_the_first_file() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["5.jpg", "000005.png", "000006.jpg"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }

        let frames = scan_frames(dir.path(), &FrameOptions::default()).unwrap();
        let ids: Vec<&str> = frames.iter().map(Frame::id).collect();
        assert_eq!(ids, vec!["000005", "000006"]);
    }

    #[test]
    fn missing_directory_is_input_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = scan_frames(&dir.path().join("nope"), &FrameOptions::default()).unwrap_err();
        assert!(matches!(err, PipelineError::InputNotFound { .. }));
    }
}
