//! Post-run aggregation of the detection log.
//!
//! Runs once after every frame has been written. The whole log becomes a dense
//! `f64` table of shape `(lines, 10 + feature_dim)` stored as `.npy`, plus a text
//! projection that keeps only the ten leading fields of every line.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use ndarray::Array2;
use serde::Serialize;

use crate::error::{PipelineError, Result};
use crate::frames::frame_number;
use crate::writer::FIXED_COLUMNS;

/// Where to read the log from and where to put the derived files.
#[derive(Clone, Debug)]
pub struct AggregateRequest {
    pub log_path: PathBuf,
    pub table_path: PathBuf,
    pub projection_path: PathBuf,
    pub feature_dim: usize,
}

impl AggregateRequest {
    /// Places the table and projection next to the log: `<stem>.npy` and `<stem>_det.txt`.
    pub fn beside_log(log_path: impl Into<PathBuf>, feature_dim: usize) -> Self {
        let log_path = log_path.into();
        let (table_path, projection_path) = default_outputs(&log_path);
        Self {
            log_path,
            table_path,
            projection_path,
            feature_dim,
        }
    }

    pub fn columns(&self) -> usize {
        FIXED_COLUMNS + self.feature_dim
    }
}

pub(crate) fn default_outputs(log_path: &Path) -> (PathBuf, PathBuf) {
    let stem = log_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("detections");
    (
        log_path.with_file_name(format!("{stem}.npy")),
        log_path.with_file_name(format!("{stem}_det.txt")),
    )
}

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct AggregateSummary {
    pub rows: usize,
    pub columns: usize,
    pub table_path: PathBuf,
    pub projection_path: PathBuf,
}

/// A parsed log line: the numeric row plus the verbatim leading fields.
#[derive(Clone, Debug, PartialEq)]
pub struct ParsedRecord {
    pub values: Vec<f64>,
    pub leading: String,
}

/// Parses one log line into `10 + feature_dim` numbers.
///
/// `line_no` is 1-based and only used for error reporting.
pub fn parse_record(path: &Path, line: &str, line_no: usize, feature_dim: usize) -> Result<ParsedRecord> {
    let malformed = |reason: String| PipelineError::MalformedRecord {
        path: path.to_path_buf(),
        line: line_no,
        reason,
    };

    let fields: Vec<&str> = line.split_whitespace().collect();
    let expected = FIXED_COLUMNS + feature_dim;
    if fields.len() != expected {
        return Err(malformed(format!(
            "expected {} fields, found {}",
            expected,
            fields.len()
        )));
    }

    let mut values = Vec::with_capacity(expected);
    let frame = frame_number(fields[0])
        .ok_or_else(|| malformed(format!("frame id '{}' is not a frame number", fields[0])))?;
    values.push(frame as f64);
    for (col, field) in fields.iter().enumerate().skip(1) {
        let value: f64 = field
            .parse()
            .map_err(|_| malformed(format!("column {col}: '{field}' is not a number")))?;
        values.push(value);
    }

    Ok(ParsedRecord {
        values,
        leading: fields[..FIXED_COLUMNS].join(" "),
    })
}

/// Builds the dense table and the projection file from the detection log.
pub fn aggregate(request: &AggregateRequest) -> Result<AggregateSummary> {
    let log_path = &request.log_path;
    if !log_path.is_file() {
        return Err(PipelineError::input_not_found(log_path));
    }

    let file = File::open(log_path).map_err(|e| PipelineError::io(log_path, e))?;
    let columns = request.columns();
    let mut flat: Vec<f64> = Vec::new();
    let mut projection: Vec<String> = Vec::new();

    for (idx, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|e| PipelineError::io(log_path, e))?;
        if line.trim().is_empty() {
            continue;
        }
        let record = parse_record(log_path, &line, idx + 1, request.feature_dim)?;
        flat.extend_from_slice(&record.values);
        projection.push(record.leading);
    }

    let rows = projection.len();
    let table = Array2::from_shape_vec((rows, columns), flat)
        .map_err(|e| PipelineError::Npy(format!("table shape: {e}")))?;

    write_table(&request.table_path, &table)?;
    write_projection(&request.projection_path, &projection)?;

    log::info!(
        "aggregated {} records ({} columns) from {} into {} and {}",
        rows,
        columns,
        log_path.display(),
        request.table_path.display(),
        request.projection_path.display()
    );

    Ok(AggregateSummary {
        rows,
        columns,
        table_path: request.table_path.clone(),
        projection_path: request.projection_path.clone(),
    })
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| PipelineError::Io {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }
    Ok(())
}

fn write_table(path: &Path, table: &Array2<f64>) -> Result<()> {
    ensure_parent(path)?;
    ndarray_npy::write_npy(path, table)
        .map_err(|e| PipelineError::Npy(format!("{}: {}", path.display(), e)))
}

fn write_projection(path: &Path, lines: &[String]) -> Result<()> {
    ensure_parent(path)?;
    let io_err = |e| PipelineError::Io {
        path: path.to_path_buf(),
        source: e,
    };
    let mut out = BufWriter::new(File::create(path).map_err(io_err)?);
    for line in lines {
        writeln!(out, "{line}").map_err(io_err)?;
    }
    out.flush().map_err(io_err)
}

/// Reloads a table written by [`aggregate`].
pub fn load_table(path: &Path) -> Result<Array2<f64>> {
    if !path.is_file() {
        return Err(PipelineError::input_not_found(path));
    }
    ndarray_npy::read_npy(path).map_err(|e| PipelineError::Npy(format!("{}: {}", path.display(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(dir: &Path, feature_dim: usize) -> AggregateRequest {
        AggregateRequest::beside_log(dir.join("det.txt"), feature_dim)
    }

    #[test]
    fn default_outputs_sit_beside_the_log() {
        let req = AggregateRequest::beside_log("/out/run1/detections.txt", 4);
        assert_eq!(req.table_path, PathBuf::from("/out/run1/detections.npy"));
        assert_eq!(req.projection_path, PathBuf::from("/out/run1/detections_det.txt"));
        assert_eq!(req.columns(), 14);
    }

    #[test]
    fn parses_numeric_frame_ids_only() {
        let path = Path::new("det.txt");
        let rec = parse_record(path, "000012 -1 1 2 3 4 0.91 -1 -1 -1 0.50", 1, 1).unwrap();
        assert_eq!(rec.values[0], 12.0);
        assert_eq!(rec.values[6], 0.91);
        assert_eq!(rec.leading, "000012 -1 1 2 3 4 0.91 -1 -1 -1");

        let err = parse_record(path, "frame_0042 -1 1 2 3 4 0.91 -1 -1 -1 0.50", 3, 1).unwrap_err();
        assert!(matches!(err, PipelineError::MalformedRecord { line: 3, .. }));
    }

    #[test]
    fn rejects_wrong_field_count_with_line_number() {
        let err = parse_record(Path::new("det.txt"), "1 -1 1 2 3 4 0.91 -1 -1 -1", 5, 2).unwrap_err();
        match err {
            PipelineError::MalformedRecord { line, reason, .. } => {
                assert_eq!(line, 5);
                assert!(reason.contains("expected 12 fields, found 10"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn rejects_non_numeric_fields() {
        let err = parse_record(Path::new("d"), "1 -1 1 2 x 4 0.91 -1 -1 -1", 1, 0).unwrap_err();
        assert!(matches!(err, PipelineError::MalformedRecord { .. }));

        let err = parse_record(Path::new("d"), "frame -1 1 2 3 4 0.91 -1 -1 -1", 1, 0).unwrap_err();
        assert!(matches!(err, PipelineError::MalformedRecord { .. }));
    }

    #[test]
    fn missing_log_is_input_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let req = request(dir.path(), 2);
        let err = aggregate(&req).unwrap_err();
        assert!(matches!(err, PipelineError::InputNotFound { .. }));
        assert!(!req.table_path.exists());
        assert!(!req.projection_path.exists());
    }

    #[test]
    fn builds_table_and_projection() {
        let dir = tempfile::tempdir().unwrap();
        let req = request(dir.path(), 2);
        std::fs::write(
            &req.log_path,
            "1 -1 10 20 30 40 0.91 -1 -1 -1 0.10 0.20\n\
             \n\
             2 -1 11 21 31 41 0.85 -1 -1 -1 0.30 0.40\n\
             2 -1 50 60 70 80 0.99 -1 -1 -1 0.50 0.60\n",
        )
        .unwrap();

        let summary = aggregate(&req).unwrap();
        assert_eq!(summary.rows, 3);
        assert_eq!(summary.columns, 12);

        let table = load_table(&req.table_path).unwrap();
        assert_eq!(table.dim(), (3, 12));
        assert_eq!(table[[0, 0]], 1.0);
        assert_eq!(table[[2, 2]], 50.0);
        assert_eq!(table[[1, 6]], 0.85);
        assert_eq!(table[[2, 11]], 0.60);

        let projection = std::fs::read_to_string(&req.projection_path).unwrap();
        let lines: Vec<&str> = projection.lines().collect();
        assert_eq!(
            lines,
            vec![
                "1 -1 10 20 30 40 0.91 -1 -1 -1",
                "2 -1 11 21 31 41 0.85 -1 -1 -1",
                "2 -1 50 60 70 80 0.99 -1 -1 -1",
            ]
        );
    }

    #[test]
    fn malformed_line_aborts_without_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let req = request(dir.path(), 1);
        std::fs::write(
            &req.log_path,
            "1 -1 10 20 30 40 0.91 -1 -1 -1 0.10\n1 -1 10 20\n",
        )
        .unwrap();

        let err = aggregate(&req).unwrap_err();
        match err {
            PipelineError::MalformedRecord { path, line, .. } => {
                assert_eq!(path, req.log_path);
                assert_eq!(line, 2);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!req.table_path.exists());
    }

    #[test]
    fn empty_log_gives_empty_table() {
        let dir = tempfile::tempdir().unwrap();
        let req = request(dir.path(), 3);
        std::fs::write(&req.log_path, "").unwrap();

        let summary = aggregate(&req).unwrap();
        assert_eq!(summary.rows, 0);
        assert_eq!(load_table(&req.table_path).unwrap().dim(), (0, 13));
        assert_eq!(std::fs::read_to_string(&req.projection_path).unwrap(), "");
    }
}
