use std::path::PathBuf;

use thiserror::Error;

/// Failures that abort a training or testing run.
///
/// Unreadable corpus files and images smaller than the detection window are
/// not errors; they are logged (or silently skipped) by the stage that meets
/// them.
#[derive(Debug, Error)]
pub enum TrainError {
    #[error("opencv: {0}")]
    OpenCv(#[from] opencv::Error),

    #[error("failed to access {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("illegal dir for samples: both --positive-dir and --negative-dir are required")]
    MissingCorpusDir,

    #[error("no image in {}", .0.display())]
    EmptyCorpus(PathBuf),

    #[error(
        "all positive images should be same size: expected {expected_width}x{expected_height}, \
         found {width}x{height} in {}",
        .path.display()
    )]
    InconsistentPositiveSize {
        path: PathBuf,
        expected_width: i32,
        expected_height: i32,
        width: i32,
        height: i32,
    },

    #[error("invalid detection window {width}x{height}: each side must be a multiple of 8 and at least 16")]
    InvalidWindow { width: i32, height: i32 },

    #[error("no positive samples could be extracted for a {width}x{height} window")]
    NoPositiveSamples { width: i32, height: i32 },

    #[error("no negative samples could be extracted for a {width}x{height} window")]
    NoNegativeSamples { width: i32, height: i32 },

    #[error("feature vector {index} is a {rows}x{cols} matrix, expected a single row or column")]
    NotAVector { index: usize, rows: i32, cols: i32 },

    #[error("feature vector {index} has {found} values, expected {expected}")]
    DescriptorLength {
        index: usize,
        found: usize,
        expected: usize,
    },

    #[error("classifier did not reduce to a single unit-weight support vector: {0}")]
    DegenerateClassifier(String),

    #[error("classifier has not been trained")]
    Untrained,

    #[error("failed to load detector model from {}: {reason}", .path.display())]
    ModelLoad { path: PathBuf, reason: String },

    #[error("could not open video source {0}")]
    VideoOpen(String),
}

pub type Result<T> = std::result::Result<T, TrainError>;

impl TrainError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        TrainError::Io {
            path: path.into(),
            source,
        }
    }
}
