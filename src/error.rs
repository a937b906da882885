//! Error type shared by every stage of the pipeline.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading, extracting, aggregating or scanning.
#[derive(Debug, Error)]
pub enum StyleError {
    /// Reading a corpus file or writing an output failed.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A window with the same (section, start) key was submitted twice.
    #[error("duplicate window for section {section:?} at start {start}")]
    DuplicateWindow { section: String, start: usize },

    /// A whole-document row for the same section was submitted twice.
    #[error("duplicate document row for section {section:?}")]
    DuplicateDocument { section: String },

    /// The token provider could not annotate its input.
    #[error("annotator failed: {0}")]
    Annotator(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A persisted table does not have the expected shape.
    #[error("malformed table: {0}")]
    MalformedTable(String),

    #[error("unknown metric {0:?}")]
    UnknownMetric(String),

    /// A flagged row names a section with no source document.
    #[error("no source document for section {section:?}")]
    MissingSection { section: String },

    #[error("no .xml sections found under {path}")]
    EmptyCorpus { path: PathBuf },
}

impl StyleError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StyleError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, StyleError>;
