#![forbid(unsafe_code)]
//! # Window Stylometry
//!
//! Sliding-window stylometric feature extraction and anomaly detection for
//! sectioned literary corpora.
//!
//! A corpus is a directory of `.xml` files, one per narrative section, whose
//! paragraph lines are wrapped in `<p>`. Each section is annotated once, cut
//! into fixed-length overlapping windows of alphabetic tokens, and every
//! window is re-annotated on its own before fourteen metrics are computed.
//! The resulting table can then be scanned for extreme values and sudden
//! changes, and flagged windows are mapped back to their text.
//!
//! ## Example
//! ```no_run
//! use std::path::Path;
//! use window_stylometry::{DetectionConfig, ExtractOptions, RuleAnnotator, pipeline};
//!
//! let annotator = RuleAnnotator::new();
//! let out = Path::new("out");
//! pipeline::extract_corpus(Path::new("corpus"), out, &annotator, &ExtractOptions::default())?;
//! pipeline::detect_corpus(
//!     Path::new("corpus"),
//!     &out.join(pipeline::WINDOW_TABLE_FILE),
//!     out,
//!     &annotator,
//!     200,
//!     &DetectionConfig::default(),
//! )?;
//! # Ok::<(), window_stylometry::StyleError>(())
//! ```

pub mod annotate;
pub mod anomaly;
pub mod corpus;
pub mod error;
pub mod features;
pub mod pipeline;
pub mod preprocess;
pub mod table;
pub mod window;

pub use annotate::{AnnotatedToken, Annotator, CommandAnnotator, RuleAnnotator};
pub use anomaly::{AnomalyFlag, Detection, DetectionConfig, Deviation, FlagKind};
pub use corpus::Document;
pub use error::{Result, StyleError};
pub use features::{FeatureVector, Metric};
pub use pipeline::{ExtractOptions, RunSummary};
pub use preprocess::{LemmaFrequencyIndex, PreprocessOptions, SentenceRecord};
pub use table::{DocumentTable, FeatureTable};
pub use window::{Window, WindowConfig};
