//! Run-level orchestration: extraction, detection and preprocessing over a
//! corpus directory, writing their output files.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::prelude::*;
use log::{debug, info, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::annotate::Annotator;
use crate::anomaly::{
    AnomalyFlag, DetectionConfig, Detection, detect, extract_snippets, write_detections_csv_path,
};
use crate::corpus::{Document, alphabetic_words, load_corpus};
use crate::error::{Result, StyleError};
use crate::features::{FeatureVector, Metric, window_features};
use crate::preprocess::{LemmaFrequencyIndex, PreprocessOptions, preprocess_document, write_jsonl_path};
use crate::table::{DocumentTable, FeatureTable};
use crate::window::{Window, WindowConfig, slice_windows};

pub const WINDOW_TABLE_FILE: &str = "style_metrics_sliding_window.csv";
pub const DOCUMENT_TABLE_FILE: &str = "style_metrics_document.csv";
pub const SUMMARY_FILE: &str = "run_summary.json";
pub const DETECTIONS_FILE: &str = "detected_snippets.csv";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractOptions {
    pub window: WindowConfig,
    /// Compute windows of a section on the rayon pool.
    pub parallel: bool,
    /// Also compute one whole-document row per section.
    pub document_table: bool,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        ExtractOptions {
            window: WindowConfig::default(),
            parallel: true,
            document_table: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionSummary {
    pub section: String,
    pub tokens: usize,
    pub windows: usize,
}

/// Written next to the tables after every extraction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub window_length: usize,
    pub window_step: usize,
    pub sections: Vec<SectionSummary>,
    pub metrics: Vec<String>,
    pub generated_at: String,
}

impl RunSummary {
    pub fn read(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| StyleError::io(path, e))?;
        Ok(serde_json::from_str(&content)?)
    }
}

#[derive(Debug, Clone)]
pub struct ExtractReport {
    pub table: FeatureTable,
    pub documents: Option<DocumentTable>,
    pub summary: RunSummary,
}

/// Builds the windowed table (and optionally the document table) for
/// already loaded sections.
///
/// Each section is annotated once. Its windows are then re-annotated on
/// their own, concurrently when `options.parallel` is set, and the finished
/// table is ordered by section and start.
pub fn extract_documents(
    documents: &[Document],
    annotator: &dyn Annotator,
    options: &ExtractOptions,
) -> Result<ExtractReport> {
    options.window.validate()?;
    let mut table = FeatureTable::new();
    let mut doc_table = options.document_table.then(DocumentTable::new);
    let mut sections = Vec::with_capacity(documents.len());

    for doc in documents {
        let tokens = annotator.annotate(&doc.full_text())?;
        let words = alphabetic_words(&tokens);
        let windows: Vec<Window<'_>> = slice_windows(&doc.section, &words, &options.window).collect();
        info!(
            "{}: {} tokens, {} windows",
            doc.section,
            words.len(),
            windows.len()
        );

        let rows: Vec<(usize, FeatureVector)> = if options.parallel {
            windows
                .par_iter()
                .map(|w| window_features(w, annotator).map(|f| (w.start, f)))
                .collect::<Result<Vec<_>>>()?
        } else {
            windows
                .iter()
                .map(|w| {
                    debug!("{}: window at {}", w.section, w.start);
                    window_features(w, annotator).map(|f| (w.start, f))
                })
                .collect::<Result<Vec<_>>>()?
        };
        for (start, features) in rows {
            table.append(&doc.section, start, features)?;
        }

        if let Some(dt) = doc_table.as_mut() {
            dt.append(&doc.section, FeatureVector::compute(&words, &tokens))?;
        }
        sections.push(SectionSummary {
            section: doc.section.clone(),
            tokens: words.len(),
            windows: windows.len(),
        });
    }
    table.sort();

    let summary = RunSummary {
        window_length: options.window.length,
        window_step: options.window.step,
        sections,
        metrics: Metric::ALL.iter().map(|m| m.name().to_string()).collect(),
        generated_at: Local::now().to_rfc3339(),
    };
    Ok(ExtractReport {
        table,
        documents: doc_table,
        summary,
    })
}

/// Loads the corpus, extracts features and writes the tables and summary
/// into `out_dir`.
pub fn extract_corpus(
    corpus: &Path,
    out_dir: &Path,
    annotator: &dyn Annotator,
    options: &ExtractOptions,
) -> Result<ExtractReport> {
    let documents = load_corpus(corpus)?;
    let report = extract_documents(&documents, annotator, options)?;

    ensure_dir(out_dir)?;
    let path = out_dir.join(WINDOW_TABLE_FILE);
    report.table.write_csv_path(&path)?;
    info!("wrote {} rows to {}", report.table.len(), path.display());

    if let Some(dt) = &report.documents {
        let path = out_dir.join(DOCUMENT_TABLE_FILE);
        dt.write_csv_path(&path)?;
        info!("wrote {} rows to {}", dt.len(), path.display());
    }

    let path = out_dir.join(SUMMARY_FILE);
    let json = serde_json::to_string_pretty(&report.summary)?;
    fs::write(&path, json).map_err(|e| StyleError::io(&path, e))?;
    info!("wrote {}", path.display());
    Ok(report)
}

#[derive(Debug, Clone)]
pub struct DetectReport {
    pub flags: Vec<AnomalyFlag>,
    pub detections: Vec<Detection>,
    pub output: PathBuf,
}

/// Window length recorded by the extraction run that wrote `table_path`,
/// if its summary sits next to it.
pub fn recorded_window_length(table_path: &Path) -> Option<usize> {
    let summary = table_path.parent()?.join(SUMMARY_FILE);
    if !summary.is_file() {
        return None;
    }
    match RunSummary::read(&summary) {
        Ok(s) => Some(s.window_length),
        Err(e) => {
            warn!("ignoring unreadable {}: {e}", summary.display());
            None
        }
    }
}

/// Scans a persisted feature table and writes the flagged snippets.
pub fn detect_corpus(
    corpus: &Path,
    table_path: &Path,
    out_dir: &Path,
    annotator: &dyn Annotator,
    window_length: usize,
    config: &DetectionConfig,
) -> Result<DetectReport> {
    config.validate()?;
    if window_length == 0 {
        return Err(StyleError::InvalidConfig("window length must be positive".into()));
    }
    let table = FeatureTable::read_csv_path(table_path)?;
    if table.is_empty() {
        warn!("{} has no rows; nothing to scan", table_path.display());
    }
    let flags = detect(&table, config);

    let detections = if flags.is_empty() {
        Vec::new()
    } else {
        let documents = load_corpus(corpus)?;
        extract_snippets(&flags, &documents, annotator, window_length)?
    };

    ensure_dir(out_dir)?;
    let output = out_dir.join(DETECTIONS_FILE);
    write_detections_csv_path(&detections, &output)?;
    info!("wrote {} detections to {}", detections.len(), output.display());
    Ok(DetectReport {
        flags,
        detections,
        output,
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreprocessReport {
    /// (section, records written) in corpus order.
    pub sections: Vec<(String, usize)>,
    pub distinct_lemmas: usize,
}

/// Runs both preprocessing stages and writes `<section>.jsonl` files.
pub fn preprocess_corpus(
    corpus: &Path,
    out_dir: &Path,
    annotator: &dyn Annotator,
    options: &PreprocessOptions,
) -> Result<PreprocessReport> {
    let documents = load_corpus(corpus)?;
    let annotated = documents
        .iter()
        .map(|d| annotator.annotate(&d.full_text()))
        .collect::<Result<Vec<_>>>()?;

    let index = LemmaFrequencyIndex::from_tokens(annotated.iter().map(Vec::as_slice));
    info!("lemma index: {} distinct lemmas", index.len());
    let stopwords = options.stopwords();

    ensure_dir(out_dir)?;
    let mut sections = Vec::with_capacity(documents.len());
    for (doc, tokens) in documents.iter().zip(&annotated) {
        let records = preprocess_document(&doc.section, tokens, &index, &stopwords, options.min_frequency);
        let path = out_dir.join(format!("{}.jsonl", doc.section));
        write_jsonl_path(&records, &path)?;
        info!("{}: {} sentences -> {}", doc.section, records.len(), path.display());
        sections.push((doc.section.clone(), records.len()));
    }
    Ok(PreprocessReport {
        sections,
        distinct_lemmas: index.len(),
    })
}

fn ensure_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).map_err(|e| StyleError::io(dir, e))
}
