//! Extreme-value and sudden-change detection over a feature table.
//!
//! Each scanned metric is handled on its own. Mean and deviation are pooled
//! over every row of the table regardless of section, and change detection
//! diffs each row against its predecessor in stored order, so the first row
//! of a section is compared with the last row of the section before it.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use clap::ValueEnum;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::annotate::Annotator;
use crate::corpus::{Document, alphabetic_words};
use crate::error::{Result, StyleError};
use crate::features::Metric;
use crate::table::{FeatureTable, csv_safe_cell};

/// Which standard deviation the band is built from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Deviation {
    /// Divides by `n - 1`.
    #[default]
    Sample,
    /// Divides by `n`.
    Population,
}

impl fmt::Display for Deviation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Deviation::Sample => f.write_str("sample"),
            Deviation::Population => f.write_str("population"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetectionConfig {
    /// Band half-width in standard deviations.
    pub k: f64,
    pub deviation: Deviation,
    /// Metrics to scan, in output order.
    pub metrics: Vec<Metric>,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        DetectionConfig {
            k: 2.0,
            deviation: Deviation::Sample,
            metrics: vec![Metric::Msl, Metric::Scr, Metric::Ttr, Metric::Awl],
        }
    }
}

impl DetectionConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.k.is_finite() || self.k < 0.0 {
            return Err(StyleError::InvalidConfig(format!(
                "k must be a non-negative number, got {}",
                self.k
            )));
        }
        if self.metrics.is_empty() {
            return Err(StyleError::InvalidConfig("no metrics to scan".into()));
        }
        Ok(())
    }
}

/// Resolves metric names, warning about and skipping names that are not
/// table columns. Fails only if nothing usable remains.
pub fn parse_metrics<S: AsRef<str>>(names: &[S]) -> Result<Vec<Metric>> {
    let mut metrics = Vec::new();
    for name in names {
        match name.as_ref().parse::<Metric>() {
            Ok(m) if !metrics.contains(&m) => metrics.push(m),
            Ok(_) => {}
            Err(_) => warn!("metric {:?} is not a feature table column; skipping", name.as_ref()),
        }
    }
    if metrics.is_empty() {
        return Err(StyleError::InvalidConfig(
            "none of the requested metrics are table columns".into(),
        ));
    }
    Ok(metrics)
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Standard deviation around `mean`. Degenerate inputs (no values, or a
/// single value under the sample estimator) give `0.0`.
pub fn std_dev(values: &[f64], mean: f64, deviation: Deviation) -> f64 {
    let n = values.len();
    let denom = match deviation {
        Deviation::Sample if n > 1 => (n - 1) as f64,
        Deviation::Population if n > 0 => n as f64,
        _ => return 0.0,
    };
    let ss: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
    (ss / denom).sqrt()
}

/// Marks values strictly outside `mean ± k·σ`.
pub fn extreme_flags(values: &[f64], k: f64, deviation: Deviation) -> Vec<bool> {
    let mu = mean(values);
    let sigma = std_dev(values, mu, deviation);
    let (upper, lower) = (mu + k * sigma, mu - k * sigma);
    values.iter().map(|&v| v > upper || v < lower).collect()
}

/// Marks values whose absolute step from the previous value is strictly
/// above `mean_d + k·σ_d`. The first value has no step and is never marked;
/// it is also left out of the step distribution.
pub fn change_flags(values: &[f64], k: f64, deviation: Deviation) -> Vec<bool> {
    let mut flags = vec![false; values.len()];
    if values.len() < 2 {
        return flags;
    }
    let diffs: Vec<f64> = values.windows(2).map(|w| (w[1] - w[0]).abs()).collect();
    let mu = mean(&diffs);
    let threshold = mu + k * std_dev(&diffs, mu, deviation);
    for (i, d) in diffs.iter().enumerate() {
        flags[i + 1] = *d > threshold;
    }
    flags
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FlagKind {
    Extreme,
    Change,
}

/// One flagged (metric, row) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AnomalyFlag {
    pub metric: Metric,
    pub section: String,
    pub start: usize,
    pub kind: FlagKind,
}

/// Scans the configured metrics of `table`.
///
/// Flags come out grouped by metric in configured order, then in table row
/// order, with an extreme flag before a change flag on the same row.
pub fn detect(table: &FeatureTable, config: &DetectionConfig) -> Vec<AnomalyFlag> {
    let mut flags = Vec::new();
    for &metric in &config.metrics {
        let values = table.column(metric);
        let extreme = extreme_flags(&values, config.k, config.deviation);
        let change = change_flags(&values, config.k, config.deviation);
        let before = flags.len();
        for (i, row) in table.rows().iter().enumerate() {
            for (hit, kind) in [(extreme[i], FlagKind::Extreme), (change[i], FlagKind::Change)] {
                if hit {
                    flags.push(AnomalyFlag {
                        metric,
                        section: row.section.clone(),
                        start: row.start,
                        kind,
                    });
                }
            }
        }
        info!("{metric}: {} flag(s)", flags.len() - before);
    }
    flags
}

/// Unique (metric, section, start) positions in first-seen order.
pub fn flagged_positions(flags: &[AnomalyFlag]) -> Vec<(Metric, &str, usize)> {
    let mut seen = HashSet::new();
    flags
        .iter()
        .map(|f| (f.metric, f.section.as_str(), f.start))
        .filter(|key| seen.insert(*key))
        .collect()
}

/// A flagged window with its source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Detection {
    pub metric: Metric,
    pub section: String,
    pub start: usize,
    pub snippet: String,
}

/// `length` words from `start`, space-joined. Clamped at the end of the stream.
pub fn snippet(words: &[String], start: usize, length: usize) -> String {
    let from = start.min(words.len());
    let to = start.saturating_add(length).min(words.len());
    words[from..to].join(" ")
}

/// Resolves every flagged position to a snippet of its own section.
///
/// Each needed section is re-annotated once and cut down to its alphabetic
/// word stream, the same stream windows were sliced from.
pub fn extract_snippets(
    flags: &[AnomalyFlag],
    documents: &[Document],
    annotator: &dyn Annotator,
    window_length: usize,
) -> Result<Vec<Detection>> {
    let positions = flagged_positions(flags);
    let mut streams: HashMap<&str, Vec<String>> = HashMap::new();
    for &(_, section, _) in &positions {
        if streams.contains_key(section) {
            continue;
        }
        let doc = documents
            .iter()
            .find(|d| d.section == section)
            .ok_or_else(|| StyleError::MissingSection {
                section: section.to_string(),
            })?;
        let tokens = annotator.annotate(&doc.full_text())?;
        streams.insert(section, alphabetic_words(&tokens));
    }

    let mut detections = Vec::with_capacity(positions.len());
    for (metric, section, start) in positions {
        let words = streams.get(section).map(Vec::as_slice).unwrap_or_default();
        if start.saturating_add(window_length) > words.len() {
            debug!(
                "{section}: window at {start} runs past {} words; snippet is short",
                words.len()
            );
        }
        detections.push(Detection {
            metric,
            section: section.to_string(),
            start,
            snippet: snippet(words, start, window_length),
        });
    }
    Ok(detections)
}

pub const DETECTION_HEADER: [&str; 4] = ["metric", "window_start", "section", "snippet"];

pub fn write_detections_csv<W: Write>(detections: &[Detection], writer: W) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(DETECTION_HEADER)?;
    for d in detections {
        wtr.write_record([
            d.metric.name().to_string(),
            d.start.to_string(),
            csv_safe_cell(d.section.clone()),
            csv_safe_cell(d.snippet.clone()),
        ])?;
    }
    wtr.flush().map_err(csv::Error::from)?;
    Ok(())
}

pub fn write_detections_csv_path(detections: &[Detection], path: &Path) -> Result<()> {
    let file = File::create(path).map_err(|e| StyleError::io(path, e))?;
    write_detections_csv(detections, BufWriter::new(file))
}
