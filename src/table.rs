//! Aggregation of feature rows and their CSV form.
//!
//! The windowed table is keyed by (section, window start) and is the
//! contract between extraction and anomaly detection. Column order is
//! `section`, `window_start`, then every metric in registry order.

use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::error::{Result, StyleError};
use crate::features::{FeatureVector, Metric};

pub const SECTION_COLUMN: &str = "section";
pub const START_COLUMN: &str = "window_start";

/// Decimal places written for feature values.
pub const PRECISION: usize = 6;

/// One window's features.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    pub section: String,
    pub start: usize,
    pub features: FeatureVector,
}

/// Append-only table of window rows, at most one per (section, start).
#[derive(Debug, Default, Clone)]
pub struct FeatureTable {
    rows: Vec<FeatureRow>,
    keys: HashSet<(String, usize)>,
}

impl FeatureTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one row. A second row for the same key is a caller bug and
    /// is rejected without touching the table.
    pub fn append(&mut self, section: &str, start: usize, features: FeatureVector) -> Result<()> {
        if !self.keys.insert((section.to_string(), start)) {
            return Err(StyleError::DuplicateWindow {
                section: section.to_string(),
                start,
            });
        }
        self.rows.push(FeatureRow {
            section: section.to_string(),
            start,
            features,
        });
        Ok(())
    }

    /// Rows in stored order.
    pub fn rows(&self) -> &[FeatureRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Reorders rows by section, then ascending start.
    pub fn sort(&mut self) {
        self.rows
            .sort_by(|a, b| a.section.cmp(&b.section).then(a.start.cmp(&b.start)));
    }

    /// Values of one metric in stored order.
    pub fn column(&self, metric: Metric) -> Vec<f64> {
        self.rows.iter().map(|r| r.features.get(metric)).collect()
    }

    pub fn header() -> Vec<&'static str> {
        let mut h = vec![SECTION_COLUMN, START_COLUMN];
        h.extend(Metric::ALL.iter().map(|m| m.name()));
        h
    }

    /// Writes the table in stored order.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut wtr = csv::Writer::from_writer(writer);
        wtr.write_record(Self::header())?;
        for row in &self.rows {
            let mut record = vec![row.section.clone(), row.start.to_string()];
            record.extend(row.features.iter().map(|(_, v)| format_value(v)));
            wtr.write_record(&record)?;
        }
        wtr.flush().map_err(csv::Error::from)?;
        Ok(())
    }

    pub fn write_csv_path(&self, path: &Path) -> Result<()> {
        let file = File::create(path).map_err(|e| StyleError::io(path, e))?;
        self.write_csv(BufWriter::new(file))
    }

    /// Reads a persisted table, keeping the file's row order.
    ///
    /// The header must match [`FeatureTable::header`] exactly and keys must
    /// be unique.
    pub fn read_csv<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::Reader::from_reader(reader);
        let expected = Self::header();
        let found: Vec<String> = rdr.headers()?.iter().map(String::from).collect();
        if found != expected {
            return Err(StyleError::MalformedTable(format!(
                "expected columns {expected:?}, found {found:?}"
            )));
        }
        let mut table = FeatureTable::new();
        for (line, record) in rdr.records().enumerate() {
            let record = record?;
            let section = record[0].to_string();
            let start: usize = record[1].trim().parse().map_err(|_| {
                StyleError::MalformedTable(format!(
                    "row {}: window_start {:?} is not a non-negative integer",
                    line + 1,
                    &record[1]
                ))
            })?;
            let mut features = FeatureVector::zeroed();
            for (k, m) in Metric::ALL.iter().enumerate() {
                let cell = &record[k + 2];
                let v: f64 = cell.trim().parse().map_err(|_| {
                    StyleError::MalformedTable(format!("row {}: {m} value {cell:?}", line + 1))
                })?;
                features.set(*m, v);
            }
            table.append(&section, start, features)?;
        }
        Ok(table)
    }

    pub fn read_csv_path(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| StyleError::io(path, e))?;
        Self::read_csv(BufReader::new(file))
    }
}

/// Whole-document rows, one per section.
#[derive(Debug, Default, Clone)]
pub struct DocumentTable {
    rows: Vec<(String, FeatureVector)>,
}

impl DocumentTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, section: &str, features: FeatureVector) -> Result<()> {
        if self.rows.iter().any(|(s, _)| s == section) {
            return Err(StyleError::DuplicateDocument {
                section: section.to_string(),
            });
        }
        self.rows.push((section.to_string(), features));
        Ok(())
    }

    pub fn get(&self, section: &str) -> Option<&FeatureVector> {
        self.rows.iter().find(|(s, _)| s == section).map(|(_, f)| f)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Writes rows sorted by section.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut wtr = csv::Writer::from_writer(writer);
        let mut header = vec![SECTION_COLUMN];
        header.extend(Metric::ALL.iter().map(|m| m.name()));
        wtr.write_record(&header)?;

        let mut sorted: Vec<&(String, FeatureVector)> = self.rows.iter().collect();
        sorted.sort_by(|a, b| a.0.cmp(&b.0));
        for (section, features) in sorted {
            let mut record = vec![section.clone()];
            record.extend(features.iter().map(|(_, v)| format_value(v)));
            wtr.write_record(&record)?;
        }
        wtr.flush().map_err(csv::Error::from)?;
        Ok(())
    }

    pub fn write_csv_path(&self, path: &Path) -> Result<()> {
        let file = File::create(path).map_err(|e| StyleError::io(path, e))?;
        self.write_csv(BufWriter::new(file))
    }
}

fn format_value(v: f64) -> String {
    format!("{v:.PRECISION$}")
}

/// Neutralizes cells a spreadsheet would read as a formula by prefixing a
/// single quote. Cells that already start with a quote are left alone.
pub fn csv_safe_cell(cell: String) -> String {
    match cell.chars().next() {
        Some('=' | '+' | '-' | '@' | '\t' | '\r') => format!("'{cell}"),
        _ => cell,
    }
}
