//! Integration tests for `window_stylometry`.
//
// This suite verifies:
// - Library behavior (windowing counts, degenerate metrics, aggregation, detection, snippets)
// - CLI behavior for extract, detect and preprocess, including failure exits
//
// Notes:
// - CLI tests run the binary with a per-process working directory.
// - Where exact syntax matters a fake annotator stands in for the rule-based one.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use assert_cmd::prelude::*;
use assert_fs::prelude::*;
use predicates::prelude::*;
use serde_json::Value as Json;

use window_stylometry::anomaly::{change_flags, detect, extract_snippets, extreme_flags};
use window_stylometry::corpus::{alphabetic_words, load_corpus, load_document};
use window_stylometry::features::type_token_ratio;
use window_stylometry::pipeline::{self, extract_documents};
use window_stylometry::{
    AnnotatedToken, Annotator, AnomalyFlag, DetectionConfig, Deviation, Document, ExtractOptions,
    FeatureTable, FeatureVector, FlagKind, Metric, Result, RuleAnnotator, StyleError,
    WindowConfig,
};

// --------------------- helpers ---------------------

/// Create a file with content in a temp dir.
fn write_file(dir: &assert_fs::TempDir, name: &str, content: &str) -> PathBuf {
    let f = dir.child(name);
    f.write_str(content).unwrap();
    f.path().to_path_buf()
}

/// Read file to string.
fn read_to_string<P: AsRef<Path>>(p: P) -> String {
    fs::read_to_string(p).unwrap()
}

/// A section file with `per_paragraph` words on each `<p>` line.
fn section_xml(words: &[String], per_paragraph: usize) -> String {
    let mut xml = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<TEI>\n<text>\n<body>\n");
    for chunk in words.chunks(per_paragraph) {
        xml.push_str(&format!("<p>{}</p>\n", chunk.join(" ")));
    }
    xml.push_str("</body>\n</text>\n</TEI>\n");
    xml
}

/// Distinct alphabetic words: "wa", "wb", ..., "wab", ...
fn alpha_words(n: usize) -> Vec<String> {
    (0..n)
        .map(|mut i| {
            let mut s = String::from("w");
            loop {
                s.push((b'a' + (i % 26) as u8) as char);
                i /= 26;
                if i == 0 {
                    break;
                }
            }
            s
        })
        .collect()
}

fn repeat(pattern: &[&str], n: usize) -> Vec<String> {
    pattern.iter().cycle().take(n).map(|s| s.to_string()).collect()
}

/// Run CLI successfully with a specific working directory.
fn run_cli_ok_in(dir: &Path, args: &[&str]) -> assert_cmd::assert::Assert {
    let mut cmd = assert_cmd::Command::cargo_bin("window_stylometry").unwrap();
    cmd.current_dir(dir);
    cmd.args(args).assert().success()
}

/// Run CLI expecting failure with a specific working directory.
fn run_cli_fail_in(dir: &Path, args: &[&str]) -> assert_cmd::assert::Assert {
    let mut cmd = assert_cmd::Command::cargo_bin("window_stylometry").unwrap();
    cmd.current_dir(dir);
    cmd.args(args).assert().failure()
}

/// Whitespace tokenizer that tags every word as a noun in a single
/// sentence and counts how often each entry point is used.
#[derive(Default)]
struct CountingAnnotator {
    documents: AtomicUsize,
    windows: AtomicUsize,
}

fn nouns(words: &[String]) -> Vec<AnnotatedToken> {
    words
        .iter()
        .map(|w| AnnotatedToken {
            text: w.clone(),
            lemma: w.to_lowercase(),
            pos: "NOUN".into(),
            tag: "NN".into(),
            dep: "dep".into(),
            head: 0,
            sentence: 0,
        })
        .collect()
}

impl Annotator for CountingAnnotator {
    fn annotate(&self, text: &str) -> Result<Vec<AnnotatedToken>> {
        self.documents.fetch_add(1, Ordering::SeqCst);
        let words: Vec<String> = text.split_whitespace().map(String::from).collect();
        Ok(nouns(&words))
    }

    fn annotate_words(&self, words: &[String]) -> Result<Vec<AnnotatedToken>> {
        self.windows.fetch_add(1, Ordering::SeqCst);
        Ok(nouns(words))
    }
}

fn msl_table(values: &[(&str, usize, f64)]) -> FeatureTable {
    let mut t = FeatureTable::new();
    for &(section, start, v) in values {
        let mut f = FeatureVector::zeroed();
        f.set(Metric::Msl, v);
        t.append(section, start, f).unwrap();
    }
    t
}

// --------------------- library ---------------------

#[test]
fn thousand_tokens_give_nine_windows() {
    let words = alpha_words(1000);
    let docs = vec![Document::new("A", vec![words.join(" ")])];
    let annotator = CountingAnnotator::default();
    let report = extract_documents(&docs, &annotator, &ExtractOptions::default()).unwrap();

    let starts: Vec<usize> = report.table.rows().iter().map(|r| r.start).collect();
    assert_eq!(starts, (0..9).map(|i| i * 100).collect::<Vec<_>>());
    // one annotation per document, one per window
    assert_eq!(annotator.documents.load(Ordering::SeqCst), 1);
    assert_eq!(annotator.windows.load(Ordering::SeqCst), 9);
}

#[test]
fn short_section_has_no_rows_but_is_summarized() {
    let docs = vec![Document::new("Short", vec![alpha_words(150).join(" ")])];
    let report = extract_documents(&docs, &CountingAnnotator::default(), &ExtractOptions::default()).unwrap();
    assert!(report.table.is_empty());
    assert_eq!(report.summary.sections[0].tokens, 150);
    assert_eq!(report.summary.sections[0].windows, 0);
}

#[test]
fn empty_window_metrics_are_all_zero() {
    let fv = FeatureVector::compute(&[], &[]);
    for (metric, value) in fv.iter() {
        assert_eq!(value, 0.0, "{metric} should be 0 for an empty window");
    }
}

#[test]
fn ttr_bounds() {
    let distinct: Vec<String> = ["a", "b", "c"].iter().map(|s| s.to_string()).collect();
    let same: Vec<String> = ["a", "a", "a"].iter().map(|s| s.to_string()).collect();
    assert_eq!(type_token_ratio(&distinct), 1.0);
    assert!((type_token_ratio(&same) - 1.0 / 3.0).abs() < 1e-12);
}

#[test]
fn band_edge_value_is_not_flagged() {
    let values = [10.0, 10.0, 10.0, 10.0, 100.0];
    assert!(extreme_flags(&values, 2.0, Deviation::Population).iter().all(|f| !f));

    let table = msl_table(&[("A", 0, 10.0), ("A", 100, 10.0), ("A", 200, 10.0), ("A", 300, 10.0), ("A", 400, 100.0)]);
    let config = DetectionConfig {
        deviation: Deviation::Population,
        metrics: vec![Metric::Msl],
        ..DetectionConfig::default()
    };
    let extremes: Vec<AnomalyFlag> = detect(&table, &config)
        .into_iter()
        .filter(|f| f.kind == FlagKind::Extreme)
        .collect();
    assert!(extremes.is_empty());
}

#[test]
fn first_row_never_changes() {
    let values = [1000.0, 10.0, 10.0, 10.0, 100.0];
    let flags = change_flags(&values, 0.0, Deviation::Population);
    assert!(!flags[0]);
    assert!(flags[1]);
}

#[test]
fn duplicate_window_keeps_one_row() {
    let mut t = FeatureTable::new();
    t.append("A", 0, FeatureVector::zeroed()).unwrap();
    let err = t.append("A", 0, FeatureVector::zeroed()).unwrap_err();
    assert!(matches!(err, StyleError::DuplicateWindow { start: 0, .. }));
    assert_eq!(t.rows().iter().filter(|r| r.section == "A" && r.start == 0).count(), 1);
}

#[test]
fn snippet_round_trips_through_corpus_files() {
    let td = assert_fs::TempDir::new().unwrap();
    let words = alpha_words(600);
    write_file(&td, "X.xml", &section_xml(&words, 37));
    write_file(&td, "Y.xml", &section_xml(&alpha_words(10), 5));

    let docs = load_corpus(td.path()).unwrap();
    let annotator = RuleAnnotator::new();
    let flags = vec![AnomalyFlag {
        metric: Metric::Msl,
        section: "X".into(),
        start: 200,
        kind: FlagKind::Change,
    }];
    let detections = extract_snippets(&flags, &docs, &annotator, 200).unwrap();
    assert_eq!(detections.len(), 1);

    let snippet: Vec<&str> = detections[0].snippet.split(' ').collect();
    assert_eq!(snippet.len(), 200);

    // recompute the stream independently
    let doc = load_document(&td.path().join("X.xml")).unwrap();
    let stream = alphabetic_words(&annotator.annotate(&doc.full_text()).unwrap());
    assert_eq!(snippet, stream[200..400].iter().map(String::as_str).collect::<Vec<_>>());
    assert_eq!(stream, words);
}

#[test]
fn persisted_table_reloads_with_same_keys() {
    let td = assert_fs::TempDir::new().unwrap();
    write_file(&td, "A.xml", &section_xml(&repeat(&["quiet", "dark", "water"], 60), 12));
    write_file(&td, "B.xml", &section_xml(&repeat(&["bright", "noon"], 45), 9));
    let out = td.path().join("out");
    let options = ExtractOptions {
        window: WindowConfig::new(20, 10).unwrap(),
        ..ExtractOptions::default()
    };
    let report = pipeline::extract_corpus(td.path(), &out, &RuleAnnotator::new(), &options).unwrap();

    let back = FeatureTable::read_csv_path(&out.join(pipeline::WINDOW_TABLE_FILE)).unwrap();
    let keys = |t: &FeatureTable| t.rows().iter().map(|r| (r.section.clone(), r.start)).collect::<Vec<_>>();
    assert_eq!(keys(&back), keys(&report.table));
    // (60-20)/10+1 and (45-20)/10+1
    assert_eq!(back.len(), 5 + 3);
    for (a, b) in back.rows().iter().zip(report.table.rows()) {
        for m in Metric::ALL {
            assert!((a.features.get(m) - b.features.get(m)).abs() < 1e-6);
        }
    }
}

#[test]
fn missing_section_for_flag_is_reported() {
    let flags = vec![AnomalyFlag {
        metric: Metric::Ttr,
        section: "Nowhere".into(),
        start: 0,
        kind: FlagKind::Extreme,
    }];
    let docs = vec![Document::new("A", vec!["some words".into()])];
    let err = extract_snippets(&flags, &docs, &RuleAnnotator::new(), 5).unwrap_err();
    assert!(matches!(err, StyleError::MissingSection { .. }));
}

// --------------------- CLI ---------------------

#[test]
fn cli_extract_writes_tables_and_summary() {
    let td = assert_fs::TempDir::new().unwrap();
    write_file(&td, "April Seventh, 1928.xml", &section_xml(&repeat(&["the", "fence", "flower"], 50), 10));
    write_file(&td, "notes.txt", "not a section");

    run_cli_ok_in(td.path(), &["extract", ".", "--out", "out", "--window", "10", "--step", "5"])
        .stdout(predicate::str::contains("9 windows from 1 sections"));

    let table = read_to_string(td.path().join("out").join("style_metrics_sliding_window.csv"));
    let mut lines = table.lines();
    assert_eq!(
        lines.next().unwrap(),
        "section,window_start,MSL,SCR,PassiveAuxRatio,PastParticipleRatio,TTR,AWL,MTLD,\
         NounRatio,VerbRatio,AdjRatio,AdvRatio,AvgClauseLength,MeanDependencyDistance,SubordinationIndex"
    );
    assert!(lines.next().unwrap().starts_with("\"April Seventh, 1928\",0,"));
    assert_eq!(table.lines().count(), 1 + 9);

    let doc_table = read_to_string(td.path().join("out").join("style_metrics_document.csv"));
    assert_eq!(doc_table.lines().count(), 2);

    let summary: Json = serde_json::from_str(&read_to_string(td.path().join("out").join("run_summary.json"))).unwrap();
    assert_eq!(summary["window_length"], 10);
    assert_eq!(summary["window_step"], 5);
    assert_eq!(summary["sections"][0]["tokens"], 50);
    assert_eq!(summary["metrics"].as_array().unwrap().len(), 14);
}

#[test]
fn cli_extract_can_skip_document_table() {
    let td = assert_fs::TempDir::new().unwrap();
    write_file(&td, "A.xml", &section_xml(&repeat(&["one", "two"], 30), 10));
    run_cli_ok_in(
        td.path(),
        &["extract", ".", "--out", "out", "--window", "10", "--step", "10", "--sequential", "--no-document-table"],
    );
    td.child("out/style_metrics_sliding_window.csv").assert(predicate::path::exists());
    td.child("out/style_metrics_document.csv").assert(predicate::path::missing());
}

#[test]
fn cli_detect_flags_section_boundary_change() {
    let td = assert_fs::TempDir::new().unwrap();
    write_file(&td, "A.xml", &section_xml(&repeat(&["cat", "dog"], 100), 20));
    write_file(&td, "B.xml", &section_xml(&repeat(&["extraordinarily", "unquestionably"], 100), 20));

    run_cli_ok_in(td.path(), &["extract", ".", "--out", "out", "--window", "10", "--step", "10"]);
    // window length comes from run_summary.json
    run_cli_ok_in(
        td.path(),
        &["detect", ".", "out/style_metrics_sliding_window.csv", "--out", "out", "--metric", "AWL"],
    );

    let mut rdr = csv::Reader::from_path(td.path().join("out").join("detected_snippets.csv")).unwrap();
    assert_eq!(
        rdr.headers().unwrap().iter().collect::<Vec<_>>(),
        vec!["metric", "window_start", "section", "snippet"]
    );
    let rows: Vec<csv::StringRecord> = rdr.records().map(|r| r.unwrap()).collect();
    assert_eq!(rows.len(), 1);
    assert_eq!(&rows[0][0], "AWL");
    assert_eq!(&rows[0][1], "0");
    assert_eq!(&rows[0][2], "B");
    assert_eq!(rows[0][3].split(' ').count(), 10);
    assert!(rows[0][3].starts_with("extraordinarily unquestionably"));

    run_cli_ok_in(
        td.path(),
        &["detect", ".", "out/style_metrics_sliding_window.csv", "--out", "pop", "--deviation", "population"],
    );
    td.child("pop/detected_snippets.csv").assert(predicate::path::exists());
}

#[test]
fn cli_detect_rejects_bad_table_and_options() {
    let td = assert_fs::TempDir::new().unwrap();
    write_file(&td, "A.xml", &section_xml(&repeat(&["cat"], 10), 5));
    write_file(&td, "table.csv", "section,window_start,MSL\nA,0,1.0\n");

    run_cli_fail_in(td.path(), &["detect", ".", "table.csv"]);
    run_cli_fail_in(td.path(), &["detect", ".", "table.csv", "--deviation", "median"])
        .stderr(predicate::str::contains("median"));
    run_cli_fail_in(td.path(), &["detect", ".", "missing.csv"]);
}

#[test]
fn cli_fails_on_missing_corpus_and_zero_window() {
    let td = assert_fs::TempDir::new().unwrap();
    run_cli_fail_in(td.path(), &["extract", "does-not-exist"]);
    write_file(&td, "A.xml", "<p>a b c</p>\n");
    run_cli_fail_in(td.path(), &["extract", ".", "--window", "0"]);
}

#[test]
fn cli_preprocess_writes_jsonl_per_section() {
    let td = assert_fs::TempDir::new().unwrap();
    write_file(
        &td,
        "June Second, 1910.xml",
        "<p>The clock ticked. The clock ticked again.</p>\n<p>Shreve heard the clock.</p>\n",
    );
    let stop = write_file(&td, "stop.txt", "again\n");

    run_cli_ok_in(
        td.path(),
        &["preprocess", ".", "--out", "processed", "--stopwords", stop.to_str().unwrap()],
    )
    .stdout(predicate::str::contains("June Second, 1910:"));

    let out = read_to_string(td.path().join("processed").join("June Second, 1910.jsonl"));
    let records: Vec<Json> = out.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
    assert!(!records.is_empty());
    for r in &records {
        assert_eq!(r["section"], "June Second, 1910");
        let tokens = r["tokens"].as_array().unwrap();
        assert!(tokens.iter().all(|t| t.as_str().unwrap().eq_ignore_ascii_case("clock")));
        assert_eq!(tokens.len(), r["lemmas"].as_array().unwrap().len());
    }
}
