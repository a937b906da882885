#![forbid(unsafe_code)]
//! # Window Stylometry CLI
//!
//! Command-line interface for the `window_stylometry` crate.
//!
//! ## Subcommands
//! - `extract`: slide windows over every section and write the feature tables.
//! - `detect`: scan a feature table for extreme and sudden-change windows.
//! - `preprocess`: write frequency-filtered sentences as JSON lines.
//!
//! ## Example
//! ```bash
//! cargo run --release -- extract corpus --out results
//! cargo run --release -- detect corpus results/style_metrics_sliding_window.csv --k 2
//! ```
//!
//! Set `RUST_LOG=info` to follow progress.

use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use log::{error, info};
use window_stylometry::anomaly::parse_metrics;
use window_stylometry::pipeline::{self, ExtractOptions, recorded_window_length};
use window_stylometry::preprocess::load_stopword_file;
use window_stylometry::{
    Annotator, CommandAnnotator, DetectionConfig, Deviation, PreprocessOptions, Result,
    RuleAnnotator, WindowConfig,
};

#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compute per-window metrics for every section of a corpus
    Extract {
        /// Directory of .xml section files
        corpus: PathBuf,

        /// Output directory
        #[arg(long, default_value = ".")]
        out: PathBuf,

        /// Window length in tokens
        #[arg(long, default_value_t = 200)]
        window: usize,

        /// Step between window starts in tokens
        #[arg(long, default_value_t = 100)]
        step: usize,

        /// Compute windows one at a time instead of on all cores
        #[arg(long, default_value_t = false)]
        sequential: bool,

        /// Skip the whole-document table
        #[arg(long, default_value_t = false)]
        no_document_table: bool,

        #[command(flatten)]
        annotator: AnnotatorArgs,
    },

    /// Flag extreme and sudden-change windows in a feature table
    Detect {
        /// Directory of .xml section files the table was built from
        corpus: PathBuf,

        /// Feature table written by `extract`
        table: PathBuf,

        /// Output directory
        #[arg(long, default_value = ".")]
        out: PathBuf,

        /// Window length for snippets (default: from run_summary.json, else 200)
        #[arg(long)]
        window: Option<usize>,

        /// Band half-width in standard deviations
        #[arg(long, default_value_t = 2.0)]
        k: f64,

        /// Standard deviation estimator (sample or population)
        #[arg(long, value_enum, default_value = "sample")]
        deviation: Deviation,

        /// Metric to scan; repeat for several (default: MSL, SCR, TTR, AWL)
        #[arg(long = "metric")]
        metrics: Vec<String>,

        #[command(flatten)]
        annotator: AnnotatorArgs,
    },

    /// Write stopword- and frequency-filtered sentences per section
    Preprocess {
        /// Directory of .xml section files
        corpus: PathBuf,

        /// Output directory
        #[arg(long, default_value = "processed")]
        out: PathBuf,

        /// Minimum corpus frequency of a kept lemma
        #[arg(long, default_value_t = 3)]
        min_frequency: u32,

        /// Optional path to additional stopword file (.txt, one word per line)
        #[arg(long)]
        stopwords: Option<PathBuf>,

        #[command(flatten)]
        annotator: AnnotatorArgs,
    },
}

#[derive(clap::Args)]
struct AnnotatorArgs {
    /// External annotator program (JSON on stdin/stdout); built-in rules if unset
    #[arg(long)]
    annotator_cmd: Option<String>,

    /// Argument passed to the external annotator; repeatable
    #[arg(long = "annotator-arg", requires = "annotator_cmd", allow_hyphen_values = true)]
    annotator_args: Vec<String>,
}

impl AnnotatorArgs {
    fn build(&self) -> Box<dyn Annotator> {
        match &self.annotator_cmd {
            Some(program) => Box::new(CommandAnnotator::new(program.clone(), self.annotator_args.clone())),
            None => Box::new(RuleAnnotator::new()),
        }
    }
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    if let Err(e) = run(cli.command) {
        error!("Error: {}", e);
        process::exit(1);
    }
}

fn run(command: Command) -> Result<()> {
    match command {
        Command::Extract {
            corpus,
            out,
            window,
            step,
            sequential,
            no_document_table,
            annotator,
        } => {
            let options = ExtractOptions {
                window: WindowConfig::new(window, step)?,
                parallel: !sequential,
                document_table: !no_document_table,
            };
            let report = pipeline::extract_corpus(&corpus, &out, annotator.build().as_ref(), &options)?;
            println!(
                "{} windows from {} sections written to {}",
                report.table.len(),
                report.summary.sections.len(),
                out.join(pipeline::WINDOW_TABLE_FILE).display()
            );
        }
        Command::Detect {
            corpus,
            table,
            out,
            window,
            k,
            deviation,
            metrics,
            annotator,
        } => {
            let mut config = DetectionConfig {
                k,
                deviation,
                ..DetectionConfig::default()
            };
            if !metrics.is_empty() {
                config.metrics = parse_metrics(&metrics)?;
            }
            let window_length = resolve_window_length(window, &table);
            let report = pipeline::detect_corpus(
                &corpus,
                &table,
                &out,
                annotator.build().as_ref(),
                window_length,
                &config,
            )?;
            println!(
                "{} flags, {} detections written to {}",
                report.flags.len(),
                report.detections.len(),
                report.output.display()
            );
        }
        Command::Preprocess {
            corpus,
            out,
            min_frequency,
            stopwords,
            annotator,
        } => {
            let extra_stopwords = match &stopwords {
                Some(path) => load_stopword_file(path)?,
                None => Vec::new(),
            };
            let options = PreprocessOptions {
                min_frequency,
                extra_stopwords,
            };
            let report = pipeline::preprocess_corpus(&corpus, &out, annotator.build().as_ref(), &options)?;
            for (section, count) in &report.sections {
                println!("{section}: {count} sentences");
            }
        }
    }
    Ok(())
}

fn resolve_window_length(explicit: Option<usize>, table: &Path) -> usize {
    explicit.or_else(|| recorded_window_length(table)).unwrap_or_else(|| {
        let length = WindowConfig::default().length;
        info!("no window length given or recorded; using {length}");
        length
    })
}
