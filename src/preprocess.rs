//! Two-stage lemma filtering for downstream topic and frequency work.
//!
//! Stage one counts lemmas over the whole corpus into an immutable
//! [`LemmaFrequencyIndex`]. Stage two takes that index as an argument and
//! reduces each sentence to its frequent, non-stopword alphabetic tokens.

use std::collections::{HashMap, HashSet};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::annotate::{AnnotatedToken, Annotator, pos, sentences};
use crate::corpus::{Document, is_alphabetic};
use crate::error::{Result, StyleError};

/// English function words, plus dialect forms common in the corpus.
pub const DEFAULT_STOPWORDS: &[&str] = &[
    "i", "me", "my", "myself", "we", "our", "ours", "ourselves", "you", "you're", "you've",
    "you'll", "you'd", "your", "yours", "yourself", "yourselves", "he", "him", "his", "himself",
    "she", "she's", "her", "hers", "herself", "it", "it's", "its", "itself", "they", "them",
    "their", "theirs", "themselves", "what", "which", "who", "whom", "this", "that", "that'll",
    "these", "those", "am", "is", "are", "was", "were", "be", "been", "being", "have", "has",
    "had", "having", "do", "does", "did", "doing", "a", "an", "the", "and", "but", "if", "or",
    "because", "as", "until", "while", "of", "at", "by", "for", "with", "about", "against",
    "between", "into", "through", "during", "before", "after", "above", "below", "to", "from",
    "up", "down", "in", "out", "on", "off", "over", "under", "again", "further", "then", "once",
    "here", "there", "when", "where", "why", "how", "all", "any", "both", "each", "few", "more",
    "most", "other", "some", "such", "no", "nor", "not", "only", "own", "same", "so", "than",
    "too", "very", "s", "t", "can", "will", "just", "don", "don't", "should", "should've", "now",
    "d", "ll", "m", "o", "re", "ve", "y", "ain", "aren", "aren't", "couldn", "couldn't", "didn",
    "didn't", "doesn", "doesn't", "hadn", "hadn't", "hasn", "hasn't", "haven", "haven't", "isn",
    "isn't", "ma", "mightn", "mightn't", "mustn", "mustn't", "needn", "needn't", "shan", "shan't",
    "shouldn", "shouldn't", "wasn", "wasn't", "weren", "weren't", "won", "won't", "wouldn",
    "wouldn't", "'em", "'bout",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreprocessOptions {
    /// Lemmas seen fewer times than this across the corpus are dropped.
    pub min_frequency: u32,
    pub extra_stopwords: Vec<String>,
}

impl Default for PreprocessOptions {
    fn default() -> Self {
        PreprocessOptions {
            min_frequency: 3,
            extra_stopwords: Vec::new(),
        }
    }
}

impl PreprocessOptions {
    /// Built-in stopwords plus the extra ones, lower-cased.
    pub fn stopwords(&self) -> HashSet<String> {
        DEFAULT_STOPWORDS
            .iter()
            .map(|w| w.to_string())
            .chain(self.extra_stopwords.iter().map(|w| w.trim().to_lowercase()))
            .filter(|w| !w.is_empty())
            .collect()
    }
}

/// Reads a stopword file, one word per line. Blank lines are ignored.
pub fn load_stopword_file(path: &Path) -> Result<Vec<String>> {
    let content = fs::read_to_string(path).map_err(|e| StyleError::io(path, e))?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(String::from)
        .collect())
}

/// Corpus-wide lemma counts. Built once, then only read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LemmaFrequencyIndex {
    counts: HashMap<String, u32>,
}

impl LemmaFrequencyIndex {
    /// Annotates every document and counts the lemmas of its alphabetic tokens.
    pub fn build(documents: &[Document], annotator: &dyn Annotator) -> Result<Self> {
        let annotated = documents
            .iter()
            .map(|d| annotator.annotate(&d.full_text()))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::from_tokens(annotated.iter().map(Vec::as_slice)))
    }

    /// Counts lemmas over already annotated documents.
    pub fn from_tokens<'a>(documents: impl IntoIterator<Item = &'a [AnnotatedToken]>) -> Self {
        let mut counts: HashMap<String, u32> = HashMap::new();
        for tokens in documents {
            for t in tokens.iter().filter(|t| is_alphabetic(&t.text)) {
                *counts.entry(t.lemma.clone()).or_insert(0) += 1;
            }
        }
        LemmaFrequencyIndex { counts }
    }

    pub fn frequency(&self, lemma: &str) -> u32 {
        self.counts.get(lemma).copied().unwrap_or(0)
    }

    /// Number of distinct lemmas.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

/// One filtered sentence, as written to the JSON-lines output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentenceRecord {
    pub section: String,
    pub sentence_id: usize,
    pub sentence: String,
    pub tokens: Vec<String>,
    pub lemmas: Vec<String>,
    pub pos: Vec<String>,
}

/// Filters one annotated document against the corpus index.
///
/// Sentences left with no tokens are not emitted; `sentence_id` still counts
/// them, so ids may skip.
pub fn preprocess_document(
    section: &str,
    annotated: &[AnnotatedToken],
    index: &LemmaFrequencyIndex,
    stopwords: &HashSet<String>,
    min_frequency: u32,
) -> Vec<SentenceRecord> {
    let mut records = Vec::new();
    for (sentence_id, (_, sent)) in sentences(annotated).into_iter().enumerate() {
        let kept: Vec<&AnnotatedToken> = sent
            .iter()
            .filter(|t| is_alphabetic(&t.text))
            .filter(|t| !stopwords.contains(&t.lemma.to_lowercase()))
            .filter(|t| index.frequency(&t.lemma) >= min_frequency)
            .collect();
        if kept.is_empty() {
            continue;
        }
        records.push(SentenceRecord {
            section: section.to_string(),
            sentence_id,
            sentence: sentence_text(sent),
            tokens: kept.iter().map(|t| t.text.clone()).collect(),
            lemmas: kept.iter().map(|t| t.lemma.clone()).collect(),
            pos: kept.iter().map(|t| t.pos.clone()).collect(),
        });
    }
    records
}

/// Rebuilds readable sentence text: punctuation and clitics attach to the
/// preceding token.
fn sentence_text(tokens: &[AnnotatedToken]) -> String {
    let mut out = String::new();
    for t in tokens {
        let attach = (t.pos == pos::PUNCT && !matches!(t.text.as_str(), "(" | "[" | "\"" | "“"))
            || t.text.starts_with('\'')
            || t.text.starts_with('’')
            || t.text.eq_ignore_ascii_case("n't");
        if !out.is_empty() && !attach {
            out.push(' ');
        }
        out.push_str(&t.text);
    }
    out
}

/// Writes one JSON object per line.
pub fn write_jsonl<W: Write>(records: &[SentenceRecord], writer: W) -> Result<()> {
    let mut w = BufWriter::new(writer);
    for r in records {
        serde_json::to_writer(&mut w, r)?;
        w.write_all(b"\n").map_err(serde_json::Error::io)?;
    }
    w.flush().map_err(serde_json::Error::io)?;
    Ok(())
}

pub fn write_jsonl_path(records: &[SentenceRecord], path: &Path) -> Result<()> {
    let file = File::create(path).map_err(|e| StyleError::io(path, e))?;
    write_jsonl(records, file)
}
