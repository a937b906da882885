//! Per-window stylometric metrics.
//!
//! Every metric is an independent function of a window's word list and its
//! annotation. None of them can fail: empty inputs, windows without
//! sentences and windows without verbs all yield `0.0`.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use log::debug;
use thiserror::Error;

use crate::annotate::{AnnotatedToken, Annotator, TAG_PAST_PARTICIPLE, dep, pos, sentences};
use crate::corpus::is_alphabetic;
use crate::error::{Result, StyleError};
use crate::window::Window;

/// The fixed metric registry, in persisted column order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Metric {
    Msl,
    Scr,
    PassiveAuxRatio,
    PastParticipleRatio,
    Ttr,
    Awl,
    Mtld,
    NounRatio,
    VerbRatio,
    AdjRatio,
    AdvRatio,
    AvgClauseLength,
    MeanDependencyDistance,
    SubordinationIndex,
}

impl Metric {
    pub const COUNT: usize = 14;

    pub const ALL: [Metric; Metric::COUNT] = [
        Metric::Msl,
        Metric::Scr,
        Metric::PassiveAuxRatio,
        Metric::PastParticipleRatio,
        Metric::Ttr,
        Metric::Awl,
        Metric::Mtld,
        Metric::NounRatio,
        Metric::VerbRatio,
        Metric::AdjRatio,
        Metric::AdvRatio,
        Metric::AvgClauseLength,
        Metric::MeanDependencyDistance,
        Metric::SubordinationIndex,
    ];

    /// Column name used in persisted tables.
    pub fn name(self) -> &'static str {
        match self {
            Metric::Msl => "MSL",
            Metric::Scr => "SCR",
            Metric::PassiveAuxRatio => "PassiveAuxRatio",
            Metric::PastParticipleRatio => "PastParticipleRatio",
            Metric::Ttr => "TTR",
            Metric::Awl => "AWL",
            Metric::Mtld => "MTLD",
            Metric::NounRatio => "NounRatio",
            Metric::VerbRatio => "VerbRatio",
            Metric::AdjRatio => "AdjRatio",
            Metric::AdvRatio => "AdvRatio",
            Metric::AvgClauseLength => "AvgClauseLength",
            Metric::MeanDependencyDistance => "MeanDependencyDistance",
            Metric::SubordinationIndex => "SubordinationIndex",
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }

    /// Computes this metric for one window (or one whole document).
    ///
    /// `words` is the alphabetic word list, `tokens` its annotation.
    pub fn compute(self, words: &[String], tokens: &[AnnotatedToken]) -> f64 {
        match self {
            Metric::Msl | Metric::AvgClauseLength => mean_sentence_length(tokens),
            Metric::Scr => subordinate_clause_ratio(tokens),
            Metric::PassiveAuxRatio => per_verb(tokens, |t| t.dep == dep::AUXPASS),
            Metric::PastParticipleRatio => per_verb(tokens, |t| t.tag == TAG_PAST_PARTICIPLE),
            Metric::Ttr => type_token_ratio(words),
            Metric::Awl => average_word_length(words),
            Metric::Mtld => match mtld(words) {
                Ok(v) => v,
                Err(e) => {
                    debug!("MTLD unavailable ({e}); using 0");
                    0.0
                }
            },
            Metric::NounRatio => pos_ratio(tokens, pos::NOUN),
            Metric::VerbRatio => pos_ratio(tokens, pos::VERB),
            Metric::AdjRatio => pos_ratio(tokens, pos::ADJ),
            Metric::AdvRatio => pos_ratio(tokens, pos::ADV),
            Metric::MeanDependencyDistance => mean_dependency_distance(tokens),
            Metric::SubordinationIndex => subordination_index(tokens),
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Metric {
    type Err = StyleError;

    fn from_str(s: &str) -> Result<Self> {
        Metric::ALL
            .iter()
            .copied()
            .find(|m| m.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| StyleError::UnknownMetric(s.to_string()))
    }
}

/// One value per registered metric.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureVector {
    values: [f64; Metric::COUNT],
}

impl FeatureVector {
    pub fn zeroed() -> Self {
        FeatureVector {
            values: [0.0; Metric::COUNT],
        }
    }

    pub fn get(&self, metric: Metric) -> f64 {
        self.values[metric.index()]
    }

    pub fn set(&mut self, metric: Metric, value: f64) {
        self.values[metric.index()] = value;
    }

    /// (metric, value) pairs in column order.
    pub fn iter(&self) -> impl Iterator<Item = (Metric, f64)> + '_ {
        Metric::ALL.iter().map(move |&m| (m, self.get(m)))
    }

    /// Runs the whole registry over one input.
    pub fn compute(words: &[String], tokens: &[AnnotatedToken]) -> Self {
        let mut fv = FeatureVector::zeroed();
        for m in Metric::ALL {
            fv.set(m, m.compute(words, tokens));
        }
        fv
    }
}

/// Re-annotates a window in isolation and computes its features.
pub fn window_features(window: &Window<'_>, annotator: &dyn Annotator) -> Result<FeatureVector> {
    let tokens = window.annotate(annotator)?;
    Ok(FeatureVector::compute(window.words, &tokens))
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 { 0.0 } else { num as f64 / den as f64 }
}

fn is_word(t: &AnnotatedToken) -> bool {
    t.pos != pos::PUNCT
}

fn mean_sentence_length(tokens: &[AnnotatedToken]) -> f64 {
    let sents = sentences(tokens);
    let words: usize = sents
        .iter()
        .map(|(_, s)| s.iter().filter(|t| is_word(t)).count())
        .sum();
    ratio(words, sents.len())
}

fn subordinate_clause_ratio(tokens: &[AnnotatedToken]) -> f64 {
    let marks = tokens
        .iter()
        .filter(|t| t.dep == dep::MARK)
        .filter(|t| tokens.get(t.head).is_some_and(|h| h.pos == pos::VERB))
        .count();
    ratio(marks, sentences(tokens).len())
}

fn per_verb(tokens: &[AnnotatedToken], hit: impl Fn(&AnnotatedToken) -> bool) -> f64 {
    let verbs = tokens.iter().filter(|t| t.pos == pos::VERB).count();
    ratio(tokens.iter().filter(|&t| hit(t)).count(), verbs)
}

fn pos_ratio(tokens: &[AnnotatedToken], coarse: &str) -> f64 {
    let total = tokens.iter().filter(|t| is_word(t)).count();
    ratio(tokens.iter().filter(|t| t.pos == coarse).count(), total)
}

fn mean_dependency_distance(tokens: &[AnnotatedToken]) -> f64 {
    let distances: Vec<usize> = tokens
        .iter()
        .enumerate()
        .filter(|(i, t)| !t.is_root(*i))
        .map(|(i, t)| i.abs_diff(t.head))
        .collect();
    ratio(distances.iter().sum(), distances.len())
}

fn subordination_index(tokens: &[AnnotatedToken]) -> f64 {
    let sents = sentences(tokens);
    let subordinated = sents
        .iter()
        .filter(|(_, s)| s.iter().any(|t| t.dep == dep::MARK))
        .count();
    ratio(subordinated, sents.len())
}

/// Distinct surface forms over total words (case-sensitive).
pub fn type_token_ratio(words: &[String]) -> f64 {
    let types: HashSet<&str> = words.iter().map(String::as_str).collect();
    ratio(types.len(), words.len())
}

/// Mean character count of the alphabetic words.
pub fn average_word_length(words: &[String]) -> f64 {
    let lengths: Vec<usize> = words
        .iter()
        .filter(|w| is_alphabetic(w))
        .map(|w| w.chars().count())
        .collect();
    ratio(lengths.iter().sum(), lengths.len())
}

/// Type-token ratio at which an MTLD factor is complete.
pub const MTLD_THRESHOLD: f64 = 0.72;

#[derive(Debug, Error, PartialEq)]
pub enum MtldError {
    #[error("no tokens")]
    Empty,
    #[error("result is not finite")]
    NonFinite,
}

/// Measure of Textual Lexical Diversity, averaged over a forward and a
/// backward pass.
pub fn mtld(words: &[String]) -> std::result::Result<f64, MtldError> {
    if words.is_empty() {
        return Err(MtldError::Empty);
    }
    let forward = mtld_pass(words.iter().map(String::as_str), words.len());
    let backward = mtld_pass(words.iter().rev().map(String::as_str), words.len());
    let value = (forward + backward) / 2.0;
    if value.is_finite() {
        Ok(value)
    } else {
        Err(MtldError::NonFinite)
    }
}

fn mtld_pass<'a>(words: impl Iterator<Item = &'a str>, n: usize) -> f64 {
    let mut factors = 0.0;
    let mut types: HashSet<&str> = HashSet::new();
    let mut count = 0usize;
    for (x, w) in words.enumerate() {
        types.insert(w);
        count += 1;
        let ttr = types.len() as f64 / count as f64;
        if x + 1 == n {
            // The last segment counts as a partial factor even when it
            // already fell below the threshold.
            factors += (1.0 - ttr) / (1.0 - MTLD_THRESHOLD);
        } else if ttr < MTLD_THRESHOLD {
            factors += 1.0;
            types.clear();
            count = 0;
        }
    }
    if factors == 0.0 { 0.0 } else { n as f64 / factors }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotate::testing::tok;

    fn words(s: &str) -> Vec<String> {
        s.split_whitespace().map(String::from).collect()
    }

    /// "Because he was seen , Ben cried" / "Luster laughed"
    fn two_sentences() -> Vec<AnnotatedToken> {
        vec![
            tok("Because", pos::SCONJ, "IN", dep::MARK, 3, 0),
            tok("he", pos::PRON, "PRP", "nsubjpass", 3, 0),
            tok("was", pos::AUX, "VBD", dep::AUXPASS, 3, 0),
            tok("seen", pos::VERB, "VBN", "advcl", 6, 0),
            tok(",", pos::PUNCT, ",", "punct", 6, 0),
            tok("Ben", pos::PROPN, "NNP", "nsubj", 6, 0),
            tok("cried", pos::VERB, "VBD", dep::ROOT, 6, 0),
            tok("Luster", pos::PROPN, "NNP", "nsubj", 8, 1),
            tok("laughed", pos::VERB, "VBD", dep::ROOT, 8, 1),
        ]
    }

    #[test]
    fn syntactic_metrics_on_known_parse() {
        let toks = two_sentences();
        let w: Vec<String> = toks
            .iter()
            .filter(|t| is_alphabetic(&t.text))
            .map(|t| t.text.clone())
            .collect();
        let fv = FeatureVector::compute(&w, &toks);

        // 6 + 2 words over 2 sentences
        assert_eq!(fv.get(Metric::Msl), 4.0);
        assert_eq!(fv.get(Metric::AvgClauseLength), 4.0);
        // one "mark" headed by a verb, two sentences
        assert_eq!(fv.get(Metric::Scr), 0.5);
        assert_eq!(fv.get(Metric::SubordinationIndex), 0.5);
        // three verbs: seen, cried, laughed
        assert!((fv.get(Metric::PassiveAuxRatio) - 1.0 / 3.0).abs() < 1e-12);
        assert!((fv.get(Metric::PastParticipleRatio) - 1.0 / 3.0).abs() < 1e-12);
        assert!((fv.get(Metric::VerbRatio) - 3.0 / 8.0).abs() < 1e-12);
        assert_eq!(fv.get(Metric::NounRatio), 0.0);
        // distances: 3,2,1,3,2,1,1 over seven non-root tokens, comma included
        assert!((fv.get(Metric::MeanDependencyDistance) - 13.0 / 7.0).abs() < 1e-12);
    }

    #[test]
    fn window_features_use_the_window_parse() {
        use crate::annotate::testing::FixedAnnotator;

        let toks = two_sentences();
        let w: Vec<String> = toks
            .iter()
            .filter(|t| is_alphabetic(&t.text))
            .map(|t| t.text.clone())
            .collect();
        // the fixed parse has 9 tokens, the window only 8 words
        let annotator = FixedAnnotator(toks);
        let window = Window {
            section: "A",
            start: 0,
            words: &w,
        };
        let fv = window_features(&window, &annotator).unwrap();
        assert_eq!(fv.get(Metric::Msl), 8.0);
        assert_eq!(fv.get(Metric::NounRatio), 1.0);
        assert_eq!(fv.get(Metric::Scr), 0.0);
    }

    #[test]
    fn mark_with_non_verb_head_is_not_a_subordinate_clause() {
        let toks = vec![
            tok("if", pos::SCONJ, "IN", dep::MARK, 1, 0),
            tok("so", pos::ADV, "RB", dep::ROOT, 1, 0),
        ];
        assert_eq!(Metric::Scr.compute(&[], &toks), 0.0);
        assert_eq!(Metric::SubordinationIndex.compute(&[], &toks), 1.0);
    }

    #[test]
    fn empty_window_is_all_zero() {
        let fv = FeatureVector::compute(&[], &[]);
        for (m, v) in fv.iter() {
            assert_eq!(v, 0.0, "{m} should be 0 on empty input");
        }
    }

    #[test]
    fn no_verbs_means_zero_verb_ratios() {
        let toks = vec![tok("Caddy", pos::PROPN, "NNP", dep::ROOT, 0, 0)];
        assert_eq!(Metric::PassiveAuxRatio.compute(&[], &toks), 0.0);
        assert_eq!(Metric::PastParticipleRatio.compute(&[], &toks), 0.0);
    }

    #[test]
    fn ttr_bounds() {
        assert_eq!(type_token_ratio(&words("a b c")), 1.0);
        assert!((type_token_ratio(&words("a a a")) - 1.0 / 3.0).abs() < 1e-12);
        assert_eq!(type_token_ratio(&[]), 0.0);
        let mixed = type_token_ratio(&words("the cat and the hat"));
        assert!(mixed > 0.0 && mixed < 1.0);
    }

    #[test]
    fn awl_counts_characters_of_alphabetic_words() {
        assert_eq!(average_word_length(&words("a bb ccc")), 2.0);
        assert_eq!(average_word_length(&words("éé")), 2.0);
        assert_eq!(average_word_length(&words("12 ,")), 0.0);
    }

    #[test]
    fn mtld_known_values() {
        assert_eq!(mtld(&words("a a a")), Ok(3.0));
        // never drops below the threshold: no factors at all
        assert_eq!(mtld(&words("a b c")), Ok(0.0));
        assert_eq!(mtld(&[]), Err(MtldError::Empty));
        assert_eq!(Metric::Mtld.compute(&[], &[]), 0.0);
    }

    #[test]
    fn metric_names_round_trip() {
        for m in Metric::ALL {
            assert_eq!(m.name().parse::<Metric>().unwrap(), m);
        }
        assert_eq!("ttr".parse::<Metric>().unwrap(), Metric::Ttr);
        assert!(matches!("Flesch".parse::<Metric>(), Err(StyleError::UnknownMetric(_))));
    }
}
