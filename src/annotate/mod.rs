//! Token provider boundary.
//!
//! The pipeline never talks to a concrete NLP library. It asks an
//! [`Annotator`] for [`AnnotatedToken`]s and reads only their named fields.
//! Two providers ship with the crate: [`RuleAnnotator`], a lexicon and
//! suffix driven English tagger with a heuristic dependency attacher, and
//! [`CommandAnnotator`], which pipes text to an external process and adapts
//! its JSON reply.

pub mod command;
pub mod rules;

use serde::{Deserialize, Serialize};

use crate::error::Result;

pub use command::CommandAnnotator;
pub use rules::RuleAnnotator;

/// Coarse part-of-speech labels (Universal Dependencies tag set).
pub mod pos {
    pub const NOUN: &str = "NOUN";
    pub const PROPN: &str = "PROPN";
    pub const VERB: &str = "VERB";
    pub const AUX: &str = "AUX";
    pub const ADJ: &str = "ADJ";
    pub const ADV: &str = "ADV";
    pub const PRON: &str = "PRON";
    pub const DET: &str = "DET";
    pub const ADP: &str = "ADP";
    pub const CCONJ: &str = "CCONJ";
    pub const SCONJ: &str = "SCONJ";
    pub const PART: &str = "PART";
    pub const NUM: &str = "NUM";
    pub const INTJ: &str = "INTJ";
    pub const PUNCT: &str = "PUNCT";
    pub const X: &str = "X";
}

/// Dependency labels the feature computer inspects.
pub mod dep {
    pub const ROOT: &str = "ROOT";
    pub const MARK: &str = "mark";
    pub const AUXPASS: &str = "auxpass";
}

/// Fine-grained tag for past participles (Penn Treebank).
pub const TAG_PAST_PARTICIPLE: &str = "VBN";

/// One token with its annotations.
///
/// `head` indexes into the same sequence the token came from; a root token
/// points at itself. `sentence` is the index of the sentence the token
/// belongs to within that sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotatedToken {
    pub text: String,
    pub lemma: String,
    pub pos: String,
    pub tag: String,
    pub dep: String,
    pub head: usize,
    pub sentence: usize,
}

impl AnnotatedToken {
    /// True if this token is the root of its sentence.
    pub fn is_root(&self, index: usize) -> bool {
        self.head == index
    }
}

/// Produces annotated tokens for raw text or for an already tokenized word list.
///
/// Implementations must be pure given their input: the same text always
/// yields the same tokens, and no state is shared between calls. Windows are
/// annotated concurrently.
pub trait Annotator: Send + Sync {
    /// Tokenizes and annotates a whole document.
    fn annotate(&self, text: &str) -> Result<Vec<AnnotatedToken>>;

    /// Annotates a pre-tokenized word list as a standalone text.
    ///
    /// The output has exactly one token per input word, in order. Sentence
    /// boundaries and heads are derived from these words alone.
    fn annotate_words(&self, words: &[String]) -> Result<Vec<AnnotatedToken>>;
}

/// Splits a token sequence into its sentences (contiguous runs sharing a
/// sentence index). Each item pairs the offset of the sentence's first token
/// with the sentence slice.
pub fn sentences(tokens: &[AnnotatedToken]) -> Vec<(usize, &[AnnotatedToken])> {
    let mut out = Vec::new();
    let mut start = 0;
    for i in 1..=tokens.len() {
        if i == tokens.len() || tokens[i].sentence != tokens[start].sentence {
            out.push((start, &tokens[start..i]));
            start = i;
        }
    }
    out
}
