//! Built-in English annotator.
//!
//! Tagging is lexicon first, then suffix rules, then one contextual pass over
//! neighbouring tags. Dependencies are attached per clause: a clause opens at
//! a subordinating conjunction and a subordinate clause closes at the next
//! comma. This is an approximation of a trained parser, good enough to give
//! stable sentence, clause and attachment-distance statistics.

use rust_stemmers::{Algorithm, Stemmer};
use unicode_segmentation::UnicodeSegmentation;

use super::{AnnotatedToken, Annotator, dep, pos};
use crate::error::Result;

/// Lexicon and suffix driven annotator. Holds only the immutable stemmer
/// used for lemmas, so one instance can serve every window of a run.
pub struct RuleAnnotator {
    stemmer: Stemmer,
}

impl RuleAnnotator {
    pub fn new() -> Self {
        RuleAnnotator {
            stemmer: Stemmer::create(Algorithm::English),
        }
    }

    fn annotate_tokens(&self, words: &[String], infer_from_case: bool) -> Vec<AnnotatedToken> {
        if words.is_empty() {
            return Vec::new();
        }
        let sentence_of = segment(words, infer_from_case);
        let lowers: Vec<String> = words.iter().map(|w| w.to_lowercase()).collect();

        let mut tags: Vec<Tag> = words
            .iter()
            .zip(&lowers)
            .enumerate()
            .map(|(i, (w, l))| {
                let initial = i == 0 || sentence_of[i - 1] != sentence_of[i];
                lexical_tag(w, l, initial)
            })
            .collect();
        refine_tags(&lowers, &sentence_of, &mut tags);

        let mut heads = vec![(0usize, dep::ROOT); words.len()];
        let mut start = 0;
        for i in 1..=words.len() {
            if i == words.len() || sentence_of[i] != sentence_of[start] {
                let parsed = parse_sentence(&lowers[start..i], &tags[start..i]);
                for (k, (h, d)) in parsed.into_iter().enumerate() {
                    heads[start + k] = (start + h, d);
                }
                start = i;
            }
        }

        words
            .iter()
            .enumerate()
            .map(|(i, w)| AnnotatedToken {
                text: w.clone(),
                lemma: self.lemma(w, &lowers[i], tags[i].pos),
                pos: tags[i].pos.to_string(),
                tag: tags[i].tag.to_string(),
                dep: heads[i].1.to_string(),
                head: heads[i].0,
                sentence: sentence_of[i],
            })
            .collect()
    }

    fn lemma(&self, word: &str, lower: &str, coarse: &str) -> String {
        if let Some(l) = irregular_lemma(lower) {
            return l.to_string();
        }
        match coarse {
            pos::PROPN => word.to_string(),
            pos::NOUN | pos::VERB | pos::ADJ | pos::ADV => self.stemmer.stem(lower).into_owned(),
            _ => lower.to_string(),
        }
    }
}

impl Default for RuleAnnotator {
    fn default() -> Self {
        Self::new()
    }
}

impl Annotator for RuleAnnotator {
    fn annotate(&self, text: &str) -> Result<Vec<AnnotatedToken>> {
        let words = tokenize(text);
        Ok(self.annotate_tokens(&words, false))
    }

    fn annotate_words(&self, words: &[String]) -> Result<Vec<AnnotatedToken>> {
        Ok(self.annotate_tokens(words, true))
    }
}

/// Splits text at Unicode word boundaries, dropping whitespace and splitting
/// English clitics (`don't` -> `do`, `n't`; `he's` -> `he`, `'s`).
pub fn tokenize(text: &str) -> Vec<String> {
    text.split_word_bounds()
        .filter(|s| !s.trim().is_empty())
        .flat_map(split_contraction)
        .collect()
}

const CLITICS: &[&str] = &[
    "n't", "n’t", "'s", "’s", "'ll", "’ll", "'re", "’re", "'ve", "’ve", "'d", "’d", "'m", "’m",
];

fn split_contraction(word: &str) -> Vec<String> {
    for suffix in CLITICS {
        if word.len() > suffix.len() {
            let cut = word.len() - suffix.len();
            if word.is_char_boundary(cut) && word[cut..].eq_ignore_ascii_case(suffix) {
                return vec![word[..cut].to_string(), word[cut..].to_string()];
            }
        }
    }
    vec![word.to_string()]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Tag {
    pos: &'static str,
    tag: &'static str,
}

const fn t(pos: &'static str, tag: &'static str) -> Tag {
    Tag { pos, tag }
}

fn is_terminal(word: &str) -> bool {
    matches!(word, "." | "!" | "?" | "..." | "…")
}

fn is_closing(word: &str) -> bool {
    matches!(word, "\"" | "'" | ")" | "]" | "”" | "’")
}

fn is_punct(word: &str) -> bool {
    !word.is_empty() && word.chars().all(|c| !c.is_alphanumeric())
}

/// Words that, capitalized, open a sentence when the text carries no
/// terminal punctuation (windows are built from alphabetic tokens only).
const SENTENCE_STARTERS: &[&str] = &[
    "the", "a", "an", "he", "she", "it", "they", "we", "you", "there", "then", "but", "and", "so",
    "when", "if", "this", "that", "what", "who", "why", "how", "my", "his", "her", "their", "our",
    "your", "now", "yes", "no", "oh", "well", "because", "after", "before", "while", "though",
    "although", "as", "in", "on", "at", "one", "its", "these", "those", "where",
];

/// Sentence index for every word.
fn segment(words: &[String], infer_from_case: bool) -> Vec<usize> {
    let mut out = Vec::with_capacity(words.len());
    let mut sentence = 0;
    let mut pending = false;
    let mut sentence_start = 0;
    for (i, w) in words.iter().enumerate() {
        if i > 0 {
            let opens = if pending {
                !is_closing(w)
            } else {
                infer_from_case && i > sentence_start && starts_sentence_by_case(w)
            };
            if opens {
                sentence += 1;
                sentence_start = i;
                pending = false;
            }
        }
        if is_terminal(w) {
            pending = true;
        }
        out.push(sentence);
    }
    out
}

fn starts_sentence_by_case(word: &str) -> bool {
    let mut chars = word.chars();
    match chars.next() {
        Some(c) if c.is_uppercase() => {}
        _ => return false,
    }
    let lower = word.to_lowercase();
    SENTENCE_STARTERS.contains(&lower.as_str())
}

fn closed_class(lower: &str) -> Option<Tag> {
    let tag = match lower {
        "the" | "a" | "an" | "this" | "these" | "those" | "every" | "each" | "some" | "any"
        | "no" | "another" | "either" | "neither" | "all" | "both" | "such" | "that" => {
            t(pos::DET, "DT")
        }
        "my" | "your" | "his" | "her" | "its" | "our" | "their" => t(pos::PRON, "PRP$"),
        "whose" => t(pos::PRON, "WP$"),
        "i" | "you" | "he" | "she" | "it" | "we" | "they" | "me" | "him" | "us" | "them"
        | "myself" | "yourself" | "himself" | "herself" | "itself" | "ourselves"
        | "themselves" | "mine" | "yours" | "hers" | "ours" | "theirs" => t(pos::PRON, "PRP"),
        "who" | "whom" | "what" => t(pos::PRON, "WP"),
        "which" => t(pos::PRON, "WDT"),
        "nobody" | "somebody" | "anybody" | "everybody" | "nothing" | "something"
        | "anything" | "everything" | "someone" | "anyone" | "everyone" | "none" => {
            t(pos::PRON, "NN")
        }
        "of" | "in" | "on" | "at" | "by" | "for" | "with" | "from" | "into" | "onto" | "upon"
        | "about" | "above" | "across" | "against" | "along" | "among" | "around" | "behind"
        | "below" | "beneath" | "beside" | "between" | "beyond" | "during" | "except"
        | "inside" | "near" | "off" | "outside" | "over" | "past" | "through"
        | "throughout" | "toward" | "towards" | "under" | "underneath" | "within"
        | "without" | "like" | "out" | "down" | "up" | "after" | "before" | "since"
        | "until" | "till" | "as" => t(pos::ADP, "IN"),
        "to" => t(pos::PART, "TO"),
        "and" | "or" | "but" | "nor" | "yet" | "so" => t(pos::CCONJ, "CC"),
        "because" | "although" | "though" | "if" | "unless" | "whether" | "whereas"
        | "while" | "lest" => t(pos::SCONJ, "IN"),
        "am" | "are" | "'re" | "’re" | "'m" | "’m" => t(pos::AUX, "VBP"),
        "is" => t(pos::AUX, "VBZ"),
        "was" | "were" => t(pos::AUX, "VBD"),
        "be" => t(pos::AUX, "VB"),
        "been" => t(pos::AUX, "VBN"),
        "being" => t(pos::AUX, "VBG"),
        "have" | "'ve" | "’ve" => t(pos::AUX, "VBP"),
        "has" => t(pos::AUX, "VBZ"),
        "had" => t(pos::AUX, "VBD"),
        "having" => t(pos::AUX, "VBG"),
        "do" => t(pos::AUX, "VBP"),
        "does" => t(pos::AUX, "VBZ"),
        "did" => t(pos::AUX, "VBD"),
        "can" | "could" | "will" | "would" | "shall" | "should" | "may" | "might" | "must"
        | "ca" | "wo" | "'ll" | "’ll" | "'d" | "’d" => t(pos::AUX, "MD"),
        "not" | "n't" | "n’t" => t(pos::PART, "RB"),
        "'s" | "’s" => t(pos::PART, "POS"),
        "very" | "too" | "also" | "just" | "then" | "now" | "here" | "there" | "never"
        | "always" | "often" | "still" | "already" | "again" | "ever" | "soon" | "almost"
        | "only" | "even" | "quite" | "rather" | "back" | "away" | "else" | "perhaps"
        | "maybe" | "once" | "together" | "yesterday" | "today" | "tomorrow" | "sometimes"
        | "anyway" | "much" | "more" | "most" | "less" | "least" | "well" | "far" | "ago"
        | "home" | "right" => t(pos::ADV, "RB"),
        "when" | "where" | "why" | "how" => t(pos::ADV, "WRB"),
        "oh" | "yes" | "ah" | "hey" | "hush" | "huh" => t(pos::INTJ, "UH"),
        "one" | "two" | "three" | "four" | "five" | "six" | "seven" | "eight" | "nine"
        | "ten" | "hundred" | "thousand" => t(pos::NUM, "CD"),
        _ => return None,
    };
    Some(tag)
}

/// Irregular simple past forms that are never participles.
const PAST_ONLY: &[&str] = &[
    "went", "saw", "came", "took", "gave", "knew", "ran", "began", "ate", "fell", "rose", "wrote",
    "rode", "spoke", "broke", "chose", "drove", "froze", "grew", "threw", "wore", "sang", "sank",
    "swam", "drank", "forgot", "became", "shook", "hid", "lay", "stole", "flew", "drew",
];

/// Irregular forms shared by the simple past and the past participle.
const PAST_OR_PARTICIPLE: &[&str] = &[
    "said", "made", "got", "thought", "told", "found", "left", "felt", "kept", "heard", "held",
    "brought", "bought", "caught", "taught", "fought", "meant", "sent", "spent", "built", "lost",
    "paid", "laid", "led", "sat", "stood", "slept", "understood", "won", "hung", "struck", "met",
    "fed",
];

const PARTICIPLE_ONLY: &[&str] = &[
    "gone", "seen", "taken", "given", "known", "gotten", "done", "written", "ridden", "spoken",
    "broken", "chosen", "driven", "eaten", "fallen", "forgotten", "frozen", "grown", "hidden",
    "shown", "stolen", "thrown", "worn", "begun", "sung", "swum", "drunk", "flown", "drawn",
    "risen", "shaken", "born",
];

const BASE_VERBS: &[&str] = &[
    "say", "go", "come", "get", "make", "know", "think", "take", "see", "look", "want", "give",
    "use", "find", "tell", "ask", "seem", "feel", "try", "leave", "call", "keep", "let", "begin",
    "help", "talk", "turn", "start", "show", "hear", "play", "run", "move", "live", "believe",
    "hold", "bring", "happen", "write", "sit", "stand", "lose", "pay", "meet", "include",
    "continue", "learn", "change", "lead", "understand", "watch", "follow", "stop", "create",
    "speak", "read", "spend", "grow", "open", "walk", "win", "offer", "remember", "love",
    "consider", "appear", "buy", "wait", "serve", "die", "send", "expect", "build", "stay",
    "fall", "reach", "kill", "remain", "cry", "eat", "sleep", "mean", "hurry", "listen", "laugh",
    "smell", "wonder", "hate", "need", "fix", "wash", "break", "carry", "climb", "close", "drink",
    "jump", "pull", "push", "put", "hit", "cut", "set", "shut", "bellow", "moan", "hush",
];

const NOUN_SUFFIXES: &[&str] = &[
    "tion", "sion", "ness", "ment", "ity", "ship", "ism", "ance", "ence", "hood", "dom", "ist",
];

const ADJ_SUFFIXES: &[&str] = &[
    "ous", "ful", "ive", "able", "ible", "less", "ical", "ish", "ary", "al", "ic",
];

fn base_verb(lower: &str) -> bool {
    BASE_VERBS.contains(&lower)
}

fn third_person_base(lower: &str) -> Option<String> {
    if let Some(stem) = lower.strip_suffix("ies") {
        return Some(format!("{stem}y"));
    }
    if let Some(stem) = lower.strip_suffix("es") {
        if base_verb(stem) {
            return Some(stem.to_string());
        }
    }
    lower.strip_suffix('s').map(str::to_string)
}

fn lexical_tag(word: &str, lower: &str, sentence_initial: bool) -> Tag {
    if is_punct(word) {
        return match word {
            w if is_terminal(w) => t(pos::PUNCT, "."),
            "," => t(pos::PUNCT, ","),
            _ => t(pos::PUNCT, ":"),
        };
    }
    if word.chars().any(|c| c.is_ascii_digit())
        && word.chars().all(|c| c.is_ascii_digit() || c == ',' || c == '.')
    {
        return t(pos::NUM, "CD");
    }
    if let Some(tag) = closed_class(lower) {
        return tag;
    }
    if PAST_ONLY.contains(&lower) || PAST_OR_PARTICIPLE.contains(&lower) {
        return t(pos::VERB, "VBD");
    }
    if PARTICIPLE_ONLY.contains(&lower) {
        return t(pos::VERB, "VBN");
    }
    let capitalized = word.chars().next().map(char::is_uppercase).unwrap_or(false);
    if capitalized && !sentence_initial {
        return t(pos::PROPN, "NNP");
    }
    if base_verb(lower) {
        return t(pos::VERB, "VB");
    }
    if lower.ends_with('s') && third_person_base(lower).is_some_and(|b| base_verb(&b)) {
        return t(pos::VERB, "VBZ");
    }
    suffix_tag(lower)
}

fn suffix_tag(lower: &str) -> Tag {
    let long = lower.chars().count() > 4;
    if long && lower.ends_with("ly") {
        return t(pos::ADV, "RB");
    }
    if long && lower.ends_with("ing") {
        return t(pos::VERB, "VBG");
    }
    if long && lower.ends_with("ed") {
        return t(pos::VERB, "VBD");
    }
    let singular = lower
        .strip_suffix('s')
        .filter(|s| !s.ends_with('s'))
        .unwrap_or(lower);
    if NOUN_SUFFIXES.iter().any(|s| lower.ends_with(s)) {
        return t(pos::NOUN, "NN");
    }
    if singular != lower && NOUN_SUFFIXES.iter().any(|s| singular.ends_with(s)) {
        return t(pos::NOUN, "NNS");
    }
    if long && ADJ_SUFFIXES.iter().any(|s| lower.ends_with(s)) {
        return t(pos::ADJ, "JJ");
    }
    if singular != lower && lower.chars().count() > 3 {
        t(pos::NOUN, "NNS")
    } else {
        t(pos::NOUN, "NN")
    }
}

fn is_be(lower: &str) -> bool {
    matches!(
        lower,
        "be" | "am" | "is" | "are" | "was" | "were" | "been" | "being" | "'m" | "’m" | "'re" | "’re"
    )
}

fn is_have(lower: &str) -> bool {
    matches!(lower, "have" | "has" | "had" | "having" | "'ve" | "’ve")
}

fn is_do(lower: &str) -> bool {
    matches!(lower, "do" | "does" | "did")
}

fn can_be_participle(lower: &str) -> bool {
    lower.ends_with("ed") || PAST_OR_PARTICIPLE.contains(&lower)
}

/// Index of the closest earlier token in the same sentence, skipping adverbs
/// and negation.
fn prev_core(tags: &[Tag], sentence_of: &[usize], i: usize) -> Option<usize> {
    let mut j = i;
    while j > 0 {
        j -= 1;
        if sentence_of[j] != sentence_of[i] {
            return None;
        }
        if tags[j].pos != pos::ADV && !(tags[j].pos == pos::PART && tags[j].tag == "RB") {
            return Some(j);
        }
    }
    None
}

fn next_in_sentence(sentence_of: &[usize], i: usize) -> Option<usize> {
    (i + 1 < sentence_of.len() && sentence_of[i + 1] == sentence_of[i]).then_some(i + 1)
}

fn next_core(tags: &[Tag], sentence_of: &[usize], i: usize) -> Option<usize> {
    let mut j = i;
    while let Some(n) = next_in_sentence(sentence_of, j) {
        if tags[n].pos != pos::ADV && !(tags[n].pos == pos::PART && tags[n].tag == "RB") {
            return Some(n);
        }
        j = n;
    }
    None
}

fn refine_tags(lowers: &[String], sentence_of: &[usize], tags: &mut [Tag]) {
    let lexical = tags.to_vec();
    for i in 0..tags.len() {
        let lower = lowers[i].as_str();
        let prev = prev_core(&lexical, sentence_of, i);
        let next = next_in_sentence(sentence_of, i);
        let prev_tag = prev.map(|p| lexical[p]);
        let next_tag = next.map(|n| lexical[n]);

        match lower {
            "to" => {
                if let Some(n) = next_tag {
                    if matches!(n.pos, pos::DET | pos::PRON | pos::PROPN | pos::NOUN | pos::NUM | pos::ADJ) {
                        tags[i] = t(pos::ADP, "IN");
                    }
                }
                continue;
            }
            "that" => {
                let after_verb = prev_tag.is_some_and(|p| p.pos == pos::VERB);
                let after_noun = prev_tag.is_some_and(|p| matches!(p.pos, pos::NOUN | pos::PROPN));
                let before_clause = next_tag.is_some_and(|n| matches!(n.pos, pos::PRON | pos::DET | pos::PROPN));
                if after_verb && before_clause {
                    tags[i] = t(pos::SCONJ, "IN");
                } else if after_noun {
                    tags[i] = t(pos::PRON, "WDT");
                }
                continue;
            }
            "after" | "before" | "since" | "until" | "till" => {
                if next_tag.is_some_and(|n| n.pos == pos::PRON && n.tag == "PRP") {
                    tags[i] = t(pos::SCONJ, "IN");
                }
                continue;
            }
            _ => {}
        }

        let nominal_context = prev_tag
            .is_some_and(|p| p.pos == pos::DET || p.tag == "PRP$" || p.pos == pos::ADJ || (p.pos == pos::ADP && lowers[prev.unwrap_or(0)] != "to"));
        let infinitive_context = prev.is_some_and(|p| {
            lexical[p].tag == "MD" || lowers[p] == "to" || is_do(&lowers[p])
        });
        let perfect_or_passive = prev.is_some_and(|p| {
            lexical[p].pos == pos::AUX && (is_be(&lowers[p]) || is_have(&lowers[p]))
        });

        match (tags[i].pos, tags[i].tag) {
            (pos::VERB, "VB") => {
                if nominal_context {
                    tags[i] = t(pos::NOUN, "NN");
                } else if infinitive_context || prev.is_none() {
                    tags[i] = t(pos::VERB, "VB");
                } else {
                    tags[i] = t(pos::VERB, "VBP");
                }
            }
            (pos::VERB, "VBZ") if nominal_context => tags[i] = t(pos::NOUN, "NNS"),
            (pos::VERB, "VBG") if prev_tag.is_some_and(|p| p.pos == pos::DET || p.tag == "PRP$") => {
                tags[i] = t(pos::NOUN, "NN");
            }
            (pos::VERB, "VBD") if can_be_participle(lower) => {
                if perfect_or_passive {
                    tags[i] = t(pos::VERB, "VBN");
                } else if prev_tag.is_some_and(|p| p.pos == pos::DET || p.tag == "PRP$") {
                    tags[i] = t(pos::ADJ, "JJ");
                }
            }
            _ => {}
        }
    }

    // `have` and `do` with no verb to support are main verbs.
    let refined = tags.to_vec();
    for i in 0..tags.len() {
        let lower = lowers[i].as_str();
        if refined[i].pos == pos::AUX && (is_have(lower) || is_do(lower)) {
            let supports = next_core(&refined, sentence_of, i)
                .is_some_and(|n| matches!(refined[n].pos, pos::VERB | pos::AUX));
            if !supports {
                tags[i] = t(pos::VERB, refined[i].tag);
            }
        }
    }
}

fn irregular_lemma(lower: &str) -> Option<&'static str> {
    let lemma = match lower {
        "am" | "is" | "are" | "was" | "were" | "been" | "being" | "'m" | "’m" | "'re" | "’re" => "be",
        "has" | "had" | "having" | "'ve" | "’ve" => "have",
        "does" | "did" | "done" => "do",
        "n't" | "n’t" => "not",
        "'ll" | "’ll" | "wo" => "will",
        "'d" | "’d" => "would",
        "ca" => "can",
        "i" | "me" => "I",
        "went" | "gone" => "go",
        "saw" | "seen" => "see",
        "came" => "come",
        "took" | "taken" => "take",
        "gave" | "given" => "give",
        "knew" | "known" => "know",
        "said" => "say",
        "made" => "make",
        "got" | "gotten" => "get",
        "thought" => "think",
        "told" => "tell",
        "found" => "find",
        "left" => "leave",
        "felt" => "feel",
        "kept" => "keep",
        "heard" => "hear",
        "held" => "hold",
        "brought" => "bring",
        "ran" => "run",
        "began" | "begun" => "begin",
        "sat" => "sit",
        "stood" => "stand",
        "wrote" | "written" => "write",
        "spoke" | "spoken" => "speak",
        "fell" | "fallen" => "fall",
        "ate" | "eaten" => "eat",
        _ => return None,
    };
    Some(lemma)
}

#[derive(Debug, Clone, Copy)]
struct Clause {
    start: usize,
    end: usize,
    marker: Option<usize>,
    subordinate: bool,
}

fn split_clauses(lowers: &[String], tags: &[Tag]) -> Vec<Clause> {
    let mut clauses = Vec::new();
    let mut current = Clause {
        start: 0,
        end: 0,
        marker: None,
        subordinate: false,
    };
    for j in 0..tags.len() {
        if tags[j].pos == pos::SCONJ {
            if j == current.start {
                current.marker = Some(j);
                current.subordinate = true;
            } else {
                current.end = j;
                clauses.push(current);
                current = Clause {
                    start: j,
                    end: j,
                    marker: Some(j),
                    subordinate: true,
                };
            }
        } else if lowers[j] == "," && current.subordinate && j + 1 < tags.len() {
            current.end = j + 1;
            clauses.push(current);
            current = Clause {
                start: j + 1,
                end: j + 1,
                marker: None,
                subordinate: false,
            };
        }
    }
    current.end = tags.len();
    clauses.push(current);
    clauses
}

fn clause_head(tags: &[Tag], c: &Clause) -> usize {
    let (start, end, marker) = (c.start, c.end, c.marker);
    let candidates = move || (start..end).filter(move |&j| Some(j) != marker);
    candidates()
        .find(|&j| tags[j].pos == pos::VERB)
        .or_else(|| candidates().find(|&j| tags[j].pos == pos::AUX))
        .or_else(|| candidates().find(|&j| matches!(tags[j].pos, pos::NOUN | pos::PROPN | pos::PRON)))
        .or_else(|| candidates().find(|&j| tags[j].pos != pos::PUNCT))
        .or(c.marker)
        .unwrap_or(c.start)
}

fn is_nominal(tag: Tag) -> bool {
    matches!(tag.pos, pos::NOUN | pos::PROPN | pos::PRON) && tag.tag != "PRP$"
}

fn clause_is_passive(lowers: &[String], tags: &[Tag], c: &Clause) -> bool {
    (c.start..c.end).any(|j| {
        tags[j].pos == pos::VERB
            && tags[j].tag == "VBN"
            && (j.saturating_sub(3).max(c.start)..j)
                .any(|k| tags[k].pos == pos::AUX && is_be(&lowers[k]))
    })
}

/// Heads (sentence-local) and labels for one sentence.
fn parse_sentence(lowers: &[String], tags: &[Tag]) -> Vec<(usize, &'static str)> {
    let n = tags.len();
    let clauses = split_clauses(lowers, tags);
    let heads: Vec<usize> = clauses.iter().map(|c| clause_head(tags, c)).collect();
    let root = clauses
        .iter()
        .zip(&heads)
        .find(|(c, _)| !c.subordinate && c.start < c.end)
        .map(|(_, &h)| h)
        .unwrap_or(heads[0]);

    let mut out: Vec<(usize, &'static str)> = vec![(root, "dep"); n];
    out[root] = (root, dep::ROOT);

    for (c, &head) in clauses.iter().zip(&heads) {
        if c.start >= c.end {
            continue;
        }
        if head != root {
            out[head] = (root, if c.subordinate { "advcl" } else { "conj" });
        }
        if let Some(m) = c.marker {
            if m != head {
                out[m] = (head, dep::MARK);
            } else if m != root {
                out[m] = (root, dep::MARK);
            }
        }
        let passive = clause_is_passive(lowers, tags, c);
        let mut pending_adp: Option<usize> = None;

        for j in c.start..c.end {
            if j == head || Some(j) == c.marker || j == root {
                continue;
            }
            let next_in_clause = (j + 1 < c.end).then_some(j + 1);
            let forward = |pred: &dyn Fn(Tag) -> bool, stop: &dyn Fn(Tag) -> bool, limit: usize| {
                ((j + 1)..c.end.min(j + 1 + limit))
                    .take_while(|&k| !stop(tags[k]))
                    .find(|&k| pred(tags[k]))
            };
            let stops_phrase = |tg: Tag| matches!(tg.pos, pos::VERB | pos::AUX | pos::ADP | pos::PUNCT | pos::SCONJ);

            let (target, label): (usize, &'static str) = match tags[j].pos {
                pos::PUNCT => (root, "punct"),
                pos::DET | pos::NUM | pos::ADJ => {
                    match forward(&|tg: Tag| matches!(tg.pos, pos::NOUN | pos::PROPN), &stops_phrase, 4) {
                        Some(k) => (
                            k,
                            match tags[j].pos {
                                pos::DET => "det",
                                pos::NUM => "nummod",
                                _ => "amod",
                            },
                        ),
                        None if tags[j].pos == pos::ADJ => (head, "acomp"),
                        None => (head, "dep"),
                    }
                }
                pos::PRON if tags[j].tag == "PRP$" => {
                    match forward(&|tg: Tag| matches!(tg.pos, pos::NOUN | pos::PROPN), &stops_phrase, 4) {
                        Some(k) => (k, "poss"),
                        None => (head, "dep"),
                    }
                }
                pos::AUX => {
                    let stop = |tg: Tag| matches!(tg.pos, pos::PUNCT | pos::SCONJ);
                    match forward(&|tg: Tag| tg.pos == pos::VERB, &stop, c.end) {
                        Some(k) if is_be(&lowers[j]) && tags[k].tag == "VBN" => (k, dep::AUXPASS),
                        Some(k) => (k, "aux"),
                        None => (head, "aux"),
                    }
                }
                pos::PART => match tags[j].tag {
                    "POS" => (if j > c.start { j - 1 } else { head }, "case"),
                    "TO" => {
                        let stop = |tg: Tag| matches!(tg.pos, pos::PUNCT | pos::SCONJ);
                        (forward(&|tg: Tag| tg.pos == pos::VERB, &stop, 3).unwrap_or(head), "aux")
                    }
                    _ => {
                        let stop = |tg: Tag| matches!(tg.pos, pos::PUNCT | pos::SCONJ);
                        (forward(&|tg: Tag| tg.pos == pos::VERB, &stop, 3).unwrap_or(head), "neg")
                    }
                },
                pos::ADV => match next_in_clause {
                    Some(k) if matches!(tags[k].pos, pos::ADJ | pos::ADV) => (k, "advmod"),
                    _ => (head, "advmod"),
                },
                pos::NOUN | pos::PROPN | pos::PRON => {
                    let compound = matches!(tags[j].pos, pos::NOUN | pos::PROPN)
                        && next_in_clause.is_some_and(|k| matches!(tags[k].pos, pos::NOUN | pos::PROPN));
                    if compound {
                        (j + 1, "compound")
                    } else if let Some(a) = pending_adp.take() {
                        (a, "pobj")
                    } else if j < head {
                        (head, if passive { "nsubjpass" } else { "nsubj" })
                    } else if is_nominal(tags[head]) {
                        (head, "appos")
                    } else {
                        (head, "dobj")
                    }
                }
                pos::ADP => {
                    pending_adp = Some(j);
                    let attach = (c.start..j)
                        .rev()
                        .find(|&k| matches!(tags[k].pos, pos::NOUN | pos::PROPN | pos::PRON | pos::VERB));
                    (attach.unwrap_or(head), "prep")
                }
                pos::CCONJ => (head, "cc"),
                pos::VERB => {
                    let after_to = (c.start..j)
                        .rev()
                        .find(|&k| tags[k].pos != pos::ADV)
                        .is_some_and(|k| tags[k].tag == "TO");
                    (head, if after_to { "xcomp" } else { "conj" })
                }
                pos::INTJ => (root, "intj"),
                pos::SCONJ => (head, dep::MARK),
                _ => (head, "dep"),
            };
            out[j] = if target == j { (root, "dep") } else { (target, label) };
        }
    }
    out
}
