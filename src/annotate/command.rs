//! Adapter for an external NLP process.
//!
//! The program receives one JSON request on stdin, either
//! `{"text": "..."}` or `{"words": ["...", ...]}`, and must print a JSON
//! array of tokens on stdout. Token fields may use spaCy attribute names
//! (`lemma_`, `pos_`, `tag_`, `dep_`, `sent`); `head` is the absolute index of
//! the head token in the returned array.

use std::io::Write;
use std::process::{Command, Stdio};

use serde::{Deserialize, Serialize};

use super::{AnnotatedToken, Annotator};
use crate::error::{Result, StyleError};

#[derive(Debug, Serialize)]
#[serde(rename_all = "lowercase")]
enum Request<'a> {
    Text(&'a str),
    Words(&'a [String]),
}

#[derive(Debug, Deserialize)]
struct WireToken {
    text: String,
    #[serde(alias = "lemma_")]
    lemma: String,
    #[serde(alias = "pos_")]
    pos: String,
    #[serde(alias = "tag_")]
    tag: String,
    #[serde(alias = "dep_")]
    dep: String,
    head: usize,
    #[serde(alias = "sent")]
    sentence: usize,
}

impl From<WireToken> for AnnotatedToken {
    fn from(w: WireToken) -> Self {
        AnnotatedToken {
            text: w.text,
            lemma: w.lemma,
            pos: w.pos,
            tag: w.tag,
            dep: w.dep,
            head: w.head,
            sentence: w.sentence,
        }
    }
}

/// Runs a program once per request. The program is spawned fresh each call,
/// so concurrent windows never share a process.
#[derive(Debug, Clone)]
pub struct CommandAnnotator {
    program: String,
    args: Vec<String>,
}

impl CommandAnnotator {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        CommandAnnotator {
            program: program.into(),
            args,
        }
    }

    fn run(&self, request: &Request<'_>) -> Result<Vec<AnnotatedToken>> {
        let payload = serde_json::to_vec(request)?;
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| StyleError::Annotator(format!("cannot start {}: {e}", self.program)))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| StyleError::Annotator("child stdin unavailable".into()))?;
        // Feed stdin from a separate thread so a chatty child cannot fill
        // its stdout pipe while we are still writing.
        let writer = std::thread::spawn(move || stdin.write_all(&payload));

        let output = child
            .wait_with_output()
            .map_err(|e| StyleError::Annotator(format!("{} failed: {e}", self.program)))?;
        writer
            .join()
            .map_err(|_| StyleError::Annotator("stdin writer panicked".into()))?
            .map_err(|e| StyleError::Annotator(format!("writing request failed: {e}")))?;

        if !output.status.success() {
            return Err(StyleError::Annotator(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        parse_response(&output.stdout)
    }
}

/// Decodes a token array and checks that every head points inside it.
fn parse_response(bytes: &[u8]) -> Result<Vec<AnnotatedToken>> {
    let wire: Vec<WireToken> = serde_json::from_slice(bytes)?;
    let len = wire.len();
    let tokens: Vec<AnnotatedToken> = wire.into_iter().map(AnnotatedToken::from).collect();
    if let Some((i, bad)) = tokens.iter().enumerate().find(|(_, t)| t.head >= len) {
        return Err(StyleError::Annotator(format!(
            "token {i} ({:?}) has head {} outside 0..{len}",
            bad.text, bad.head
        )));
    }
    Ok(tokens)
}

impl Annotator for CommandAnnotator {
    fn annotate(&self, text: &str) -> Result<Vec<AnnotatedToken>> {
        self.run(&Request::Text(text))
    }

    fn annotate_words(&self, words: &[String]) -> Result<Vec<AnnotatedToken>> {
        let tokens = self.run(&Request::Words(words))?;
        if tokens.len() != words.len() {
            return Err(StyleError::Annotator(format!(
                "expected {} tokens for pre-tokenized input, got {}",
                words.len(),
                tokens.len()
            )));
        }
        Ok(tokens)
    }
}
