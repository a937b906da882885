//! Fixed-length, fixed-step windows over a section's token stream.
//!
//! Windows start at `0, step, 2 * step, ...` while `start + length <= n`.
//! Trailing tokens that cannot fill a whole window are dropped.

use serde::{Deserialize, Serialize};

use crate::annotate::{AnnotatedToken, Annotator};
use crate::error::{Result, StyleError};

/// Window length and step, shared by every window of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowConfig {
    pub length: usize,
    pub step: usize,
}

impl Default for WindowConfig {
    fn default() -> Self {
        WindowConfig {
            length: 200,
            step: 100,
        }
    }
}

impl WindowConfig {
    pub fn new(length: usize, step: usize) -> Result<Self> {
        let config = WindowConfig { length, step };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.length == 0 {
            return Err(StyleError::InvalidConfig("window length must be positive".into()));
        }
        if self.step == 0 {
            return Err(StyleError::InvalidConfig("window step must be positive".into()));
        }
        Ok(())
    }

    /// Number of whole windows over `n` tokens: `(n - length) / step + 1`,
    /// or 0 when `n < length`.
    pub fn window_count(&self, n: usize) -> usize {
        if n < self.length || self.step == 0 {
            0
        } else {
            (n - self.length) / self.step + 1
        }
    }

    /// Start offsets of every whole window over `n` tokens.
    pub fn starts(&self, n: usize) -> impl Iterator<Item = usize> + use<> {
        let step = self.step.max(1);
        (0..self.window_count(n)).map(move |i| i * step)
    }
}

/// A contiguous slice of a section's word stream.
#[derive(Debug, Clone, Copy)]
pub struct Window<'a> {
    pub section: &'a str,
    pub start: usize,
    pub words: &'a [String],
}

impl<'a> Window<'a> {
    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// The window's words joined with single spaces.
    pub fn text(&self) -> String {
        self.words.join(" ")
    }

    /// Re-annotates the window as a standalone text.
    ///
    /// Sentence boundaries and dependency heads come from the window's own
    /// words, never from the parent document's parse, so a sentence cut by
    /// the window edge becomes a shorter sentence here.
    pub fn annotate(&self, annotator: &dyn Annotator) -> Result<Vec<AnnotatedToken>> {
        annotator.annotate_words(self.words)
    }
}

/// Lazily yields every whole window over `words`.
pub fn slice_windows<'a>(
    section: &'a str,
    words: &'a [String],
    config: &WindowConfig,
) -> impl Iterator<Item = Window<'a>> + 'a {
    let length = config.length;
    config.starts(words.len()).map(move |start| Window {
        section,
        start,
        words: &words[start..start + length],
    })
}
