//! Corpus loading: one `.xml` file per section, paragraphs marked with `<p>`.
//!
//! Only the ordered paragraph strings are consumed; the surrounding markup
//! is never parsed.

use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use walkdir::WalkDir;

use crate::annotate::AnnotatedToken;
use crate::error::{Result, StyleError};

/// Extension of section files inside a corpus directory.
pub const SECTION_EXTENSION: &str = "xml";

/// One narrative section: its name and its paragraphs in reading order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub section: String,
    pub paragraphs: Vec<String>,
}

impl Document {
    pub fn new(section: impl Into<String>, paragraphs: Vec<String>) -> Self {
        Document {
            section: section.into(),
            paragraphs,
        }
    }

    /// Paragraphs joined with single spaces, the text handed to the annotator.
    pub fn full_text(&self) -> String {
        self.paragraphs.join(" ")
    }
}

/// Pulls paragraph text out of a section file.
///
/// A line is a paragraph if it contains `<p>`. The tags are removed, the rest
/// trimmed and XML entities unescaped. Lines that fail to unescape are kept
/// as written.
pub fn extract_paragraphs(content: &str) -> Vec<String> {
    content
        .lines()
        .filter(|line| line.contains("<p>"))
        .map(|line| {
            let raw = line.replace("<p>", "").replace("</p>", "");
            let raw = raw.trim();
            match quick_xml::escape::unescape(raw) {
                Ok(text) => text.into_owned(),
                Err(_) => raw.to_string(),
            }
        })
        .collect()
}

/// Reads one section file. The section name is the file stem.
pub fn load_document(path: &Path) -> Result<Document> {
    let content = fs::read_to_string(path).map_err(|e| StyleError::io(path, e))?;
    let section = section_name(path);
    Ok(Document::new(section, extract_paragraphs(&content)))
}

/// Section name for a corpus file path (its file stem).
pub fn section_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Lists section files under `path`, sorted by section name.
///
/// A directory is scanned one level deep; a single file is accepted if it
/// carries the section extension. Everything else is skipped.
pub fn collect_sections(path: &Path) -> Result<Vec<PathBuf>> {
    if !path.exists() {
        return Err(StyleError::io(
            path,
            std::io::Error::new(std::io::ErrorKind::NotFound, "corpus path does not exist"),
        ));
    }
    let mut files: Vec<PathBuf> = Vec::new();
    for entry in WalkDir::new(path).max_depth(1).into_iter() {
        let entry = entry.map_err(|e| {
            let p = e.path().map(Path::to_path_buf).unwrap_or_else(|| path.to_path_buf());
            StyleError::io(p, std::io::Error::from(e))
        })?;
        let p = entry.path();
        if entry.file_type().is_file() && has_section_extension(p) {
            files.push(p.to_path_buf());
        } else if entry.depth() > 0 {
            debug!("skipping non-section entry {}", p.display());
        }
    }
    files.sort_by_key(|p| section_name(p));
    Ok(files)
}

/// Loads every section under `path` in section-name order.
pub fn load_corpus(path: &Path) -> Result<Vec<Document>> {
    let files = collect_sections(path)?;
    if files.is_empty() {
        warn!("no .{SECTION_EXTENSION} sections under {}", path.display());
        return Err(StyleError::EmptyCorpus {
            path: path.to_path_buf(),
        });
    }
    files.iter().map(|f| load_document(f)).collect()
}

/// Exact, case-sensitive match: `A.XML` is not a section file.
fn has_section_extension(p: &Path) -> bool {
    p.extension() == Some(OsStr::new(SECTION_EXTENSION))
}

/// True for non-empty strings made only of alphabetic characters.
pub fn is_alphabetic(word: &str) -> bool {
    !word.is_empty() && word.chars().all(char::is_alphabetic)
}

/// Surface forms of the alphabetic tokens, in document order.
///
/// This is the token stream windows are cut from and snippets are sliced out of.
pub fn alphabetic_words(tokens: &[AnnotatedToken]) -> Vec<String> {
    tokens
        .iter()
        .filter(|t| is_alphabetic(&t.text))
        .map(|t| t.text.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paragraphs_are_extracted_and_unescaped() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<TEI>
  <text>
    <body>
      <div type="section">
        <p>Through the fence, between the curling flower spaces.</p>
        <p>Luster &amp; Ben went on.</p>
      </div>
    </body>
  </text>
</TEI>"#;
        let paras = extract_paragraphs(xml);
        assert_eq!(
            paras,
            vec![
                "Through the fence, between the curling flower spaces.".to_string(),
                "Luster & Ben went on.".to_string(),
            ]
        );
    }

    #[test]
    fn full_text_joins_with_spaces() {
        let doc = Document::new("A", vec!["one two".into(), "three".into()]);
        assert_eq!(doc.full_text(), "one two three");
    }

    #[test]
    fn alphabetic_check() {
        assert!(is_alphabetic("Caddy"));
        assert!(!is_alphabetic("n't"));
        assert!(!is_alphabetic("1928"));
        assert!(!is_alphabetic(""));
    }

    #[test]
    fn collect_skips_other_files_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.xml"), "<p>b</p>").unwrap();
        fs::write(dir.path().join("a.xml"), "<p>a</p>").unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();
        fs::write(dir.path().join("a.XML"), "<p>upper</p>").unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("sub").join("c.xml"), "<p>c</p>").unwrap();

        let files = collect_sections(dir.path()).unwrap();
        let names: Vec<String> = files.iter().map(|p| section_name(p)).collect();
        assert_eq!(names, vec!["a".to_string(), "b".to_string()]);
        assert!(files.iter().all(|p| p.extension() == Some(OsStr::new("xml"))));
    }

    #[test]
    #[cfg(target_os = "linux")]
    fn upper_case_twin_does_not_duplicate_a_section() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("A.xml"), "<p>lower</p>").unwrap();
        fs::write(dir.path().join("A.XML"), "<p>upper</p>").unwrap();
        let docs = load_corpus(dir.path()).unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].paragraphs, vec!["lower".to_string()]);
    }

    #[test]
    fn missing_corpus_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = collect_sections(&dir.path().join("nope")).unwrap_err();
        assert!(matches!(err, StyleError::Io { .. }));
    }
}
