//! Core traits for language analysis.

use std::borrow::Cow;
use std::path::Path;

use super::{FunctionDefinition, Language, TestSignals};
use crate::error::{AnalysisError, Result};

/// Holds a parsed tree-sitter tree and associated metadata.
///
/// Kept separate from the extracted facts so one tree can serve several
/// passes without re-parsing.
pub struct ParsedFile {
    /// The tree-sitter parse tree.
    pub tree: tree_sitter::Tree,
    /// The original source code (kept for node text extraction).
    pub source: String,
    /// The file path (for grammar selection and error reporting).
    pub path: String,
}

impl ParsedFile {
    /// Get text for a tree-sitter node.
    pub fn node_text(&self, node: tree_sitter::Node) -> &str {
        node.utf8_text(self.source.as_bytes()).unwrap_or("")
    }

    /// Get the source text between two byte offsets.
    pub fn slice(&self, start: usize, end: usize) -> &str {
        self.source.get(start..end).unwrap_or("")
    }
}

/// Language-specific analyzer trait.
///
/// `content` may be `None` or empty, in which case the analyzer reads the
/// file at `path` itself. Callers that already hold the text pass it in.
///
/// # Thread Safety
///
/// tree_sitter::Parser is not Sync, so implementations create parsers per
/// call. Every call owns its own accumulation state.
pub trait LanguageAnalyzer: Send + Sync {
    /// The language this analyzer handles.
    fn language(&self) -> Language;

    /// Returns file extensions this analyzer handles (without dot).
    fn file_extensions(&self) -> &'static [&'static str] {
        self.language().extensions()
    }

    /// Extract function definitions, ordered by first appearance.
    fn analyze(&self, content: Option<&str>, path: &Path) -> Result<Vec<FunctionDefinition>>;

    /// Extract call and mention signals from a test file.
    fn analyze_test_file(&self, content: Option<&str>, path: &Path) -> Result<TestSignals> {
        let _ = (content, path);
        Ok(TestSignals::default())
    }

    /// Check if this analyzer handles the given file extension.
    fn handles_extension(&self, ext: &str) -> bool {
        let ext = ext.strip_prefix('.').unwrap_or(ext);
        self.file_extensions().contains(&ext)
    }
}

/// Use the supplied content, or read the file when none was given.
pub fn load_source<'a>(content: Option<&'a str>, path: &Path) -> Result<Cow<'a, str>> {
    match content {
        Some(text) if !text.is_empty() => Ok(Cow::Borrowed(text)),
        _ => std::fs::read_to_string(path)
            .map(Cow::Owned)
            .map_err(|source| AnalysisError::UnreadableFile {
                path: path.to_path_buf(),
                source,
            }),
    }
}
