//! Language-specific analyzer implementations.

mod dart;
mod typescript;

pub use dart::{scan_functions, scan_test_signals, DartAnalyzer};
pub use typescript::TypeScriptAnalyzer;

use std::path::Path;

use super::{ExternalParser, LanguageAnalyzer};

/// Maps a file extension to the analyzer that handles it.
///
/// Registration order decides ties: the first analyzer claiming an
/// extension wins.
pub struct AnalyzerFactory {
    analyzers: Vec<Box<dyn LanguageAnalyzer>>,
}

impl AnalyzerFactory {
    /// Factory with the built-in Dart and TypeScript analyzers.
    pub fn new() -> Self {
        Self::from_analyzers(vec![
            Box::new(DartAnalyzer::new()),
            Box::new(TypeScriptAnalyzer::new()),
        ])
    }

    /// Built-in analyzers, with Dart delegating to an external parser.
    pub fn with_dart_parser(parser: ExternalParser) -> Self {
        Self::from_analyzers(vec![
            Box::new(DartAnalyzer::with_external_parser(parser)),
            Box::new(TypeScriptAnalyzer::new()),
        ])
    }

    pub fn from_analyzers(analyzers: Vec<Box<dyn LanguageAnalyzer>>) -> Self {
        Self { analyzers }
    }

    /// Get an analyzer for the given file extension.
    ///
    /// Returns None if no analyzer is registered for the extension.
    pub fn for_extension(&self, ext: &str) -> Option<&dyn LanguageAnalyzer> {
        self.analyzers
            .iter()
            .find(|a| a.handles_extension(ext))
            .map(|a| a.as_ref())
    }

    /// Get an analyzer for a file path, by its extension.
    pub fn for_path(&self, path: &Path) -> Option<&dyn LanguageAnalyzer> {
        let ext = path.extension()?.to_str()?;
        self.for_extension(ext)
    }
}

impl Default for AnalyzerFactory {
    fn default() -> Self {
        Self::new()
    }
}
