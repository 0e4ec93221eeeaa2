//! Supported languages and their file naming conventions.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// A language the analyzer understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Dart,
    TypeScript,
}

impl Language {
    /// All supported languages, in analyzer registration order.
    pub const ALL: [Language; 2] = [Language::Dart, Language::TypeScript];

    /// Name used in coverage reports.
    pub fn display_name(&self) -> &'static str {
        match self {
            Language::Dart => "Dart",
            Language::TypeScript => "TypeScript",
        }
    }

    /// File extensions handled by this language (without dot).
    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            Language::Dart => &["dart"],
            Language::TypeScript => &["ts", "tsx"],
        }
    }

    /// Resolve a language from an extension, with or without the leading dot.
    pub fn from_extension(ext: &str) -> Option<Self> {
        let ext = ext.strip_prefix('.').unwrap_or(ext);
        Self::ALL
            .into_iter()
            .find(|lang| lang.extensions().contains(&ext))
    }

    /// Resolve a language from a file path.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    /// File name suffixes that mark a test file.
    pub fn test_suffixes(&self) -> &'static [&'static str] {
        match self {
            Language::Dart => &["_test.dart"],
            Language::TypeScript => &[".spec.ts", ".test.ts", ".spec.tsx", ".test.tsx"],
        }
    }

    /// Whether a file name follows this language's test naming convention.
    ///
    /// Comparison is case-insensitive.
    pub fn is_test_file_name(&self, file_name: &str) -> bool {
        let lower = file_name.to_lowercase();
        self.test_suffixes().iter().any(|s| lower.ends_with(s))
    }

    /// Expected test file names for a source file `stem.ext`.
    ///
    /// `foo.dart` pairs with `foo_test.dart`; `foo.ts` pairs with
    /// `foo.spec.ts` or `foo.test.ts`.
    pub fn test_file_names(&self, stem: &str, ext: &str) -> Vec<String> {
        let ext = ext.strip_prefix('.').unwrap_or(ext);
        match self {
            Language::Dart => vec![format!("{}_test.{}", stem, ext)],
            Language::TypeScript => vec![
                format!("{}.spec.{}", stem, ext),
                format!("{}.test.{}", stem, ext),
            ],
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}
