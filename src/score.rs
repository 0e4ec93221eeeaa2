//! Coverage scoring.
//!
//! Each function gets a confidence score (0-100) from the evidence found in
//! its paired test file. A file's coverage is the share of its functions
//! with a nonzero score.

use serde::{Deserialize, Serialize};

use crate::analysis::{FunctionDefinition, FunctionKind, TestSignals};

/// Point weights for each kind of evidence.
pub mod points {
    pub const CALL: i32 = 50; // the test invokes the function
    pub const MENTION: i32 = 30; // a test title names it
    pub const TEXT_MATCH: i32 = 10; // the name appears somewhere in the test text
    pub const MAX: i32 = 100;
}

/// Evidence found for one function and the score it earns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverageDetails {
    pub is_called: bool,
    pub is_mentioned: bool,
    pub is_text_match: bool,
    pub score: i32,
}

impl CoverageDetails {
    /// No evidence at all, as for a file without a paired test.
    pub fn uncovered() -> Self {
        Self::default()
    }
}

/// Score `name` against a test file's signals and raw text.
///
/// The substring match only counts when neither the call nor the mention
/// signal fired, so the reachable scores are 0, 10, 30, 50 and 80.
pub fn score_function(name: &str, signals: &TestSignals, test_text: &str) -> CoverageDetails {
    let is_called = signals.is_called(name);
    let is_mentioned = signals.is_mentioned(name);
    let is_text_match = !name.is_empty() && test_text.contains(name);

    let mut score = 0;
    if is_called {
        score += points::CALL;
    }
    if is_mentioned {
        score += points::MENTION;
    }
    if is_text_match && !is_called && !is_mentioned {
        score += points::TEXT_MATCH;
    }

    CoverageDetails {
        is_called,
        is_mentioned,
        is_text_match,
        score: score.clamp(0, points::MAX),
    }
}

/// Coverage result for one function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionCoverage {
    pub function_name: String,
    pub start_line: usize,
    pub end_line: usize,
    #[serde(rename = "type")]
    pub kind: FunctionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
    #[serde(flatten)]
    pub details: CoverageDetails,
    /// True when `score > 0`.
    pub covered: bool,
}

impl FunctionCoverage {
    pub fn new(def: &FunctionDefinition, details: CoverageDetails) -> Self {
        Self {
            function_name: def.name.clone(),
            start_line: def.start_line,
            end_line: def.end_line,
            kind: def.kind,
            class_name: def.enclosing_type.clone(),
            details,
            covered: details.score > 0,
        }
    }

    pub fn score(&self) -> i32 {
        self.details.score
    }
}

/// Coverage result for one source file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileCoverage {
    /// Source path relative to the project root.
    pub file: String,
    pub paired_test_file: Option<String>,
    pub functions: Vec<FunctionCoverage>,
    pub coverage_percentage: f64,
    /// Display name of the language ("Dart", "TypeScript").
    pub language: String,
}

impl FileCoverage {
    pub fn covered_count(&self) -> usize {
        self.functions.iter().filter(|f| f.covered).count()
    }
}

/// Percentage of covered functions, rounded to 2 decimals. 0 for no functions.
pub fn coverage_percentage(functions: &[FunctionCoverage]) -> f64 {
    if functions.is_empty() {
        return 0.0;
    }
    let covered = functions.iter().filter(|f| f.covered).count();
    round2(covered as f64 / functions.len() as f64 * 100.0)
}

/// Mean of the per-file percentages, rounded to 2 decimals. 0 for no files.
pub fn overall_coverage(files: &[FileCoverage]) -> f64 {
    if files.is_empty() {
        return 0.0;
    }
    let total: f64 = files.iter().map(|f| f.coverage_percentage).sum();
    round2(total / files.len() as f64)
}

/// Round half away from zero to 2 decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
