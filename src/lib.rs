//! Sentinel - heuristic test coverage estimation.
//!
//! Sentinel estimates how well a Dart or TypeScript project is tested
//! without running anything. Each source file is paired with a test file by
//! naming convention, the functions it defines are extracted, and each
//! function is scored by the evidence its test file carries: direct calls,
//! test titles naming it, or a bare textual mention.
//!
//! # Architecture
//!
//! - `scan`: project walk and source/test classification
//! - `analysis`: per-language function and test-signal extraction
//! - `pairing`: source-to-test pairing and the parallel analysis pass
//! - `score`: per-function scores and coverage percentages
//! - `report`: the report document and its pretty/JSON output
//! - `config`: YAML configuration schema and discovery
//!
//! # Adding a New Language
//!
//! Add a variant to [`Language`], implement [`LanguageAnalyzer`] under
//! `src/analysis/languages/` and register it in [`AnalyzerFactory::new`].

pub mod analysis;
pub mod cli;
pub mod config;
pub mod error;
pub mod pairing;
pub mod report;
pub mod scan;
pub mod score;

pub use analysis::{
    AnalyzerFactory, CancellationFlag, DartAnalyzer, ExternalParser, FunctionDefinition,
    FunctionKind, Language, LanguageAnalyzer, TestSignals, TypeScriptAnalyzer,
};
pub use config::Config;
pub use error::AnalysisError;
pub use pairing::PairingService;
pub use report::AnalysisReport;
pub use scan::{FileRecord, FileScanner, ScanResult};
pub use score::{CoverageDetails, FileCoverage, FunctionCoverage};
