//! Source and test file analysis.
//!
//! This module extracts function definitions from source files and call /
//! mention signals from test files. Each supported language has one
//! `LanguageAnalyzer`:
//!
//! - Dart: a line-scanning brace-depth state machine, or an external parser
//!   process when one is configured
//! - TypeScript: a tree-sitter syntax tree walk
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌─────────────────┐     ┌────────────────────┐
//! │ FileRecord      │────▶│ AnalyzerFactory │────▶│ LanguageAnalyzer   │
//! └─────────────────┘     │ (by extension)  │     │ (Dart, TypeScript) │
//!                         └─────────────────┘     └────────────────────┘
//!                                                    │              │
//!                                                    ▼              ▼
//!                                       FunctionDefinition[]   TestSignals
//! ```
//!
//! # Adding a New Language
//!
//! 1. Add a variant to `Language` with its extensions and test naming rules
//! 2. Create a module in `src/analysis/languages/`
//! 3. Implement `LanguageAnalyzer`
//! 4. Register the analyzer in `AnalyzerFactory::new`

mod cancel;
mod external;
mod facts;
mod language;
mod languages;
mod traits;

pub use cancel::CancellationFlag;
pub use external::{ExternalParser, ParserOutput, DEFAULT_PARSER_TIMEOUT};
pub use facts::{FunctionDefinition, FunctionKind, TestSignals};
pub use language::Language;
pub use languages::{
    scan_functions, scan_test_signals, AnalyzerFactory, DartAnalyzer, TypeScriptAnalyzer,
};
pub use traits::{load_source, LanguageAnalyzer, ParsedFile};
