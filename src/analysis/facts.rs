//! Fact structures extracted from source and test files.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Kind of callable definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FunctionKind {
    Function,
    Method,
    Getter,
    Setter,
}

impl FunctionKind {
    /// Convert to a string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            FunctionKind::Function => "function",
            FunctionKind::Method => "method",
            FunctionKind::Getter => "getter",
            FunctionKind::Setter => "setter",
        }
    }
}

impl fmt::Display for FunctionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A function or method definition extracted from one file.
///
/// Lines are 1-indexed and inclusive. The serialized field names follow the
/// external parser protocol (`type`, `className`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionDefinition {
    pub name: String,
    pub start_line: usize,
    pub end_line: usize,
    pub signature: String,
    #[serde(rename = "type")]
    pub kind: FunctionKind,
    #[serde(default, rename = "className", skip_serializing_if = "Option::is_none")]
    pub enclosing_type: Option<String>,
}

impl FunctionDefinition {
    /// Whether the line span satisfies `1 <= start <= end`.
    pub fn has_valid_span(&self) -> bool {
        self.start_line >= 1 && self.start_line <= self.end_line
    }
}

/// Signals gathered from a test file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestSignals {
    /// Callee names of every invocation in the file.
    pub calls: BTreeSet<String>,
    /// Titles passed to test declarations, plus their whitespace tokens.
    pub mentions: BTreeSet<String>,
}

impl TestSignals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_called(&self, name: &str) -> bool {
        self.calls.contains(name)
    }

    pub fn is_mentioned(&self, name: &str) -> bool {
        self.mentions.contains(name)
    }

    pub fn add_call(&mut self, callee: &str) {
        if !callee.is_empty() {
            self.calls.insert(callee.to_string());
        }
    }

    /// Record a test title and each of its whitespace-separated tokens.
    pub fn add_mention(&mut self, title: &str) {
        self.mentions.insert(title.to_string());
        for token in title.split_whitespace() {
            self.mentions.insert(token.to_string());
        }
    }
}
