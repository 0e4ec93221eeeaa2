//! File-scoped analysis errors.
//!
//! Every variant describes a failure confined to a single file. The pairing
//! pass logs these and leaves the file out of the report; none of them abort
//! a run.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors raised while analyzing one file.
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("cannot read {}: {source}", .path.display())]
    UnreadableFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot parse {}: {message}", .path.display())]
    MalformedSource { path: PathBuf, message: String },
    #[error("external parser failed on {}: {message}", .path.display())]
    ExternalProcess {
        path: PathBuf,
        message: String,
        /// Captured standard error of the parser process.
        stderr: String,
    },
    #[error("external parser timed out after {after:?} on {}", .path.display())]
    Timeout {
        path: PathBuf,
        after: Duration,
        stderr: String,
    },
    #[error("analysis of {} was cancelled", .path.display())]
    Cancelled { path: PathBuf },
}

impl AnalysisError {
    /// Diagnostic output captured from an external process, if any.
    pub fn diagnostics(&self) -> Option<&str> {
        match self {
            AnalysisError::ExternalProcess { stderr, .. } | AnalysisError::Timeout { stderr, .. } => {
                let trimmed = stderr.trim();
                (!trimmed.is_empty()).then_some(trimmed)
            }
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, AnalysisError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_names_file() {
        let err = AnalysisError::MalformedSource {
            path: PathBuf::from("lib/a.dart"),
            message: "no tree".to_string(),
        };
        assert_eq!(err.to_string(), "cannot parse lib/a.dart: no tree");
        assert!(err.diagnostics().is_none());
    }

    #[test]
    fn test_diagnostics_skip_blank_stderr() {
        let err = AnalysisError::ExternalProcess {
            path: PathBuf::from("a.dart"),
            message: "exit status 1".to_string(),
            stderr: "  \n".to_string(),
        };
        assert!(err.diagnostics().is_none());

        let err = AnalysisError::Timeout {
            path: PathBuf::from("a.dart"),
            after: Duration::from_secs(2),
            stderr: "still compiling\n".to_string(),
        };
        assert_eq!(err.diagnostics(), Some("still compiling"));
        assert!(err.to_string().contains("timed out after 2s"));
    }
}
