//! Configuration file schema and discovery.
//!
//! Configuration is optional. When present it is YAML:
//!
//! ```yaml
//! excluded_paths: ["**/*.g.dart"]
//! dart:
//!   parser: tool/dart_parser
//!   timeout_secs: 30
//! jobs: 4
//! min_coverage: 60
//! ```
//!
//! Command-line flags override values read from the file.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::analysis::{AnalyzerFactory, CancellationFlag, ExternalParser, DEFAULT_PARSER_TIMEOUT};
use crate::scan::FileScanner;

/// Config file names looked up in the project root, in order.
pub const DEFAULT_CONFIG_NAMES: &[&str] = &["sentinel.yaml", ".sentinel.yaml"];

/// Commented template written by `sentinel init`.
pub const DEFAULT_TEMPLATE: &str = include_str!("templates/default.yaml");

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
pub struct Config {
    /// Glob patterns for paths to exclude, relative to the project root
    #[serde(default)]
    pub excluded_paths: Vec<String>,
    #[serde(default)]
    pub dart: DartConfig,
    /// Worker thread count (default: rayon's choice)
    #[serde(default)]
    pub jobs: Option<usize>,
    /// Minimum overall coverage percentage
    #[serde(default)]
    pub min_coverage: Option<f64>,
}

/// Dart analyzer settings.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
pub struct DartConfig {
    /// External parser executable
    #[serde(default)]
    pub parser: Option<PathBuf>,
    /// Arguments placed before `--file <path>`
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl Config {
    /// Parse a config from a YAML file. An empty file yields the defaults.
    pub fn parse_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::parse_str(&content).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn parse_str(content: &str) -> anyhow::Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let value: serde_yaml::Value = serde_yaml::from_str(content)?;
        if value.is_null() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_value(value)?)
    }

    /// Find a config file for a project rooted at `root`.
    ///
    /// Looks in the root first, then in the user config directory.
    pub fn discover(root: &Path) -> Option<PathBuf> {
        DEFAULT_CONFIG_NAMES
            .iter()
            .map(|name| root.join(name))
            .chain(user_config_path())
            .find(|path| path.is_file())
    }

    /// Load the explicit config, or a discovered one, or the defaults.
    ///
    /// Returns the path the config was read from, if any.
    pub fn load(explicit: Option<&Path>, root: &Path) -> anyhow::Result<(Self, Option<PathBuf>)> {
        let path = match explicit {
            Some(path) => Some(path.to_path_buf()),
            None => Self::discover(root),
        };
        match path {
            Some(path) => {
                debug!("loading config from {}", path.display());
                let config = Self::parse_file(&path)?;
                Ok((config, Some(path)))
            }
            None => Ok((Self::default(), None)),
        }
    }

    /// Per-file timeout for the external parser.
    pub fn parser_timeout(&self) -> Duration {
        self.dart
            .timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_PARSER_TIMEOUT)
    }

    /// The configured external Dart parser, if any.
    pub fn external_parser(&self, cancel: &CancellationFlag) -> Option<ExternalParser> {
        let program = self.dart.parser.as_ref()?;
        Some(
            ExternalParser::new(program)
                .with_args(self.dart.args.iter().cloned())
                .timeout(self.parser_timeout())
                .cancel_on(cancel.clone()),
        )
    }

    /// Analyzer factory honoring the Dart parser setting.
    pub fn analyzer_factory(&self, cancel: &CancellationFlag) -> AnalyzerFactory {
        match self.external_parser(cancel) {
            Some(parser) => AnalyzerFactory::with_dart_parser(parser),
            None => AnalyzerFactory::new(),
        }
    }

    /// File scanner with the configured exclusions.
    pub fn scanner(&self) -> anyhow::Result<FileScanner> {
        FileScanner::with_excluded_paths(&self.excluded_paths)
    }
}

fn user_config_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "sentinel").map(|dirs| dirs.config_dir().join("config.yaml"))
}

/// Validate a config for correctness.
pub fn validate(config: &Config) -> anyhow::Result<()> {
    for pattern in &config.excluded_paths {
        globset::Glob::new(pattern)
            .map_err(|e| anyhow::anyhow!("invalid excluded_paths pattern {:?}: {}", pattern, e))?;
    }

    if config.dart.timeout_secs == Some(0) {
        anyhow::bail!("dart.timeout_secs must be greater than zero");
    }

    if config.jobs == Some(0) {
        anyhow::bail!("jobs must be greater than zero");
    }

    if let Some(min) = config.min_coverage {
        if !(0.0..=100.0).contains(&min) {
            anyhow::bail!("min_coverage must be between 0 and 100, got {}", min);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_config() {
        let yaml = r#"
excluded_paths:
  - "**/*.g.dart"
dart:
  parser: tool/dart_parser
  args: ["run", "parser.dart"]
  timeout_secs: 5
jobs: 2
min_coverage: 60.5
"#;
        let config = Config::parse_str(yaml).unwrap();
        assert_eq!(config.excluded_paths, vec!["**/*.g.dart"]);
        assert_eq!(config.dart.parser, Some(PathBuf::from("tool/dart_parser")));
        assert_eq!(config.dart.args, vec!["run", "parser.dart"]);
        assert_eq!(config.parser_timeout(), Duration::from_secs(5));
        assert_eq!(config.jobs, Some(2));
        assert_eq!(config.min_coverage, Some(60.5));
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_empty_config() {
        assert_eq!(Config::parse_str("").unwrap(), Config::default());
        assert_eq!(Config::parse_str("# nothing here\n").unwrap(), Config::default());

        let config = Config::default();
        assert_eq!(config.parser_timeout(), DEFAULT_PARSER_TIMEOUT);
        assert!(config.external_parser(&CancellationFlag::new()).is_none());
    }

    #[test]
    fn test_template_is_valid() {
        let config = Config::parse_str(DEFAULT_TEMPLATE).unwrap();
        assert!(validate(&config).is_ok());
        assert_eq!(config.dart.timeout_secs, Some(30));
        assert!(config.dart.parser.is_none());
        assert!(config.scanner().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config {
            excluded_paths: vec!["lib/[".to_string()],
            ..Default::default()
        };
        assert!(validate(&config).is_err());

        config.excluded_paths.clear();
        config.jobs = Some(0);
        assert!(validate(&config).is_err());

        config.jobs = None;
        config.min_coverage = Some(120.0);
        assert!(validate(&config).is_err());

        config.min_coverage = None;
        config.dart.timeout_secs = Some(0);
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_discover_in_root() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(".sentinel.yaml"), "jobs: 3\n").unwrap();

        let found = Config::discover(temp.path()).unwrap();
        assert_eq!(found, temp.path().join(".sentinel.yaml"));

        fs::write(temp.path().join("sentinel.yaml"), "jobs: 1\n").unwrap();
        let (config, path) = Config::load(None, temp.path()).unwrap();
        assert_eq!(path, Some(temp.path().join("sentinel.yaml")));
        assert_eq!(config.jobs, Some(1));
    }

    #[test]
    fn test_explicit_config_must_exist() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("nope.yaml");
        assert!(Config::load(Some(&missing), temp.path()).is_err());
    }

    #[test]
    fn test_unknown_yaml_shape_is_error() {
        assert!(Config::parse_str("jobs: many\n").is_err());
    }
}
