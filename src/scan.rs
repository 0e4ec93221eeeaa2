//! Project file discovery.
//!
//! Walks a project tree and partitions the files of supported languages
//! into source and test sets. Dependency, build output and platform
//! scaffold directories are pruned, as are generated declaration files and
//! anything matching a configured exclusion glob.

use std::path::{Component, Path};

use anyhow::Context;
use globset::{Glob, GlobSet, GlobSetBuilder};
use phf::phf_set;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

use crate::analysis::Language;

/// Directory names never descended into.
static EXCLUDED_DIRS: phf::Set<&'static str> = phf_set! {
    "node_modules",
    "build",
    "dist",
    "ios",
    "android",
    "web",
    "linux",
    "macos",
    "windows",
};

/// Directory names that mark everything below them as tests.
static TEST_DIRS: phf::Set<&'static str> = phf_set! {
    "test",
    "tests",
    "__tests__",
};

/// A discovered file, relative to the scan root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    /// Path relative to the root, `/`-separated.
    pub relative_path: String,
    pub size_bytes: u64,
    /// Extension including the leading dot.
    pub extension: String,
}

impl FileRecord {
    /// Final path component.
    pub fn file_name(&self) -> &str {
        self.relative_path
            .rsplit('/')
            .next()
            .unwrap_or(&self.relative_path)
    }

    /// Parent directory components, outermost first.
    pub fn parent_dirs(&self) -> Vec<&str> {
        let mut parts: Vec<&str> = self.relative_path.split('/').collect();
        parts.pop();
        parts
    }

    pub fn language(&self) -> Option<Language> {
        Language::from_extension(&self.extension)
    }
}

/// Files found under a root, split by role.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanResult {
    pub source_files: Vec<FileRecord>,
    pub test_files: Vec<FileRecord>,
}

/// Walks a project tree applying the exclusion rules.
#[derive(Debug, Clone)]
pub struct FileScanner {
    excluded: GlobSet,
}

impl FileScanner {
    /// Scanner with only the built-in exclusions.
    pub fn new() -> Self {
        Self {
            excluded: GlobSet::empty(),
        }
    }

    /// Scanner that also skips paths matching any of `patterns`.
    ///
    /// Patterns are matched against the `/`-separated path relative to the
    /// scan root.
    pub fn with_excluded_paths(patterns: &[String]) -> anyhow::Result<Self> {
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            let glob = Glob::new(pattern)
                .with_context(|| format!("invalid exclusion pattern {:?}", pattern))?;
            builder.add(glob);
        }
        Ok(Self {
            excluded: builder.build()?,
        })
    }

    /// Scan `root` and classify every supported file.
    pub fn scan(&self, root: &Path) -> anyhow::Result<ScanResult> {
        let metadata = std::fs::metadata(root)
            .with_context(|| format!("cannot access {}", root.display()))?;
        if !metadata.is_dir() {
            anyhow::bail!("{} is not a directory", root.display());
        }

        let mut result = ScanResult::default();

        let walker = WalkDir::new(root)
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !self.is_excluded(root, e));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("skipping unreadable entry: {}", e);
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            let Some(language) = Language::from_path(path) else {
                continue;
            };
            let Some(relative_path) = relative(root, path) else {
                continue;
            };
            let size_bytes = match entry.metadata() {
                Ok(m) => m.len(),
                Err(e) => {
                    warn!("skipping {}: {}", relative_path, e);
                    continue;
                }
            };
            let extension = path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| format!(".{}", e))
                .unwrap_or_default();

            let record = FileRecord {
                relative_path,
                size_bytes,
                extension,
            };
            if is_test_path(&record.relative_path, language) {
                result.test_files.push(record);
            } else {
                result.source_files.push(record);
            }
        }

        result
            .source_files
            .sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
        result
            .test_files
            .sort_by(|a, b| a.relative_path.cmp(&b.relative_path));

        debug!(
            "scanned {}: {} source files, {} test files",
            root.display(),
            result.source_files.len(),
            result.test_files.len()
        );
        Ok(result)
    }

    fn is_excluded(&self, root: &Path, entry: &DirEntry) -> bool {
        let name = entry.file_name().to_string_lossy();

        if entry.file_type().is_dir() {
            if name.starts_with('.') || EXCLUDED_DIRS.contains(&*name) {
                return true;
            }
        } else if name.to_lowercase().ends_with(".d.ts") {
            return true;
        }

        match relative(root, entry.path()) {
            Some(rel) => self.excluded.is_match(&rel),
            None => false,
        }
    }
}

impl Default for FileScanner {
    fn default() -> Self {
        Self::new()
    }
}

/// Whether a relative path names a test file.
///
/// True when a parent directory is a conventional test directory, or the
/// file name carries the language's test suffix.
pub fn is_test_path(relative_path: &str, language: Language) -> bool {
    let mut parts: Vec<&str> = relative_path.split('/').collect();
    let file_name = parts.pop().unwrap_or_default();

    if parts
        .iter()
        .any(|dir| TEST_DIRS.contains(dir.to_lowercase().as_str()))
    {
        return true;
    }
    language.is_test_file_name(file_name)
}

fn relative(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = rel
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    Some(parts.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "// content\n").unwrap();
    }

    fn paths(records: &[FileRecord]) -> Vec<&str> {
        records.iter().map(|r| r.relative_path.as_str()).collect()
    }

    #[test]
    fn test_partitions_and_sorts() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        touch(root, "lib/b.dart");
        touch(root, "lib/a.dart");
        touch(root, "test/a_test.dart");
        touch(root, "src/math.ts");
        touch(root, "src/math.spec.ts");
        touch(root, "src/__tests__/strings.test.ts");
        touch(root, "src/View.tsx");
        touch(root, "README.md");

        let result = FileScanner::new().scan(root).unwrap();

        assert_eq!(
            paths(&result.source_files),
            vec!["lib/a.dart", "lib/b.dart", "src/View.tsx", "src/math.ts"]
        );
        assert_eq!(
            paths(&result.test_files),
            vec!["src/__tests__/strings.test.ts", "src/math.spec.ts", "test/a_test.dart"]
        );
    }

    #[test]
    fn test_builtin_exclusions() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        touch(root, "lib/main.dart");
        touch(root, "node_modules/pkg/index.ts");
        touch(root, "build/gen.dart");
        touch(root, "dist/out.ts");
        touch(root, ".dart_tool/cache.dart");
        touch(root, "ios/Runner/plugin.dart");
        touch(root, "android/app.dart");
        touch(root, "web/entry.dart");
        touch(root, "src/types.d.ts");

        let result = FileScanner::new().scan(root).unwrap();

        assert_eq!(paths(&result.source_files), vec!["lib/main.dart"]);
        assert!(result.test_files.is_empty());
    }

    #[test]
    fn test_root_named_like_excluded_dir() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("build");
        touch(&root, "lib/app.dart");

        let result = FileScanner::new().scan(&root).unwrap();
        assert_eq!(paths(&result.source_files), vec!["lib/app.dart"]);
    }

    #[test]
    fn test_configured_globs() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        touch(root, "lib/app.dart");
        touch(root, "lib/app.g.dart");
        touch(root, "lib/generated/intl.dart");

        let scanner = FileScanner::with_excluded_paths(&[
            "**/*.g.dart".to_string(),
            "lib/generated/**".to_string(),
        ])
        .unwrap();
        let result = scanner.scan(root).unwrap();

        assert_eq!(paths(&result.source_files), vec!["lib/app.dart"]);
    }

    #[test]
    fn test_invalid_glob() {
        assert!(FileScanner::with_excluded_paths(&["lib/[".to_string()]).is_err());
    }

    #[test]
    fn test_missing_root() {
        let temp = TempDir::new().unwrap();
        assert!(FileScanner::new().scan(&temp.path().join("nope")).is_err());

        touch(temp.path(), "file.dart");
        assert!(FileScanner::new().scan(&temp.path().join("file.dart")).is_err());
    }

    #[test]
    fn test_record_fields() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "lib/models/user.dart");

        let result = FileScanner::new().scan(temp.path()).unwrap();
        let record = &result.source_files[0];

        assert_eq!(record.extension, ".dart");
        assert_eq!(record.size_bytes, "// content\n".len() as u64);
        assert_eq!(record.file_name(), "user.dart");
        assert_eq!(record.parent_dirs(), vec!["lib", "models"]);
        assert_eq!(record.language(), Some(Language::Dart));
    }

    #[test]
    fn test_is_test_path() {
        assert!(is_test_path("test/widget.dart", Language::Dart));
        assert!(is_test_path("packages/core/Tests/util.ts", Language::TypeScript));
        assert!(is_test_path("lib/cart_test.dart", Language::Dart));
        assert!(is_test_path("src/App.Spec.ts", Language::TypeScript));
        assert!(!is_test_path("lib/testing.dart", Language::Dart));
        assert!(!is_test_path("src/contest/score.ts", Language::TypeScript));
    }
}
