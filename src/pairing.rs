//! Source/test pairing and per-file coverage.
//!
//! Each source file is paired with at most one test file by naming
//! convention. Functions extracted from the source are scored against the
//! signals and raw text of its paired test. Files are processed in parallel
//! with rayon; the result is sorted by path.

use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use rayon::prelude::*;
use tracing::{debug, trace, warn};

use crate::analysis::{AnalyzerFactory, CancellationFlag, TestSignals};
use crate::error::AnalysisError;
use crate::report::AnalysisReport;
use crate::scan::{FileRecord, FileScanner, ScanResult};
use crate::score::{
    coverage_percentage, score_function, CoverageDetails, FileCoverage, FunctionCoverage,
};

/// Test files grouped by file name for pairing lookups.
pub struct TestIndex<'s> {
    by_name: HashMap<&'s str, Vec<(usize, &'s FileRecord)>>,
}

impl<'s> TestIndex<'s> {
    pub fn new(tests: &'s [FileRecord]) -> Self {
        let mut by_name: HashMap<&str, Vec<(usize, &FileRecord)>> = HashMap::new();
        for (idx, test) in tests.iter().enumerate() {
            by_name.entry(test.file_name()).or_default().push((idx, test));
        }
        Self { by_name }
    }

    /// The test file paired with `source`, if any.
    ///
    /// Candidates carry one of the expected test file names. The candidate
    /// sharing the longest run of trailing parent directories with the
    /// source wins; ties go to the earliest in scan order.
    ///
    /// This refines plain first-match-by-name. When a test file name is
    /// unique in the project, or no candidate shares a directory with the
    /// source, the result is the first match in scan order.
    pub fn find(&self, source: &FileRecord) -> Option<&'s FileRecord> {
        let language = source.language()?;
        let stem = source.file_name().strip_suffix(source.extension.as_str())?;
        let source_dirs = source.parent_dirs();

        language
            .test_file_names(stem, &source.extension)
            .iter()
            .filter_map(|name| self.by_name.get(name.as_str()))
            .flatten()
            .max_by_key(|(idx, test)| {
                (shared_trailing_dirs(&source_dirs, &test.parent_dirs()), Reverse(*idx))
            })
            .map(|(_, test)| *test)
    }
}

fn shared_trailing_dirs(a: &[&str], b: &[&str]) -> usize {
    a.iter()
        .rev()
        .zip(b.iter().rev())
        .take_while(|(x, y)| x == y)
        .count()
}

/// What a paired test file contributes to scoring.
struct TestEvidence {
    signals: TestSignals,
    text: String,
}

/// Pairs source files with tests and scores their functions.
pub struct PairingService<'a> {
    root: &'a Path,
    factory: &'a AnalyzerFactory,
    cancel: CancellationFlag,
    jobs: Option<usize>,
}

impl<'a> PairingService<'a> {
    pub fn new(root: &'a Path, factory: &'a AnalyzerFactory) -> Self {
        Self {
            root,
            factory,
            cancel: CancellationFlag::new(),
            jobs: None,
        }
    }

    /// Stop picking up files once `flag` is set.
    pub fn with_cancellation(mut self, flag: CancellationFlag) -> Self {
        self.cancel = flag;
        self
    }

    /// Cap the number of worker threads. `None` uses the global pool.
    pub fn with_jobs(mut self, jobs: Option<usize>) -> Self {
        self.jobs = jobs.filter(|&n| n > 0);
        self
    }

    /// Scan the root and build the full report.
    pub fn run(&self, scanner: &FileScanner) -> anyhow::Result<AnalysisReport> {
        let scan = scanner.scan(self.root)?;
        let details = self.pair_and_analyze(&scan);
        Ok(AnalysisReport::new(&scan, details))
    }

    /// Coverage for every source file with at least one function.
    pub fn pair_and_analyze(&self, scan: &ScanResult) -> Vec<FileCoverage> {
        match self.jobs {
            Some(jobs) => match rayon::ThreadPoolBuilder::new().num_threads(jobs).build() {
                Ok(pool) => pool.install(|| self.pair_and_analyze_inner(scan)),
                Err(e) => {
                    warn!("cannot build a pool of {} threads, using default: {}", jobs, e);
                    self.pair_and_analyze_inner(scan)
                }
            },
            None => self.pair_and_analyze_inner(scan),
        }
    }

    fn pair_and_analyze_inner(&self, scan: &ScanResult) -> Vec<FileCoverage> {
        let index = TestIndex::new(&scan.test_files);
        let pairs: Vec<(&FileRecord, Option<&FileRecord>)> = scan
            .source_files
            .iter()
            .map(|source| (source, index.find(source)))
            .collect();

        // Each distinct test file is analyzed once and shared read-only.
        let paired: BTreeMap<&str, &FileRecord> = pairs
            .iter()
            .filter_map(|(_, test)| *test)
            .map(|test| (test.relative_path.as_str(), test))
            .collect();
        let evidence: HashMap<&str, TestEvidence> = paired
            .into_par_iter()
            .filter_map(|(path, test)| Some((path, self.load_evidence(test)?)))
            .collect();

        let mut results: Vec<FileCoverage> = pairs
            .par_iter()
            .filter_map(|(source, test)| {
                let paired = test.and_then(|t| {
                    evidence
                        .get(t.relative_path.as_str())
                        .map(|e| (t.relative_path.as_str(), e))
                });
                self.analyze_source(source, paired)
            })
            .collect();

        results.sort_by(|a, b| a.file.cmp(&b.file));
        results
    }

    fn load_evidence(&self, test: &FileRecord) -> Option<TestEvidence> {
        if self.cancel.is_cancelled() {
            return None;
        }
        let path = self.root.join(&test.relative_path);

        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) => {
                warn!(
                    "cannot read test file {}, treating its sources as unpaired: {}",
                    test.relative_path, e
                );
                return None;
            }
        };

        let signals = match self.factory.for_path(&path) {
            Some(analyzer) => match analyzer.analyze_test_file(Some(&text), &path) {
                Ok(signals) => signals,
                Err(e) => {
                    log_failure(&e);
                    TestSignals::new()
                }
            },
            None => TestSignals::new(),
        };

        trace!(
            "{}: {} calls, {} mentions",
            test.relative_path,
            signals.calls.len(),
            signals.mentions.len()
        );
        Some(TestEvidence { signals, text })
    }

    fn analyze_source(
        &self,
        source: &FileRecord,
        paired: Option<(&str, &TestEvidence)>,
    ) -> Option<FileCoverage> {
        if self.cancel.is_cancelled() {
            return None;
        }
        let path = self.root.join(&source.relative_path);

        let Some(analyzer) = self.factory.for_path(&path) else {
            trace!("no analyzer for {}", source.relative_path);
            return None;
        };

        let definitions = match analyzer.analyze(None, &path) {
            Ok(defs) => defs,
            Err(e) => {
                log_failure(&e);
                return None;
            }
        };
        debug!(
            "analyzed {}: found {} functions",
            source.relative_path,
            definitions.len()
        );
        if definitions.is_empty() {
            return None;
        }

        let functions: Vec<FunctionCoverage> = definitions
            .iter()
            .map(|def| {
                let details = match paired {
                    Some((_, evidence)) => {
                        score_function(&def.name, &evidence.signals, &evidence.text)
                    }
                    None => CoverageDetails::uncovered(),
                };
                FunctionCoverage::new(def, details)
            })
            .collect();

        Some(FileCoverage {
            file: source.relative_path.clone(),
            paired_test_file: paired.map(|(test, _)| test.to_string()),
            coverage_percentage: coverage_percentage(&functions),
            functions,
            language: analyzer.language().display_name().to_string(),
        })
    }
}

fn log_failure(err: &AnalysisError) {
    match err {
        AnalysisError::Cancelled { .. } => debug!("{}", err),
        _ => match err.diagnostics() {
            Some(stderr) => warn!("{}\n{}", err, stderr),
            None => warn!("{}", err),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn record(path: &str) -> FileRecord {
        let ext = path.rsplit('.').next().unwrap();
        FileRecord {
            relative_path: path.to_string(),
            size_bytes: 0,
            extension: format!(".{}", ext),
        }
    }

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_pairs_by_naming_convention() {
        let tests = vec![
            record("src/math.spec.ts"),
            record("src/__tests__/strings.test.ts"),
            record("test/calculator_test.dart"),
        ];
        let index = TestIndex::new(&tests);

        let find = |p: &str| index.find(&record(p)).map(|t| t.relative_path.as_str());
        assert_eq!(find("src/math.ts"), Some("src/math.spec.ts"));
        assert_eq!(find("src/strings.ts"), Some("src/__tests__/strings.test.ts"));
        assert_eq!(find("lib/calculator.dart"), Some("test/calculator_test.dart"));
        assert_eq!(find("lib/other.dart"), None);
        // calculator.ts does not pair with the Dart test.
        assert_eq!(find("src/calculator.ts"), None);
    }

    #[test]
    fn test_prefers_matching_directory() {
        let tests = vec![
            record("test/api/user_test.dart"),
            record("test/models/user_test.dart"),
        ];
        let index = TestIndex::new(&tests);

        let found = index.find(&record("lib/models/user.dart")).unwrap();
        assert_eq!(found.relative_path, "test/models/user_test.dart");

        // No directory in common: earliest in scan order.
        let found = index.find(&record("lib/user.dart")).unwrap();
        assert_eq!(found.relative_path, "test/api/user_test.dart");
    }

    #[test]
    fn test_scores_against_paired_test() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        write(
            root,
            "src/math.ts",
            "export function add(a: number, b: number) {\n  return a + b;\n}\n\nexport function sub(a: number, b: number) {\n  return a - b;\n}\n",
        );
        write(
            root,
            "src/math.spec.ts",
            "import { add } from './math';\n\nit('adds numbers', () => {\n  expect(add(1, 2)).toBe(3);\n});\n",
        );

        let scan = FileScanner::new().scan(root).unwrap();
        let factory = AnalyzerFactory::new();
        let results = PairingService::new(root, &factory).pair_and_analyze(&scan);

        assert_eq!(results.len(), 1);
        let file = &results[0];
        assert_eq!(file.paired_test_file.as_deref(), Some("src/math.spec.ts"));
        assert_eq!(file.language, "TypeScript");
        assert_eq!(file.functions[0].function_name, "add");
        assert_eq!(file.functions[0].score(), 50);
        assert!(file.functions[0].covered);
        assert_eq!(file.functions[1].function_name, "sub");
        assert_eq!(file.functions[1].score(), 0);
        assert_eq!(file.coverage_percentage, 50.0);
    }

    #[test]
    fn test_unpaired_and_empty_files() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        write(root, "lib/a.dart", "int add(int a, int b) => a + b;\n");
        write(root, "lib/constants.dart", "const answer = 42;\n");

        let scan = FileScanner::new().scan(root).unwrap();
        let factory = AnalyzerFactory::new();
        let results = PairingService::new(root, &factory)
            .with_jobs(Some(2))
            .pair_and_analyze(&scan);

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].file, "lib/a.dart");
        assert_eq!(results[0].paired_test_file, None);
        assert_eq!(results[0].coverage_percentage, 0.0);
        assert!(results[0].functions.iter().all(|f| f.score() == 0 && !f.covered));
    }

    #[test]
    fn test_unreadable_test_file_leaves_source_unpaired() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        write(root, "lib/a.dart", "int add(int a, int b) => a + b;\n");
        let test_path = root.join("test/a_test.dart");
        fs::create_dir_all(test_path.parent().unwrap()).unwrap();
        let mut bytes = b"test('add', () { expect(add(1, 2), 3); });\n".to_vec();
        bytes.extend_from_slice(&[0xff, 0xfe, 0xfd]);
        fs::write(&test_path, bytes).unwrap();

        let scan = FileScanner::new().scan(root).unwrap();
        assert_eq!(scan.test_files.len(), 1);
        let factory = AnalyzerFactory::new();
        let results = PairingService::new(root, &factory).pair_and_analyze(&scan);

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].paired_test_file, None);
        assert_eq!(results[0].functions[0].score(), 0);
        assert!(!results[0].functions[0].details.is_text_match);
        assert_eq!(results[0].coverage_percentage, 0.0);
    }

    #[test]
    fn test_cancelled_pass_is_empty() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "lib/a.dart", "int add(int a, int b) => a + b;\n");

        let scan = FileScanner::new().scan(temp.path()).unwrap();
        let factory = AnalyzerFactory::new();
        let flag = CancellationFlag::new();
        flag.cancel();

        let results = PairingService::new(temp.path(), &factory)
            .with_cancellation(flag)
            .pair_and_analyze(&scan);
        assert!(results.is_empty());
    }
}
