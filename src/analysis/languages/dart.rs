//! Dart analyzer.
//!
//! Two backends:
//!
//! - A line scanner that spots function headers with a regex and finds the
//!   end of each body by counting braces. Braces inside string literals and
//!   comments are counted like any other, so a stray `{` in a string shifts
//!   the boundaries of the enclosing function.
//! - An external parser process (see [`ExternalParser`]) when configured.

use std::path::Path;

use lazy_static::lazy_static;
use phf::phf_set;
use regex::Regex;
use tracing::debug;

use crate::analysis::{
    load_source, ExternalParser, FunctionDefinition, FunctionKind, Language, LanguageAnalyzer,
    TestSignals,
};
use crate::error::Result;

lazy_static! {
    /// Function header: optional modifier/type words, a name, optional type
    /// parameters, a parameter list, an optional async marker, then a body.
    static ref HEADER: Regex = Regex::new(
        r"^\s*(?:[\w<>\[\]?,]+\s+)*?(\w+)\s*(?:<[^()<>]*>)?\s*\(.*\)\s*(?:(?:async|sync)\*?\s*)?(?:=>|\{)"
    ).unwrap();

    /// An identifier followed by an argument list, with optional type arguments.
    static ref CALL_SITE: Regex = Regex::new(
        r"\b([A-Za-z_$][\w$]*)\s*(?:<[\w<>,\s?]*>)?\s*\("
    ).unwrap();

    /// First string argument of a test declaration.
    static ref TEST_DECLARATION: Regex = Regex::new(
        r#"\b(?:test|group|testWidgets)\s*\(\s*(?:'([^'\n]*)'|"([^"\n]*)")"#
    ).unwrap();
}

/// Header names that are never function definitions.
static DENYLIST: phf::Set<&'static str> = phf_set! {
    "if", "for", "while", "switch", "catch", "factory", "main",
};

/// Keywords that look like calls in test code.
static CALL_KEYWORDS: phf::Set<&'static str> = phf_set! {
    "if", "for", "while", "switch", "catch", "return",
};

/// Analyzer for Dart source and test files.
pub struct DartAnalyzer {
    parser: Option<ExternalParser>,
}

impl DartAnalyzer {
    pub fn new() -> Self {
        Self { parser: None }
    }

    /// Delegate extraction to an external parser instead of the line scanner.
    pub fn with_external_parser(parser: ExternalParser) -> Self {
        Self {
            parser: Some(parser),
        }
    }
}

impl Default for DartAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl LanguageAnalyzer for DartAnalyzer {
    fn language(&self) -> Language {
        Language::Dart
    }

    fn analyze(&self, content: Option<&str>, path: &Path) -> Result<Vec<FunctionDefinition>> {
        // The external parser reads the file itself.
        if let Some(parser) = &self.parser {
            return Ok(parser.parse_file(path)?.into_functions(path));
        }
        let source = load_source(content, path)?;
        Ok(scan_functions(&source))
    }

    fn analyze_test_file(&self, content: Option<&str>, path: &Path) -> Result<TestSignals> {
        if let Some(parser) = &self.parser {
            return Ok(parser.parse_file(path)?.into_signals());
        }
        let source = load_source(content, path)?;
        Ok(scan_test_signals(&source))
    }
}

enum ScanState {
    Searching,
    InBody {
        pending: FunctionDefinition,
        depth: i64,
    },
}

/// Extract function definitions with the line scanner.
///
/// Private names (leading `_`) and denylisted names are skipped. A function
/// whose body never closes before end of input is dropped.
pub fn scan_functions(content: &str) -> Vec<FunctionDefinition> {
    let mut functions = Vec::new();
    let mut state = ScanState::Searching;

    for (idx, line) in content.lines().enumerate() {
        let line_no = idx + 1;

        if let ScanState::Searching = state {
            let Some(name) = header_name(line) else {
                continue;
            };
            let trimmed = line.trim();
            let def = FunctionDefinition {
                name: name.to_string(),
                start_line: line_no,
                end_line: line_no,
                signature: trimmed.to_string(),
                kind: FunctionKind::Function,
                enclosing_type: None,
            };

            if line.contains("=>") && trimmed.ends_with(';') {
                functions.push(def);
                continue;
            }
            state = ScanState::InBody {
                pending: def,
                depth: 0,
            };
        }

        if let ScanState::InBody { depth, .. } = &mut state {
            *depth += brace_balance(line);
            if closes(*depth, line) {
                if let ScanState::InBody { mut pending, .. } =
                    std::mem::replace(&mut state, ScanState::Searching)
                {
                    pending.end_line = line_no;
                    functions.push(pending);
                }
            }
        }
    }

    if let ScanState::InBody { pending, depth } = state {
        debug!(
            "dropping unterminated function {} (line {}, depth {})",
            pending.name, pending.start_line, depth
        );
    }

    functions
}

/// Extract call and mention signals from a Dart test file.
pub fn scan_test_signals(content: &str) -> TestSignals {
    let mut signals = TestSignals::new();

    for caps in CALL_SITE.captures_iter(content) {
        let callee = &caps[1];
        if !CALL_KEYWORDS.contains(callee) {
            signals.add_call(callee);
        }
    }

    for caps in TEST_DECLARATION.captures_iter(content) {
        if let Some(title) = caps.get(1).or_else(|| caps.get(2)) {
            signals.add_mention(title.as_str());
        }
    }

    signals
}

fn header_name(line: &str) -> Option<&str> {
    let name = HEADER.captures(line)?.get(1)?.as_str();
    if DENYLIST.contains(name) || name.starts_with('_') {
        return None;
    }
    Some(name)
}

fn brace_balance(line: &str) -> i64 {
    line.chars().fold(0, |acc, c| match c {
        '{' => acc + 1,
        '}' => acc - 1,
        _ => acc,
    })
}

fn closes(depth: i64, line: &str) -> bool {
    depth == 0 && (line.contains('}') || line.contains(';'))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(functions: &[FunctionDefinition]) -> Vec<&str> {
        functions.iter().map(|f| f.name.as_str()).collect()
    }

    fn spans(functions: &[FunctionDefinition]) -> Vec<(usize, usize)> {
        functions.iter().map(|f| (f.start_line, f.end_line)).collect()
    }

    #[test]
    fn test_skips_private_functions() {
        let source = r#"int add(int a, int b) {
  return a + b;
}

int _helper() {
  return 1;
}
"#;
        let functions = scan_functions(source);
        assert_eq!(names(&functions), vec!["add"]);
        assert_eq!(spans(&functions), vec![(1, 3)]);
        assert_eq!(functions[0].signature, "int add(int a, int b) {");
        assert_eq!(functions[0].kind, FunctionKind::Function);
    }

    #[test]
    fn test_single_line_arrow() {
        let functions = scan_functions("int twice(int x) => x * 2;\n");
        assert_eq!(names(&functions), vec!["twice"]);
        assert_eq!(spans(&functions), vec![(1, 1)]);
    }

    #[test]
    fn test_multi_line_arrow() {
        let source = "Future<void> load() async =>\n    repository.fetch();\n";
        let functions = scan_functions(source);
        assert_eq!(names(&functions), vec!["load"]);
        assert_eq!(spans(&functions), vec![(1, 2)]);
    }

    #[test]
    fn test_closes_on_header_line() {
        let functions = scan_functions("void ping() { log(); }\nvoid pong() {\n}\n");
        assert_eq!(names(&functions), vec!["ping", "pong"]);
        assert_eq!(spans(&functions), vec![(1, 1), (2, 3)]);
    }

    #[test]
    fn test_nested_blocks_and_modifiers() {
        let source = r#"class Counter {
  int value = 0;

  void increment() {
    if (value < 10) {
      value++;
    }
  }

  static Counter create(int start) {
    return Counter()..value = start;
  }
}
"#;
        let functions = scan_functions(source);
        assert_eq!(names(&functions), vec!["increment", "create"]);
        assert_eq!(spans(&functions), vec![(4, 8), (10, 12)]);
    }

    #[test]
    fn test_generic_and_async_star_headers() {
        let source = r#"List<T> wrap<T>(T item) => [item];
Map<String, int> counts(List<String> words) {
  return {};
}
Stream<int> ticks(int n) async* {
  yield n;
}
"#;
        let functions = scan_functions(source);
        assert_eq!(names(&functions), vec!["wrap", "counts", "ticks"]);
        assert_eq!(spans(&functions), vec![(1, 1), (2, 4), (5, 7)]);
    }

    #[test]
    fn test_denylisted_names() {
        let source = r#"void main() {
  runApp(App());
}
"#;
        assert!(scan_functions(source).is_empty());
    }

    #[test]
    fn test_declarations_without_body_are_ignored() {
        let source = "abstract class Repo {\n  Future<void> save(String id);\n}\n";
        assert!(scan_functions(source).is_empty());
    }

    #[test]
    fn test_brace_in_string_shifts_boundaries() {
        // The `{` inside the string literal is counted, so `printBrace` never
        // returns to depth zero and is dropped at end of input along with
        // the function after it.
        let source = r#"void printBrace() {
  print("{");
}
void next() {
}
"#;
        assert!(scan_functions(source).is_empty());
    }

    #[test]
    fn test_unterminated_function_dropped() {
        let source = "int done() => 1;\nvoid open() {\n  work();\n";
        assert_eq!(names(&scan_functions(source)), vec!["done"]);
    }

    #[test]
    fn test_deterministic() {
        let source = "int a() => 1;\nint b() {\n  return 2;\n}\n";
        assert_eq!(scan_functions(source), scan_functions(source));
    }

    #[test]
    fn test_spans_are_valid() {
        let source = "int a() => 1;\nint b() {\n  return 2;\n}\nvoid c() { }\n";
        assert!(scan_functions(source).iter().all(|f| f.has_valid_span()));
    }

    #[test]
    fn test_signals_from_test_file() {
        let source = r#"import 'package:test/test.dart';

void main() {
  group('group description', () {
    test('test description', () {
      if (ready) expect(add(1, 2), equals(3));
    });
    testWidgets("widget test", (tester) async {
      await tester.pumpWidget(App());
    });
  });
}
"#;
        let signals = scan_test_signals(source);

        for call in ["test", "group", "testWidgets", "expect", "add", "equals", "pumpWidget"] {
            assert!(signals.is_called(call), "missing call {call}");
        }
        assert!(!signals.is_called("if"));
        assert!(!signals.is_called("tester"));

        for mention in ["test description", "group description", "widget test", "widget"] {
            assert!(signals.is_mentioned(mention), "missing mention {mention}");
        }
        assert!(!signals.is_mentioned("add"));
    }

    #[test]
    fn test_analyzer_uses_content() {
        let analyzer = DartAnalyzer::new();

        let functions = analyzer
            .analyze(Some("int add(int a, int b) => a + b;\n"), Path::new("missing.dart"))
            .unwrap();
        assert_eq!(names(&functions), vec!["add"]);
    }
}
