//! TypeScript language analyzer using tree-sitter.

use std::path::Path;

use streaming_iterator::StreamingIterator;
use tracing::debug;
use tree_sitter::{Language as Grammar, Node, Parser, Query, QueryCursor};

use crate::analysis::{
    load_source, FunctionDefinition, FunctionKind, Language, LanguageAnalyzer, ParsedFile,
    TestSignals,
};
use crate::error::{AnalysisError, Result};

/// Tree-sitter query for call sites in test files.
const CALL_QUERY: &str = r#"
; foo(...)
(call_expression
  function: (identifier) @callee
)

; obj.foo(...)
(call_expression
  function: (member_expression
    property: (_) @member_callee)
)

; describe('title', ...) / it(...) / test(...)
(call_expression
  function: (identifier) @declaration
  arguments: (arguments . (string) @title)
)
"#;

/// Callees whose first string argument is a test title.
const TEST_DECLARATIONS: &[&str] = &["describe", "it", "test"];

/// Initializer node kinds that make a variable a function.
const FUNCTION_VALUES: &[&str] = &[
    "arrow_function",
    "function_expression",
    "function",
    "generator_function",
];

pub struct TypeScriptAnalyzer {
    typescript: Grammar,
    tsx: Grammar,
}

impl TypeScriptAnalyzer {
    pub fn new() -> Self {
        Self {
            typescript: tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            tsx: tree_sitter_typescript::LANGUAGE_TSX.into(),
        }
    }

    fn grammar_for(&self, path: &Path) -> &Grammar {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("tsx") => &self.tsx,
            _ => &self.typescript,
        }
    }

    /// Parse source into a syntax tree.
    ///
    /// Trees containing error nodes are returned as-is and walked best effort.
    pub fn parse(&self, path: &Path, source: &str) -> Result<ParsedFile> {
        let mut parser = Parser::new();
        parser
            .set_language(self.grammar_for(path))
            .map_err(|e| malformed(path, e.to_string()))?;
        let tree = parser
            .parse(source, None)
            .ok_or_else(|| malformed(path, "parser produced no syntax tree".to_string()))?;

        if tree.root_node().has_error() {
            debug!("{} has syntax errors, continuing", path.display());
        }

        Ok(ParsedFile {
            tree,
            source: source.to_string(),
            path: path.to_string_lossy().to_string(),
        })
    }

    /// Function, method and accessor definitions in document order.
    pub fn extract_functions(&self, parsed: &ParsedFile) -> Vec<FunctionDefinition> {
        let mut found: Vec<(usize, FunctionDefinition)> = Vec::new();
        let mut stack = vec![parsed.tree.root_node()];

        while let Some(node) = stack.pop() {
            collect_definitions(parsed, node, &mut found);

            let mut cursor = node.walk();
            let children: Vec<Node> = node.children(&mut cursor).collect();
            stack.extend(children.into_iter().rev());
        }

        found.sort_by_key(|(start, _)| *start);
        found.into_iter().map(|(_, def)| def).collect()
    }

    /// Call and title signals from a test file.
    pub fn extract_test_signals(&self, parsed: &ParsedFile) -> Result<TestSignals> {
        let path = Path::new(&parsed.path);
        let query = Query::new(self.grammar_for(path), CALL_QUERY)
            .map_err(|e| malformed(path, format!("invalid call query: {}", e)))?;
        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(&query, parsed.tree.root_node(), parsed.source.as_bytes());

        let mut signals = TestSignals::new();

        while let Some(m) = matches.next() {
            let mut declaration = None;
            let mut title: Option<String> = None;

            for capture in m.captures {
                let capture_name = query.capture_names()[capture.index as usize];
                match capture_name {
                    "callee" | "member_callee" => {
                        signals.add_call(parsed.node_text(capture.node));
                    }
                    "declaration" => declaration = Some(parsed.node_text(capture.node)),
                    "title" => title = Some(string_value(parsed, capture.node)),
                    _ => {}
                }
            }

            if let (Some(callee), Some(title)) = (declaration, title) {
                if TEST_DECLARATIONS.contains(&callee) {
                    signals.add_mention(&title);
                }
            }
        }

        Ok(signals)
    }
}

impl Default for TypeScriptAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl LanguageAnalyzer for TypeScriptAnalyzer {
    fn language(&self) -> Language {
        Language::TypeScript
    }

    fn analyze(&self, content: Option<&str>, path: &Path) -> Result<Vec<FunctionDefinition>> {
        let source = load_source(content, path)?;
        let parsed = self.parse(path, &source)?;
        Ok(self.extract_functions(&parsed))
    }

    fn analyze_test_file(&self, content: Option<&str>, path: &Path) -> Result<TestSignals> {
        let source = load_source(content, path)?;
        let parsed = self.parse(path, &source)?;
        self.extract_test_signals(&parsed)
    }
}

fn collect_definitions(parsed: &ParsedFile, node: Node, out: &mut Vec<(usize, FunctionDefinition)>) {
    match node.kind() {
        "function_declaration" | "generator_function_declaration" => {
            if let Some(name) = node.child_by_field_name("name") {
                let def = definition(
                    parsed,
                    node,
                    parsed.node_text(name),
                    FunctionKind::Function,
                    None,
                );
                out.push((node.start_byte(), def));
            }
        }
        "class_declaration" | "abstract_class_declaration" => {
            let (Some(name), Some(body)) = (
                node.child_by_field_name("name"),
                node.child_by_field_name("body"),
            ) else {
                return;
            };
            let owner = parsed.node_text(name);

            let mut cursor = body.walk();
            for member in body.named_children(&mut cursor) {
                if member.kind() != "method_definition" {
                    continue;
                }
                let Some(member_name) = member.child_by_field_name("name") else {
                    continue;
                };
                let method = parsed.node_text(member_name);
                if method == "constructor" {
                    continue;
                }
                let kind = accessor_kind(member, member_name);
                out.push((
                    member.start_byte(),
                    definition(parsed, member, method, kind, Some(owner)),
                ));
            }
        }
        "variable_declarator" => {
            let (Some(name), Some(value)) = (
                node.child_by_field_name("name"),
                node.child_by_field_name("value"),
            ) else {
                return;
            };
            if name.kind() == "identifier" && FUNCTION_VALUES.contains(&value.kind()) {
                let def = definition(
                    parsed,
                    value,
                    parsed.node_text(name),
                    FunctionKind::Function,
                    None,
                );
                out.push((value.start_byte(), def));
            }
        }
        _ => {}
    }
}

fn definition(
    parsed: &ParsedFile,
    node: Node,
    name: &str,
    kind: FunctionKind,
    owner: Option<&str>,
) -> FunctionDefinition {
    FunctionDefinition {
        name: name.to_string(),
        start_line: node.start_position().row + 1,
        end_line: node.end_position().row + 1,
        signature: signature(parsed, node),
        kind,
        enclosing_type: owner.map(str::to_string),
    }
}

/// Header text up to the body, without a trailing `=>`.
fn signature(parsed: &ParsedFile, node: Node) -> String {
    let header = match node.child_by_field_name("body") {
        Some(body) => parsed.slice(node.start_byte(), body.start_byte()),
        None => {
            let text = parsed.node_text(node);
            text.split('{').next().unwrap_or(text)
        }
    };
    let header = header.trim();
    header
        .strip_suffix("=>")
        .map(str::trim_end)
        .unwrap_or(header)
        .to_string()
}

/// `get`/`set` keywords appear as anonymous children before the name.
fn accessor_kind(member: Node, name: Node) -> FunctionKind {
    let mut cursor = member.walk();
    for child in member.children(&mut cursor) {
        if child.id() == name.id() {
            break;
        }
        match child.kind() {
            "get" => return FunctionKind::Getter,
            "set" => return FunctionKind::Setter,
            _ => {}
        }
    }
    FunctionKind::Method
}

/// The cooked value of a string literal, with escapes decoded.
fn string_value(parsed: &ParsedFile, node: Node) -> String {
    let mut value = String::new();
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        match child.kind() {
            "escape_sequence" => unescape(parsed.node_text(child), &mut value),
            _ => value.push_str(parsed.node_text(child)),
        }
    }
    value
}

/// Decode one escape sequence (including its backslash) into `out`.
fn unescape(escape: &str, out: &mut String) {
    let Some(body) = escape.strip_prefix('\\') else {
        out.push_str(escape);
        return;
    };
    let mut chars = body.chars();
    let Some(first) = chars.next() else {
        return;
    };
    let rest = chars.as_str();
    match first {
        'n' => out.push('\n'),
        't' => out.push('\t'),
        'r' => out.push('\r'),
        'b' => out.push('\u{8}'),
        'f' => out.push('\u{c}'),
        'v' => out.push('\u{b}'),
        '0' if rest.is_empty() => out.push('\0'),
        // Line continuation.
        '\n' | '\r' | '\u{2028}' | '\u{2029}' => {}
        'x' | 'u' => {
            let hex = rest.trim_start_matches('{').trim_end_matches('}');
            match u32::from_str_radix(hex, 16).ok().and_then(char::from_u32) {
                Some(c) => out.push(c),
                None => out.push_str(escape),
            }
        }
        other => {
            out.push(other);
            out.push_str(rest);
        }
    }
}

fn malformed(path: &Path, message: String) -> AnalysisError {
    AnalysisError::MalformedSource {
        path: path.to_path_buf(),
        message,
    }
}
