use std::collections::BTreeSet;
use std::path::Path;
use tree_sitter::{Node, Parser, TreeCursor};

use crate::core::call_graph::{FunctionKind, FunctionRecord};
use crate::core::sanitize::{sanitize_name, truncate_chars};
use crate::error::{CallflowError, ParseError, Result};
use super::{ExtractOptions, LanguageParser};

const SNIPPET_ELISION: &str = "\n... (truncated)";

/// Python-specific parser using Tree-sitter
pub struct PythonParser {
    parser: Parser,
    options: ExtractOptions,
}

impl PythonParser {
    pub fn new(options: ExtractOptions) -> Result<Self> {
        let mut parser = Parser::new();
        let python_language: tree_sitter::Language = tree_sitter_python::LANGUAGE.into();
        parser.set_language(&python_language)
            .map_err(|e| CallflowError::Parser(format!("Failed to set Python language: {}", e)))?;

        Ok(Self { parser, options })
    }
}

impl LanguageParser for PythonParser {
    fn parse(&mut self, content: &str, file_path: &Path) -> std::result::Result<Vec<FunctionRecord>, ParseError> {
        let tree = self.parser.parse(content, None).ok_or_else(|| ParseError::Syntax {
            message: "parser produced no tree".to_string(),
            line: 1,
        })?;

        let root = tree.root_node();
        if root.has_error() {
            return Err(first_syntax_error(root, content));
        }
        if let Some(statement) = first_legacy_statement(root) {
            return Err(ParseError::Syntax {
                message: format!("Python 2 `{}` is not valid Python 3", statement.kind().trim_end_matches("_statement")),
                line: statement.start_position().row + 1,
            });
        }

        let mut walk = Walk {
            source: content,
            file_path,
            options: self.options,
            types: Vec::new(),
            functions: Vec::new(),
            records: Vec::new(),
        };
        walk.run(root.walk());

        Ok(walk.records)
    }

    fn file_extensions(&self) -> &[&str] {
        &["py"]
    }

    fn language_name(&self) -> &str {
        "python"
    }
}

/// What entering a node pushed, so leaving it can pop the same thing
#[derive(Debug, Clone, Copy)]
enum Frame {
    Plain,
    Type,
    Function,
}

/// Traversal state for one file.
///
/// `types` and `functions` are stacks: a definition pushes on entry and pops
/// on exit, so nested classes and nested functions see the right context.
struct Walk<'a> {
    source: &'a str,
    file_path: &'a Path,
    options: ExtractOptions,
    types: Vec<String>,
    /// Indices into `records` of the functions currently open
    functions: Vec<usize>,
    records: Vec<FunctionRecord>,
}

impl<'a> Walk<'a> {
    /// Depth-first pre-order traversal driven by the cursor, no recursion
    fn run(&mut self, mut cursor: TreeCursor<'_>) {
        let mut frames: Vec<Frame> = Vec::new();

        loop {
            let frame = self.enter(cursor.node());
            frames.push(frame);

            if cursor.goto_first_child() {
                continue;
            }

            loop {
                if let Some(frame) = frames.pop() {
                    self.leave(frame);
                }
                if cursor.goto_next_sibling() {
                    break;
                }
                if !cursor.goto_parent() {
                    return;
                }
            }
        }
    }

    fn enter(&mut self, node: Node<'_>) -> Frame {
        match node.kind() {
            "class_definition" => {
                let name = node
                    .child_by_field_name("name")
                    .map(|n| self.text(n).to_string())
                    .unwrap_or_default();
                self.types.push(name);
                Frame::Type
            }
            "function_definition" => {
                let record = self.function_record(node);
                self.records.push(record);
                self.functions.push(self.records.len() - 1);
                Frame::Function
            }
            "call" => {
                if let Some(&current) = self.functions.last() {
                    if let Some(callee) = self.call_name(node) {
                        let callee = sanitize_name(&callee, self.options.max_name_len);
                        self.records[current].calls.insert(callee);
                    }
                }
                Frame::Plain
            }
            _ => Frame::Plain,
        }
    }

    fn leave(&mut self, frame: Frame) {
        match frame {
            Frame::Type => {
                self.types.pop();
            }
            Frame::Function => {
                self.functions.pop();
            }
            Frame::Plain => {}
        }
    }

    fn function_record(&self, node: Node<'_>) -> FunctionRecord {
        let max_len = self.options.max_name_len;
        let raw_name = node
            .child_by_field_name("name")
            .map(|n| self.text(n))
            .unwrap_or_default();
        let enclosing_type = self.types.last().cloned();

        let qualified_name = match &enclosing_type {
            Some(type_name) => format!("{}.{}", type_name, raw_name),
            None => raw_name.to_string(),
        };

        let is_async = node.child(0).map_or(false, |first| first.kind() == "async");

        FunctionRecord {
            name: sanitize_name(raw_name, max_len),
            qualified_name: sanitize_name(&qualified_name, max_len),
            source_file: self.file_path.to_path_buf(),
            start_line: node.start_position().row + 1,
            end_line: Some(node.end_position().row + 1),
            kind: if is_async { FunctionKind::Async } else { FunctionKind::Sync },
            is_method: enclosing_type.is_some(),
            enclosing_type: enclosing_type.map(|t| sanitize_name(&t, max_len)),
            signature: self.render_signature(node),
            docstring: self.docstring(node).unwrap_or_default(),
            source_snippet: self.snippet(node),
            calls: BTreeSet::new(),
        }
    }

    /// `name()` gives `name`; `recv.attr()` gives `recv.attr` when the
    /// receiver is a plain identifier, otherwise just `attr`.
    fn call_name(&self, call: Node<'_>) -> Option<String> {
        let function = call.child_by_field_name("function")?;
        match function.kind() {
            "identifier" => Some(self.text(function).to_string()),
            "attribute" => {
                let attribute = function.child_by_field_name("attribute")?;
                let attr = self.text(attribute);
                match function.child_by_field_name("object") {
                    Some(object) if object.kind() == "identifier" => {
                        Some(format!("{}.{}", self.text(object), attr))
                    }
                    _ => Some(attr.to_string()),
                }
            }
            _ => None,
        }
    }

    fn render_signature(&self, node: Node<'_>) -> String {
        let mut parts = Vec::new();

        if let Some(params) = node.child_by_field_name("parameters") {
            let mut cursor = params.walk();
            for param in params.named_children(&mut cursor) {
                let field = |name: &str| param.child_by_field_name(name).map(|n| collapse(self.text(n)));
                let rendered = match param.kind() {
                    "comment" => continue,
                    "default_parameter" => match (field("name"), field("value")) {
                        (Some(name), Some(value)) => format!("{}={}", name, value),
                        _ => collapse(self.text(param)),
                    },
                    "typed_default_parameter" => match (field("name"), field("type"), field("value")) {
                        (Some(name), Some(ty), Some(value)) => format!("{}: {} = {}", name, ty, value),
                        _ => collapse(self.text(param)),
                    },
                    "typed_parameter" => match (param.named_child(0), field("type")) {
                        (Some(target), Some(ty)) => format!("{}: {}", collapse(self.text(target)), ty),
                        _ => collapse(self.text(param)),
                    },
                    // identifiers, `*args`, `**kwargs`, bare `*` and `/`
                    _ => collapse(self.text(param)),
                };
                parts.push(rendered);
            }
        }

        let mut signature = format!("({})", parts.join(", "));
        if let Some(return_type) = node.child_by_field_name("return_type") {
            signature.push_str(" -> ");
            signature.push_str(&collapse(self.text(return_type)));
        }
        signature
    }

    /// Leading string literal of the body, quotes and indentation removed
    fn docstring(&self, node: Node<'_>) -> Option<String> {
        let body = node.child_by_field_name("body")?;
        let mut cursor = body.walk();
        let first = body
            .named_children(&mut cursor)
            .find(|child| child.kind() != "comment")?;

        if first.kind() != "expression_statement" {
            return None;
        }
        let literal = first.named_child(0)?;
        if literal.kind() != "string" {
            return None;
        }
        Some(clean_docstring(self.text(literal)))
    }

    fn snippet(&self, node: Node<'_>) -> String {
        let text = self.text(node);
        let limit = self.options.snippet_chars;
        if text.chars().count() > limit {
            format!("{}{}", truncate_chars(text, limit), SNIPPET_ELISION)
        } else {
            text.to_string()
        }
    }

    fn text(&self, node: Node<'_>) -> &'a str {
        self.source.get(node.byte_range()).unwrap_or_default()
    }
}

/// Locate the first ERROR or MISSING node for reporting
fn first_syntax_error(root: Node<'_>, source: &str) -> ParseError {
    let mut cursor = root.walk();

    loop {
        let node = cursor.node();
        if node.is_missing() {
            return ParseError::Syntax {
                message: format!("missing {}", node.kind()),
                line: node.start_position().row + 1,
            };
        }
        if node.is_error() {
            let snippet = source.get(node.byte_range()).unwrap_or_default();
            return ParseError::Syntax {
                message: format!("invalid syntax near `{}`", truncate_chars(&collapse(snippet), 40)),
                line: node.start_position().row + 1,
            };
        }

        // Only descend into subtrees that contain the error.
        if node.has_error() && cursor.goto_first_child() {
            continue;
        }
        loop {
            if cursor.goto_next_sibling() {
                break;
            }
            if !cursor.goto_parent() {
                return ParseError::Syntax {
                    message: "invalid syntax".to_string(),
                    line: 1,
                };
            }
        }
    }
}

/// Statement forms the grammar still accepts but Python 3 rejects
const LEGACY_STATEMENTS: &[&str] = &["print_statement", "exec_statement"];

fn first_legacy_statement(root: Node<'_>) -> Option<Node<'_>> {
    let mut cursor = root.walk();
    loop {
        let node = cursor.node();
        if LEGACY_STATEMENTS.contains(&node.kind()) {
            return Some(node);
        }
        if cursor.goto_first_child() {
            continue;
        }
        loop {
            if cursor.goto_next_sibling() {
                break;
            }
            if !cursor.goto_parent() {
                return None;
            }
        }
    }
}

fn clean_docstring(literal: &str) -> String {
    let unprefixed = literal.trim_start_matches(|c: char| c.is_ascii_alphabetic());
    let inner = ["\"\"\"", "'''", "\"", "'"]
        .iter()
        .find(|quote| unprefixed.starts_with(**quote) && unprefixed.len() >= 2 * quote.len())
        .map(|quote| &unprefixed[quote.len()..unprefixed.len() - quote.len()])
        .unwrap_or(unprefixed);

    let lines: Vec<&str> = inner.lines().collect();
    let indent = lines
        .iter()
        .skip(1)
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.len() - line.trim_start().len())
        .min()
        .unwrap_or(0);

    let mut cleaned: Vec<&str> = lines
        .iter()
        .enumerate()
        .map(|(i, line)| {
            if i == 0 {
                line.trim()
            } else {
                line.get(indent..).unwrap_or_else(|| line.trim_start()).trim_end()
            }
        })
        .collect();

    while cleaned.last().map_or(false, |line| line.is_empty()) {
        cleaned.pop();
    }
    while cleaned.first().map_or(false, |line| line.is_empty()) {
        cleaned.remove(0);
    }
    cleaned.join("\n")
}

fn collapse(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
