// src/core/call_graph/record.rs
use std::collections::BTreeSet;
use std::path::PathBuf;
use serde::{Serialize, Deserialize};

/// Whether a function body runs synchronously or as a coroutine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FunctionKind {
    Sync,
    Async,
}

/// One function or method discovered in a source file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionRecord {
    /// Bare function name as written in the definition
    pub name: String,
    /// `Type.method` for methods, the bare name otherwise; the graph key
    pub qualified_name: String,
    pub source_file: PathBuf,
    /// 1-based line of the `def`
    pub start_line: usize,
    pub end_line: Option<usize>,
    pub kind: FunctionKind,
    pub is_method: bool,
    pub enclosing_type: Option<String>,
    /// Rendered parameter list, e.g. `(self, x: int = 1, *args, **kwargs) -> str`
    pub signature: String,
    pub docstring: String,
    pub source_snippet: String,
    /// Callee names seen at call sites in the body, unresolved
    pub calls: BTreeSet<String>,
}

impl FunctionRecord {
    pub fn is_async(&self) -> bool {
        self.kind == FunctionKind::Async
    }

    /// Number of source lines spanned by the definition
    pub fn line_count(&self) -> usize {
        match self.end_line {
            Some(end) if end >= self.start_line => end - self.start_line + 1,
            _ => 1,
        }
    }
}
