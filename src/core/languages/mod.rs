//! Language-specific parsers
//!
//! Each language gets its own module implementing [`LanguageParser`], which
//! turns one file's source text into function records without executing it.

mod python;

pub use python::PythonParser;

use std::path::Path;

use crate::config::AnalysisConfig;
use crate::error::ParseError;
use super::call_graph::FunctionRecord;

/// Trait that all language parsers must implement
pub trait LanguageParser: Send {
    /// Extract every function definition and its call sites
    fn parse(&mut self, content: &str, file_path: &Path) -> Result<Vec<FunctionRecord>, ParseError>;

    /// Get the file extensions this parser handles
    fn file_extensions(&self) -> &[&str];

    /// Get the language name
    fn language_name(&self) -> &str;
}

/// Size caps applied while building records
#[derive(Debug, Clone, Copy)]
pub struct ExtractOptions {
    /// Characters of function source kept in `source_snippet`
    pub snippet_chars: usize,
    /// Maximum length of any sanitized name
    pub max_name_len: usize,
}

impl ExtractOptions {
    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self {
            snippet_chars: config.snippet_chars,
            max_name_len: config.max_name_len,
        }
    }
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self::from_config(&AnalysisConfig::default())
    }
}
