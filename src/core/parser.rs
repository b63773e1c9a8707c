use std::fmt;
use std::path::Path;
use serde::{Deserialize, Serialize};
use sha2::{Sha256, Digest};
use tracing::debug;

use crate::config::AnalysisConfig;
use crate::error::{ParseError, Result};
use super::call_graph::FunctionRecord;
use super::languages::{ExtractOptions, LanguageParser, PythonParser};

/// 128-bit digest of a file's raw bytes, rendered as lowercase hex
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentHash(String);

impl ContentHash {
    /// Calculate the SHA-256 of `bytes`, keeping the first 16 bytes
    pub fn of(bytes: &[u8]) -> Self {
        let digest = Sha256::digest(bytes);
        let hex = digest[..16].iter().map(|b| format!("{:02x}", b)).collect();
        Self(hex)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Turns one source file into function records.
///
/// Delegates to the language parser registered for the file's extension.
/// Parsing is read-only: analyzed code is never imported or evaluated.
pub struct SourceUnitParser {
    language_parsers: Vec<Box<dyn LanguageParser>>,
}

impl SourceUnitParser {
    pub fn new(config: &AnalysisConfig) -> Result<Self> {
        let options = ExtractOptions::from_config(config);
        let language_parsers: Vec<Box<dyn LanguageParser>> = vec![Box::new(PythonParser::new(options)?)];

        Ok(Self { language_parsers })
    }

    /// Parse source text that has already been read
    pub fn parse(&mut self, file_path: &Path, source_text: &str) -> std::result::Result<Vec<FunctionRecord>, ParseError> {
        let parser = self
            .parser_for(file_path)
            .ok_or_else(|| ParseError::Unsupported(file_path.to_path_buf()))?;
        debug!("Parsing {} as {}", file_path.display(), parser.language_name());
        parser.parse(source_text, file_path)
    }

    /// Decode raw bytes and parse them
    pub fn parse_bytes(&mut self, file_path: &Path, bytes: &[u8]) -> std::result::Result<Vec<FunctionRecord>, ParseError> {
        let source_text = std::str::from_utf8(bytes)
            .map_err(|e| ParseError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))?;
        self.parse(file_path, source_text)
    }

    /// Read a file from disk and parse it
    pub fn parse_file(&mut self, file_path: &Path) -> std::result::Result<Vec<FunctionRecord>, ParseError> {
        let bytes = std::fs::read(file_path)?;
        self.parse_bytes(file_path, &bytes)
    }

    /// Whether any registered parser handles this file
    pub fn supports(&self, file_path: &Path) -> bool {
        self.language_parsers.iter().any(|p| Self::handles(p.as_ref(), file_path))
    }

    fn parser_for(&mut self, file_path: &Path) -> Option<&mut Box<dyn LanguageParser>> {
        self.language_parsers
            .iter_mut()
            .find(|p| Self::handles(p.as_ref(), file_path))
    }

    fn handles(parser: &dyn LanguageParser, file_path: &Path) -> bool {
        file_path
            .extension()
            .and_then(|ext| ext.to_str())
            .map_or(false, |ext| parser.file_extensions().contains(&ext))
    }
}
