use std::path::PathBuf;
use thiserror::Error;

/// Main error type for Callflow operations
#[derive(Error, Debug)]
pub enum CallflowError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Parser error: {0}")]
    Parser(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("File system error: {0}")]
    FileSystem(String),

    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("File rejected: {0}")]
    Rejected(#[from] RejectionReason),

    #[error("Scan budget exhausted: {0}")]
    Exhausted(#[from] ExhaustionError),
}

pub type Result<T> = std::result::Result<T, CallflowError>;

/// Why the path governor refused a file or a node.
///
/// Everything except the two count variants is a per-file skip; the count
/// variants end the scan (see [`RejectionReason::exhaustion`]).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RejectionReason {
    #[error("{} resolves outside the project root", path.display())]
    OutsideRoot { path: PathBuf },

    #[error("{} is not a regular file", path.display())]
    NotRegularFile { path: PathBuf },

    #[error("{} is not a supported source file", path.display())]
    NotSourceFile { path: PathBuf },

    #[error("{} is too large ({size} bytes, max {limit})", path.display())]
    TooLarge { path: PathBuf, size: u64, limit: u64 },

    #[error("maximum file limit reached ({limit})")]
    FileCountExceeded { limit: usize },

    #[error("maximum node limit reached ({limit})")]
    NodeCountExceeded { limit: usize },
}

impl RejectionReason {
    /// The scan-terminating form of this rejection, if it is one.
    pub fn exhaustion(&self) -> Option<ExhaustionError> {
        match self {
            Self::FileCountExceeded { limit } => Some(ExhaustionError::FileCount { limit: *limit }),
            Self::NodeCountExceeded { limit } => Some(ExhaustionError::NodeCount { limit: *limit }),
            _ => None,
        }
    }
}

/// Failure to turn one source file into function records.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("syntax error at line {line}: {message}")]
    Syntax { message: String, line: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("no parser registered for {}", .0.display())]
    Unsupported(PathBuf),
}

/// A file-count or node-count ceiling was hit and the scan stopped early.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExhaustionError {
    #[error("file limit of {limit} reached, remaining files were not scanned")]
    FileCount { limit: usize },

    #[error("node limit of {limit} reached, remaining functions were dropped")]
    NodeCount { limit: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_count_rejections_are_exhaustion() {
        let file_cap = RejectionReason::FileCountExceeded { limit: 3 };
        let node_cap = RejectionReason::NodeCountExceeded { limit: 9 };
        let too_large = RejectionReason::TooLarge {
            path: PathBuf::from("big.py"),
            size: 10,
            limit: 5,
        };

        assert_eq!(file_cap.exhaustion(), Some(ExhaustionError::FileCount { limit: 3 }));
        assert_eq!(node_cap.exhaustion(), Some(ExhaustionError::NodeCount { limit: 9 }));
        assert_eq!(too_large.exhaustion(), None);
    }

    #[test]
    fn syntax_error_message_names_line() {
        let err = ParseError::Syntax {
            message: "unexpected token".to_string(),
            line: 7,
        };
        assert_eq!(err.to_string(), "syntax error at line 7: unexpected token");
    }
}
