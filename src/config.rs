use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{CallflowError, Result};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Resource ceilings enforced by the path governor
    pub limits: LimitsConfig,

    /// Source discovery and parsing settings
    pub analysis: AnalysisConfig,

    /// Output and visualization sizing
    pub output: OutputConfig,

    /// Persisted analysis cache
    pub cache: CacheConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum file size to parse (in bytes)
    pub max_file_size: u64,

    /// Maximum number of files scanned per project
    pub max_files: usize,

    /// Maximum number of nodes in one graph
    pub max_nodes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Number of concurrent parse workers
    pub worker_count: usize,

    /// File extensions treated as source files
    pub extensions: Vec<String>,

    /// Directory names pruned during traversal
    pub excluded_dirs: Vec<String>,

    /// Maximum characters kept from a function body
    pub snippet_chars: usize,

    /// Maximum length of a sanitized name
    pub max_name_len: usize,

    /// Whether directory symlinks are followed while walking
    pub follow_links: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Node budget for visualization-optimized graphs
    pub max_visual_nodes: usize,

    /// Expansion depth used when shrinking a graph for display
    pub visual_depth: usize,

    /// Pretty-print JSON output
    pub pretty: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Location of the persisted cache file, if any
    pub path: Option<PathBuf>,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_file_size: 5 * 1024 * 1024, // 5MB
            max_files: 1000,
            max_nodes: 5000,
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            worker_count: 4,
            extensions: vec!["py".to_string()],
            excluded_dirs: [
                "__pycache__",
                ".git",
                ".hg",
                ".svn",
                ".venv",
                "venv",
                "env",
                "node_modules",
                ".idea",
                ".tox",
                ".mypy_cache",
                "build",
                "dist",
                "target",
            ]
            .iter()
            .map(|d| d.to_string())
            .collect(),
            snippet_chars: 800,
            max_name_len: 200,
            follow_links: false,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            max_visual_nodes: 100,
            visual_depth: 2,
            pretty: true,
        }
    }
}

/// Command-line values that take precedence over the loaded file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub max_file_size: Option<u64>,
    pub max_files: Option<usize>,
    pub max_nodes: Option<usize>,
    pub worker_count: Option<usize>,
    pub cache_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| CallflowError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| CallflowError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load configuration with fallback to default
    pub fn load_or_default<P: AsRef<Path>>(path: Option<P>) -> Result<Self> {
        match path {
            Some(p) => {
                if p.as_ref().exists() {
                    Self::load(p)
                } else {
                    Ok(Self::default())
                }
            }
            None => {
                let candidates = ["callflow.toml", ".callflow.toml", "Callflow.toml"];

                for candidate in &candidates {
                    if Path::new(candidate).exists() {
                        return Self::load(candidate);
                    }
                }

                Ok(Self::default())
            }
        }
    }

    pub fn apply_overrides(&mut self, overrides: Overrides) -> Result<()> {
        if let Some(size) = overrides.max_file_size {
            self.limits.max_file_size = size;
        }
        if let Some(files) = overrides.max_files {
            self.limits.max_files = files;
        }
        if let Some(nodes) = overrides.max_nodes {
            self.limits.max_nodes = nodes;
        }
        if let Some(workers) = overrides.worker_count {
            self.analysis.worker_count = workers;
        }
        if overrides.cache_path.is_some() {
            self.cache.path = overrides.cache_path;
        }
        self.validate()
    }

    fn validate(&self) -> Result<()> {
        if self.analysis.worker_count == 0 {
            return Err(CallflowError::Config("worker_count must be at least 1".to_string()));
        }
        if self.analysis.extensions.is_empty() {
            return Err(CallflowError::Config("at least one source extension is required".to_string()));
        }
        if self.analysis.max_name_len == 0 {
            return Err(CallflowError::Config("max_name_len must be positive".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_limits() {
        let config = Config::default();
        assert_eq!(config.limits.max_file_size, 5 * 1024 * 1024);
        assert_eq!(config.limits.max_files, 1000);
        assert_eq!(config.limits.max_nodes, 5000);
        assert_eq!(config.analysis.worker_count, 4);
        assert!(config.analysis.excluded_dirs.iter().any(|d| d == "__pycache__"));
    }

    #[test]
    fn partial_toml_keeps_remaining_defaults() {
        let config: Config = toml::from_str("[limits]\nmax_files = 12\n").unwrap();
        assert_eq!(config.limits.max_files, 12);
        assert_eq!(config.limits.max_nodes, 5000);
        assert_eq!(config.analysis.snippet_chars, 800);
    }

    #[test]
    fn overrides_take_precedence() {
        let mut config = Config::default();
        config
            .apply_overrides(Overrides {
                max_nodes: Some(10),
                worker_count: Some(2),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(config.limits.max_nodes, 10);
        assert_eq!(config.analysis.worker_count, 2);
        assert_eq!(config.limits.max_files, 1000);
    }

    #[test]
    fn zero_workers_is_rejected() {
        let mut config = Config::default();
        let result = config.apply_overrides(Overrides {
            worker_count: Some(0),
            ..Default::default()
        });
        assert!(matches!(result, Err(CallflowError::Config(_))));
    }

    #[test]
    fn save_then_load_preserves_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("callflow.toml");

        let mut config = Config::default();
        config.limits.max_files = 42;
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.limits.max_files, 42);
    }
}
