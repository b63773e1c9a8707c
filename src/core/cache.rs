// src/core/cache.rs
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{CallflowError, Result};
use super::call_graph::FunctionRecord;
use super::parser::ContentHash;

/// Memoized parse results keyed by file content hash.
///
/// A hash identifies content, not location, so a hit stays valid however
/// the file was moved or renamed. Shared between scan and worker tasks.
#[derive(Debug, Default)]
pub struct AnalysisCache {
    entries: Mutex<HashMap<ContentHash, Arc<Vec<FunctionRecord>>>>,
}

/// One function as stored in the persisted cache file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedFunction {
    pub hash: ContentHash,
    pub summary: FunctionRecord,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CacheFile {
    #[serde(default)]
    projects: BTreeMap<String, ProjectEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ProjectEntry {
    generated_at: DateTime<Utc>,
    /// file path -> function name -> cached function
    files: BTreeMap<String, BTreeMap<String, CachedFunction>>,
}

impl AnalysisCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn get(&self, hash: &ContentHash) -> Option<Arc<Vec<FunctionRecord>>> {
        self.lock().get(hash).cloned()
    }

    pub fn insert(&self, hash: ContentHash, records: Vec<FunctionRecord>) -> Arc<Vec<FunctionRecord>> {
        let records = Arc::new(records);
        self.lock().insert(hash, Arc::clone(&records));
        records
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Warm the cache from a persisted file written for `project_root`.
    ///
    /// Entries whose file content has since changed simply never match a
    /// current hash, so no timestamp check is needed. Returns how many file
    /// entries were loaded; a missing cache file loads nothing.
    pub fn load_persisted(&self, cache_file: &Path, project_root: &Path) -> Result<usize> {
        if !cache_file.exists() {
            debug!("No persisted cache at {}", cache_file.display());
            return Ok(0);
        }

        let content = std::fs::read_to_string(cache_file)?;
        let mut file: CacheFile = serde_json::from_str(&content)?;
        let Some(project) = file.projects.remove(&project_key(project_root)) else {
            return Ok(0);
        };

        let mut loaded = 0;
        let mut entries = self.lock();
        for (path, functions) in project.files {
            let Some(hash) = functions.values().next().map(|f| f.hash.clone()) else {
                continue;
            };
            if functions.values().any(|f| f.hash != hash) {
                warn!("Ignoring inconsistent cache entry for {}", path);
                continue;
            }

            let mut records: Vec<FunctionRecord> = functions.into_values().map(|f| f.summary).collect();
            records.sort_by_key(|r| r.start_line);
            entries.insert(hash, Arc::new(records));
            loaded += 1;
        }

        info!("Loaded {} cached files from {}", loaded, cache_file.display());
        Ok(loaded)
    }

    /// Write the entries for `files` under `project_root`, keeping other projects.
    pub fn save_persisted(&self, cache_file: &Path, project_root: &Path, files: &[(PathBuf, ContentHash)]) -> Result<()> {
        let mut file = if cache_file.exists() {
            let content = std::fs::read_to_string(cache_file)?;
            serde_json::from_str(&content).unwrap_or_else(|e| {
                warn!("Replacing unreadable cache file {}: {}", cache_file.display(), e);
                CacheFile::default()
            })
        } else {
            CacheFile::default()
        };

        let entries = self.lock();
        let mut stored: BTreeMap<String, BTreeMap<String, CachedFunction>> = BTreeMap::new();
        for (path, hash) in files {
            let Some(records) = entries.get(hash) else {
                continue;
            };
            let mut functions = BTreeMap::new();
            for record in records.iter() {
                let cached = CachedFunction {
                    hash: hash.clone(),
                    summary: record.clone(),
                };
                // Redefinitions (property setters, overloads) keep their own entry.
                let key = if functions.contains_key(&record.qualified_name) {
                    format!("{}@{}", record.qualified_name, record.start_line)
                } else {
                    record.qualified_name.clone()
                };
                functions.insert(key, cached);
            }
            stored.insert(path.to_string_lossy().to_string(), functions);
        }
        drop(entries);

        file.projects.insert(
            project_key(project_root),
            ProjectEntry {
                generated_at: Utc::now(),
                files: stored,
            },
        );

        if let Some(parent) = cache_file.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let content = serde_json::to_string_pretty(&file)?;
        std::fs::write(cache_file, content)
            .map_err(|e| CallflowError::FileSystem(format!("cannot write cache {}: {}", cache_file.display(), e)))?;

        debug!("Persisted {} files to {}", files.len(), cache_file.display());
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ContentHash, Arc<Vec<FunctionRecord>>>> {
        // Entries are replaced whole, so a poisoned lock still guards a consistent map.
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn project_key(project_root: &Path) -> String {
    std::fs::canonicalize(project_root)
        .unwrap_or_else(|_| project_root.to_path_buf())
        .to_string_lossy()
        .to_string()
}
