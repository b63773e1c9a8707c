// src/core/governor.rs
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

use crate::config::{AnalysisConfig, LimitsConfig};
use crate::error::{CallflowError, RejectionReason, Result};

/// Keeps one analysis run inside its project root and its resource budget.
///
/// Counters only ever grow and belong to this instance, so every run needs a
/// fresh governor. Nothing here opens a file; all checks are `stat` calls.
#[derive(Debug)]
pub struct PathGovernor {
    root: PathBuf,
    max_file_size: u64,
    max_files: usize,
    max_nodes: usize,
    extensions: Vec<String>,
    excluded_dirs: HashSet<String>,
    follow_links: bool,
    files_processed: AtomicUsize,
    nodes_created: AtomicUsize,
}

impl PathGovernor {
    pub fn new<P: AsRef<Path>>(root: P, limits: &LimitsConfig, analysis: &AnalysisConfig) -> Result<Self> {
        let root = root.as_ref();
        let resolved = std::fs::canonicalize(root).map_err(|e| {
            CallflowError::FileSystem(format!("cannot resolve project root {}: {}", root.display(), e))
        })?;

        if !resolved.is_dir() {
            return Err(CallflowError::FileSystem(format!(
                "project root {} is not a directory",
                resolved.display()
            )));
        }

        Ok(Self {
            root: resolved,
            max_file_size: limits.max_file_size,
            max_files: limits.max_files,
            max_nodes: limits.max_nodes,
            extensions: analysis.extensions.clone(),
            excluded_dirs: analysis.excluded_dirs.iter().cloned().collect(),
            follow_links: analysis.follow_links,
            files_processed: AtomicUsize::new(0),
            nodes_created: AtomicUsize::new(0),
        })
    }

    /// Canonical project root every candidate must resolve under
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn files_processed(&self) -> usize {
        self.files_processed.load(Ordering::SeqCst)
    }

    pub fn nodes_created(&self) -> usize {
        self.nodes_created.load(Ordering::SeqCst)
    }

    /// Check one file and, if it passes, count it against the file budget.
    pub fn validate(&self, file_path: &Path) -> std::result::Result<(), RejectionReason> {
        if self.files_processed() >= self.max_files {
            return Err(RejectionReason::FileCountExceeded { limit: self.max_files });
        }

        let candidate = if file_path.is_relative() {
            self.root.join(file_path)
        } else {
            file_path.to_path_buf()
        };

        // Resolve symlinks and `..` before comparing; a missing target cannot
        // be resolved and is reported as not being a regular file.
        let resolved = match std::fs::canonicalize(&candidate) {
            Ok(resolved) => resolved,
            Err(_) => return Err(RejectionReason::NotRegularFile { path: candidate }),
        };

        if !resolved.starts_with(&self.root) {
            return Err(RejectionReason::OutsideRoot { path: candidate });
        }

        let metadata = std::fs::metadata(&resolved)
            .map_err(|_| RejectionReason::NotRegularFile { path: candidate.clone() })?;
        if !metadata.is_file() {
            return Err(RejectionReason::NotRegularFile { path: candidate });
        }

        if !self.is_source_file(&resolved) {
            return Err(RejectionReason::NotSourceFile { path: candidate });
        }

        if metadata.len() > self.max_file_size {
            return Err(RejectionReason::TooLarge {
                path: candidate,
                size: metadata.len(),
                limit: self.max_file_size,
            });
        }

        let max_files = self.max_files;
        self.files_processed
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| (n < max_files).then_some(n + 1))
            .map(|_| ())
            .map_err(|_| RejectionReason::FileCountExceeded { limit: max_files })
    }

    /// Reserve room for one more graph node.
    pub fn admit_node(&self) -> std::result::Result<(), RejectionReason> {
        let max_nodes = self.max_nodes;
        self.nodes_created
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| (n < max_nodes).then_some(n + 1))
            .map(|_| ())
            .map_err(|_| RejectionReason::NodeCountExceeded { limit: max_nodes })
    }

    /// Lazily walk the project, yielding each source file's verdict.
    ///
    /// Noise directories are pruned before they are entered. The sequence ends
    /// right after the first file-count rejection.
    pub fn enumerate(&self) -> impl Iterator<Item = std::result::Result<PathBuf, RejectionReason>> + '_ {
        let mut exhausted = false;
        self.candidates().map_while(move |path| {
            if exhausted {
                return None;
            }
            match self.validate(&path) {
                Ok(()) => Some(Ok(path)),
                Err(reason) => {
                    if reason.exhaustion().is_some() {
                        exhausted = true;
                    }
                    Some(Err(reason))
                }
            }
        })
    }

    /// Files under the root whose extension marks them as source
    fn candidates(&self) -> impl Iterator<Item = PathBuf> + '_ {
        WalkDir::new(&self.root)
            .follow_links(self.follow_links)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(move |entry| !self.is_pruned(entry))
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!("Skipping unreadable entry: {}", e);
                    None
                }
            })
            .filter(|entry| !entry.file_type().is_dir())
            .map(DirEntry::into_path)
            .filter(move |path| {
                let keep = self.is_source_file(path);
                if !keep {
                    debug!("Ignoring non-source file {}", path.display());
                }
                keep
            })
    }

    fn is_pruned(&self, entry: &DirEntry) -> bool {
        entry.depth() > 0
            && entry.file_type().is_dir()
            && entry
                .file_name()
                .to_str()
                .map_or(false, |name| self.excluded_dirs.contains(name))
    }

    fn is_source_file(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map_or(false, |ext| self.extensions.iter().any(|e| e == ext))
    }
}
