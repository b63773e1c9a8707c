// src/core/analyzer.rs
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::config::{AnalysisConfig, Config};
use crate::error::{CallflowError, ExhaustionError, Result};
use super::cache::AnalysisCache;
use super::call_graph::{CallGraph, FunctionRecord, GraphBuilder};
use super::governor::PathGovernor;
use super::parser::{ContentHash, SourceUnitParser};

/// Scans project trees into call graphs.
///
/// Each scan gets its own governor and graph; only the content-hash cache
/// lives across scans.
pub struct FlowAnalyzer {
    config: Config,
    cache: Arc<AnalysisCache>,
}

/// Result of one project scan
#[derive(Debug, Clone)]
pub struct AnalysisReport {
    pub graph: CallGraph,
    /// Set when a file or node ceiling ended the scan early
    pub truncated: Option<ExhaustionError>,
    /// Files accepted by the governor
    pub files_scanned: usize,
    /// Files skipped for path, type or size reasons
    pub files_rejected: usize,
    /// Files that could not be read or parsed
    pub parse_failures: usize,
    pub cache_hits: usize,
    /// Every file read during the scan with its content hash
    pub units: Vec<(PathBuf, ContentHash)>,
}

impl AnalysisReport {
    pub fn is_truncated(&self) -> bool {
        self.truncated.is_some()
    }
}

type ParseJob = (usize, PathBuf, ContentHash, Result<Vec<FunctionRecord>>);

impl FlowAnalyzer {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            cache: Arc::new(AnalysisCache::new()),
        }
    }

    pub fn cache(&self) -> &AnalysisCache {
        &self.cache
    }

    /// Analyze an entire project directory.
    ///
    /// Only an unusable root is an error. Rejected, unreadable and
    /// unparsable files are logged and left out; hitting a ceiling returns
    /// the graph built so far with `truncated` set.
    pub async fn analyze_project<P: AsRef<Path>>(&self, project_root: P) -> Result<AnalysisReport> {
        let governor = PathGovernor::new(project_root.as_ref(), &self.config.limits, &self.config.analysis)?;
        info!("Analyzing project at {}", governor.root().display());

        if let Some(cache_path) = &self.config.cache.path {
            if let Err(e) = self.cache.load_persisted(cache_path, governor.root()) {
                warn!("Ignoring persisted cache {}: {}", cache_path.display(), e);
            }
        }

        let workers = Arc::new(Semaphore::new(self.config.analysis.worker_count.max(1)));
        let mut jobs: JoinSet<ParseJob> = JoinSet::new();
        let mut slots: Vec<Option<Arc<Vec<FunctionRecord>>>> = Vec::new();
        let mut units: Vec<(PathBuf, ContentHash)> = Vec::new();
        let mut truncated = None;
        let mut files_rejected = 0;
        let mut parse_failures = 0;
        let mut cache_hits = 0;

        for verdict in governor.enumerate() {
            let path = match verdict {
                Ok(path) => path,
                Err(reason) => {
                    if let Some(exhausted) = reason.exhaustion() {
                        warn!("Stopping scan: {}", exhausted);
                        truncated = Some(exhausted);
                        break;
                    }
                    debug!("Skipping file: {}", reason);
                    files_rejected += 1;
                    continue;
                }
            };

            let bytes = match tokio::fs::read(&path).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!("Error reading {}: {}", path.display(), e);
                    parse_failures += 1;
                    continue;
                }
            };

            let hash = ContentHash::of(&bytes);
            let index = slots.len();
            units.push((path.clone(), hash.clone()));

            if let Some(records) = self.cache.get(&hash) {
                debug!("Cache hit for {}", path.display());
                cache_hits += 1;
                slots.push(Some(records));
                continue;
            }
            slots.push(None);

            let permit = Arc::clone(&workers)
                .acquire_owned()
                .await
                .map_err(|e| CallflowError::Parser(format!("worker pool closed: {}", e)))?;
            let analysis = self.config.analysis.clone();
            jobs.spawn_blocking(move || {
                let _permit = permit;
                let result = parse_unit(&analysis, &path, &bytes);
                (index, path, hash, result)
            });
        }

        while let Some(joined) = jobs.join_next().await {
            match joined {
                Ok((index, _, hash, Ok(records))) => {
                    slots[index] = Some(self.cache.insert(hash, records));
                }
                Ok((_, path, _, Err(e))) => {
                    warn!("Error analyzing {}: {}", path.display(), e);
                    parse_failures += 1;
                }
                Err(e) => {
                    warn!("Parse worker failed: {}", e);
                    parse_failures += 1;
                }
            }
        }

        // Assembly is sequential and in walk order so overwrites are deterministic.
        let per_file = slots
            .iter()
            .zip(&units)
            .filter_map(|(slot, (path, _))| slot.as_ref().map(|records| located_at(records, path)));
        let outcome = GraphBuilder::governed(&governor).build(per_file);
        let truncated = truncated.or(outcome.truncated);

        if let Some(cache_path) = &self.config.cache.path {
            if let Err(e) = self.cache.save_persisted(cache_path, governor.root(), &units) {
                warn!("Failed to persist cache to {}: {}", cache_path.display(), e);
            }
        }

        info!(
            "Scanned {} files ({} cached, {} rejected, {} failed): {} functions",
            governor.files_processed(),
            cache_hits,
            files_rejected,
            parse_failures,
            outcome.graph.node_count()
        );

        Ok(AnalysisReport {
            graph: outcome.graph,
            truncated,
            files_scanned: governor.files_processed(),
            files_rejected,
            parse_failures,
            cache_hits,
            units,
        })
    }

    /// Analyze a single file inside `project_root`.
    ///
    /// Unlike a project scan, rejections and parse failures are returned.
    pub async fn analyze_file<P: AsRef<Path>, F: AsRef<Path>>(&self, project_root: P, file: F) -> Result<Vec<FunctionRecord>> {
        let governor = PathGovernor::new(project_root.as_ref(), &self.config.limits, &self.config.analysis)?;
        let file = file.as_ref();
        let path = if file.is_relative() {
            governor.root().join(file)
        } else {
            file.to_path_buf()
        };

        governor.validate(&path)?;

        let bytes = tokio::fs::read(&path).await?;
        let hash = ContentHash::of(&bytes);
        if let Some(records) = self.cache.get(&hash) {
            return Ok(located_at(&records, &path));
        }

        let analysis = self.config.analysis.clone();
        let job_path = path.clone();
        let records = tokio::task::spawn_blocking(move || parse_unit(&analysis, &job_path, &bytes))
            .await
            .map_err(|e| CallflowError::Parser(format!("parse worker failed: {}", e)))??;

        Ok(self.cache.insert(hash, records).to_vec())
    }
}

fn parse_unit(analysis: &AnalysisConfig, path: &Path, bytes: &[u8]) -> Result<Vec<FunctionRecord>> {
    let mut parser = SourceUnitParser::new(analysis)?;
    Ok(parser.parse_bytes(path, bytes)?)
}

/// Copy cached records, pointing them at the file they were found in this time
fn located_at(records: &[FunctionRecord], path: &Path) -> Vec<FunctionRecord> {
    records
        .iter()
        .cloned()
        .map(|mut record| {
            if record.source_file != path {
                record.source_file = path.to_path_buf();
            }
            record
        })
        .collect()
}
