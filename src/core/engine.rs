// src/core/engine.rs
use std::path::{Path, PathBuf};
use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::config::{Config, Overrides};
use super::{AnalysisReport, CallGraph, FlowAnalyzer, GraphBuilder, Stats};

/// Runs CLI commands against the analysis core and prints their results
pub struct Engine {
    config: Config,
    analyzer: FlowAnalyzer,
}

impl Engine {
    pub fn new(config_path: Option<&Path>, overrides: Overrides) -> Result<Self> {
        let mut config = Config::load_or_default(config_path).context("Failed to load configuration")?;
        config.apply_overrides(overrides).context("Invalid command-line override")?;

        debug!("Loaded configuration: {:?}", config);

        let analyzer = FlowAnalyzer::new(config.clone());
        Ok(Self { config, analyzer })
    }

    /// Scan `root`, print a summary and optionally write the graph
    pub async fn analyze(&self, root: &Path, output: Option<PathBuf>, visual: bool) -> Result<AnalysisReport> {
        let report = self.scan(root).await?;
        let cycles = report.graph.find_cycles();

        println!("Functions: {}", report.graph.node_count());
        println!("Calls:     {}", report.graph.edge_count());
        println!("Cycles:    {}", cycles.len());
        println!(
            "Files:     {} scanned, {} cached, {} rejected, {} failed",
            report.files_scanned, report.cache_hits, report.files_rejected, report.parse_failures
        );
        match &report.truncated {
            Some(reason) => println!("Truncated: yes ({})", reason),
            None => println!("Truncated: no"),
        }

        if let Some(output) = output {
            let graph = if visual {
                GraphBuilder::optimize_for_visualization(
                    &report.graph,
                    self.config.output.max_visual_nodes,
                    self.config.output.visual_depth,
                )
            } else {
                report.graph.clone()
            };
            self.write_graph(&graph, &output)?;
        }

        Ok(report)
    }

    pub async fn stats(&self, root: &Path) -> Result<Stats> {
        let report = self.scan(root).await?;
        let stats = report.graph.get_stats().clone();
        print_stats(&stats);
        Ok(stats)
    }

    pub async fn cycles(&self, root: &Path) -> Result<Vec<Vec<String>>> {
        let report = self.scan(root).await?;
        let cycles = report.graph.find_cycles();
        print_cycles(&cycles);
        Ok(cycles)
    }

    /// Extract the neighbourhood of `from` up to `depth` calls away
    pub async fn subgraph(&self, root: &Path, from: &[String], depth: usize, output: Option<PathBuf>) -> Result<CallGraph> {
        let report = self.scan(root).await?;

        let missing: Vec<&str> = from
            .iter()
            .map(String::as_str)
            .filter(|name| !report.graph.contains(name))
            .collect();
        if !missing.is_empty() {
            warn!("Unknown roots ignored: {}", missing.join(", "));
        }

        let subgraph = report.graph.get_subgraph(from, depth);
        match output {
            Some(output) => self.write_graph(&subgraph, &output)?,
            None => {
                for (name, record) in subgraph.nodes() {
                    println!("{} ({}:{})", name, record.source_file.display(), record.start_line);
                }
                for (caller, callee) in subgraph.edges() {
                    println!("{} -> {}", caller, callee);
                }
            }
        }

        Ok(subgraph)
    }

    /// Load a saved graph and report on it without touching any sources
    pub fn inspect(&self, graph_file: &Path) -> Result<CallGraph> {
        let graph = CallGraph::load_from_json(graph_file)
            .with_context(|| format!("Failed to load graph from {}", graph_file.display()))?;

        info!("Loaded {} functions from {}", graph.node_count(), graph_file.display());
        print_stats(graph.get_stats());
        print_cycles(&graph.find_cycles());
        Ok(graph)
    }

    async fn scan(&self, root: &Path) -> Result<AnalysisReport> {
        let report = self
            .analyzer
            .analyze_project(root)
            .await
            .with_context(|| format!("Failed to analyze {}", root.display()))?;

        if let Some(reason) = &report.truncated {
            warn!("Results are partial: {}", reason);
        }
        Ok(report)
    }

    fn write_graph(&self, graph: &CallGraph, output: &Path) -> Result<()> {
        graph
            .save_to_json(output, self.config.output.pretty)
            .with_context(|| format!("Failed to write graph to {}", output.display()))?;
        info!("Wrote {} functions to {}", graph.node_count(), output.display());
        Ok(())
    }
}

fn print_stats(stats: &Stats) {
    println!("Total functions:   {}", stats.total_nodes);
    println!("Total calls:       {}", stats.total_edges);
    println!("Isolated:          {}", stats.isolated_nodes);
    println!("Async functions:   {}", stats.async_functions);
    println!("Unresolved calls:  {}", stats.dangling_edges);
    println!("Avg out-degree:    {:.2}", stats.avg_out_degree);
    if !stats.top_connected.is_empty() {
        println!("Most connected:");
        for ranked in &stats.top_connected {
            println!("  {} ({})", ranked.name, ranked.degree);
        }
    }
}

fn print_cycles(cycles: &[Vec<String>]) {
    if cycles.is_empty() {
        println!("No cycles found");
        return;
    }
    for cycle in cycles {
        println!("{}", cycle.join(" -> "));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[tokio::test]
    async fn overrides_reach_the_analyzer() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..3 {
            fs::write(dir.path().join(format!("m{}.py", i)), format!("def f{}():\n    pass\n", i)).unwrap();
        }
        let config_file = dir.path().join("missing.toml");

        let engine = Engine::new(
            Some(config_file.as_path()),
            Overrides {
                max_files: Some(2),
                ..Default::default()
            },
        )
        .unwrap();

        let report = engine.analyze(dir.path(), None, false).await.unwrap();
        assert!(report.is_truncated());
        assert_eq!(report.graph.node_count(), 2);
    }

    #[tokio::test]
    async fn analyze_writes_graph_that_inspect_reads() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("loop.py"), "def ping():\n    pong()\n\ndef pong():\n    ping()\n").unwrap();
        let out = dir.path().join("out").join("graph.json");

        let engine = Engine::new(None, Overrides::default()).unwrap();
        engine.analyze(dir.path(), Some(out.clone()), false).await.unwrap();

        let graph = engine.inspect(&out).unwrap();
        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.find_cycles().len(), 1);
    }

    #[test]
    fn zero_workers_override_is_rejected() {
        let result = Engine::new(
            None,
            Overrides {
                worker_count: Some(0),
                ..Default::default()
            },
        );
        assert!(result.is_err());
    }
}
