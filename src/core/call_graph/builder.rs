// src/core/call_graph/builder.rs
use tracing::{debug, info, warn};

use crate::core::governor::PathGovernor;
use crate::error::ExhaustionError;
use super::call_graph::CallGraph;
use super::record::FunctionRecord;

/// Folds per-file function records into one [`CallGraph`]
#[derive(Debug, Default)]
pub struct GraphBuilder<'g> {
    governor: Option<&'g PathGovernor>,
}

/// A built graph plus whether the node budget cut it short
#[derive(Debug, Clone)]
pub struct BuildOutcome {
    pub graph: CallGraph,
    pub truncated: Option<ExhaustionError>,
}

impl GraphBuilder<'static> {
    pub fn new() -> Self {
        Self { governor: None }
    }
}

impl<'g> GraphBuilder<'g> {
    /// Builder whose node insertions are charged to `governor`
    pub fn governed(governor: &'g PathGovernor) -> Self {
        Self { governor: Some(governor) }
    }

    /// Build a graph, inserting records in the order given.
    ///
    /// A repeated qualified name overwrites the earlier record; edges already
    /// added for it stay. Call targets become edges whether or not they name a
    /// known function.
    pub fn build<I>(&self, records: I) -> BuildOutcome
    where
        I: IntoIterator<Item = Vec<FunctionRecord>>,
    {
        let mut graph = CallGraph::new();
        let mut truncated = None;

        'files: for file_records in records {
            for record in file_records {
                if !graph.contains(&record.qualified_name) {
                    if let Some(governor) = self.governor {
                        if let Err(reason) = governor.admit_node() {
                            warn!("Stopping graph assembly: {}", reason);
                            truncated = reason.exhaustion();
                            break 'files;
                        }
                    }
                } else {
                    debug!("Overwriting duplicate function {}", record.qualified_name);
                }

                let caller = record.qualified_name.clone();
                let calls: Vec<String> = record.calls.iter().cloned().collect();
                graph.insert_node(record);
                for callee in &calls {
                    graph.insert_edge(&caller, callee);
                }
            }
        }

        info!("Graph built: {} functions, {} calls", graph.node_count(), graph.edge_count());

        BuildOutcome { graph, truncated }
    }

    /// Shrink a graph for display.
    ///
    /// Graphs within `max_nodes` are returned as they are; larger ones are cut
    /// down to the neighbourhood of their most connected functions.
    pub fn optimize_for_visualization(graph: &CallGraph, max_nodes: usize, depth: usize) -> CallGraph {
        if graph.node_count() <= max_nodes {
            return graph.clone();
        }

        info!("Optimizing graph: {} -> {} nodes", graph.node_count(), max_nodes);

        let top: Vec<&str> = graph
            .get_stats()
            .top_connected
            .iter()
            .map(|ranked| ranked.name.as_str())
            .collect();

        graph.get_subgraph(&top, depth)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AnalysisConfig, LimitsConfig};
    use crate::core::call_graph::FunctionKind;
    use std::path::PathBuf;

    fn func(name: &str, file: &str, calls: &[&str]) -> FunctionRecord {
        FunctionRecord {
            name: name.to_string(),
            qualified_name: name.to_string(),
            source_file: PathBuf::from(file),
            start_line: 1,
            end_line: None,
            kind: FunctionKind::Sync,
            is_method: false,
            enclosing_type: None,
            signature: "()".to_string(),
            docstring: String::new(),
            source_snippet: String::new(),
            calls: calls.iter().map(|c| c.to_string()).collect(),
        }
    }

    #[test]
    fn empty_input_is_a_valid_empty_graph() {
        let outcome = GraphBuilder::new().build(Vec::<Vec<FunctionRecord>>::new());
        assert!(outcome.graph.is_empty());
        assert!(outcome.truncated.is_none());
        assert_eq!(outcome.graph.get_stats().total_edges, 0);
    }

    #[test]
    fn chain_across_files() {
        let outcome = GraphBuilder::new().build(vec![
            vec![func("main", "main.py", &["helper"])],
            vec![func("helper", "helper.py", &["util"])],
            vec![func("util", "util.py", &[])],
        ]);
        let stats = outcome.graph.get_stats();

        assert_eq!(stats.total_nodes, 3);
        assert_eq!(stats.total_edges, 2);
        assert_eq!(stats.isolated_nodes, 0);
        assert!(outcome.graph.find_cycles().is_empty());
    }

    #[test]
    fn dangling_edges_are_kept() {
        let outcome = GraphBuilder::new().build(vec![vec![func("main", "main.py", &["os.getcwd"])]]);
        assert_eq!(outcome.graph.get_callees("main"), vec!["os.getcwd"]);
        assert!(!outcome.graph.contains("os.getcwd"));
    }

    #[test]
    fn later_file_wins_name_collision() {
        let outcome = GraphBuilder::new().build(vec![
            vec![func("setup", "a.py", &["first"])],
            vec![func("setup", "b.py", &["second"])],
        ]);
        let graph = outcome.graph;

        assert_eq!(graph.node_count(), 1);
        assert_eq!(graph.node("setup").unwrap().source_file, PathBuf::from("b.py"));
        assert_eq!(graph.get_callees("setup"), vec!["first", "second"]);
    }

    #[test]
    fn node_budget_truncates_but_keeps_partial_graph() {
        let dir = tempfile::tempdir().unwrap();
        let limits = LimitsConfig {
            max_nodes: 2,
            ..LimitsConfig::default()
        };
        let governor = PathGovernor::new(dir.path(), &limits, &AnalysisConfig::default()).unwrap();

        let outcome = GraphBuilder::governed(&governor).build(vec![
            vec![func("a", "x.py", &["b"]), func("a", "x.py", &["b"])],
            vec![func("b", "y.py", &[]), func("c", "y.py", &[])],
        ]);

        assert_eq!(outcome.truncated, Some(ExhaustionError::NodeCount { limit: 2 }));
        assert_eq!(outcome.graph.node_count(), 2);
        assert!(outcome.graph.contains("a"));
        assert!(outcome.graph.contains("b"));
    }

    #[test]
    fn small_graphs_are_not_optimized() {
        let outcome = GraphBuilder::new().build(vec![vec![func("a", "x.py", &["b"]), func("b", "x.py", &[])]]);
        let optimized = GraphBuilder::optimize_for_visualization(&outcome.graph, 10, 2);
        assert_eq!(optimized.node_count(), 2);
    }

    #[test]
    fn large_graphs_shrink_around_hubs() {
        let mut records = vec![func("hub", "x.py", &["leaf0", "leaf1", "leaf2"])];
        for i in 0..3 {
            records.push(func(&format!("leaf{}", i), "x.py", &[]));
        }
        for i in 0..20 {
            records.push(func(&format!("orphan{}", i), "x.py", &[]));
        }
        let outcome = GraphBuilder::new().build(vec![records]);

        let optimized = GraphBuilder::optimize_for_visualization(&outcome.graph, 10, 2);
        assert!(optimized.node_count() <= 10);
        assert!(optimized.contains("hub"));
        assert!(optimized.contains("leaf2"));
    }
}
