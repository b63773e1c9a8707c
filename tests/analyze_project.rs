use assert_fs::prelude::*;
use assert_fs::TempDir;
use predicates::prelude::*;

use callflow::config::Config;
use callflow::core::{CallGraph, FlowAnalyzer};
use callflow::error::ExhaustionError;

fn chain_project() -> TempDir {
    let temp = TempDir::new().unwrap();
    temp.child("main.py")
        .write_str("from helper import helper\n\ndef main():\n    helper()\n")
        .unwrap();
    temp.child("helper.py")
        .write_str("from util import util\n\ndef helper():\n    \"\"\"Delegate to util.\"\"\"\n    util()\n")
        .unwrap();
    temp.child("util.py").write_str("def util():\n    return 1\n").unwrap();
    temp
}

fn config_with(update: impl FnOnce(&mut Config)) -> Config {
    let mut config = Config::default();
    update(&mut config);
    config
}

#[tokio::test]
async fn three_file_chain_builds_linear_graph() {
    let project = chain_project();
    let analyzer = FlowAnalyzer::new(Config::default());

    let report = analyzer.analyze_project(project.path()).await.unwrap();
    let graph = &report.graph;

    assert_eq!(graph.node_count(), 3);
    assert_eq!(graph.edge_count(), 2);
    assert_eq!(graph.get_callees("main"), vec!["helper"]);
    assert_eq!(graph.get_callers("util"), vec!["helper"]);
    assert!(graph.find_cycles().is_empty());

    let stats = graph.get_stats();
    assert_eq!(stats.isolated_nodes, 0);
    assert_eq!(stats.dangling_edges, 0);
    assert_eq!(stats.top_connected[0].name, "helper");
    assert_eq!(graph.node("helper").unwrap().docstring, "Delegate to util.");
    assert!(!report.is_truncated());
}

#[tokio::test]
async fn warm_cache_gives_identical_graph() {
    let project = chain_project();
    let analyzer = FlowAnalyzer::new(Config::default());

    let cold = analyzer.analyze_project(project.path()).await.unwrap();
    let warm = analyzer.analyze_project(project.path()).await.unwrap();

    assert_eq!(cold.cache_hits, 0);
    assert_eq!(warm.cache_hits, 3);
    assert_eq!(cold.graph.to_document(), warm.graph.to_document());
}

#[tokio::test]
async fn edited_file_misses_the_cache() {
    let project = chain_project();
    let analyzer = FlowAnalyzer::new(Config::default());
    analyzer.analyze_project(project.path()).await.unwrap();

    project
        .child("util.py")
        .write_str("def util():\n    return compute()\n")
        .unwrap();
    let report = analyzer.analyze_project(project.path()).await.unwrap();

    assert_eq!(report.cache_hits, 2);
    assert_eq!(report.graph.get_callees("util"), vec!["compute"]);
    assert_eq!(report.graph.get_stats().dangling_edges, 1);
}

#[tokio::test]
async fn file_limit_keeps_partial_graph() {
    let project = chain_project();
    let analyzer = FlowAnalyzer::new(config_with(|c| c.limits.max_files = 2));

    let report = analyzer.analyze_project(project.path()).await.unwrap();

    assert_eq!(report.truncated, Some(ExhaustionError::FileCount { limit: 2 }));
    assert_eq!(report.files_scanned, 2);
    // Walk order is helper.py, main.py, util.py.
    assert!(report.graph.contains("helper"));
    assert!(report.graph.contains("main"));
    assert!(!report.graph.contains("util"));
}

#[tokio::test]
async fn node_limit_keeps_partial_graph() {
    let temp = TempDir::new().unwrap();
    temp.child("many.py")
        .write_str("def a():\n    b()\n\ndef b():\n    c()\n\ndef c():\n    pass\n")
        .unwrap();
    let analyzer = FlowAnalyzer::new(config_with(|c| c.limits.max_nodes = 2));

    let report = analyzer.analyze_project(temp.path()).await.unwrap();

    assert_eq!(report.truncated, Some(ExhaustionError::NodeCount { limit: 2 }));
    assert_eq!(report.graph.node_count(), 2);
    assert!(!report.graph.contains("c"));
}

#[tokio::test]
async fn oversized_and_noise_files_are_skipped() {
    let temp = TempDir::new().unwrap();
    temp.child("keep.py").write_str("def keep():\n    pass\n").unwrap();
    temp.child("big.py")
        .write_str(&format!("def big():\n    pass\n{}", "#".repeat(4096)))
        .unwrap();
    temp.child("__pycache__/cached.py").write_str("def cached():\n    pass\n").unwrap();
    temp.child(".venv/lib/site.py").write_str("def site():\n    pass\n").unwrap();
    let analyzer = FlowAnalyzer::new(config_with(|c| c.limits.max_file_size = 1024));

    let report = analyzer.analyze_project(temp.path()).await.unwrap();

    let names: Vec<&str> = report.graph.nodes().map(|(name, _)| name).collect();
    assert_eq!(names, vec!["keep"]);
    assert_eq!(report.files_rejected, 1);
}

#[cfg(unix)]
#[tokio::test]
async fn symlink_escaping_root_is_rejected() {
    let outer = TempDir::new().unwrap();
    outer.child("secret.py").write_str("def secret():\n    pass\n").unwrap();
    let project = outer.child("project");
    project.child("app.py").write_str("def app():\n    pass\n").unwrap();
    project
        .child("link.py")
        .symlink_to_file(outer.child("secret.py").path())
        .unwrap();

    let analyzer = FlowAnalyzer::new(Config::default());
    let report = analyzer.analyze_project(project.path()).await.unwrap();

    assert!(report.graph.contains("app"));
    assert!(!report.graph.contains("secret"));
    assert_eq!(report.files_rejected, 1);
}

#[tokio::test]
async fn empty_project_gives_empty_graph() {
    let temp = TempDir::new().unwrap();
    let analyzer = FlowAnalyzer::new(Config::default());

    let report = analyzer.analyze_project(temp.path()).await.unwrap();

    assert!(report.graph.is_empty());
    assert_eq!(report.graph.get_stats().total_nodes, 0);
    assert_eq!(report.graph.get_stats().avg_out_degree, 0.0);
    assert!(report.graph.find_cycles().is_empty());
    assert!(!report.is_truncated());
}

#[tokio::test]
async fn missing_root_is_an_error() {
    let temp = TempDir::new().unwrap();
    let analyzer = FlowAnalyzer::new(Config::default());
    assert!(analyzer.analyze_project(temp.path().join("nope")).await.is_err());
}

#[tokio::test]
async fn ranking_is_stable_across_runs() {
    let temp = TempDir::new().unwrap();
    temp.child("hub.py")
        .write_str("def a():\n    x()\n\ndef b():\n    y()\n\ndef c():\n    z()\n")
        .unwrap();

    let first = FlowAnalyzer::new(Config::default())
        .analyze_project(temp.path())
        .await
        .unwrap();
    let second = FlowAnalyzer::new(config_with(|c| c.analysis.worker_count = 1))
        .analyze_project(temp.path())
        .await
        .unwrap();

    let ranked = |graph: &CallGraph| -> Vec<String> {
        graph.get_stats().top_connected.iter().map(|r| r.name.clone()).collect()
    };
    assert_eq!(ranked(&first.graph), vec!["a", "b", "c"]);
    assert_eq!(ranked(&first.graph), ranked(&second.graph));
}

#[tokio::test]
async fn persisted_cache_warms_a_new_analyzer() {
    let project = chain_project();
    let state = TempDir::new().unwrap();
    let cache_file = state.child("cache.json");
    let config = config_with(|c| c.cache.path = Some(cache_file.path().to_path_buf()));

    let first = FlowAnalyzer::new(config.clone());
    first.analyze_project(project.path()).await.unwrap();
    cache_file.assert(predicate::path::exists());
    cache_file.assert(predicate::str::contains("\"projects\""));

    let second = FlowAnalyzer::new(config);
    let report = second.analyze_project(project.path()).await.unwrap();
    assert_eq!(report.cache_hits, 3);
    assert_eq!(report.graph.edge_count(), 2);
}

#[tokio::test]
async fn persisted_cache_keeps_property_pairs() {
    let project = TempDir::new().unwrap();
    project
        .child("model.py")
        .write_str(
            "class A:\n    @property\n    def x(self):\n        return self.read()\n\n    @x.setter\n    def x(self, v):\n        self.write(v)\n",
        )
        .unwrap();
    let state = TempDir::new().unwrap();
    let config = config_with(|c| c.cache.path = Some(state.child("cache.json").path().to_path_buf()));

    let cold = FlowAnalyzer::new(config.clone())
        .analyze_project(project.path())
        .await
        .unwrap();
    assert_eq!(cold.graph.get_callees("A.x"), vec!["self.read", "self.write"]);

    let warm = FlowAnalyzer::new(config)
        .analyze_project(project.path())
        .await
        .unwrap();
    assert_eq!(warm.cache_hits, 1);
    assert_eq!(warm.graph.to_document(), cold.graph.to_document());
}

#[tokio::test]
async fn saved_graph_reloads_and_slices() {
    let project = chain_project();
    let out = TempDir::new().unwrap();
    let graph_file = out.child("graph.json");

    let report = FlowAnalyzer::new(Config::default())
        .analyze_project(project.path())
        .await
        .unwrap();
    report.graph.save_to_json(graph_file.path(), true).unwrap();
    graph_file.assert(predicate::str::contains("\"edges\""));

    let loaded = CallGraph::load_from_json(graph_file.path()).unwrap();
    assert_eq!(loaded.to_document(), report.graph.to_document());

    let sliced = loaded.get_subgraph(&["main"], 1);
    assert_eq!(sliced.node_count(), 2);
    assert_eq!(sliced.edge_count(), 1);
    assert!(!sliced.contains("util"));
}
