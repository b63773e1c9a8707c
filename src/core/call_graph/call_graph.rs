// src/core/call_graph/call_graph.rs
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use once_cell::sync::OnceCell;
use serde::{Serialize, Deserialize};

use crate::error::Result;
use super::record::{FunctionKind, FunctionRecord};

/// Index of an interned name inside a [`CallGraph`]
type NameId = usize;

/// Number of entries reported in [`Stats::top_connected`]
const TOP_CONNECTED: usize = 5;

/// Directed call graph keyed by qualified function name.
///
/// Names (both defined functions and unresolved call targets) are interned
/// into a dense arena; adjacency is kept as index sets in both directions.
/// Only the builder in this module can add nodes or edges.
#[derive(Debug, Clone, Default)]
pub struct CallGraph {
    names: Vec<String>,
    ids: HashMap<String, NameId>,
    /// Record per name; `None` for names that are only call targets
    records: Vec<Option<FunctionRecord>>,
    /// Node ids in first-insertion order
    node_order: Vec<NameId>,
    edges: Vec<BTreeSet<NameId>>,
    reverse_edges: Vec<BTreeSet<NameId>>,
    edge_count: usize,
    stats: OnceCell<Stats>,
}

/// Node ranked by total degree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedNode {
    pub name: String,
    pub degree: usize,
}

/// Summary numbers for a built graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    pub total_nodes: usize,
    pub total_edges: usize,
    /// Nodes with neither callers nor callees
    pub isolated_nodes: usize,
    /// Highest `in + out` degree first; ties keep insertion order
    pub top_connected: Vec<RankedNode>,
    pub avg_out_degree: f64,
    pub async_functions: usize,
    /// Edges whose target has no node in the graph
    pub dangling_edges: usize,
}

/// Serialized graph: `nodes` by qualified name and `edges` by caller
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphDocument {
    pub nodes: BTreeMap<String, NodeDocument>,
    pub edges: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDocument {
    #[serde(default)]
    pub name: String,
    pub file: PathBuf,
    pub line: usize,
    #[serde(default)]
    pub is_async: bool,
    #[serde(default)]
    pub is_method: bool,
    #[serde(default, alias = "class_name")]
    pub enclosing_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_line: Option<usize>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub signature: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub docstring: String,
}

impl CallGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node_count(&self) -> usize {
        self.node_order.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    pub fn is_empty(&self) -> bool {
        self.node_order.is_empty()
    }

    /// Whether `name` is a defined function (not just a call target)
    pub fn contains(&self, name: &str) -> bool {
        self.node(name).is_some()
    }

    pub fn node(&self, name: &str) -> Option<&FunctionRecord> {
        self.ids.get(name).and_then(|&id| self.records[id].as_ref())
    }

    /// Nodes in insertion order
    pub fn nodes(&self) -> impl Iterator<Item = (&str, &FunctionRecord)> + '_ {
        self.node_order.iter().filter_map(move |&id| {
            self.records[id].as_ref().map(|record| (self.names[id].as_str(), record))
        })
    }

    /// Every `(caller, callee)` pair, dangling targets included
    pub fn edges(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.edges.iter().enumerate().flat_map(move |(from, callees)| {
            callees
                .iter()
                .map(move |&to| (self.names[from].as_str(), self.names[to].as_str()))
        })
    }

    /// Names this function calls
    pub fn get_callees(&self, name: &str) -> Vec<&str> {
        self.ids
            .get(name)
            .map(|&id| self.edges[id].iter().map(|&to| self.names[to].as_str()).collect())
            .unwrap_or_default()
    }

    /// Functions that call this name
    pub fn get_callers(&self, name: &str) -> Vec<&str> {
        self.ids
            .get(name)
            .map(|&id| self.reverse_edges[id].iter().map(|&from| self.names[from].as_str()).collect())
            .unwrap_or_default()
    }

    /// Statistics, computed on first access
    pub fn get_stats(&self) -> &Stats {
        self.stats.get_or_init(|| self.compute_stats())
    }

    /// Detect circular call chains.
    ///
    /// Each cycle is closed: it starts and ends with the same name, so a
    /// self-recursive function yields `[f, f]`.
    pub fn find_cycles(&self) -> Vec<Vec<String>> {
        let mut visited = vec![false; self.names.len()];
        let mut on_stack = vec![false; self.names.len()];
        let mut seen: HashSet<Vec<NameId>> = HashSet::new();
        let mut cycles: Vec<Vec<NameId>> = Vec::new();

        for &start in &self.node_order {
            if visited[start] {
                continue;
            }

            visited[start] = true;
            on_stack[start] = true;
            let mut path = vec![start];
            let mut stack = vec![self.edges[start].iter()];

            while let Some(neighbors) = stack.last_mut() {
                match neighbors.next() {
                    Some(&next) if !visited[next] => {
                        visited[next] = true;
                        on_stack[next] = true;
                        path.push(next);
                        stack.push(self.edges[next].iter());
                    }
                    Some(&next) if on_stack[next] => {
                        if let Some(pos) = path.iter().position(|&n| n == next) {
                            let mut cycle = path[pos..].to_vec();
                            cycle.push(next);
                            if seen.insert(cycle.clone()) {
                                cycles.push(cycle);
                            }
                        }
                    }
                    Some(_) => {}
                    None => {
                        stack.pop();
                        if let Some(done) = path.pop() {
                            on_stack[done] = false;
                        }
                    }
                }
            }
        }

        cycles
            .into_iter()
            .map(|cycle| cycle.into_iter().map(|id| self.names[id].clone()).collect())
            .collect()
    }

    /// Breadth-first extraction of everything within `max_depth` calls of `roots`.
    ///
    /// Each name is visited once. Edges are copied only from names expanded
    /// before the depth bound, so `max_depth == 0` yields the roots alone.
    pub fn get_subgraph<S: AsRef<str>>(&self, roots: &[S], max_depth: usize) -> CallGraph {
        let mut subgraph = CallGraph::new();
        let mut visited: HashSet<NameId> = HashSet::new();
        let mut queue: VecDeque<(NameId, usize)> = VecDeque::new();

        for root in roots {
            if let Some(&id) = self.ids.get(root.as_ref()) {
                if visited.insert(id) {
                    queue.push_back((id, 0));
                }
            }
        }

        while let Some((id, depth)) = queue.pop_front() {
            if let Some(record) = &self.records[id] {
                subgraph.insert_node(record.clone());
            }

            if depth < max_depth {
                for &next in &self.edges[id] {
                    subgraph.insert_edge(&self.names[id], &self.names[next]);
                    if visited.insert(next) {
                        queue.push_back((next, depth + 1));
                    }
                }
            }
        }

        subgraph
    }

    /// Convert graph to its serializable form
    pub fn to_document(&self) -> GraphDocument {
        let nodes = self
            .nodes()
            .map(|(name, record)| {
                let node = NodeDocument {
                    name: record.name.clone(),
                    file: record.source_file.clone(),
                    line: record.start_line,
                    is_async: record.is_async(),
                    is_method: record.is_method,
                    enclosing_type: record.enclosing_type.clone(),
                    end_line: record.end_line,
                    signature: record.signature.clone(),
                    docstring: record.docstring.clone(),
                };
                (name.to_string(), node)
            })
            .collect();

        let edges = self
            .edges
            .iter()
            .enumerate()
            .filter(|(_, callees)| !callees.is_empty())
            .map(|(from, callees)| {
                let mut targets: Vec<String> = callees.iter().map(|&to| self.names[to].clone()).collect();
                targets.sort();
                (self.names[from].clone(), targets)
            })
            .collect();

        GraphDocument { nodes, edges }
    }

    /// Rebuild a graph from its serialized form
    pub fn from_document(document: GraphDocument) -> Self {
        let mut graph = Self::new();

        for (qualified_name, node) in document.nodes {
            let calls = document
                .edges
                .get(&qualified_name)
                .map(|targets| targets.iter().cloned().collect())
                .unwrap_or_default();
            let name = if node.name.is_empty() {
                qualified_name
                    .rsplit('.')
                    .next()
                    .unwrap_or(qualified_name.as_str())
                    .to_string()
            } else {
                node.name
            };

            graph.insert_node(FunctionRecord {
                name,
                qualified_name,
                source_file: node.file,
                start_line: node.line,
                end_line: node.end_line,
                kind: if node.is_async { FunctionKind::Async } else { FunctionKind::Sync },
                is_method: node.is_method,
                enclosing_type: node.enclosing_type,
                signature: node.signature,
                docstring: node.docstring,
                source_snippet: String::new(),
                calls,
            });
        }

        for (caller, callees) in &document.edges {
            for callee in callees {
                graph.insert_edge(caller, callee);
            }
        }

        graph
    }

    /// Save graph to JSON file
    pub fn save_to_json<P: AsRef<Path>>(&self, path: P, pretty: bool) -> Result<()> {
        let document = self.to_document();
        let content = if pretty {
            serde_json::to_string_pretty(&document)?
        } else {
            serde_json::to_string(&document)?
        };
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load graph from JSON file
    pub fn load_from_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let document: GraphDocument = serde_json::from_str(&content)?;
        Ok(Self::from_document(document))
    }

    /// Insert or overwrite a node; returns whether the name was new as a node.
    pub(super) fn insert_node(&mut self, record: FunctionRecord) -> bool {
        let id = self.intern(&record.qualified_name);
        let fresh = self.records[id].is_none();
        if fresh {
            self.node_order.push(id);
        }
        self.records[id] = Some(record);
        self.stats = OnceCell::new();
        fresh
    }

    /// Add `caller -> callee` to both adjacency directions at once.
    pub(super) fn insert_edge(&mut self, caller: &str, callee: &str) {
        let from = self.intern(caller);
        let to = self.intern(callee);
        if self.edges[from].insert(to) {
            self.reverse_edges[to].insert(from);
            self.edge_count += 1;
        }
        self.stats = OnceCell::new();
    }

    fn intern(&mut self, name: &str) -> NameId {
        if let Some(&id) = self.ids.get(name) {
            return id;
        }
        let id = self.names.len();
        self.names.push(name.to_string());
        self.ids.insert(name.to_string(), id);
        self.records.push(None);
        self.edges.push(BTreeSet::new());
        self.reverse_edges.push(BTreeSet::new());
        id
    }

    fn compute_stats(&self) -> Stats {
        let total_nodes = self.node_count();
        let total_edges: usize = self.edges.iter().map(BTreeSet::len).sum();

        let mut ranked: Vec<RankedNode> = self
            .node_order
            .iter()
            .map(|&id| RankedNode {
                name: self.names[id].clone(),
                degree: self.edges[id].len() + self.reverse_edges[id].len(),
            })
            .collect();
        // Stable sort keeps insertion order among equal degrees.
        ranked.sort_by(|a, b| b.degree.cmp(&a.degree));
        ranked.truncate(TOP_CONNECTED);

        let isolated_nodes = self
            .node_order
            .iter()
            .filter(|&&id| self.edges[id].is_empty() && self.reverse_edges[id].is_empty())
            .count();

        let async_functions = self.nodes().filter(|(_, record)| record.is_async()).count();

        let dangling_edges = self
            .edges
            .iter()
            .flat_map(|callees| callees.iter())
            .filter(|&&to| self.records[to].is_none())
            .count();

        Stats {
            total_nodes,
            total_edges,
            isolated_nodes,
            top_connected: ranked,
            avg_out_degree: if total_nodes > 0 {
                total_edges as f64 / total_nodes as f64
            } else {
                0.0
            },
            async_functions,
            dangling_edges,
        }
    }
}
