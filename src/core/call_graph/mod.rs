// src/core/call_graph/mod.rs
//! Call graph assembly and queries.
//!
//! Function records extracted per file are folded into a single directed
//! graph keyed by qualified name. The graph answers caller/callee lookups,
//! cycle detection, statistics and depth-bounded subgraph extraction.

mod record;
mod call_graph;
mod builder;

pub use record::{FunctionRecord, FunctionKind};
pub use call_graph::{CallGraph, Stats, RankedNode, GraphDocument, NodeDocument};
pub use builder::{GraphBuilder, BuildOutcome};
