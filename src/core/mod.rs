// src/core/mod.rs
mod analyzer;
mod cache;
mod engine;
mod governor;
mod parser;
mod sanitize;

// Call graph model and construction
pub mod call_graph;

// Language-specific parsers
pub mod languages;

pub use analyzer::{AnalysisReport, FlowAnalyzer};
pub use cache::{AnalysisCache, CachedFunction};
pub use governor::PathGovernor;
pub use parser::{ContentHash, SourceUnitParser};
pub use sanitize::{sanitize_name, truncate_chars};

pub use call_graph::{
    BuildOutcome, CallGraph, FunctionKind, FunctionRecord, GraphBuilder, GraphDocument,
    NodeDocument, RankedNode, Stats,
};

// Export the main engine
pub use engine::Engine;
