//! Static call-graph analysis for Python source trees.
//!
//! Files are discovered under a governed root, parsed without being executed
//! and assembled into a `CallGraph` that can be queried and saved.

pub mod cli;
pub mod config;
pub mod core;
pub mod error;

pub use error::{CallflowError, Result};
