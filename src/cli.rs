use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use anyhow::Result;

use crate::config::Overrides;
use crate::core::Engine;

#[derive(Parser)]
#[command(name = "callflow")]
#[command(about = "Static call graphs for Python source trees")]
#[command(version)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(flatten)]
    pub limits: LimitArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Values that override the configuration file
#[derive(Args, Debug, Default)]
pub struct LimitArgs {
    /// Largest source file to analyze, in bytes
    #[arg(long, global = true)]
    pub max_file_size: Option<u64>,

    /// Stop after this many files
    #[arg(long, global = true)]
    pub max_files: Option<usize>,

    /// Stop after this many functions
    #[arg(long, global = true)]
    pub max_nodes: Option<usize>,

    /// Number of parse workers
    #[arg(long, global = true)]
    pub workers: Option<usize>,

    /// Persisted analysis cache file
    #[arg(long, global = true)]
    pub cache: Option<PathBuf>,
}

impl From<LimitArgs> for Overrides {
    fn from(args: LimitArgs) -> Self {
        Self {
            max_file_size: args.max_file_size,
            max_files: args.max_files,
            max_nodes: args.max_nodes,
            worker_count: args.workers,
            cache_path: args.cache,
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build the call graph for a project
    Analyze {
        /// Project root
        root: PathBuf,

        /// Write the graph as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Write a reduced graph suited for rendering
        #[arg(long)]
        visual: bool,
    },

    /// Print graph statistics
    Stats {
        /// Project root
        root: PathBuf,
    },

    /// List call cycles
    Cycles {
        /// Project root
        root: PathBuf,
    },

    /// Extract the functions reachable from the given roots
    Subgraph {
        /// Project root
        root: PathBuf,

        /// Qualified names to start from
        #[arg(long = "from", required = true, num_args = 1..)]
        from: Vec<String>,

        /// How many calls away to follow
        #[arg(short, long, default_value_t = 2)]
        depth: usize,

        /// Write the subgraph as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Summarize a previously saved graph file
    Inspect {
        /// Graph JSON file
        graph: PathBuf,
    },
}

impl Cli {
    pub async fn execute(self, engine: Engine) -> Result<()> {
        match self.command {
            Commands::Analyze { root, output, visual } => {
                engine.analyze(&root, output, visual).await.map(|_| ())
            }
            Commands::Stats { root } => {
                engine.stats(&root).await.map(|_| ())
            }
            Commands::Cycles { root } => {
                engine.cycles(&root).await.map(|_| ())
            }
            Commands::Subgraph { root, from, depth, output } => {
                engine.subgraph(&root, &from, depth, output).await.map(|_| ())
            }
            Commands::Inspect { graph } => {
                engine.inspect(&graph).map(|_| ())
            }
        }
    }
}
