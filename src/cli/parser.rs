//! Command-line argument parsing.
//!
//! Defines the CLI structure using clap derive macros.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Routes questions to finance, legal and healthcare agents and evaluates
/// the routing pipeline against labeled cases.
#[derive(Parser, Debug)]
#[command(name = "agent-router")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable debug logging on stderr.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json).
    #[arg(long, default_value = "text", global = true)]
    pub format: String,

    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Evaluate the pipeline against a labeled dataset.
    ///
    /// Prints the report; individual case failures do not change the exit code.
    #[command(after_help = r#"Examples:
  agent-router eval --dataset routing --routing-only   # Keyword routing only, no API key
  agent-router eval --dataset full -o report.json      # Full suite, save JSON report
  agent-router eval --dataset tools --concurrency 4    # Four cases at a time
  agent-router eval --dataset full --domain legal      # Only cases expecting legal
  agent-router eval --dataset-file my_cases.json       # Custom dataset
"#)]
    Eval {
        /// Built-in dataset: routing, tools, quality, full.
        #[arg(short, long, default_value = "routing")]
        dataset: String,

        /// Load cases from a JSON file instead of a built-in dataset.
        #[arg(long)]
        dataset_file: Option<PathBuf>,

        /// Only evaluate routing (no agent execution, no API key).
        #[arg(long)]
        routing_only: bool,

        /// Write the JSON report to this path.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Maximum cases evaluated at once.
        #[arg(short, long)]
        concurrency: Option<usize>,

        /// Per-case timeout in seconds.
        #[arg(short, long)]
        timeout: Option<f64>,

        /// Only cases expecting this domain (finance, legal, healthcare, general, multi).
        #[arg(long)]
        domain: Option<String>,

        /// Only cases with this difficulty (easy, medium, hard).
        #[arg(long)]
        difficulty: Option<String>,
    },

    /// Ask a question and print the orchestrated answer.
    #[command(after_help = r#"Examples:
  agent-router ask "What is the P/E ratio for AAPL?"
  agent-router ask "Review this NDA" --agents legal,finance
  agent-router ask "Explain HIPAA" --stream
"#)]
    Ask {
        /// Question text.
        query: String,

        /// Skip routing and use these agents (comma-separated).
        #[arg(short, long, value_delimiter = ',')]
        agents: Vec<String>,

        /// Stream a direct answer from the routed domain.
        #[arg(short, long, conflicts_with = "agents")]
        stream: bool,
    },

    /// Show the routing decision for a query (no API key needed).
    Route {
        /// Question text.
        query: String,
    },

    /// List domain agents and their tools (no API key needed).
    Agents,
}
