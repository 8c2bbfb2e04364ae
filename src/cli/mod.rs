//! CLI layer for agent-router.
//!
//! Provides the command-line interface using clap, with commands for
//! evaluating the pipeline, asking questions, inspecting routing and
//! listing agents.

pub mod commands;
pub mod output;
pub mod parser;

pub use commands::execute;
pub use output::OutputFormat;
pub use parser::{Cli, Commands};
