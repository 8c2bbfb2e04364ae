//! Error types for agent-router.
//!
//! Each concern gets its own enum. Tool errors never leave the reasoning
//! loop (they become observations) and evaluation errors never leave a
//! case (they become a failing [`CaseResult`](crate::eval::CaseResult)).

use thiserror::Error;

/// Result alias used by the CLI layer.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error for the binary and CLI commands.
#[derive(Debug, Error)]
pub enum Error {
    /// Agent, provider, or orchestration failure.
    #[error(transparent)]
    Agent(#[from] AgentError),

    /// Evaluation setup failure.
    #[error(transparent)]
    Eval(#[from] EvalError),

    /// CLI command failure.
    #[error(transparent)]
    Command(#[from] CommandError),

    /// I/O failure (report output, dataset files).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by providers, agents and the orchestrator.
#[derive(Debug, Error)]
pub enum AgentError {
    /// No API key was configured.
    #[error("API key missing: set OPENAI_API_KEY or AGENT_ROUTER_API_KEY")]
    ApiKeyMissing,

    /// The configured provider name has no backend.
    #[error("unsupported provider: {name}")]
    UnsupportedProvider {
        /// Provider name from configuration.
        name: String,
    },

    /// Configuration values are out of range.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// What is wrong.
        message: String,
    },

    /// The text-generation request failed.
    #[error("generation request failed: {message}")]
    ApiRequest {
        /// Provider error message.
        message: String,
        /// HTTP status, when the provider reports one.
        status: Option<u16>,
    },

    /// A streaming generation failed mid-stream.
    #[error("stream error: {message}")]
    Stream {
        /// Provider error message.
        message: String,
    },

    /// The embedding or rerank request failed.
    #[error("embedding request failed: {message}")]
    Embedding {
        /// Provider error message.
        message: String,
    },

    /// Orchestration failed outside of any single provider call.
    #[error("orchestration error: {message}")]
    Orchestration {
        /// What went wrong.
        message: String,
    },
}

/// Errors produced while resolving or running a tool.
///
/// These are rendered into observation strings by the reasoning loop.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ToolError {
    /// The model asked for a tool that is not registered.
    #[error("Unknown tool '{name}'")]
    NotFound {
        /// Requested tool name.
        name: String,
    },

    /// The action input did not satisfy the tool's parameter schema.
    #[error("Invalid arguments for {name}: {message}")]
    InvalidArguments {
        /// Tool name.
        name: String,
        /// Binding failure detail.
        message: String,
    },

    /// The tool body failed.
    #[error("Error executing {name}: {message}")]
    Execution {
        /// Tool name.
        name: String,
        /// Failure detail.
        message: String,
    },
}

/// Errors from the evaluation harness.
#[derive(Debug, Clone, Error)]
pub enum EvalError {
    /// A case step exceeded the per-case timeout.
    #[error("Timeout after {seconds}s")]
    Timeout {
        /// Timeout that was exceeded, in seconds.
        seconds: f64,
    },

    /// A case failed with an uncaught error.
    #[error("{message}")]
    CaseFailed {
        /// Failure detail.
        message: String,
    },

    /// No built-in dataset has this name.
    #[error("unknown dataset '{name}' (expected one of: routing, tools, quality, full)")]
    UnknownDataset {
        /// Requested dataset name.
        name: String,
    },

    /// A dataset file could not be read or parsed.
    #[error("failed to load dataset: {message}")]
    DatasetLoad {
        /// Failure detail.
        message: String,
    },
}

/// CLI command errors.
#[derive(Debug, Error)]
pub enum CommandError {
    /// The command could not run to completion.
    #[error("command failed: {0}")]
    ExecutionFailed(String),

    /// Output could not be rendered.
    #[error("output formatting failed: {0}")]
    OutputFormat(String),
}
