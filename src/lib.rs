//! # agent-router
//!
//! Keyword-routed multi-agent reasoning with an evaluation harness.
//!
//! A [`Router`] scores each query against finance, legal and healthcare
//! keyword tables. The [`Orchestrator`] runs one domain agent's
//! THOUGHT / ACTION / ACTION_INPUT tool loop, or several concurrently and
//! synthesizes their answers. The [`Evaluator`] replays labeled cases
//! through the pipeline and reports routing accuracy, tool precision and
//! recall, keyword coverage and latency percentiles.
//!
//! ```no_run
//! use agent_router::Router;
//!
//! let decision = Router::new().route("What is the current P/E ratio for AAPL?");
//! assert_eq!(decision.primary.as_str(), "finance");
//! ```

pub mod agent;
pub mod cli;
pub mod error;
pub mod eval;

pub use agent::{
    AgentConfig, AgentRunResult, Domain, Orchestrator, OrchestrationResult, ReasoningLoop, Router,
    RoutingDecision,
};
pub use error::{AgentError, CommandError, Error, EvalError, Result, ToolError};
pub use eval::{EvalCase, EvalDataset, EvaluationReport, Evaluator, Pipeline, Verdict};
