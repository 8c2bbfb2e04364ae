//! Routing and reasoning-orchestration engine.
//!
//! Routes natural-language queries to domain agents, runs each agent's
//! tool-using reasoning loop, and merges multi-agent answers. Uses a
//! pluggable provider abstraction backed by OpenAI-compatible APIs.
//!
//! # Architecture
//!
//! ```text
//! User query → Orchestrator
//!   ├── Router (keyword tables → RoutingDecision)
//!   ├── general → one direct generation
//!   ├── single agent → ReasoningLoop
//!   │   └── THOUGHT / ACTION / ACTION_INPUT → ToolRegistry → OBSERVATION → …
//!   └── multi agent → JoinSet fan-out of ReasoningLoops
//!       └── synthesis call over the non-error answers
//! ```

pub mod client;
pub mod config;
pub mod domain;
pub mod domains;
pub mod knowledge;
pub mod message;
pub mod orchestrator;
pub mod parser;
pub mod prompt;
pub mod provider;
pub mod providers;
pub mod react;
pub mod registry;
pub mod router;
pub mod tool;
pub mod trace;

// Re-export key types
pub use client::{Backend, create_backend};
pub use config::{AgentConfig, AgentConfigBuilder};
pub use domain::{AgentInfo, Domain, DomainAgent, ParseDomainError};
pub use knowledge::{Document, KnowledgeBase, SearchHit, SearchKnowledgeTool};
pub use message::{ChatMessage, ChatRequest, ChatResponse, Role, TokenUsage};
pub use orchestrator::Orchestrator;
pub use parser::{ParsedStep, parse_step};
pub use provider::{
    ChunkStream, EmbeddingProvider, EmbeddingPurpose, LlmProvider, RankedDocument,
};
pub use react::ReasoningLoop;
pub use registry::{ToolOutcome, ToolRegistry};
pub use router::{Router, RoutingDecision};
pub use tool::{
    ActionInput, FnTool, ParamSpec, ParamType, ParameterSchema, Tool, ToolArgs, ToolDefinition,
};
pub use trace::{
    AgentRunResult, AgentState, OrchestrationMetadata, OrchestrationResult, ReasoningStep,
    RunMetadata, StepAction,
};
