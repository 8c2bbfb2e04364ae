//! Run records: reasoning steps, per-agent results and orchestration results.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

use super::domain::Domain;
use super::knowledge::Document;
use super::parser::FINAL_ANSWER;
use super::router::RoutingDecision;
use super::tool::ActionInput;

/// Serializes a [`Duration`] as fractional milliseconds.
pub(crate) fn serialize_ms<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64() * 1000.0)
}

/// Lifecycle state of a reasoning run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentState {
    /// Waiting on the model for the next step.
    Thinking,
    /// Running a tool.
    ExecutingTool,
    /// Finished with an answer (complete or degraded).
    Completed,
    /// Aborted by a generation failure.
    Error,
}

/// Action chosen in a reasoning step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(into = "Option<String>")]
pub enum StepAction {
    /// A named tool.
    Tool(String),
    /// The final-answer sentinel.
    FinalAnswer,
    /// The model produced no action.
    Missing,
}

impl StepAction {
    /// Tool name, if this step invoked one.
    #[must_use]
    pub fn tool_name(&self) -> Option<&str> {
        match self {
            Self::Tool(name) => Some(name),
            Self::FinalAnswer | Self::Missing => None,
        }
    }
}

impl From<StepAction> for Option<String> {
    fn from(action: StepAction) -> Self {
        match action {
            StepAction::Tool(name) => Some(name),
            StepAction::FinalAnswer => Some(FINAL_ANSWER.to_string()),
            StepAction::Missing => None,
        }
    }
}

/// One think/act/observe step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReasoningStep {
    /// 1-based index, monotonic within a run.
    pub step: usize,
    /// Reasoning statement (empty if the model gave none).
    pub thought: String,
    /// Chosen action.
    pub action: StepAction,
    /// Parsed action input.
    pub action_input: ActionInput,
    /// Tool output, or the answer text on the final step.
    pub observation: Option<String>,
    /// When the step was recorded.
    pub timestamp: DateTime<Utc>,
}

/// Bookkeeping for one agent run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunMetadata {
    /// Model calls made.
    pub iterations: usize,
    /// `false` when the step budget ran out before a final answer.
    pub complete: bool,
    /// Set when the run failed and this result is a stand-in.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Tokens reported by the provider across all steps.
    pub total_tokens: u32,
}

/// Result of one agent run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentRunResult {
    /// Domain that produced the result.
    pub domain: Domain,
    /// Final answer text.
    pub answer: String,
    /// Ordered reasoning steps.
    pub trace: Vec<ReasoningStep>,
    /// Documents supplied to the run.
    pub sources: Vec<Document>,
    /// Run bookkeeping.
    pub metadata: RunMetadata,
    /// Terminal state.
    pub state: AgentState,
    /// Wall-clock duration.
    #[serde(rename = "elapsed_ms", serialize_with = "serialize_ms")]
    pub elapsed: Duration,
}

impl AgentRunResult {
    /// Stand-in for an agent whose run failed.
    #[must_use]
    pub fn failed(domain: Domain, message: &str) -> Self {
        Self {
            domain,
            answer: format!("Error from {domain} agent: {message}"),
            trace: Vec::new(),
            sources: Vec::new(),
            metadata: RunMetadata {
                error: Some(message.to_string()),
                ..RunMetadata::default()
            },
            state: AgentState::Error,
            elapsed: Duration::ZERO,
        }
    }

    /// Returns `true` if this is a stand-in for a failed run.
    #[must_use]
    pub const fn is_error(&self) -> bool {
        self.metadata.error.is_some()
    }

    /// Distinct tool names invoked, in first-use order.
    #[must_use]
    pub fn tools_used(&self) -> Vec<String> {
        let mut seen: Vec<String> = Vec::new();
        for name in self.trace.iter().filter_map(|s| s.action.tool_name()) {
            if !seen.iter().any(|s| s == name) {
                seen.push(name.to_string());
            }
        }
        seen
    }
}

/// Bookkeeping for one orchestrator call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrchestrationMetadata {
    /// When the call finished.
    pub timestamp: DateTime<Utc>,
    /// Domains whose results are included.
    pub agents_used: Vec<Domain>,
    /// Whether the routing decision asked for several agents.
    pub multi_agent: bool,
    /// Whether a synthesis call produced the answer.
    pub synthesized: bool,
}

/// Result of one orchestrator call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrchestrationResult {
    /// Final answer.
    pub answer: String,
    /// Per-domain results.
    pub agent_results: BTreeMap<Domain, AgentRunResult>,
    /// Routing decision used.
    pub routing: RoutingDecision,
    /// Wall-clock duration of the whole call.
    #[serde(rename = "elapsed_ms", serialize_with = "serialize_ms")]
    pub elapsed: Duration,
    /// Call bookkeeping.
    pub metadata: OrchestrationMetadata,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(n: usize, action: StepAction) -> ReasoningStep {
        ReasoningStep {
            step: n,
            thought: String::new(),
            action,
            action_input: ActionInput::Empty,
            observation: None,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_tools_used_distinct_in_order() {
        let mut result = AgentRunResult::failed(Domain::Finance, "x");
        result.trace = vec![
            step(1, StepAction::Tool("b".into())),
            step(2, StepAction::Missing),
            step(3, StepAction::Tool("a".into())),
            step(4, StepAction::Tool("b".into())),
            step(5, StepAction::FinalAnswer),
        ];
        assert_eq!(result.tools_used(), vec!["b", "a"]);
    }

    #[test]
    fn test_failed_result() {
        let result = AgentRunResult::failed(Domain::Legal, "boom");
        assert_eq!(result.answer, "Error from legal agent: boom");
        assert!(result.is_error());
        assert_eq!(result.state, AgentState::Error);
        assert!(result.trace.is_empty());
    }

    #[test]
    fn test_step_action_serializes_as_name() {
        let json = serde_json::to_value(step(1, StepAction::FinalAnswer)).unwrap_or_default();
        assert_eq!(json["action"], "FINAL_ANSWER");
        let json = serde_json::to_value(step(1, StepAction::Missing)).unwrap_or_default();
        assert!(json["action"].is_null());
    }

    #[test]
    fn test_agent_state_wire_names() {
        let states = [
            AgentState::Thinking,
            AgentState::ExecutingTool,
            AgentState::Completed,
            AgentState::Error,
        ];
        let names: Vec<serde_json::Value> = states
            .iter()
            .map(|s| serde_json::to_value(s).unwrap_or_default())
            .collect();
        assert_eq!(
            names,
            vec!["thinking", "executing_tool", "completed", "error"]
        );
    }
}
