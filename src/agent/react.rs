//! Reasoning loop: iterated think / act / observe for one domain agent.
//!
//! Each iteration asks the model for a THOUGHT / ACTION / ACTION_INPUT
//! triple, runs the chosen tool through the agent's [`ToolRegistry`] and
//! feeds the observation back into the transcript. The loop ends when the
//! model picks `FINAL_ANSWER` or the step budget runs out.
//!
//! Tool and parsing problems never leave the loop: they become
//! observations. Only generation failures propagate.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tracing::{debug, warn};

use super::config::AgentConfig;
use super::domain::{AgentInfo, Domain, DomainAgent};
use super::knowledge::{Document, KnowledgeBase, SearchKnowledgeTool};
use super::message::ChatRequest;
use super::parser::parse_step;
use super::prompt::{
    MISSING_ACTION_OBSERVATION, append_step, build_agent_system_prompt, build_initial_transcript,
    build_step_prompt,
};
use super::provider::{EmbeddingProvider, LlmProvider};
use super::registry::ToolRegistry;
use super::tool::ActionInput;
use super::trace::{AgentRunResult, AgentState, ReasoningStep, RunMetadata, StepAction};
use crate::error::AgentError;

/// Prefix of the answer produced when the step budget runs out.
pub const INCOMPLETE_PREFIX: &str =
    "I was unable to complete the task within the allowed steps. Here's what I found so far: ";

/// Stand-in for the last observation when nothing was observed.
pub const NO_PROGRESS: &str = "No progress made.";

/// A domain agent wired to a provider, a tool registry and a knowledge base.
///
/// The registry and system prompt are fixed at construction; each
/// [`ReasoningLoop::run`] owns its own trace and transcript, so one loop
/// can serve concurrent runs.
pub struct ReasoningLoop {
    agent: Arc<dyn DomainAgent>,
    provider: Arc<dyn LlmProvider>,
    knowledge: Arc<KnowledgeBase>,
    registry: ToolRegistry,
    system_prompt: String,
    model: String,
    max_iterations: usize,
    temperature: f32,
    max_tokens: u32,
}

impl std::fmt::Debug for ReasoningLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReasoningLoop")
            .field("agent", &self.agent.name())
            .field("provider", &self.provider.name())
            .field("registry", &self.registry)
            .field("model", &self.model)
            .field("max_iterations", &self.max_iterations)
            .finish_non_exhaustive()
    }
}

impl ReasoningLoop {
    /// Builds a loop for `agent`, registering `search_knowledge_base`
    /// ahead of the agent's own tools.
    #[must_use]
    pub fn new(
        agent: Arc<dyn DomainAgent>,
        provider: Arc<dyn LlmProvider>,
        embeddings: Arc<dyn EmbeddingProvider>,
        config: &AgentConfig,
    ) -> Self {
        let knowledge = Arc::new(KnowledgeBase::new(embeddings));
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(SearchKnowledgeTool::new(Arc::clone(&knowledge))));
        for tool in agent.tools() {
            registry.register(tool);
        }
        let system_prompt = build_agent_system_prompt(agent.system_prompt(), &registry.definitions());

        Self {
            agent,
            provider,
            knowledge,
            registry,
            system_prompt,
            model: config.generation_model.clone(),
            max_iterations: config.max_iterations,
            temperature: config.step_temperature,
            max_tokens: config.step_max_tokens,
        }
    }

    /// Domain served.
    #[must_use]
    pub fn domain(&self) -> Domain {
        self.agent.domain()
    }

    /// Registered tools.
    #[must_use]
    pub const fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// The agent's knowledge base.
    #[must_use]
    pub const fn knowledge(&self) -> &Arc<KnowledgeBase> {
        &self.knowledge
    }

    /// The domain agent's own system prompt, without tools or format rules.
    #[must_use]
    pub fn agent_prompt(&self) -> &str {
        self.agent.system_prompt()
    }

    /// Full system prompt sent with every step.
    #[must_use]
    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// Listing entry for this agent.
    #[must_use]
    pub fn info(&self) -> AgentInfo {
        AgentInfo {
            domain: self.agent.domain(),
            name: self.agent.name().to_string(),
            description: self.agent.description().to_string(),
            tools: self.registry.names(),
        }
    }

    /// Adds documents to the agent's knowledge base.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Embedding`] if the documents cannot be embedded.
    pub async fn add_documents(&self, documents: Vec<Document>) -> Result<usize, AgentError> {
        self.knowledge.add_documents(documents).await
    }

    /// Runs the loop for `query` with optional context documents.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError`] only when a generation call fails.
    pub async fn run(&self, query: &str, context: &[Document]) -> Result<AgentRunResult, AgentError> {
        let start = Instant::now();
        let domain = self.agent.domain();
        let mut trace: Vec<ReasoningStep> = Vec::new();
        let mut transcript = build_initial_transcript(query, context);
        let mut total_tokens: u32 = 0;

        for iteration in 1..=self.max_iterations {
            debug!(%domain, step = iteration, state = ?AgentState::Thinking, "requesting next step");

            let request = ChatRequest::new(
                &self.model,
                Some(&self.system_prompt),
                &build_step_prompt(&transcript),
            )
            .with_temperature(self.temperature)
            .with_max_tokens(self.max_tokens);
            let response = self.provider.chat(&request).await.inspect_err(|e| {
                warn!(%domain, step = iteration, error = %e, "generation failed");
            })?;
            total_tokens = total_tokens.saturating_add(response.usage.total_tokens);

            let parsed = parse_step(&response.content);
            let thought = parsed.thought.clone().unwrap_or_default();

            if parsed.is_final_answer() {
                let answer = parsed
                    .action_input
                    .clone()
                    .or_else(|| parsed.thought.clone())
                    .unwrap_or_else(|| response.content.trim().to_string());
                trace.push(ReasoningStep {
                    step: iteration,
                    thought,
                    action: StepAction::FinalAnswer,
                    action_input: ActionInput::parse(parsed.action_input.as_deref()),
                    observation: Some(answer.clone()),
                    timestamp: Utc::now(),
                });
                debug!(%domain, steps = iteration, "final answer reached");
                return Ok(AgentRunResult {
                    domain,
                    answer,
                    trace,
                    sources: context.to_vec(),
                    metadata: RunMetadata {
                        iterations: iteration,
                        complete: true,
                        error: None,
                        total_tokens,
                    },
                    state: AgentState::Completed,
                    elapsed: start.elapsed(),
                });
            }

            let Some(action) = parsed.action else {
                debug!(%domain, step = iteration, "step named no action");
                append_step(&mut transcript, &thought, "", "", MISSING_ACTION_OBSERVATION);
                trace.push(ReasoningStep {
                    step: iteration,
                    thought,
                    action: StepAction::Missing,
                    action_input: ActionInput::parse(parsed.action_input.as_deref()),
                    observation: Some(MISSING_ACTION_OBSERVATION.to_string()),
                    timestamp: Utc::now(),
                });
                continue;
            };

            let input = ActionInput::parse(parsed.action_input.as_deref());
            let outcome = self.registry.invoke(&action, &input).await;
            let observation = outcome.observation();
            if outcome.is_success() {
                debug!(
                    %domain,
                    step = iteration,
                    tool = %action,
                    state = ?AgentState::ExecutingTool,
                    observation_len = observation.len(),
                    "tool executed"
                );
            } else {
                warn!(%domain, step = iteration, tool = %action, error = %observation, "tool failed");
            }

            append_step(
                &mut transcript,
                &thought,
                &action,
                &input.as_text().unwrap_or_default(),
                &observation,
            );
            trace.push(ReasoningStep {
                step: iteration,
                thought,
                action: StepAction::Tool(action),
                action_input: input,
                observation: Some(observation),
                timestamp: Utc::now(),
            });
        }

        let last = trace
            .last()
            .and_then(|s| s.observation.clone())
            .unwrap_or_else(|| NO_PROGRESS.to_string());
        debug!(%domain, steps = trace.len(), "step budget exhausted");
        Ok(AgentRunResult {
            domain,
            answer: format!("{INCOMPLETE_PREFIX}{last}"),
            trace,
            sources: context.to_vec(),
            metadata: RunMetadata {
                iterations: self.max_iterations,
                complete: false,
                error: None,
                total_tokens,
            },
            state: AgentState::Completed,
            elapsed: start.elapsed(),
        })
    }
}
