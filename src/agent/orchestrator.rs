//! Orchestrator for route → fan-out → synthesize workflows.
//!
//! Routes a query with the keyword [`Router`], runs one reasoning loop or
//! several concurrently, and merges multi-agent answers with a synthesis
//! call. General queries skip the agents and get one direct generation.
//!
//! The orchestrator sets no timeout of its own; callers bound it. Fan-out
//! tasks live in a [`JoinSet`], so dropping an in-flight call aborts them.

use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use futures_util::FutureExt;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use super::client::Backend;
use super::config::AgentConfig;
use super::domain::{AgentInfo, Domain};
use super::domains::all_agents;
use super::knowledge::Document;
use super::message::ChatRequest;
use super::prompt::{GENERAL_SYSTEM_PROMPT, build_direct_prompt, build_synthesis_prompt};
use super::provider::{ChunkStream, EmbeddingProvider, LlmProvider};
use super::react::ReasoningLoop;
use super::registry::panic_message;
use super::router::{Router, RoutingDecision};
use super::trace::{
    AgentRunResult, AgentState, OrchestrationMetadata, OrchestrationResult, RunMetadata,
};
use crate::error::AgentError;

/// Direct generation used for the general domain.
#[derive(Clone)]
struct DirectAnswer {
    provider: Arc<dyn LlmProvider>,
    model: String,
    temperature: f32,
}

impl DirectAnswer {
    fn request(&self, preamble: &str, query: &str, context: &[Document]) -> ChatRequest {
        ChatRequest::new(&self.model, Some(preamble), &build_direct_prompt(query, context))
            .with_temperature(self.temperature)
    }

    async fn run(&self, query: &str, context: &[Document]) -> Result<AgentRunResult, AgentError> {
        let start = Instant::now();
        let request = self.request(GENERAL_SYSTEM_PROMPT, query, context);
        let response = self.provider.chat(&request).await?;
        Ok(AgentRunResult {
            domain: Domain::General,
            answer: response.content,
            trace: Vec::new(),
            sources: context.to_vec(),
            metadata: RunMetadata {
                iterations: 1,
                complete: true,
                error: None,
                total_tokens: response.usage.total_tokens,
            },
            state: AgentState::Completed,
            elapsed: start.elapsed(),
        })
    }
}

/// Coordinates routing, agent execution and synthesis.
pub struct Orchestrator {
    agents: BTreeMap<Domain, Arc<ReasoningLoop>>,
    router: Router,
    provider: Arc<dyn LlmProvider>,
    direct: DirectAnswer,
    config: AgentConfig,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("agents", &self.agents.keys().collect::<Vec<_>>())
            .field("provider", &self.provider.name())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    /// Creates an orchestrator over a resolved backend.
    #[must_use]
    pub fn new(backend: &Backend, config: AgentConfig) -> Self {
        Self::with_providers(
            Arc::clone(&backend.llm),
            Arc::clone(&backend.embeddings),
            config,
        )
    }

    /// Creates an orchestrator from separate capabilities.
    ///
    /// Every domain agent gets its own knowledge base over `embeddings`.
    #[must_use]
    pub fn with_providers(
        provider: Arc<dyn LlmProvider>,
        embeddings: Arc<dyn EmbeddingProvider>,
        config: AgentConfig,
    ) -> Self {
        let agents = all_agents()
            .into_iter()
            .map(|agent| {
                let domain = agent.domain();
                let reasoning = ReasoningLoop::new(
                    agent,
                    Arc::clone(&provider),
                    Arc::clone(&embeddings),
                    &config,
                );
                (domain, Arc::new(reasoning))
            })
            .collect();
        let direct = DirectAnswer {
            provider: Arc::clone(&provider),
            model: config.generation_model.clone(),
            temperature: config.general_temperature,
        };
        Self {
            agents,
            router: Router::new(),
            provider,
            direct,
            config,
        }
    }

    /// The keyword router.
    #[must_use]
    pub const fn router(&self) -> &Router {
        &self.router
    }

    /// The reasoning loop for a domain, if it has one.
    #[must_use]
    pub fn agent(&self, domain: Domain) -> Option<&Arc<ReasoningLoop>> {
        self.agents.get(&domain)
    }

    /// Routes a query.
    #[must_use]
    pub fn route(&self, query: &str) -> RoutingDecision {
        let decision = self.router.route(query);
        info!(
            primary = %decision.primary,
            confidence = decision.confidence,
            multi = decision.requires_multi_agent,
            "routing decision"
        );
        decision
    }

    /// Runs one domain. General (or any domain without an agent) gets a
    /// direct answer.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError`] if a generation call fails.
    pub async fn execute_single(
        &self,
        domain: Domain,
        query: &str,
        context: &[Document],
    ) -> Result<AgentRunResult, AgentError> {
        match self.agents.get(&domain) {
            Some(agent) => agent.run(query, context).await,
            None => self.direct.run(query, context).await,
        }
    }

    /// Runs several domains concurrently and collects results by domain.
    ///
    /// Never fails: an agent whose run errors or panics is represented by
    /// [`AgentRunResult::failed`].
    pub async fn execute_multi(
        &self,
        domains: &[Domain],
        query: &str,
        context: &[Document],
    ) -> BTreeMap<Domain, AgentRunResult> {
        let mut tasks: JoinSet<(Domain, Result<AgentRunResult, AgentError>)> = JoinSet::new();
        let mut pending: Vec<Domain> = Vec::with_capacity(domains.len());

        for &domain in domains {
            if pending.contains(&domain) {
                continue;
            }
            pending.push(domain);

            let agent = self.agents.get(&domain).map(Arc::clone);
            let direct = self.direct.clone();
            let query = query.to_string();
            let context = context.to_vec();
            tasks.spawn(async move {
                let run = async {
                    match agent {
                        Some(agent) => agent.run(&query, &context).await,
                        None => direct.run(&query, &context).await,
                    }
                };
                let result = match AssertUnwindSafe(run).catch_unwind().await {
                    Ok(result) => result,
                    Err(payload) => Err(AgentError::Orchestration {
                        message: format!("agent panicked: {}", panic_message(payload.as_ref())),
                    }),
                };
                (domain, result)
            });
        }

        let mut results = BTreeMap::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((domain, Ok(result))) => {
                    debug!(%domain, steps = result.trace.len(), "agent finished");
                    results.insert(domain, result);
                }
                Ok((domain, Err(e))) => {
                    warn!(%domain, error = %e, "agent failed");
                    results.insert(domain, AgentRunResult::failed(domain, &e.to_string()));
                }
                Err(e) => warn!(error = %e, "agent task did not complete"),
            }
        }
        for domain in pending {
            results
                .entry(domain)
                .or_insert_with(|| AgentRunResult::failed(domain, "task did not complete"));
        }
        results
    }

    /// Merges per-agent answers into one.
    ///
    /// Only non-error results are synthesized. One usable result is
    /// returned verbatim; with none, the error answers are joined. The
    /// flag reports whether a synthesis call was made.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError`] if the synthesis call fails.
    pub async fn synthesize(
        &self,
        query: &str,
        results: &BTreeMap<Domain, AgentRunResult>,
    ) -> Result<(String, bool), AgentError> {
        let usable: Vec<(Domain, &str)> = results
            .values()
            .filter(|r| !r.is_error())
            .map(|r| (r.domain, r.answer.as_str()))
            .collect();

        match usable.as_slice() {
            [] => {
                let errors: Vec<&str> = results.values().map(|r| r.answer.as_str()).collect();
                Ok((errors.join("\n\n"), false))
            }
            [(_, answer)] => Ok(((*answer).to_string(), false)),
            _ => {
                debug!(agents = usable.len(), "synthesizing answers");
                let request = ChatRequest::new(
                    &self.config.generation_model,
                    None,
                    &build_synthesis_prompt(query, &usable),
                )
                .with_temperature(self.config.synthesis_temperature)
                .with_max_tokens(self.config.synthesis_max_tokens);
                let response = self.provider.chat(&request).await?;
                Ok((response.content, true))
            }
        }
    }

    /// Answers a query end to end.
    ///
    /// With `forced` agents the router is skipped. Multi-agent decisions
    /// fan out and synthesize; single-agent decisions use the agent's
    /// answer directly.
    ///
    /// # Errors
    ///
    /// Returns the generation error of a single-agent run or of synthesis.
    pub async fn run(
        &self,
        query: &str,
        context: &[Document],
        forced: Option<&[Domain]>,
    ) -> Result<OrchestrationResult, AgentError> {
        let start = Instant::now();

        let routing = match forced {
            Some(domains) if !domains.is_empty() => RoutingDecision::forced(domains),
            _ => self.route(query),
        };

        let (answer, agent_results, synthesized) = if routing.requires_multi_agent {
            let results = self
                .execute_multi(&routing.all_domains(), query, context)
                .await;
            let (answer, synthesized) = self.synthesize(query, &results).await?;
            (answer, results, synthesized)
        } else {
            let result = self.execute_single(routing.primary, query, context).await?;
            let answer = result.answer.clone();
            (answer, BTreeMap::from([(routing.primary, result)]), false)
        };

        let elapsed = start.elapsed();
        info!(
            agents = agent_results.len(),
            synthesized,
            elapsed_ms = duration_ms(elapsed),
            "orchestration complete"
        );
        Ok(OrchestrationResult {
            answer,
            metadata: OrchestrationMetadata {
                timestamp: Utc::now(),
                agents_used: agent_results.keys().copied().collect(),
                multi_agent: routing.requires_multi_agent,
                synthesized,
            },
            agent_results,
            routing,
            elapsed,
        })
    }

    /// Routes a query and streams a direct answer from the primary
    /// domain's persona (no tools, no reasoning loop).
    ///
    /// # Errors
    ///
    /// Returns [`AgentError`] if the stream cannot be opened.
    pub async fn stream_direct(
        &self,
        query: &str,
    ) -> Result<(RoutingDecision, ChunkStream), AgentError> {
        let routing = self.route(query);
        let preamble = self
            .agents
            .get(&routing.primary)
            .map_or(GENERAL_SYSTEM_PROMPT, |a| a.agent_prompt());
        let mut request = self.direct.request(preamble, query, &[]);
        request.stream = true;
        let stream = self.provider.chat_stream(&request).await?;
        Ok((routing, stream))
    }

    /// Adds documents to a domain agent's knowledge base.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Orchestration`] for a domain without an agent,
    /// or [`AgentError::Embedding`] if embedding fails.
    pub async fn add_documents(
        &self,
        domain: Domain,
        documents: Vec<Document>,
    ) -> Result<usize, AgentError> {
        let agent = self
            .agents
            .get(&domain)
            .ok_or_else(|| AgentError::Orchestration {
                message: format!("No agent for domain '{domain}'"),
            })?;
        agent.add_documents(documents).await
    }

    /// Lists the domain agents and their tools.
    #[must_use]
    pub fn available_agents(&self) -> Vec<AgentInfo> {
        self.agents.values().map(|a| a.info()).collect()
    }
}

fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use futures_util::StreamExt;

    use super::*;
    use crate::agent::knowledge::tests::LetterEmbeddings;
    use crate::agent::react::tests::{ScriptedLlm, config};

    /// Answers each domain by spotting its tools in the step preamble.
    fn by_domain(request: &ChatRequest) -> Result<String, AgentError> {
        let preamble = request.preamble().unwrap_or_default();
        let reply = if preamble.contains("**calculate_risk_metrics**") {
            "ACTION: FINAL_ANSWER\nACTION_INPUT: finance view"
        } else if preamble.contains("**analyze_nda**") {
            "ACTION: FINAL_ANSWER\nACTION_INPUT: legal view"
        } else if preamble.contains("**parse_clinical_note**") {
            "ACTION: FINAL_ANSWER\nACTION_INPUT: healthcare view"
        } else if preamble == GENERAL_SYSTEM_PROMPT {
            "general answer"
        } else {
            "SYNTHESIZED"
        };
        Ok(reply.to_string())
    }

    fn orchestrator(llm: Arc<ScriptedLlm>) -> Orchestrator {
        Orchestrator::with_providers(llm, Arc::new(LetterEmbeddings), config(4))
    }

    const BREACH: &str =
        "What are the legal and financial implications of a healthcare data breach?";

    #[tokio::test]
    async fn test_single_agent_uses_answer_directly() {
        let llm = Arc::new(ScriptedLlm::new(by_domain));
        let result = orchestrator(Arc::clone(&llm))
            .run("What is the current P/E ratio for AAPL?", &[], None)
            .await
            .unwrap_or_else(|_| unreachable!());

        assert_eq!(result.answer, "finance view");
        assert_eq!(result.metadata.agents_used, vec![Domain::Finance]);
        assert!(!result.metadata.synthesized);
        assert_eq!(llm.count(), 1);
    }

    #[tokio::test]
    async fn test_multi_agent_fans_out_and_synthesizes() {
        let llm = Arc::new(ScriptedLlm::new(by_domain));
        let result = orchestrator(Arc::clone(&llm))
            .run(BREACH, &[], None)
            .await
            .unwrap_or_else(|_| unreachable!());

        assert_eq!(result.answer, "SYNTHESIZED");
        assert!(result.metadata.multi_agent);
        assert!(result.metadata.synthesized);
        assert_eq!(result.agent_results.len(), 3);
        assert_eq!(result.agent_results[&Domain::Legal].answer, "legal view");
        assert_eq!(llm.count(), 4);

        let requests = llm.requests.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let synthesis = requests
            .iter()
            .find(|r| r.preamble().is_none())
            .and_then(ChatRequest::user_text)
            .unwrap_or_default()
            .to_string();
        assert!(synthesis.contains("=== FINANCE AGENT RESPONSE ===\nfinance view"));
        assert!(synthesis.contains("=== LEGAL AGENT RESPONSE ==="));
        assert!(synthesis.contains("=== HEALTHCARE AGENT RESPONSE ==="));
    }

    #[tokio::test]
    async fn test_failing_agent_is_isolated() {
        let llm = Arc::new(ScriptedLlm::new(|request| {
            if request.preamble().unwrap_or_default().contains("**analyze_nda**") {
                return Err(AgentError::ApiRequest {
                    message: "rate limited".to_string(),
                    status: Some(429),
                });
            }
            by_domain(request)
        }));
        let result = orchestrator(Arc::clone(&llm))
            .run(BREACH, &[], None)
            .await
            .unwrap_or_else(|_| unreachable!());

        let legal = &result.agent_results[&Domain::Legal];
        assert!(legal.is_error());
        assert!(legal.answer.starts_with("Error from legal agent: "));
        assert_eq!(result.answer, "SYNTHESIZED");

        let requests = llm.requests.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let synthesis = requests
            .iter()
            .find(|r| r.preamble().is_none())
            .and_then(ChatRequest::user_text)
            .unwrap_or_default()
            .to_string();
        assert!(!synthesis.contains("LEGAL AGENT"));
    }

    #[tokio::test]
    async fn test_panicking_agent_is_isolated() {
        let llm = Arc::new(ScriptedLlm::new(|request| {
            if request.preamble().unwrap_or_default().contains("**parse_clinical_note**") {
                panic!("provider exploded");
            }
            by_domain(request)
        }));
        let results = orchestrator(llm)
            .execute_multi(&Domain::AGENTS, "q", &[])
            .await;
        assert_eq!(results.len(), 3);
        let healthcare = &results[&Domain::Healthcare];
        assert!(healthcare.is_error());
        assert!(healthcare.answer.contains("provider exploded"));
        assert!(!results[&Domain::Finance].is_error());
    }

    #[tokio::test]
    async fn test_single_usable_result_is_verbatim() {
        let llm = Arc::new(ScriptedLlm::new(|request| {
            if request.preamble().unwrap_or_default().contains("**calculate_risk_metrics**") {
                by_domain(request)
            } else {
                Err(AgentError::Stream {
                    message: "closed".to_string(),
                })
            }
        }));
        let result = orchestrator(Arc::clone(&llm))
            .run("q", &[], Some(&[Domain::Finance, Domain::Legal]))
            .await
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(result.answer, "finance view");
        assert!(!result.metadata.synthesized);
        assert!((result.routing.confidence - 1.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_general_query_answers_directly() {
        let llm = Arc::new(ScriptedLlm::new(by_domain));
        let result = orchestrator(Arc::clone(&llm))
            .run("Tell me a joke about cats", &[], None)
            .await
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(result.routing.primary, Domain::General);
        assert_eq!(result.answer, "general answer");
        assert!(result.agent_results[&Domain::General].trace.is_empty());
        assert_eq!(llm.count(), 1);
    }

    #[tokio::test]
    async fn test_single_agent_error_propagates() {
        let llm = Arc::new(ScriptedLlm::new(|_| {
            Err(AgentError::ApiRequest {
                message: "down".to_string(),
                status: None,
            })
        }));
        let err = orchestrator(llm)
            .run("What is the current P/E ratio for AAPL?", &[], None)
            .await;
        assert!(matches!(err, Err(AgentError::ApiRequest { .. })));
    }

    #[tokio::test]
    async fn test_empty_query_answered_by_general() {
        let llm = Arc::new(ScriptedLlm::new(by_domain));
        let result = orchestrator(Arc::clone(&llm))
            .run("   ", &[], None)
            .await
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(result.routing.primary, Domain::General);
        assert!((result.routing.confidence - 0.5).abs() < f64::EPSILON);
        assert_eq!(result.answer, "general answer");
        assert_eq!(llm.count(), 1);
    }

    #[tokio::test]
    async fn test_stream_direct_uses_domain_persona() {
        let llm = Arc::new(ScriptedLlm::always("streamed answer text"));
        let orch = orchestrator(Arc::clone(&llm));
        let (routing, stream) = orch
            .stream_direct("What is the current P/E ratio for AAPL?")
            .await
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(routing.primary, Domain::Finance);
        let chunks: Vec<String> = stream.filter_map(|c| async move { c.ok() }).collect().await;
        assert_eq!(chunks.concat(), "streamed answer text");

        let requests = llm.requests.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        assert!(requests[0].stream);
        assert!(!requests[0].preamble().unwrap_or_default().contains("## Available Tools"));
    }

    #[tokio::test]
    async fn test_add_documents() {
        let orch = orchestrator(Arc::new(ScriptedLlm::always("x")));
        let added = orch
            .add_documents(Domain::Legal, vec![Document::new("nda", "mutual NDA terms")])
            .await
            .unwrap_or_default();
        assert_eq!(added, 1);
        assert!(orch.add_documents(Domain::General, Vec::new()).await.is_err());
        let legal = orch
            .agent(Domain::Legal)
            .map(|a| Arc::clone(a.knowledge()))
            .unwrap_or_else(|| unreachable!());
        assert_eq!(legal.len().await, 1);
    }

    #[test]
    fn test_available_agents() {
        let agents = orchestrator(Arc::new(ScriptedLlm::always("x"))).available_agents();
        let domains: Vec<Domain> = agents.iter().map(|a| a.domain).collect();
        assert_eq!(domains, Domain::AGENTS.to_vec());
        assert!(agents.iter().all(|a| a.tools.iter().any(|t| t == "search_knowledge_base")));
    }
}
