//! Batch evaluation of labeled cases against a routing pipeline.
//!
//! Cases run as tasks in a [`JoinSet`], gated by a [`Semaphore`] so at most
//! `concurrency` are in flight. Each routing and execution step is bounded
//! by the per-case timeout; a timeout, error or panic becomes that case's
//! failing [`CaseResult`] and never aborts the batch.

use std::collections::BTreeMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use futures_util::FutureExt;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use super::dataset::EvalCase;
use super::metrics::{
    CaseResult, EvaluationReport, LatencyResult, ResponseQualityResult, RoutingResult,
    ToolUsageResult,
};
use crate::agent::registry::panic_message;
use crate::agent::{AgentRunResult, Domain, Orchestrator, Router, RoutingDecision};
use crate::error::{AgentError, EvalError};

/// What the evaluator needs from the system under test.
#[async_trait]
pub trait Pipeline: Send + Sync {
    /// Routes a query.
    async fn route(&self, query: &str) -> Result<RoutingDecision, AgentError>;

    /// Runs one domain.
    async fn execute_single(&self, domain: Domain, query: &str)
    -> Result<AgentRunResult, AgentError>;

    /// Runs several domains and collects results by domain.
    async fn execute_multi(
        &self,
        domains: &[Domain],
        query: &str,
    ) -> Result<BTreeMap<Domain, AgentRunResult>, AgentError>;
}

#[async_trait]
impl Pipeline for Orchestrator {
    async fn route(&self, query: &str) -> Result<RoutingDecision, AgentError> {
        Ok(Self::route(self, query))
    }

    async fn execute_single(
        &self,
        domain: Domain,
        query: &str,
    ) -> Result<AgentRunResult, AgentError> {
        Self::execute_single(self, domain, query, &[]).await
    }

    async fn execute_multi(
        &self,
        domains: &[Domain],
        query: &str,
    ) -> Result<BTreeMap<Domain, AgentRunResult>, AgentError> {
        Ok(Self::execute_multi(self, domains, query, &[]).await)
    }
}

/// Routing without agents, for `--routing-only` runs.
#[async_trait]
impl Pipeline for Router {
    async fn route(&self, query: &str) -> Result<RoutingDecision, AgentError> {
        Ok(Self::route(self, query))
    }

    async fn execute_single(
        &self,
        domain: Domain,
        _query: &str,
    ) -> Result<AgentRunResult, AgentError> {
        Err(routing_only_error(&[domain]))
    }

    async fn execute_multi(
        &self,
        domains: &[Domain],
        _query: &str,
    ) -> Result<BTreeMap<Domain, AgentRunResult>, AgentError> {
        Err(routing_only_error(domains))
    }
}

fn routing_only_error(domains: &[Domain]) -> AgentError {
    let names: Vec<&str> = domains.iter().map(|d| d.as_str()).collect();
    AgentError::Orchestration {
        message: format!(
            "router has no agents to execute ({})",
            names.join(", ")
        ),
    }
}

/// Replays cases through a [`Pipeline`] and scores them.
#[derive(Clone)]
pub struct Evaluator {
    pipeline: Arc<dyn Pipeline>,
}

impl std::fmt::Debug for Evaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Evaluator").finish_non_exhaustive()
    }
}

impl Evaluator {
    /// Creates an evaluator over a pipeline.
    #[must_use]
    pub fn new(pipeline: Arc<dyn Pipeline>) -> Self {
        Self { pipeline }
    }

    /// Routes and executes every case, at most `concurrency` at a time.
    ///
    /// Results keep case order. A `concurrency` of 0 is treated as 1.
    pub async fn evaluate(
        &self,
        cases: &[EvalCase],
        concurrency: usize,
        timeout: Duration,
    ) -> EvaluationReport {
        let started_at = Utc::now();
        info!(cases = cases.len(), concurrency, ?timeout, "starting evaluation");

        let gate = Arc::new(Semaphore::new(concurrency.max(1)));
        let mut tasks: JoinSet<(usize, CaseResult)> = JoinSet::new();
        for (index, case) in cases.iter().enumerate() {
            let gate = Arc::clone(&gate);
            let pipeline = Arc::clone(&self.pipeline);
            let case = case.clone();
            tasks.spawn(async move {
                let result = match gate.acquire_owned().await {
                    Ok(_permit) => evaluate_case(pipeline.as_ref(), &case, timeout).await,
                    Err(e) => CaseResult::errored(&case, e.to_string()),
                };
                (index, result)
            });
        }

        let mut slots: Vec<Option<CaseResult>> = vec![None; cases.len()];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, result)) => {
                    if let Some(slot) = slots.get_mut(index) {
                        *slot = Some(result);
                    }
                }
                Err(e) => warn!(error = %e, "evaluation task did not complete"),
            }
        }

        let results = slots
            .into_iter()
            .zip(cases)
            .map(|(slot, case)| {
                slot.unwrap_or_else(|| CaseResult::errored(case, "evaluation task did not complete"))
            })
            .collect();
        let report = EvaluationReport::new(results, started_at, Utc::now());
        info!(
            passed = report.pass_count(),
            failed = report.fail_count(),
            errors = report.error_count(),
            "evaluation finished"
        );
        report
    }

    /// Routes every case without executing agents.
    ///
    /// Results carry routing and latency sub-results only.
    pub async fn evaluate_routing_only(&self, cases: &[EvalCase]) -> EvaluationReport {
        let started_at = Utc::now();
        let mut results = Vec::with_capacity(cases.len());
        for case in cases {
            let start = Instant::now();
            let result = match self.pipeline.route(&case.query).await {
                Ok(decision) => CaseResult::routing_only(
                    case,
                    RoutingResult::score(case, &decision),
                    start.elapsed(),
                ),
                Err(e) => {
                    warn!(case = %case.id, error = %e, "routing failed");
                    CaseResult::errored(case, e.to_string())
                }
            };
            debug!(case = %case.id, verdict = %result.verdict, "case routed");
            results.push(result);
        }
        EvaluationReport::new(results, started_at, Utc::now())
    }
}

async fn evaluate_case(pipeline: &dyn Pipeline, case: &EvalCase, limit: Duration) -> CaseResult {
    debug!(case = %case.id, "evaluating case");
    let result = match AssertUnwindSafe(run_case(pipeline, case, limit))
        .catch_unwind()
        .await
    {
        Ok(Ok(result)) => result,
        Ok(Err(e)) => {
            warn!(case = %case.id, error = %e, "case failed");
            CaseResult::errored(case, e.to_string())
        }
        Err(payload) => {
            let message = format!("case panicked: {}", panic_message(payload.as_ref()));
            warn!(case = %case.id, %message, "case failed");
            CaseResult::errored(case, message)
        }
    };
    debug!(case = %case.id, verdict = %result.verdict, "case finished");
    result
}

async fn run_case(
    pipeline: &dyn Pipeline,
    case: &EvalCase,
    limit: Duration,
) -> Result<CaseResult, EvalError> {
    let route_start = Instant::now();
    let decision = bounded(limit, pipeline.route(&case.query)).await?;
    let routing_time = route_start.elapsed();

    let agent_start = Instant::now();
    let results: Vec<AgentRunResult> = if decision.requires_multi_agent {
        bounded(
            limit,
            pipeline.execute_multi(&decision.all_domains(), &case.query),
        )
        .await?
        .into_values()
        .collect()
    } else {
        vec![bounded(limit, pipeline.execute_single(decision.primary, &case.query)).await?]
    };
    let agent_time = agent_start.elapsed();

    let answer = results
        .iter()
        .map(|r| r.answer.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    let mut tools: Vec<String> = Vec::new();
    for name in results.iter().flat_map(AgentRunResult::tools_used) {
        if !tools.contains(&name) {
            tools.push(name);
        }
    }
    let has_reasoning = results.iter().any(|r| !r.trace.is_empty());

    let latency = LatencyResult::new(routing_time, agent_time, tools.len());
    Ok(CaseResult::scored(
        case,
        RoutingResult::score(case, &decision),
        ToolUsageResult::score(&case.expected_tools, tools),
        ResponseQualityResult::score(&case.expected_keywords, &answer, has_reasoning),
        latency,
    ))
}

async fn bounded<T>(
    limit: Duration,
    step: impl Future<Output = Result<T, AgentError>>,
) -> Result<T, EvalError> {
    match tokio::time::timeout(limit, step).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(EvalError::CaseFailed {
            message: e.to_string(),
        }),
        Err(_) => Err(EvalError::Timeout {
            seconds: limit.as_secs_f64(),
        }),
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::agent::{ActionInput, AgentState, ReasoningStep, RunMetadata, StepAction};
    use crate::eval::dataset::{ExpectedDomain, routing_dataset};
    use crate::eval::metrics::Verdict;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn run_result(domain: Domain, answer: &str, tools: &[&str]) -> AgentRunResult {
        let mut trace: Vec<ReasoningStep> = tools
            .iter()
            .map(|t| StepAction::Tool((*t).to_string()))
            .chain(std::iter::once(StepAction::FinalAnswer))
            .enumerate()
            .map(|(i, action)| ReasoningStep {
                step: i + 1,
                thought: String::new(),
                action,
                action_input: ActionInput::Empty,
                observation: None,
                timestamp: Utc::now(),
            })
            .collect();
        if let Some(last) = trace.last_mut() {
            last.observation = Some(answer.to_string());
        }
        AgentRunResult {
            domain,
            answer: answer.to_string(),
            trace,
            sources: Vec::new(),
            metadata: RunMetadata {
                iterations: tools.len() + 1,
                complete: true,
                error: None,
                total_tokens: 0,
            },
            state: AgentState::Completed,
            elapsed: Duration::from_millis(1),
        }
    }

    /// Routes every query to one domain and answers with fixed text.
    struct MockPipeline {
        domain: Domain,
        multi: bool,
        answer: String,
        tools: Vec<&'static str>,
        fail_route_on: Option<&'static str>,
        panic_on: Option<&'static str>,
        delay: Duration,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    impl MockPipeline {
        fn new(domain: Domain, answer: &str, tools: &[&'static str]) -> Self {
            Self {
                domain,
                multi: false,
                answer: answer.to_string(),
                tools: tools.to_vec(),
                fail_route_on: None,
                panic_on: None,
                delay: Duration::ZERO,
                in_flight: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Pipeline for MockPipeline {
        async fn route(&self, query: &str) -> Result<RoutingDecision, AgentError> {
            if self.fail_route_on.is_some_and(|q| q == query) {
                return Err(AgentError::Orchestration {
                    message: "router exploded".to_string(),
                });
            }
            if self.panic_on.is_some_and(|q| q == query) {
                panic!("mock panic");
            }
            Ok(RoutingDecision {
                primary: self.domain,
                secondary: if self.multi {
                    vec![Domain::Legal]
                } else {
                    Vec::new()
                },
                confidence: 0.8,
                reasoning: "mock".to_string(),
                requires_multi_agent: self.multi,
            })
        }

        async fn execute_single(
            &self,
            domain: Domain,
            _query: &str,
        ) -> Result<AgentRunResult, AgentError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(run_result(domain, &self.answer, &self.tools))
        }

        async fn execute_multi(
            &self,
            domains: &[Domain],
            _query: &str,
        ) -> Result<BTreeMap<Domain, AgentRunResult>, AgentError> {
            Ok(domains
                .iter()
                .map(|&d| (d, run_result(d, &format!("{d} view"), &[d.as_str()])))
                .collect())
        }
    }

    fn finance_case(id: &str, query: &str) -> EvalCase {
        EvalCase::new(id, query, ExpectedDomain::Finance)
            .tools(&["calculate_risk_metrics"])
            .keywords(&["VaR", "Sharpe"])
    }

    #[tokio::test]
    async fn test_all_expectations_met() {
        let pipeline = MockPipeline::new(
            Domain::Finance,
            "VaR is 2% and the Sharpe ratio is 1.1",
            &["calculate_risk_metrics"],
        );
        let evaluator = Evaluator::new(Arc::new(pipeline));
        let report = evaluator
            .evaluate(&[finance_case("c1", "risk?")], 1, Duration::from_secs(5))
            .await;

        assert!((report.pass_rate() - 1.0).abs() < f64::EPSILON);
        assert!((report.routing_accuracy() - 1.0).abs() < f64::EPSILON);
        assert!((report.tool_selection_accuracy() - 1.0).abs() < f64::EPSILON);
        let latency = report.results[0].latency.clone().unwrap_or_else(|| unreachable!());
        assert_eq!(latency.tool_calls, 1);
        assert!(report.results[0].response_quality.as_ref().is_some_and(|q| q.has_reasoning));
    }

    #[tokio::test]
    async fn test_route_error_is_isolated() {
        let mut pipeline = MockPipeline::new(
            Domain::Finance,
            "VaR and Sharpe",
            &["calculate_risk_metrics"],
        );
        pipeline.fail_route_on = Some("bad");
        let evaluator = Evaluator::new(Arc::new(pipeline));
        let report = evaluator
            .evaluate(
                &[finance_case("bad", "bad"), finance_case("good", "good")],
                2,
                Duration::from_secs(5),
            )
            .await;

        assert_eq!(report.total_cases(), 2);
        assert_eq!(report.error_count(), 1);
        let bad = &report.results[0];
        assert_eq!(bad.case_id, "bad");
        assert_eq!(bad.verdict, Verdict::Fail);
        assert!(bad.routing.is_none());
        assert!(bad.error.as_deref().is_some_and(|e| e.contains("router exploded")));
        assert_eq!(report.results[1].verdict, Verdict::Pass);
    }

    #[tokio::test]
    async fn test_single_failing_case_batch() {
        let mut pipeline = MockPipeline::new(Domain::Finance, "", &[]);
        pipeline.fail_route_on = Some("q");
        let report = Evaluator::new(Arc::new(pipeline))
            .evaluate(&[finance_case("only", "q")], 1, Duration::from_secs(5))
            .await;
        assert_eq!(report.error_count(), 1);
        assert!(report.pass_rate().abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_panic_becomes_case_error() {
        let mut pipeline = MockPipeline::new(
            Domain::Finance,
            "VaR and Sharpe",
            &["calculate_risk_metrics"],
        );
        pipeline.panic_on = Some("boom");
        let report = Evaluator::new(Arc::new(pipeline))
            .evaluate(
                &[finance_case("p", "boom"), finance_case("ok", "fine")],
                1,
                Duration::from_secs(5),
            )
            .await;
        assert!(
            report.results[0]
                .error
                .as_deref()
                .is_some_and(|e| e.contains("mock panic"))
        );
        assert_eq!(report.results[1].verdict, Verdict::Pass);
    }

    #[tokio::test]
    async fn test_timeout_fails_case() {
        let mut pipeline = MockPipeline::new(Domain::Finance, "late", &[]);
        pipeline.delay = Duration::from_millis(500);
        let report = Evaluator::new(Arc::new(pipeline))
            .evaluate(&[finance_case("slow", "q")], 1, Duration::from_millis(50))
            .await;
        let result = &report.results[0];
        assert_eq!(result.verdict, Verdict::Fail);
        assert_eq!(result.error.as_deref(), Some("Timeout after 0.05s"));
        assert!(result.latency.is_none());
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let mut pipeline = MockPipeline::new(
            Domain::Finance,
            "VaR and Sharpe",
            &["calculate_risk_metrics"],
        );
        pipeline.delay = Duration::from_millis(20);
        let pipeline = Arc::new(pipeline);
        let cases: Vec<EvalCase> = (0..8)
            .map(|i| finance_case(&format!("c{i}"), "q"))
            .collect();
        let report = Evaluator::new(Arc::clone(&pipeline) as Arc<dyn Pipeline>)
            .evaluate(&cases, 3, Duration::from_secs(5))
            .await;

        assert_eq!(report.pass_count(), 8);
        assert!(pipeline.peak.load(Ordering::SeqCst) <= 3);
        let ids: Vec<&str> = report.results.iter().map(|r| r.case_id.as_str()).collect();
        assert_eq!(ids, vec!["c0", "c1", "c2", "c3", "c4", "c5", "c6", "c7"]);
    }

    #[tokio::test]
    async fn test_multi_agent_answers_are_joined() {
        let mut pipeline = MockPipeline::new(Domain::Finance, "", &[]);
        pipeline.multi = true;
        let case = EvalCase::new("m", "q", ExpectedDomain::Multi)
            .multi(&[Domain::Finance, Domain::Legal])
            .tools(&["finance", "legal"])
            .keywords(&["finance view", "legal view"]);
        let report = Evaluator::new(Arc::new(pipeline))
            .evaluate(&[case], 1, Duration::from_secs(5))
            .await;
        let result = &report.results[0];
        assert_eq!(result.verdict, Verdict::Pass);
        let tools = result.tool_usage.clone().unwrap_or_else(|| unreachable!());
        assert_eq!(tools.actual_tools, vec!["finance", "legal"]);
        assert!((report.multi_agent_accuracy() - 1.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_routing_only_with_keyword_router() {
        let dataset = routing_dataset();
        let report = Evaluator::new(Arc::new(Router::new()))
            .evaluate_routing_only(&dataset.cases)
            .await;
        assert_eq!(report.total_cases(), 15);
        assert_eq!(report.error_count(), 0);
        assert!(report.results.iter().all(|r| r.tool_usage.is_none() && r.routing.is_some()));

        let verdict_of = |id: &str| {
            report
                .results
                .iter()
                .find(|r| r.case_id == id)
                .map(|r| r.verdict)
        };
        assert_eq!(verdict_of("route_fin_01"), Some(Verdict::Pass));
        assert_eq!(verdict_of("route_amb_02"), Some(Verdict::Fail));
        assert_eq!(verdict_of("route_multi_01"), Some(Verdict::Pass));
    }

    #[tokio::test]
    async fn test_router_cannot_execute() {
        let report = Evaluator::new(Arc::new(Router::new()))
            .evaluate(&[finance_case("r", "stock portfolio")], 1, Duration::from_secs(5))
            .await;
        assert!(
            report.results[0]
                .error
                .as_deref()
                .is_some_and(|e| e.contains("router has no agents"))
        );
    }
}
