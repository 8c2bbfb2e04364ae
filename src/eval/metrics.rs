//! Per-case scoring and report aggregation.
//!
//! Scoring functions turn one case plus what the pipeline did into
//! sub-results. [`EvaluationReport`] is a pure reducer over the collected
//! [`CaseResult`]s: every statistic is recomputed from them on demand.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::dataset::{EvalCase, ExpectedDomain};
use crate::agent::{Domain, RoutingDecision};

/// Minimum keyword coverage for a pass.
pub const PASS_COVERAGE: f64 = 0.5;

/// Judgment for one case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    /// Routing, tools and keywords all meet expectations.
    Pass,
    /// Routing was wrong or the case errored.
    Fail,
    /// Routing was right, something else fell short.
    Partial,
}

impl Verdict {
    /// Uppercase label for reports.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pass => "PASS",
            Self::Fail => "FAIL",
            Self::Partial => "PARTIAL",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Routing sub-result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingResult {
    /// Expected domain from the case.
    pub expected_domain: ExpectedDomain,
    /// Primary domain the router picked.
    pub actual_domain: Domain,
    /// Expected multi-agent flag.
    pub expected_multi_agent: bool,
    /// Decision's multi-agent flag.
    pub actual_multi_agent: bool,
    /// Decision confidence.
    pub confidence: f64,
    /// Whether the primary domain is acceptable.
    pub correct: bool,
    /// Whether the multi-agent flag matches.
    pub multi_agent_correct: bool,
}

impl RoutingResult {
    /// Scores a routing decision against a case.
    ///
    /// A `multi` case accepts any of its secondary domains as primary.
    #[must_use]
    pub fn score(case: &EvalCase, decision: &RoutingDecision) -> Self {
        let correct = match case.expected_domain.domain() {
            Some(expected) => expected == decision.primary,
            None => case.secondary_domains.contains(&decision.primary),
        };
        Self {
            expected_domain: case.expected_domain,
            actual_domain: decision.primary,
            expected_multi_agent: case.requires_multi_agent,
            actual_multi_agent: decision.requires_multi_agent,
            confidence: decision.confidence,
            correct,
            multi_agent_correct: case.requires_multi_agent == decision.requires_multi_agent,
        }
    }
}

/// Tool selection sub-result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolUsageResult {
    /// Tools the case expects.
    pub expected_tools: Vec<String>,
    /// Distinct tools invoked, in first-use order.
    pub actual_tools: Vec<String>,
    /// Whether every expected tool was invoked.
    pub tools_correct: bool,
    /// `|expected ∩ actual| / |actual|`.
    pub precision: f64,
    /// `|expected ∩ actual| / |expected|`.
    pub recall: f64,
}

impl ToolUsageResult {
    /// Scores invoked tools against the expected set.
    ///
    /// No expected tools means the check is skipped: correct, with
    /// precision and recall of 1.0.
    #[must_use]
    pub fn score(expected: &[String], actual: Vec<String>) -> Self {
        if expected.is_empty() {
            return Self {
                expected_tools: Vec::new(),
                actual_tools: actual,
                tools_correct: true,
                precision: 1.0,
                recall: 1.0,
            };
        }
        let hits = expected.iter().filter(|t| actual.contains(t)).count();
        Self {
            tools_correct: hits == expected.len(),
            precision: ratio(hits, actual.len()),
            recall: ratio(hits, expected.len()),
            expected_tools: expected.to_vec(),
            actual_tools: actual,
        }
    }
}

/// Answer content sub-result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseQualityResult {
    /// Keywords the case expects.
    pub expected_keywords: Vec<String>,
    /// Expected keywords present in the answer.
    pub found_keywords: Vec<String>,
    /// Expected keywords absent from the answer.
    pub missing_keywords: Vec<String>,
    /// `found / expected`, 1.0 when nothing is expected.
    pub keyword_coverage: f64,
    /// Answer length in characters.
    pub response_length: usize,
    /// Whether any reasoning steps were recorded.
    pub has_reasoning: bool,
}

impl ResponseQualityResult {
    /// Scores an answer by case-insensitive keyword presence.
    #[must_use]
    pub fn score(expected: &[String], answer: &str, has_reasoning: bool) -> Self {
        let lower = answer.to_lowercase();
        let (found, missing): (Vec<String>, Vec<String>) = expected
            .iter()
            .cloned()
            .partition(|k| lower.contains(&k.to_lowercase()));
        let keyword_coverage = if expected.is_empty() {
            1.0
        } else {
            ratio(found.len(), expected.len())
        };
        Self {
            expected_keywords: expected.to_vec(),
            found_keywords: found,
            missing_keywords: missing,
            keyword_coverage,
            response_length: answer.chars().count(),
            has_reasoning,
        }
    }
}

/// Timing sub-result, in milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatencyResult {
    /// Routing plus execution.
    pub total_ms: f64,
    /// Routing only.
    pub routing_ms: f64,
    /// Agent execution only.
    pub agent_ms: f64,
    /// Distinct tools invoked.
    pub tool_calls: usize,
}

impl LatencyResult {
    /// Builds timings from measured durations.
    #[must_use]
    pub fn new(routing: Duration, agent: Duration, tool_calls: usize) -> Self {
        let routing_ms = millis(routing);
        let agent_ms = millis(agent);
        Self {
            total_ms: routing_ms + agent_ms,
            routing_ms,
            agent_ms,
            tool_calls,
        }
    }
}

/// Verdict for a fully scored case.
#[must_use]
pub fn verdict(
    routing: &RoutingResult,
    tools: &ToolUsageResult,
    quality: &ResponseQualityResult,
) -> Verdict {
    if !routing.correct {
        Verdict::Fail
    } else if tools.tools_correct && quality.keyword_coverage >= PASS_COVERAGE {
        Verdict::Pass
    } else {
        Verdict::Partial
    }
}

/// Outcome of one case.
///
/// Either `error` is set and every sub-result is `None`, or `error` is
/// `None` and the sub-results hold what was measured.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseResult {
    /// Case id.
    pub case_id: String,
    /// Query text.
    pub query: String,
    /// Judgment.
    pub verdict: Verdict,
    /// Routing sub-result.
    pub routing: Option<RoutingResult>,
    /// Tool selection sub-result.
    pub tool_usage: Option<ToolUsageResult>,
    /// Answer content sub-result.
    pub response_quality: Option<ResponseQualityResult>,
    /// Timing sub-result.
    pub latency: Option<LatencyResult>,
    /// Error that ended the case.
    pub error: Option<String>,
}

impl CaseResult {
    /// Failing result for a case that errored or timed out.
    #[must_use]
    pub fn errored(case: &EvalCase, error: impl Into<String>) -> Self {
        Self {
            case_id: case.id.clone(),
            query: case.query.clone(),
            verdict: Verdict::Fail,
            routing: None,
            tool_usage: None,
            response_quality: None,
            latency: None,
            error: Some(error.into()),
        }
    }

    /// Result for a routing-only evaluation.
    ///
    /// Passes when routing is correct and, for cases expecting several
    /// agents, the multi-agent flag matches too.
    #[must_use]
    pub fn routing_only(case: &EvalCase, routing: RoutingResult, routing_time: Duration) -> Self {
        let pass =
            routing.correct && (!case.requires_multi_agent || routing.multi_agent_correct);
        Self {
            case_id: case.id.clone(),
            query: case.query.clone(),
            verdict: if pass { Verdict::Pass } else { Verdict::Fail },
            routing: Some(routing),
            tool_usage: None,
            response_quality: None,
            latency: Some(LatencyResult::new(routing_time, Duration::ZERO, 0)),
            error: None,
        }
    }

    /// Result for a fully executed case.
    #[must_use]
    pub fn scored(
        case: &EvalCase,
        routing: RoutingResult,
        tool_usage: ToolUsageResult,
        response_quality: ResponseQualityResult,
        latency: LatencyResult,
    ) -> Self {
        Self {
            case_id: case.id.clone(),
            query: case.query.clone(),
            verdict: verdict(&routing, &tool_usage, &response_quality),
            routing: Some(routing),
            tool_usage: Some(tool_usage),
            response_quality: Some(response_quality),
            latency: Some(latency),
            error: None,
        }
    }

    /// Returns `true` if the case errored.
    #[must_use]
    pub const fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Nearest-rank percentile: sort ascending, take index
/// `floor(len * p)` clamped to the last element. Empty input gives 0.
#[must_use]
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn percentile(values: &[f64], p: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let idx = ((sorted.len() as f64) * p).floor() as usize;
    sorted[idx.min(sorted.len() - 1)]
}

/// Ordered case results plus run timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    /// Results in case order.
    pub results: Vec<CaseResult>,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the run finished.
    pub completed_at: DateTime<Utc>,
}

impl EvaluationReport {
    /// Report over finished results.
    #[must_use]
    pub const fn new(
        results: Vec<CaseResult>,
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            results,
            started_at,
            completed_at,
        }
    }

    /// Number of cases.
    #[must_use]
    pub fn total_cases(&self) -> usize {
        self.results.len()
    }

    /// Cases with verdict pass.
    #[must_use]
    pub fn pass_count(&self) -> usize {
        self.count_verdict(Verdict::Pass)
    }

    /// Cases with verdict fail, errors included.
    #[must_use]
    pub fn fail_count(&self) -> usize {
        self.count_verdict(Verdict::Fail)
    }

    /// Cases with verdict partial.
    #[must_use]
    pub fn partial_count(&self) -> usize {
        self.count_verdict(Verdict::Partial)
    }

    /// Cases that errored or timed out.
    #[must_use]
    pub fn error_count(&self) -> usize {
        self.results.iter().filter(|r| r.is_error()).count()
    }

    /// Passed over total, 0 for an empty report.
    #[must_use]
    pub fn pass_rate(&self) -> f64 {
        ratio(self.pass_count(), self.total_cases())
    }

    /// Share of routed cases with a correct primary.
    #[must_use]
    pub fn routing_accuracy(&self) -> f64 {
        let routed: Vec<&RoutingResult> = self.routing_results().collect();
        ratio(routed.iter().filter(|r| r.correct).count(), routed.len())
    }

    /// Multi-agent flag accuracy over cases that expect several agents.
    #[must_use]
    pub fn multi_agent_accuracy(&self) -> f64 {
        let multi: Vec<&RoutingResult> = self
            .routing_results()
            .filter(|r| r.expected_multi_agent)
            .collect();
        ratio(multi.iter().filter(|r| r.multi_agent_correct).count(), multi.len())
    }

    /// Mean routing confidence.
    #[must_use]
    pub fn avg_routing_confidence(&self) -> f64 {
        mean(self.routing_results().map(|r| r.confidence))
    }

    /// Share of tool-scored cases with every expected tool invoked.
    #[must_use]
    pub fn tool_selection_accuracy(&self) -> f64 {
        let scored: Vec<&ToolUsageResult> = self.tool_results().collect();
        ratio(scored.iter().filter(|t| t.tools_correct).count(), scored.len())
    }

    /// Mean tool precision.
    #[must_use]
    pub fn avg_tool_precision(&self) -> f64 {
        mean(self.tool_results().map(|t| t.precision))
    }

    /// Mean tool recall.
    #[must_use]
    pub fn avg_tool_recall(&self) -> f64 {
        mean(self.tool_results().map(|t| t.recall))
    }

    /// Mean keyword coverage.
    #[must_use]
    pub fn avg_keyword_coverage(&self) -> f64 {
        mean(
            self.results
                .iter()
                .filter_map(|r| r.response_quality.as_ref())
                .map(|q| q.keyword_coverage),
        )
    }

    /// Mean total latency in ms.
    #[must_use]
    pub fn avg_latency_ms(&self) -> f64 {
        mean(self.latencies().into_iter())
    }

    /// Total latency percentile in ms (`p` in `[0, 1]`).
    #[must_use]
    pub fn latency_percentile_ms(&self, p: f64) -> f64 {
        percentile(&self.latencies(), p)
    }

    /// Wall-clock duration of the run in seconds.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn duration_s(&self) -> f64 {
        (self.completed_at - self.started_at).num_milliseconds().max(0) as f64 / 1000.0
    }

    /// Failing and partial cases, in case order.
    #[must_use]
    pub fn failures(&self) -> Vec<&CaseResult> {
        self.results
            .iter()
            .filter(|r| r.verdict != Verdict::Pass)
            .collect()
    }

    fn count_verdict(&self, verdict: Verdict) -> usize {
        self.results.iter().filter(|r| r.verdict == verdict).count()
    }

    fn routing_results(&self) -> impl Iterator<Item = &RoutingResult> {
        self.results.iter().filter_map(|r| r.routing.as_ref())
    }

    fn tool_results(&self) -> impl Iterator<Item = &ToolUsageResult> {
        self.results.iter().filter_map(|r| r.tool_usage.as_ref())
    }

    fn latencies(&self) -> Vec<f64> {
        self.results
            .iter()
            .filter_map(|r| r.latency.as_ref())
            .map(|l| l.total_ms)
            .collect()
    }
}

#[allow(clippy::cast_precision_loss)]
fn ratio(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}

#[allow(clippy::cast_precision_loss)]
fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 { 0.0 } else { sum / n as f64 }
}

fn millis(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::dataset::Difficulty;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(ToString::to_string).collect()
    }

    fn decision(primary: Domain, multi: bool) -> RoutingDecision {
        RoutingDecision {
            primary,
            secondary: Vec::new(),
            confidence: 0.7,
            reasoning: String::new(),
            requires_multi_agent: multi,
        }
    }

    fn case_result(id: &str, verdict: Verdict, total_ms: f64) -> CaseResult {
        CaseResult {
            case_id: id.to_string(),
            query: String::new(),
            verdict,
            routing: None,
            tool_usage: None,
            response_quality: None,
            latency: Some(LatencyResult {
                total_ms,
                routing_ms: 0.0,
                agent_ms: total_ms,
                tool_calls: 0,
            }),
            error: None,
        }
    }

    fn report(results: Vec<CaseResult>) -> EvaluationReport {
        let now = Utc::now();
        EvaluationReport::new(results, now, now)
    }

    #[test]
    fn test_percentiles_of_ten_latencies() {
        let values: Vec<f64> = (1..=10).map(|i| f64::from(i) * 100.0).collect();
        let p50 = percentile(&values, 0.50);
        assert!((500.0..=600.0).contains(&p50));
        assert!(percentile(&values, 0.95) >= 900.0);
        assert!((percentile(&values, 0.99) - 1000.0).abs() < f64::EPSILON);
        assert!(percentile(&[], 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_percentile_sorts_input() {
        let values = [900.0, 100.0, 500.0];
        assert!((percentile(&values, 0.0) - 100.0).abs() < f64::EPSILON);
        assert!((percentile(&values, 1.0) - 900.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_tools_without_expectation_are_correct() {
        let result = ToolUsageResult::score(&[], strings(&["analyze_nda"]));
        assert!(result.tools_correct);
        assert!((result.precision - 1.0).abs() < f64::EPSILON);
        assert!((result.recall - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_tools_none_invoked() {
        let result = ToolUsageResult::score(&strings(&["analyze_nda"]), Vec::new());
        assert!(!result.tools_correct);
        assert!(result.precision.abs() < f64::EPSILON);
        assert!(result.recall.abs() < f64::EPSILON);
    }

    #[test]
    fn test_tools_precision_and_recall() {
        let result = ToolUsageResult::score(
            &strings(&["a", "b"]),
            strings(&["a", "c", "d", "search_knowledge_base"]),
        );
        assert!(!result.tools_correct);
        assert!((result.precision - 0.25).abs() < 1e-9);
        assert!((result.recall - 0.5).abs() < 1e-9);

        let superset = ToolUsageResult::score(&strings(&["a"]), strings(&["b", "a"]));
        assert!(superset.tools_correct);
        assert!((superset.precision - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_keyword_coverage() {
        let quality = ResponseQualityResult::score(
            &strings(&["P/E", "Ratio", "AAPL", "sector"]),
            "The p/e ratio of aapl is 28.",
            true,
        );
        assert_eq!(quality.found_keywords, strings(&["P/E", "Ratio", "AAPL"]));
        assert_eq!(quality.missing_keywords, strings(&["sector"]));
        assert!((quality.keyword_coverage - 0.75).abs() < 1e-9);
        assert_eq!(quality.response_length, 28);

        let none = ResponseQualityResult::score(&[], "", false);
        assert!((none.keyword_coverage - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_multi_routing_accepts_any_secondary() {
        let case = EvalCase::new("m", "q", ExpectedDomain::Multi)
            .multi(&[Domain::Legal, Domain::Finance]);
        assert!(RoutingResult::score(&case, &decision(Domain::Finance, true)).correct);
        let wrong = RoutingResult::score(&case, &decision(Domain::Healthcare, false));
        assert!(!wrong.correct);
        assert!(!wrong.multi_agent_correct);
    }

    #[test]
    fn test_wrong_routing_always_fails() {
        let case = EvalCase::new("c", "q", ExpectedDomain::Legal);
        let routing = RoutingResult::score(&case, &decision(Domain::Finance, false));
        let tools = ToolUsageResult::score(&[], Vec::new());
        let quality = ResponseQualityResult::score(&[], "answer", true);
        assert_eq!(verdict(&routing, &tools, &quality), Verdict::Fail);
    }

    #[test]
    fn test_partial_and_pass() {
        let case = EvalCase::new("c", "q", ExpectedDomain::Legal);
        let routing = RoutingResult::score(&case, &decision(Domain::Legal, false));
        let tools = ToolUsageResult::score(&strings(&["analyze_nda"]), strings(&["analyze_nda"]));
        let half = ResponseQualityResult::score(&strings(&["nda", "term"]), "nda", true);
        assert_eq!(verdict(&routing, &tools, &half), Verdict::Pass);

        let low = ResponseQualityResult::score(&strings(&["nda", "term", "x"]), "nda", true);
        assert_eq!(verdict(&routing, &tools, &low), Verdict::Partial);

        let missed = ToolUsageResult::score(&strings(&["analyze_nda"]), Vec::new());
        assert_eq!(verdict(&routing, &missed, &half), Verdict::Partial);
    }

    #[test]
    fn test_routing_only_requires_multi_flag() {
        let case = EvalCase::new("m", "q", ExpectedDomain::Multi)
            .multi(&[Domain::Legal])
            .difficulty(Difficulty::Hard);
        let flagless = RoutingResult::score(&case, &decision(Domain::Legal, false));
        let result = CaseResult::routing_only(&case, flagless, Duration::from_millis(2));
        assert_eq!(result.verdict, Verdict::Fail);
        assert!(result.tool_usage.is_none());

        let flagged = RoutingResult::score(&case, &decision(Domain::Legal, true));
        let result = CaseResult::routing_only(&case, flagged, Duration::from_millis(2));
        assert_eq!(result.verdict, Verdict::Pass);
        let latency = result.latency.unwrap_or_else(|| unreachable!());
        assert!((latency.total_ms - latency.routing_ms).abs() < f64::EPSILON);
    }

    #[test]
    fn test_errored_case_has_no_sub_results() {
        let case = EvalCase::new("e", "q", ExpectedDomain::Finance);
        let result = CaseResult::errored(&case, "Timeout after 1s");
        assert_eq!(result.verdict, Verdict::Fail);
        assert!(result.routing.is_none() && result.latency.is_none());
        assert_eq!(result.error.as_deref(), Some("Timeout after 1s"));
    }

    #[test]
    fn test_report_counts() {
        let case = EvalCase::new("e", "q", ExpectedDomain::Finance);
        let report = report(vec![
            case_result("a", Verdict::Pass, 100.0),
            case_result("b", Verdict::Partial, 200.0),
            case_result("c", Verdict::Fail, 300.0),
            CaseResult::errored(&case, "boom"),
        ]);
        assert_eq!(report.total_cases(), 4);
        assert_eq!(report.pass_count(), 1);
        assert_eq!(report.partial_count(), 1);
        assert_eq!(report.fail_count(), 2);
        assert_eq!(report.error_count(), 1);
        assert!((report.pass_rate() - 0.25).abs() < 1e-9);
        assert!((report.avg_latency_ms() - 200.0).abs() < 1e-9);
        let failing: Vec<&str> = report.failures().iter().map(|r| r.case_id.as_str()).collect();
        assert_eq!(failing, vec!["b", "c", "e"]);
    }

    #[test]
    fn test_multi_agent_accuracy_ignores_single_cases() {
        let single = EvalCase::new("s", "q", ExpectedDomain::Finance);
        let multi = EvalCase::new("m", "q", ExpectedDomain::Multi).multi(&[Domain::Finance]);
        let results = vec![
            CaseResult::routing_only(
                &single,
                RoutingResult::score(&single, &decision(Domain::Finance, false)),
                Duration::ZERO,
            ),
            CaseResult::routing_only(
                &multi,
                RoutingResult::score(&multi, &decision(Domain::Finance, false)),
                Duration::ZERO,
            ),
        ];
        let report = report(results);
        assert!((report.routing_accuracy() - 1.0).abs() < f64::EPSILON);
        assert!(report.multi_agent_accuracy().abs() < f64::EPSILON);
        assert!((report.avg_routing_confidence() - 0.7).abs() < 1e-9);
    }

    #[test]
    fn test_empty_report_is_all_zero() {
        let report = report(Vec::new());
        assert!(report.pass_rate().abs() < f64::EPSILON);
        assert!(report.routing_accuracy().abs() < f64::EPSILON);
        assert!(report.latency_percentile_ms(0.95).abs() < f64::EPSILON);
    }
}
