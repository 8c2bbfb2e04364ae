//! Structured and human-readable renderings of an [`EvaluationReport`].
//!
//! The JSON document has three top-level keys: `summary` (overview,
//! routing, tool usage, response quality and latency blocks), `failures`
//! (failing and partial cases with expected vs. actual routing and tools)
//! and `all_results` (id, verdict and error for every case).

use std::fmt::Write as _;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::metrics::{CaseResult, EvaluationReport, Verdict};
use crate::error::{CommandError, Error};

const RULE_WIDTH: usize = 70;
const QUERY_PREVIEW_CHARS: usize = 60;

/// Case counts and run duration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Overview {
    /// Number of cases.
    pub total_cases: usize,
    /// Cases that passed.
    pub passed: usize,
    /// Cases that failed, errors included.
    pub failed: usize,
    /// Cases judged partial.
    pub partial: usize,
    /// Cases that errored or timed out.
    pub errors: usize,
    /// `passed / total_cases`.
    pub pass_rate: f64,
    /// Wall-clock seconds.
    pub duration_s: f64,
}

/// Routing statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingSummary {
    /// Share of routed cases with a correct primary.
    pub accuracy: f64,
    /// Multi-agent flag accuracy over cases expecting several agents.
    pub multi_agent_accuracy: f64,
    /// Mean decision confidence.
    pub avg_confidence: f64,
}

/// Tool selection statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolUsageSummary {
    /// Share of cases with every expected tool invoked.
    pub selection_accuracy: f64,
    /// Mean precision.
    pub avg_precision: f64,
    /// Mean recall.
    pub avg_recall: f64,
}

/// Answer content statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseQualitySummary {
    /// Mean keyword coverage.
    pub avg_keyword_coverage: f64,
}

/// Latency statistics in milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatencySummary {
    /// Mean total latency.
    pub avg_ms: f64,
    /// Median.
    pub p50_ms: f64,
    /// 95th percentile.
    pub p95_ms: f64,
    /// 99th percentile.
    pub p99_ms: f64,
}

/// All summary blocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    /// Counts and duration.
    pub overview: Overview,
    /// Routing block.
    pub routing: RoutingSummary,
    /// Tool usage block.
    pub tool_usage: ToolUsageSummary,
    /// Response quality block.
    pub response_quality: ResponseQualitySummary,
    /// Latency block.
    pub latency: LatencySummary,
}

impl Summary {
    /// Reduces a report to its summary blocks.
    #[must_use]
    pub fn from_report(report: &EvaluationReport) -> Self {
        Self {
            overview: Overview {
                total_cases: report.total_cases(),
                passed: report.pass_count(),
                failed: report.fail_count(),
                partial: report.partial_count(),
                errors: report.error_count(),
                pass_rate: round_to(report.pass_rate(), 4),
                duration_s: round_to(report.duration_s(), 2),
            },
            routing: RoutingSummary {
                accuracy: round_to(report.routing_accuracy(), 4),
                multi_agent_accuracy: round_to(report.multi_agent_accuracy(), 4),
                avg_confidence: round_to(report.avg_routing_confidence(), 3),
            },
            tool_usage: ToolUsageSummary {
                selection_accuracy: round_to(report.tool_selection_accuracy(), 4),
                avg_precision: round_to(report.avg_tool_precision(), 3),
                avg_recall: round_to(report.avg_tool_recall(), 3),
            },
            response_quality: ResponseQualitySummary {
                avg_keyword_coverage: round_to(report.avg_keyword_coverage(), 4),
            },
            latency: LatencySummary {
                avg_ms: round_to(report.avg_latency_ms(), 1),
                p50_ms: round_to(report.latency_percentile_ms(0.50), 1),
                p95_ms: round_to(report.latency_percentile_ms(0.95), 1),
                p99_ms: round_to(report.latency_percentile_ms(0.99), 1),
            },
        }
    }
}

/// Expected vs. actual pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comparison<T> {
    /// What the case expected.
    pub expected: T,
    /// What the pipeline did.
    pub actual: T,
}

/// A failing or partial case with enough detail to diagnose it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureEntry {
    /// Case id.
    pub case_id: String,
    /// Query text.
    pub query: String,
    /// Judgment.
    pub verdict: Verdict,
    /// Error, if the case errored.
    pub error: Option<String>,
    /// Expected vs. actual domain.
    pub routing: Option<Comparison<String>>,
    /// Expected vs. actual tools.
    pub tools: Option<Comparison<Vec<String>>>,
}

impl FailureEntry {
    fn from_case(result: &CaseResult) -> Self {
        Self {
            case_id: result.case_id.clone(),
            query: result.query.clone(),
            verdict: result.verdict,
            error: result.error.clone(),
            routing: result.routing.as_ref().map(|r| Comparison {
                expected: r.expected_domain.to_string(),
                actual: r.actual_domain.to_string(),
            }),
            tools: result.tool_usage.as_ref().map(|t| Comparison {
                expected: t.expected_tools.clone(),
                actual: t.actual_tools.clone(),
            }),
        }
    }
}

/// Outcome line for every case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultEntry {
    /// Case id.
    pub case_id: String,
    /// Judgment.
    pub verdict: Verdict,
    /// Error, if the case errored.
    pub error: Option<String>,
}

/// The persisted evaluation document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportDocument {
    /// Summary blocks.
    pub summary: Summary,
    /// Failing and partial cases.
    pub failures: Vec<FailureEntry>,
    /// Every case.
    pub all_results: Vec<ResultEntry>,
}

impl ReportDocument {
    /// Builds the document for a report.
    #[must_use]
    pub fn from_report(report: &EvaluationReport) -> Self {
        Self {
            summary: Summary::from_report(report),
            failures: report
                .failures()
                .into_iter()
                .map(FailureEntry::from_case)
                .collect(),
            all_results: report
                .results
                .iter()
                .map(|r| ResultEntry {
                    case_id: r.case_id.clone(),
                    verdict: r.verdict,
                    error: r.error.clone(),
                })
                .collect(),
        }
    }

    /// Pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::OutputFormat`] if serialization fails.
    pub fn to_json(&self) -> Result<String, CommandError> {
        serde_json::to_string_pretty(self).map_err(|e| CommandError::OutputFormat(e.to_string()))
    }

    /// Writes the JSON document to `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn write(&self, path: &Path) -> Result<(), Error> {
        let json = self.to_json()?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

/// Renders the human-readable report.
#[must_use]
pub fn render_text(report: &EvaluationReport) -> String {
    let summary = Summary::from_report(report);
    let rule = "=".repeat(RULE_WIDTH);
    let mut out = String::new();

    let _ = writeln!(out, "\n{rule}\n  EVALUATION REPORT\n{rule}");

    let ov = &summary.overview;
    let _ = writeln!(out, "\n  Total Cases:  {}", ov.total_cases);
    let _ = writeln!(out, "  Passed:       {}", ov.passed);
    let _ = writeln!(out, "  Partial:      {}", ov.partial);
    let _ = writeln!(out, "  Failed:       {}", ov.failed);
    let _ = writeln!(out, "  Errors:       {}", ov.errors);
    let _ = writeln!(out, "  Pass Rate:    {}", percent(ov.pass_rate));
    let _ = writeln!(out, "  Duration:     {:.2}s", ov.duration_s);

    let rt = &summary.routing;
    let _ = writeln!(out, "\n  Routing");
    let _ = writeln!(out, "    Accuracy:           {}", percent(rt.accuracy));
    let _ = writeln!(out, "    Multi-Agent Acc:    {}", percent(rt.multi_agent_accuracy));
    let _ = writeln!(out, "    Avg Confidence:     {:.3}", rt.avg_confidence);

    let tu = &summary.tool_usage;
    let _ = writeln!(out, "\n  Tool Usage");
    let _ = writeln!(out, "    Selection Acc:      {}", percent(tu.selection_accuracy));
    let _ = writeln!(out, "    Avg Precision:      {:.3}", tu.avg_precision);
    let _ = writeln!(out, "    Avg Recall:         {:.3}", tu.avg_recall);

    let _ = writeln!(out, "\n  Response Quality");
    let _ = writeln!(
        out,
        "    Keyword Coverage:   {}",
        percent(summary.response_quality.avg_keyword_coverage)
    );

    let lt = &summary.latency;
    let _ = writeln!(out, "\n  Latency");
    let _ = writeln!(out, "    Average:            {:.1}ms", lt.avg_ms);
    let _ = writeln!(out, "    P50:                {:.1}ms", lt.p50_ms);
    let _ = writeln!(out, "    P95:                {:.1}ms", lt.p95_ms);
    let _ = writeln!(out, "    P99:                {:.1}ms", lt.p99_ms);

    let failures = report.failures();
    if !failures.is_empty() {
        let _ = writeln!(out, "\n  Failed Cases ({}):", failures.len());
        for failure in failures {
            let _ = writeln!(
                out,
                "    [{}] {} {}",
                failure.case_id,
                failure.verdict,
                preview(&failure.query)
            );
            if let Some(error) = &failure.error {
                let _ = writeln!(out, "      Error: {error}");
            }
            if let Some(routing) = &failure.routing
                && !routing.correct
            {
                let _ = writeln!(
                    out,
                    "      Expected: {}, Got: {}",
                    routing.expected_domain, routing.actual_domain
                );
            }
            if let Some(tools) = &failure.tool_usage
                && !tools.tools_correct
            {
                let _ = writeln!(
                    out,
                    "      Tools expected: [{}], used: [{}]",
                    tools.expected_tools.join(", "),
                    tools.actual_tools.join(", ")
                );
            }
        }
    }

    let _ = writeln!(out, "\n{rule}");
    out
}

fn percent(ratio: f64) -> String {
    format!("{:.1}%", ratio * 100.0)
}

fn preview(query: &str) -> String {
    if query.chars().count() <= QUERY_PREVIEW_CHARS {
        return query.to_string();
    }
    let cut: String = query.chars().take(QUERY_PREVIEW_CHARS).collect();
    format!("{cut}...")
}

#[allow(clippy::cast_possible_truncation)]
fn round_to(value: f64, places: u32) -> f64 {
    let factor = 10f64.powi(places as i32);
    (value * factor).round() / factor
}
