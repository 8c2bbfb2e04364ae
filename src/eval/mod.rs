//! Evaluation harness.
//!
//! Replays labeled cases through a [`Pipeline`], scores routing, tool
//! selection, keyword coverage and latency per case, and reduces the
//! results into an [`EvaluationReport`].

pub mod dataset;
pub mod evaluator;
pub mod metrics;
pub mod report;

pub use dataset::{BUILTIN_DATASETS, Difficulty, EvalCase, EvalDataset, ExpectedDomain};
pub use evaluator::{Evaluator, Pipeline};
pub use metrics::{
    CaseResult, EvaluationReport, LatencyResult, ResponseQualityResult, RoutingResult,
    ToolUsageResult, Verdict, percentile,
};
pub use report::{ReportDocument, Summary, render_text};
