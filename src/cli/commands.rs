//! CLI command implementations.
//!
//! Contains the business logic for each CLI command. Commands return their
//! rendered output; async work runs on a tokio runtime created per command.

use std::io::{self, Write as IoWrite};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use serde_json::json;
use tracing::info;

use crate::agent::domains::all_agents;
use crate::agent::knowledge::SEARCH_TOOL_NAME;
use crate::agent::{AgentConfig, AgentInfo, Domain, Orchestrator, Router, create_backend};
use crate::cli::output::{OutputFormat, format_agents, format_answer, format_routing};
use crate::cli::parser::{Cli, Commands};
use crate::error::{CommandError, Result};
use crate::eval::{EvalDataset, Evaluator, ReportDocument, render_text};

// ==================== Parameter Structs ====================

/// Parameters for the eval command.
#[derive(Debug, Clone, Default)]
pub struct EvalParams<'a> {
    /// Built-in dataset name.
    pub dataset: &'a str,
    /// JSON dataset file, overriding `dataset`.
    pub dataset_file: Option<&'a Path>,
    /// Skip agent execution.
    pub routing_only: bool,
    /// JSON report destination.
    pub output: Option<&'a Path>,
    /// Concurrency override.
    pub concurrency: Option<usize>,
    /// Per-case timeout override in seconds.
    pub timeout_secs: Option<f64>,
    /// Expected-domain filter.
    pub domain: Option<&'a str>,
    /// Difficulty filter.
    pub difficulty: Option<&'a str>,
}

/// Executes the CLI command.
///
/// # Arguments
///
/// * `cli` - Parsed CLI arguments.
///
/// # Returns
///
/// Result with output string on success.
///
/// # Errors
///
/// Returns an error if the command cannot start or a generation call it
/// depends on fails. Failing evaluation cases are not errors.
pub fn execute(cli: &Cli) -> Result<String> {
    let format = OutputFormat::parse(&cli.format);

    match &cli.command {
        Commands::Eval {
            dataset,
            dataset_file,
            routing_only,
            output,
            concurrency,
            timeout,
            domain,
            difficulty,
        } => {
            let params = EvalParams {
                dataset,
                dataset_file: dataset_file.as_deref(),
                routing_only: *routing_only,
                output: output.as_deref(),
                concurrency: *concurrency,
                timeout_secs: *timeout,
                domain: domain.as_deref(),
                difficulty: difficulty.as_deref(),
            };
            cmd_eval(&params, format)
        }
        Commands::Ask {
            query,
            agents,
            stream,
        } => cmd_ask(query, agents, *stream, format),
        Commands::Route { query } => cmd_route(query, format),
        Commands::Agents => cmd_agents(format),
    }
}

// ==================== Eval Command ====================

fn cmd_eval(params: &EvalParams<'_>, format: OutputFormat) -> Result<String> {
    let dataset = select_dataset(params)?;
    info!(dataset = %dataset.name, cases = dataset.len(), "loaded dataset");

    let rt = runtime()?;
    let report = if params.routing_only {
        let evaluator = Evaluator::new(Arc::new(Router::new()));
        rt.block_on(evaluator.evaluate_routing_only(&dataset.cases))
    } else {
        let mut builder = AgentConfig::builder();
        if let Some(n) = params.concurrency {
            builder = builder.eval_concurrency(n);
        }
        if let Some(secs) = params.timeout_secs {
            builder = builder.case_timeout(timeout_from_secs(secs)?);
        }
        let config = builder.from_env().build()?;
        let backend = create_backend(&config)?;
        let concurrency = config.eval_concurrency;
        let timeout = config.case_timeout;
        let evaluator = Evaluator::new(Arc::new(Orchestrator::new(&backend, config)));
        rt.block_on(evaluator.evaluate(&dataset.cases, concurrency, timeout))
    };

    let document = ReportDocument::from_report(&report);
    if let Some(path) = params.output {
        document.write(path)?;
        info!(path = %path.display(), "report written");
    }

    match format {
        OutputFormat::Text => {
            let mut output = format!(
                "Running evaluation: {} ({} cases){}\n",
                dataset.name,
                dataset.len(),
                if params.routing_only {
                    " [routing only]"
                } else {
                    ""
                }
            );
            output.push_str(&render_text(&report));
            if let Some(path) = params.output {
                output.push_str(&format!("\nResults written to {}\n", path.display()));
            }
            Ok(output)
        }
        OutputFormat::Json => Ok(format.to_json(&document)?),
    }
}

fn select_dataset(params: &EvalParams<'_>) -> Result<EvalDataset> {
    let mut dataset = match params.dataset_file {
        Some(path) => EvalDataset::load(path)?,
        None => EvalDataset::builtin(params.dataset)?,
    };
    if let Some(domain) = params.domain {
        dataset = dataset.filter_by_domain(domain.parse()?);
    }
    if let Some(difficulty) = params.difficulty {
        dataset = dataset.filter_by_difficulty(difficulty.parse()?);
    }
    Ok(dataset)
}

fn timeout_from_secs(secs: f64) -> Result<Duration> {
    if secs <= 0.0 {
        return Err(CommandError::ExecutionFailed(format!(
            "--timeout must be positive, got {secs}"
        ))
        .into());
    }
    Duration::try_from_secs_f64(secs)
        .map_err(|e| CommandError::ExecutionFailed(format!("invalid --timeout {secs}: {e}")).into())
}

// ==================== Ask Command ====================

fn cmd_ask(query: &str, agents: &[String], stream: bool, format: OutputFormat) -> Result<String> {
    let forced = agents
        .iter()
        .map(|a| a.parse::<Domain>())
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| CommandError::ExecutionFailed(e.to_string()))?;

    let config = AgentConfig::from_env()?;
    let backend = create_backend(&config)?;
    let orchestrator = Orchestrator::new(&backend, config);
    let rt = runtime()?;

    if stream {
        return rt.block_on(stream_answer(&orchestrator, query, format));
    }

    let forced = (!forced.is_empty()).then_some(forced.as_slice());
    let result = rt
        .block_on(orchestrator.run(query, &[], forced))
        .map_err(|e| CommandError::ExecutionFailed(format!("Query failed: {e}")))?;

    match format {
        OutputFormat::Text => Ok(format_answer(&result)),
        OutputFormat::Json => Ok(format.to_json(&result)?),
    }
}

/// Streams text chunks to stdout as they arrive. Chunks already written
/// stay written if the stream fails part way.
async fn stream_answer(
    orchestrator: &Orchestrator,
    query: &str,
    format: OutputFormat,
) -> Result<String> {
    let (routing, mut chunks) = orchestrator
        .stream_direct(query)
        .await
        .map_err(|e| CommandError::ExecutionFailed(format!("Stream failed: {e}")))?;

    let mut answer = String::new();
    let mut stdout = io::stdout();
    while let Some(chunk) = chunks.next().await {
        let chunk =
            chunk.map_err(|e| CommandError::ExecutionFailed(format!("Stream failed: {e}")))?;
        if format == OutputFormat::Text {
            stdout.write_all(chunk.as_bytes())?;
            stdout.flush()?;
        }
        answer.push_str(&chunk);
    }

    match format {
        OutputFormat::Text => Ok(format!(
            "\n\n---\nRouting: {} ({:.2})\n",
            routing.primary, routing.confidence
        )),
        OutputFormat::Json => Ok(format.to_json(&json!({
            "answer": answer,
            "routing": routing,
        }))?),
    }
}

// ==================== Route / Agents Commands ====================

fn cmd_route(query: &str, format: OutputFormat) -> Result<String> {
    let decision = Router::new().route(query);
    match format {
        OutputFormat::Text => Ok(format_routing(&decision)),
        OutputFormat::Json => Ok(format.to_json(&decision)?),
    }
}

fn cmd_agents(format: OutputFormat) -> Result<String> {
    let agents: Vec<AgentInfo> = all_agents()
        .iter()
        .map(|agent| {
            let mut tools: Vec<String> = agent
                .tools()
                .iter()
                .map(|t| t.name().to_string())
                .collect();
            tools.push(SEARCH_TOOL_NAME.to_string());
            tools.sort();
            AgentInfo {
                domain: agent.domain(),
                name: agent.name().to_string(),
                description: agent.description().to_string(),
                tools,
            }
        })
        .collect();

    match format {
        OutputFormat::Text => Ok(format_agents(&agents)),
        OutputFormat::Json => Ok(format.to_json(&agents)?),
    }
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new().map_err(|e| {
        CommandError::ExecutionFailed(format!("Failed to create async runtime: {e}")).into()
    })
}
