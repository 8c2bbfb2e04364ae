//! Output formatting for CLI commands.

use std::fmt::Write as _;

use serde::Serialize;

use crate::agent::{AgentInfo, OrchestrationResult, RoutingDecision};
use crate::error::CommandError;

/// How command results are rendered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable text.
    #[default]
    Text,
    /// Pretty-printed JSON.
    Json,
}

impl OutputFormat {
    /// Parses a format name, falling back to text.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Self::Json,
            _ => Self::Text,
        }
    }

    /// Serializes a value as pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::OutputFormat`] if serialization fails.
    pub fn to_json<T: Serialize>(self, value: &T) -> Result<String, CommandError> {
        serde_json::to_string_pretty(value)
            .map(|mut json| {
                json.push('\n');
                json
            })
            .map_err(|e| CommandError::OutputFormat(format!("JSON serialization failed: {e}")))
    }
}

/// Formats a routing decision.
#[must_use]
pub fn format_routing(decision: &RoutingDecision) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Primary:     {}", decision.primary);
    if !decision.secondary.is_empty() {
        let names: Vec<&str> = decision.secondary.iter().map(|d| d.as_str()).collect();
        let _ = writeln!(out, "Secondary:   {}", names.join(", "));
    }
    let _ = writeln!(out, "Confidence:  {:.2}", decision.confidence);
    let _ = writeln!(
        out,
        "Multi-agent: {}",
        if decision.requires_multi_agent { "yes" } else { "no" }
    );
    let _ = writeln!(out, "Reasoning:   {}", decision.reasoning);
    out
}

/// Formats the agent listing.
#[must_use]
pub fn format_agents(agents: &[AgentInfo]) -> String {
    let mut out = String::new();
    for (i, agent) in agents.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        let _ = writeln!(out, "{} ({})", agent.name, agent.domain);
        let _ = writeln!(out, "  {}", agent.description);
        for tool in &agent.tools {
            let _ = writeln!(out, "  - {tool}");
        }
    }
    out
}

/// Formats an orchestrated answer with its routing footer.
#[must_use]
pub fn format_answer(result: &OrchestrationResult) -> String {
    let mut out = result.answer.trim_end().to_string();
    let agents: Vec<&str> = result
        .metadata
        .agents_used
        .iter()
        .map(|d| d.as_str())
        .collect();
    let _ = write!(
        out,
        "\n\n---\nAgents: {} | Routing: {} ({:.2}) | Synthesized: {} | Time: {:.1}s\n",
        if agents.is_empty() {
            "none".to_string()
        } else {
            agents.join(", ")
        },
        result.routing.primary,
        result.routing.confidence,
        if result.metadata.synthesized { "yes" } else { "no" },
        result.elapsed.as_secs_f64()
    );
    for agent in result.agent_results.values() {
        if let Some(error) = &agent.metadata.error {
            let _ = writeln!(out, "Agent error ({}): {error}", agent.domain);
        } else if !agent.metadata.complete {
            let _ = writeln!(
                out,
                "Note: {} agent stopped after {} iterations without a final answer",
                agent.domain, agent.metadata.iterations
            );
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{Domain, Router};

    #[test]
    fn test_parse_format() {
        assert_eq!(OutputFormat::parse("JSON"), OutputFormat::Json);
        assert_eq!(OutputFormat::parse("text"), OutputFormat::Text);
        assert_eq!(OutputFormat::parse("yaml"), OutputFormat::Text);
    }

    #[test]
    fn test_format_routing() {
        let decision = Router::new()
            .route("What are the legal and financial implications of a healthcare data breach?");
        let text = format_routing(&decision);
        assert!(text.starts_with("Primary:     finance\n"));
        assert!(text.contains("Secondary:   legal, healthcare"));
        assert!(text.contains("Multi-agent: yes"));
    }

    #[test]
    fn test_format_agents() {
        let agents = vec![AgentInfo {
            domain: Domain::Legal,
            name: "LegalAgent".to_string(),
            description: "Contracts".to_string(),
            tools: vec!["analyze_nda".to_string()],
        }];
        assert_eq!(
            format_agents(&agents),
            "LegalAgent (legal)\n  Contracts\n  - analyze_nda\n"
        );
    }

    #[test]
    fn test_to_json() {
        let json = OutputFormat::Json
            .to_json(&Router::new().route("stock"))
            .unwrap_or_else(|_| unreachable!());
        assert!(json.contains("\"primary\": \"finance\""));
        assert!(json.ends_with('\n'));
    }
}
