//! System prompts and template builders for agents.
//!
//! The step prompt pairs a domain agent's system prompt with its tool
//! catalog and the three-field response contract. Template builders format
//! the running transcript, direct answers and multi-agent synthesis.

use std::fmt::Write;

use super::domain::Domain;
use super::knowledge::Document;
use super::tool::ToolDefinition;

/// System prompt for queries answered without a domain agent.
pub const GENERAL_SYSTEM_PROMPT: &str =
    "You are a helpful AI assistant. Provide clear, accurate responses.";

/// Output contract appended to every domain agent's system prompt.
pub const RESPONSE_FORMAT: &str = r#"## Response Format
You must respond in this exact format:

THOUGHT: [Your reasoning about what to do next]
ACTION: [Tool name to use, or "FINAL_ANSWER" if you have enough information]
ACTION_INPUT: [JSON parameters for the tool, or your final answer if ACTION is FINAL_ANSWER]

Always start with THOUGHT, then ACTION, then ACTION_INPUT."#;

/// Closing line of every step prompt.
pub const NEXT_STEP_CUE: &str = "What is your next step?";

/// Observation recorded when a step names no action.
pub const MISSING_ACTION_OBSERVATION: &str = "No ACTION was given. Respond with THOUGHT, ACTION and ACTION_INPUT, using FINAL_ANSWER as the action when you are done.";

/// Closing instructions of the synthesis prompt.
const SYNTHESIS_INSTRUCTIONS: &str = "Please synthesize these responses into a coherent, unified answer that:
1. Combines insights from all relevant agents
2. Highlights cross-domain considerations
3. Notes any conflicts or complementary information
4. Provides a clear, actionable summary
";

/// Builds the system prompt for a domain agent's reasoning steps.
#[must_use]
pub fn build_agent_system_prompt(agent_prompt: &str, tools: &[ToolDefinition]) -> String {
    format!(
        "{agent_prompt}\n\n## Available Tools\n{}\n\n{RESPONSE_FORMAT}\n",
        build_tool_catalog(tools)
    )
}

/// Renders the tool catalog: name, description and parameter schema.
#[must_use]
pub fn build_tool_catalog(tools: &[ToolDefinition]) -> String {
    let mut catalog = String::new();
    for (i, tool) in tools.iter().enumerate() {
        if i > 0 {
            catalog.push_str("\n\n");
        }
        let params =
            serde_json::to_string_pretty(&tool.parameters).unwrap_or_else(|_| "{}".to_string());
        let _ = write!(
            catalog,
            "**{}**: {}\nParameters: {params}",
            tool.name, tool.description
        );
    }
    catalog
}

/// Opening transcript for a run: the query plus any supplied documents.
#[must_use]
pub fn build_initial_transcript(query: &str, context: &[Document]) -> String {
    let mut transcript = format!("User Query: {query}\n\n");
    if !context.is_empty() {
        transcript.push_str("Context Documents:\n");
        transcript.push_str(&format_documents(context));
        transcript.push_str("\n\n");
    }
    transcript
}

/// Appends one completed step to the transcript.
pub fn append_step(
    transcript: &mut String,
    thought: &str,
    action: &str,
    action_input: &str,
    observation: &str,
) {
    let _ = write!(
        transcript,
        "\nTHOUGHT: {thought}\nACTION: {action}\nACTION_INPUT: {action_input}\nOBSERVATION: {observation}\n\n"
    );
}

/// Builds the user message for the next reasoning step.
#[must_use]
pub fn build_step_prompt(transcript: &str) -> String {
    format!("{transcript}{NEXT_STEP_CUE}")
}

/// Builds the user message for a direct (general domain) answer.
#[must_use]
pub fn build_direct_prompt(query: &str, context: &[Document]) -> String {
    if context.is_empty() {
        return query.to_string();
    }
    format!(
        "Context Documents:\n{}\n\nQuestion: {query}",
        format_documents(context)
    )
}

/// Builds the synthesis request over labeled agent answers.
#[must_use]
pub fn build_synthesis_prompt(query: &str, answers: &[(Domain, &str)]) -> String {
    let mut prompt = String::from(
        "You are synthesizing responses from multiple specialized AI agents.\n\n",
    );
    let _ = write!(prompt, "Original Query: {query}\n\n");
    for (domain, answer) in answers {
        let _ = write!(
            prompt,
            "=== {} AGENT RESPONSE ===\n{answer}\n\n",
            domain.label()
        );
    }
    prompt.push('\n');
    prompt.push_str(SYNTHESIS_INSTRUCTIONS);
    prompt
}

fn format_documents(documents: &[Document]) -> String {
    let mut out = String::new();
    for (i, doc) in documents.iter().enumerate() {
        if i > 0 {
            out.push_str("\n\n");
        }
        let _ = write!(out, "[{}] ({})\n{}", i + 1, doc.id, doc.content);
    }
    out
}
