//! Extraction of the labeled fields a reasoning step is expected to emit.
//!
//! A step response carries up to three fields, each introduced by a label
//! at the start of a line followed by a colon:
//!
//! ```text
//! THOUGHT: <reasoning>
//! ACTION: <tool name | FINAL_ANSWER>
//! ACTION_INPUT: <JSON arguments | answer text>
//! ```
//!
//! Labels match case-insensitively, may carry markdown decoration before
//! them, and may be separated from the colon by blanks. A field runs until
//! the next label or the end of the text. When a label appears more than
//! once the last occurrence wins, except that once the action is the
//! final-answer sentinel everything after its `ACTION_INPUT` is the
//! answer. Missing fields come back as `None`; extraction never fails.

use std::sync::LazyLock;

use regex::Regex;

/// Sentinel action that ends a reasoning run.
pub const FINAL_ANSWER: &str = "FINAL_ANSWER";

/// Alternation lists `ACTION_INPUT` before `ACTION` so the longer name wins.
static LABEL_PATTERN: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(?mi)^[^\w\n]*(ACTION_INPUT|OBSERVATION|THOUGHT|ACTION)[ \t]*:").ok()
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Label {
    Thought,
    Action,
    ActionInput,
    Observation,
}

impl Label {
    fn from_name(name: &str) -> Self {
        match name.to_ascii_uppercase().as_str() {
            "ACTION_INPUT" => Self::ActionInput,
            "OBSERVATION" => Self::Observation,
            "THOUGHT" => Self::Thought,
            _ => Self::Action,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Marker {
    label: Label,
    start: usize,
    body_start: usize,
}

/// Fields extracted from one step response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedStep {
    /// Reasoning statement.
    pub thought: Option<String>,
    /// Chosen action, normalized (wrapping quotes and brackets removed).
    pub action: Option<String>,
    /// Raw action input text.
    pub action_input: Option<String>,
}

impl ParsedStep {
    /// Returns `true` if the chosen action is the final-answer sentinel.
    #[must_use]
    pub fn is_final_answer(&self) -> bool {
        self.action.as_deref().is_some_and(is_final_answer)
    }
}

/// Parses a step response into its labeled fields.
#[must_use]
pub fn parse_step(text: &str) -> ParsedStep {
    let markers = find_markers(text);
    let mut step = ParsedStep::default();

    for (i, marker) in markers.iter().enumerate() {
        let next = markers.get(i + 1);
        let end = next.map_or(text.len(), |m| m.start);
        match marker.label {
            Label::Thought => {
                step.thought = clean(&text[marker.body_start..end], next.is_some());
            }
            Label::Action => {
                step.action = clean(&text[marker.body_start..end], next.is_some())
                    .map(|a| normalize_action(&a))
                    .filter(|a| !a.is_empty());
            }
            Label::ActionInput if step.is_final_answer() => {
                step.action_input = clean(&text[marker.body_start..], false);
                break;
            }
            Label::ActionInput => {
                step.action_input = clean(&text[marker.body_start..end], next.is_some());
            }
            Label::Observation => {}
        }
    }

    step
}

/// Returns `true` if `action` names the final-answer sentinel.
///
/// Accepts case, blank and dash variants (`final answer`, `Final-Answer`).
#[must_use]
pub fn is_final_answer(action: &str) -> bool {
    let canonical: String = normalize_action(action)
        .chars()
        .map(|c| match c {
            ' ' | '-' => '_',
            other => other.to_ascii_uppercase(),
        })
        .collect();
    canonical == FINAL_ANSWER
}

/// Strips decoration models tend to put around a tool name.
#[must_use]
pub fn normalize_action(action: &str) -> String {
    action
        .trim()
        .trim_matches(|c: char| matches!(c, '`' | '[' | ']' | '"' | '\'' | '*'))
        .trim()
        .to_string()
}

fn find_markers(text: &str) -> Vec<Marker> {
    let Some(pattern) = LABEL_PATTERN.as_ref() else {
        return Vec::new();
    };
    pattern
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let name = caps.get(1)?;
            Some(Marker {
                label: Label::from_name(name.as_str()),
                start: whole.start(),
                body_start: whole.end(),
            })
        })
        .collect()
}

/// Trims a field body, dropping bold markers glued to the labels.
fn clean(raw: &str, before_label: bool) -> Option<String> {
    let mut value = raw.trim().trim_start_matches('*').trim();
    if before_label {
        value = value.trim_end_matches('*').trim_end();
    }
    (!value.is_empty()).then(|| value.to_string())
}
