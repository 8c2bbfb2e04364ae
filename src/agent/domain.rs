//! Domain identifiers and the domain-agent capability interface.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::tool::Tool;

/// A knowledge domain a query can be routed to.
///
/// Ordering (`Finance < Legal < Healthcare < General`) is the stable order
/// used for routing tie-breaks and for keyed result maps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    /// Portfolio, filings, valuation.
    Finance,
    /// Contracts, compliance, litigation.
    Legal,
    /// Clinical documentation, coding, medications.
    Healthcare,
    /// Fallback when no domain keyword matches; answered directly.
    General,
}

impl Domain {
    /// Domains that have a dedicated agent, in routing order.
    pub const AGENTS: [Self; 3] = [Self::Finance, Self::Legal, Self::Healthcare];

    /// Lowercase identifier.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Finance => "finance",
            Self::Legal => "legal",
            Self::Healthcare => "healthcare",
            Self::General => "general",
        }
    }

    /// Uppercase label used in synthesis prompts.
    #[must_use]
    pub fn label(self) -> String {
        self.as_str().to_ascii_uppercase()
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when text does not name a domain.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown domain '{0}' (expected finance, legal, healthcare or general)")]
pub struct ParseDomainError(pub String);

impl FromStr for Domain {
    type Err = ParseDomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "finance" => Ok(Self::Finance),
            "legal" => Ok(Self::Legal),
            "healthcare" => Ok(Self::Healthcare),
            "general" => Ok(Self::General),
            other => Err(ParseDomainError(other.to_string())),
        }
    }
}

/// Capability interface implemented by each domain variant.
///
/// The reasoning loop is generic over this: it reads the prompt and tool
/// catalog from the agent and never needs to know which domain it runs.
pub trait DomainAgent: Send + Sync {
    /// Domain served.
    fn domain(&self) -> Domain;

    /// Display name (e.g., `"FinanceAgent"`).
    fn name(&self) -> &str;

    /// One-line description.
    fn description(&self) -> &str;

    /// System prompt describing expertise and guidelines.
    fn system_prompt(&self) -> &str;

    /// Domain-specific tools.
    fn tools(&self) -> Vec<Arc<dyn Tool>>;
}

/// Summary of an available agent, for listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentInfo {
    /// Domain served.
    pub domain: Domain,
    /// Display name.
    pub name: String,
    /// One-line description.
    pub description: String,
    /// Registered tool names.
    pub tools: Vec<String>,
}
