//! Domain agent variants.
//!
//! Each variant supplies a system prompt and a set of deterministic report
//! tools. Report figures are derived from a seeded generator so the same
//! input always yields the same text.

pub mod finance;
pub mod healthcare;
pub mod legal;

use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::Arc;

use rand::SeedableRng;
use rand::rngs::StdRng;

pub use finance::FinanceAgent;
pub use healthcare::HealthcareAgent;
pub use legal::LegalAgent;

use super::domain::{Domain, DomainAgent};

/// Returns the agent for a domain, or `None` for [`Domain::General`].
#[must_use]
pub fn agent_for(domain: Domain) -> Option<Arc<dyn DomainAgent>> {
    match domain {
        Domain::Finance => Some(Arc::new(FinanceAgent)),
        Domain::Legal => Some(Arc::new(LegalAgent)),
        Domain::Healthcare => Some(Arc::new(HealthcareAgent)),
        Domain::General => None,
    }
}

/// All domain agents in routing order.
#[must_use]
pub fn all_agents() -> Vec<Arc<dyn DomainAgent>> {
    Domain::AGENTS.into_iter().filter_map(agent_for).collect()
}

/// Generator for simulated report figures, seeded from the input text.
pub(crate) fn seeded_rng(seed: &str) -> StdRng {
    let mut hasher = DefaultHasher::new();
    seed.hash(&mut hasher);
    StdRng::seed_from_u64(hasher.finish())
}

/// First `max` characters of `text`, with an ellipsis when cut.
pub(crate) fn excerpt(text: &str, max: usize) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(max).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}

/// Case-insensitive substring check.
pub(crate) fn mentions(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Case-insensitive check for any of `needles` in `haystack`.
pub(crate) fn mentions_any(haystack: &str, needles: &[&str]) -> bool {
    let lower = haystack.to_lowercase();
    needles.iter().any(|n| lower.contains(&n.to_lowercase()))
}
