//! Keyword router.
//!
//! Scores a query against each domain's keyword table by counting
//! case-insensitive substring matches. The highest score picks the primary
//! domain; on equal scores the domain listed first in the table wins
//! (finance, then legal, then healthcare). Queries that match nothing go
//! to [`Domain::General`] with confidence 0.5.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::domain::Domain;

/// Confidence reported when no keyword matches.
pub const FALLBACK_CONFIDENCE: f64 = 0.5;

/// Upper bound on keyword-derived confidence.
pub const MAX_CONFIDENCE: f64 = 0.95;

/// Finance keyword table.
pub const FINANCE_KEYWORDS: &[&str] = &[
    "stock",
    "portfolio",
    "investment",
    "market",
    "trading",
    "financial",
    "earnings",
    "revenue",
    "profit",
    "loss",
    "SEC",
    "10-K",
    "10-Q",
    "valuation",
    "DCF",
    "P/E",
    "ROI",
    "risk",
    "hedge",
    "derivative",
    "bond",
    "equity",
    "dividend",
    "IPO",
    "M&A",
    "balance sheet",
];

/// Legal keyword table.
pub const LEGAL_KEYWORDS: &[&str] = &[
    "contract",
    "agreement",
    "clause",
    "legal",
    "compliance",
    "GDPR",
    "HIPAA",
    "liability",
    "indemnification",
    "NDA",
    "confidential",
    "intellectual property",
    "IP",
    "trademark",
    "patent",
    "lawsuit",
    "litigation",
    "regulatory",
    "terms of service",
    "privacy policy",
];

/// Healthcare keyword table.
pub const HEALTHCARE_KEYWORDS: &[&str] = &[
    "patient",
    "clinical",
    "medical",
    "diagnosis",
    "treatment",
    "medication",
    "drug",
    "prescription",
    "ICD",
    "CPT",
    "health",
    "disease",
    "symptom",
    "vital",
    "lab",
    "radiology",
    "surgery",
    "hospital",
    "physician",
    "nurse",
    "HIPAA",
    "PHI",
    "EHR",
];

/// Which agent(s) should handle a query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingDecision {
    /// Domain that leads the answer.
    pub primary: Domain,
    /// Other domains with at least one keyword match, in table order.
    pub secondary: Vec<Domain>,
    /// Confidence in `[0, 1]`.
    pub confidence: f64,
    /// Human-readable justification.
    pub reasoning: String,
    /// Whether several agents should run and be synthesized.
    pub requires_multi_agent: bool,
}

impl RoutingDecision {
    /// Decision for an explicit list of agents. Duplicates are dropped;
    /// an empty list routes to [`Domain::General`].
    #[must_use]
    pub fn forced(domains: &[Domain]) -> Self {
        let mut ordered: Vec<Domain> = Vec::with_capacity(domains.len());
        for d in domains {
            if !ordered.contains(d) {
                ordered.push(*d);
            }
        }
        let primary = ordered.first().copied().unwrap_or(Domain::General);
        let secondary: Vec<Domain> = ordered.into_iter().skip(1).collect();
        Self {
            primary,
            requires_multi_agent: !secondary.is_empty(),
            secondary,
            confidence: 1.0,
            reasoning: "Agents forced by user".to_string(),
        }
    }

    /// Primary followed by secondaries, without duplicates.
    #[must_use]
    pub fn all_domains(&self) -> Vec<Domain> {
        let mut all = vec![self.primary];
        for d in &self.secondary {
            if !all.contains(d) {
                all.push(*d);
            }
        }
        all
    }
}

/// Confidence for a maximum keyword score.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn confidence_for(max_score: usize) -> f64 {
    if max_score == 0 {
        return FALLBACK_CONFIDENCE;
    }
    0.1f64
        .mul_add(max_score as f64, FALLBACK_CONFIDENCE)
        .min(MAX_CONFIDENCE)
}

/// Keyword-table router. Pure: routing depends only on the tables.
#[derive(Debug, Clone)]
pub struct Router {
    tables: Vec<(Domain, Vec<String>)>,
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl Router {
    /// Router over the built-in keyword tables.
    #[must_use]
    pub fn new() -> Self {
        Self::with_tables(vec![
            (Domain::Finance, to_owned(FINANCE_KEYWORDS)),
            (Domain::Legal, to_owned(LEGAL_KEYWORDS)),
            (Domain::Healthcare, to_owned(HEALTHCARE_KEYWORDS)),
        ])
    }

    /// Router over custom tables. Table order is the tie-break order.
    #[must_use]
    pub fn with_tables(tables: Vec<(Domain, Vec<String>)>) -> Self {
        let tables = tables
            .into_iter()
            .filter(|(d, _)| *d != Domain::General)
            .map(|(d, kws)| (d, kws.into_iter().map(|k| k.to_lowercase()).collect()))
            .collect();
        Self { tables }
    }

    /// Keyword match count per domain, in table order.
    #[must_use]
    pub fn scores(&self, query: &str) -> Vec<(Domain, usize)> {
        let lower = query.to_lowercase();
        self.tables
            .iter()
            .map(|(domain, keywords)| {
                let score = keywords.iter().filter(|k| lower.contains(k.as_str())).count();
                (*domain, score)
            })
            .collect()
    }

    /// Routes a query.
    #[must_use]
    pub fn route(&self, query: &str) -> RoutingDecision {
        let scores = self.scores(query);

        let mut best: Option<(Domain, usize)> = None;
        for &(domain, score) in &scores {
            if score > 0 && best.is_none_or(|(_, b)| score > b) {
                best = Some((domain, score));
            }
        }
        let (primary, max_score) = best.unwrap_or((Domain::General, 0));

        let mut secondary = Vec::new();
        let mut requires_multi_agent = false;
        for &(domain, score) in &scores {
            if domain != primary && score > 0 {
                secondary.push(domain);
                if score * 2 >= max_score {
                    requires_multi_agent = true;
                }
            }
        }

        let mut reasoning = format!("Detected {max_score} keyword matches for {primary} domain.");
        if !secondary.is_empty() {
            let names: Vec<&str> = secondary.iter().map(|d| d.as_str()).collect();
            let _ = write!(reasoning, " Also found relevance to: {}", names.join(", "));
        }

        let decision = RoutingDecision {
            primary,
            secondary,
            confidence: confidence_for(max_score),
            reasoning,
            requires_multi_agent,
        };
        debug!(
            primary = %decision.primary,
            secondary = ?decision.secondary,
            confidence = decision.confidence,
            multi = decision.requires_multi_agent,
            "routed query"
        );
        decision
    }
}

fn to_owned(keywords: &[&str]) -> Vec<String> {
    keywords.iter().map(ToString::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_single_domain_query() {
        let decision = Router::new().route("What is the current P/E ratio for AAPL?");
        assert_eq!(decision.primary, Domain::Finance);
        assert!(decision.confidence > 0.5);
        assert!(!decision.requires_multi_agent);
    }

    #[test]
    fn test_cross_domain_query() {
        let decision = Router::new()
            .route("What are the legal and financial implications of a healthcare data breach?");
        assert!(decision.requires_multi_agent);
        let all = decision.all_domains();
        for d in Domain::AGENTS {
            assert!(all.contains(&d), "{d} missing from {all:?}");
        }
    }

    #[test]
    fn test_tie_goes_to_first_table() {
        let decision = Router::new().route("legal and financial");
        assert_eq!(decision.primary, Domain::Finance);
        assert_eq!(decision.secondary, vec![Domain::Legal]);
    }

    #[test]
    fn test_no_match_falls_back_to_general() {
        let decision = Router::new().route("Tell me a joke about cats");
        assert_eq!(decision.primary, Domain::General);
        assert!((decision.confidence - 0.5).abs() < f64::EPSILON);
        assert!(decision.secondary.is_empty());
        assert!(!decision.requires_multi_agent);
    }

    #[test]
    fn test_weak_secondary_is_not_multi() {
        let decision = Router::new().route("stock portfolio investment trading contract");
        assert_eq!(decision.primary, Domain::Finance);
        assert_eq!(decision.secondary, vec![Domain::Legal]);
        assert!(!decision.requires_multi_agent);
    }

    #[test]
    fn test_confidence_cap() {
        assert!((confidence_for(1) - 0.6).abs() < 1e-9);
        assert!((confidence_for(4) - 0.9).abs() < 1e-9);
        assert!((confidence_for(20) - MAX_CONFIDENCE).abs() < f64::EPSILON);
    }

    #[test]
    fn test_forced_decision() {
        let decision = RoutingDecision::forced(&[Domain::Legal, Domain::Legal, Domain::Finance]);
        assert_eq!(decision.primary, Domain::Legal);
        assert_eq!(decision.secondary, vec![Domain::Finance]);
        assert!(decision.requires_multi_agent);
        assert!((decision.confidence - 1.0).abs() < f64::EPSILON);
        assert!(!RoutingDecision::forced(&[Domain::Healthcare]).requires_multi_agent);
    }

    fn vocabulary() -> Vec<&'static str> {
        FINANCE_KEYWORDS
            .iter()
            .chain(LEGAL_KEYWORDS)
            .chain(HEALTHCARE_KEYWORDS)
            .copied()
            .chain(["the", "of", "and", "what", "cat", "blue"])
            .collect()
    }

    proptest! {
        #[test]
        fn prop_primary_never_secondary(words in prop::collection::vec(prop::sample::select(vocabulary()), 0..12)) {
            let decision = Router::new().route(&words.join(" "));
            prop_assert!(!decision.secondary.contains(&decision.primary));
            prop_assert!(decision.confidence >= FALLBACK_CONFIDENCE);
            prop_assert!(decision.confidence <= MAX_CONFIDENCE);
        }

        #[test]
        fn prop_no_keywords_routes_general(query in "[0-9 .,?]{0,60}") {
            let decision = Router::new().route(&query);
            prop_assert_eq!(decision.primary, Domain::General);
            prop_assert!((decision.confidence - FALLBACK_CONFIDENCE).abs() < f64::EPSILON);
        }

        #[test]
        fn prop_confidence_monotonic(a in 0usize..50, b in 0usize..50) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(confidence_for(lo) <= confidence_for(hi));
            prop_assert!(confidence_for(hi) <= MAX_CONFIDENCE);
        }

        #[test]
        fn prop_route_is_deterministic(words in prop::collection::vec(prop::sample::select(vocabulary()), 0..8)) {
            let query = words.join(" ");
            let router = Router::new();
            prop_assert_eq!(router.route(&query), router.route(&query));
        }
    }
}
