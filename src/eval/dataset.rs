//! Labeled evaluation cases and the built-in datasets.
//!
//! Four datasets ship with the crate: `routing` (15 cases), `tools` (7),
//! `quality` (3) and `full` (all 25). Datasets with the same JSON shape can
//! be loaded from disk.

use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::agent::Domain;
use crate::error::EvalError;

/// Names accepted by [`EvalDataset::builtin`].
pub const BUILTIN_DATASETS: [&str; 4] = ["routing", "tools", "quality", "full"];

/// Domain a case expects the router to pick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpectedDomain {
    /// Finance agent.
    Finance,
    /// Legal agent.
    Legal,
    /// Healthcare agent.
    Healthcare,
    /// Direct answer, no agent.
    General,
    /// Several agents; any listed secondary domain counts as correct.
    Multi,
}

impl ExpectedDomain {
    /// Lowercase identifier.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Finance => "finance",
            Self::Legal => "legal",
            Self::Healthcare => "healthcare",
            Self::General => "general",
            Self::Multi => "multi",
        }
    }

    /// The concrete domain, or `None` for [`ExpectedDomain::Multi`].
    #[must_use]
    pub const fn domain(self) -> Option<Domain> {
        match self {
            Self::Finance => Some(Domain::Finance),
            Self::Legal => Some(Domain::Legal),
            Self::Healthcare => Some(Domain::Healthcare),
            Self::General => Some(Domain::General),
            Self::Multi => None,
        }
    }
}

impl fmt::Display for ExpectedDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExpectedDomain {
    type Err = EvalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "finance" => Ok(Self::Finance),
            "legal" => Ok(Self::Legal),
            "healthcare" => Ok(Self::Healthcare),
            "general" => Ok(Self::General),
            "multi" => Ok(Self::Multi),
            other => Err(EvalError::DatasetLoad {
                message: format!("unknown expected domain '{other}'"),
            }),
        }
    }
}

/// Difficulty tag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    /// Clear domain signal.
    Easy,
    /// Default.
    #[default]
    Medium,
    /// Ambiguous or cross-domain.
    Hard,
}

impl Difficulty {
    /// Lowercase identifier.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Easy => "easy",
            Self::Medium => "medium",
            Self::Hard => "hard",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Difficulty {
    type Err = EvalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "easy" => Ok(Self::Easy),
            "medium" => Ok(Self::Medium),
            "hard" => Ok(Self::Hard),
            other => Err(EvalError::DatasetLoad {
                message: format!("unknown difficulty '{other}'"),
            }),
        }
    }
}

/// One labeled test case.
///
/// Empty `expected_tools` or `expected_keywords` mean "don't check".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvalCase {
    /// Unique id within a dataset.
    pub id: String,
    /// Query text.
    pub query: String,
    /// Domain the router should pick.
    pub expected_domain: ExpectedDomain,
    /// Tools the agents should invoke.
    #[serde(default)]
    pub expected_tools: Vec<String>,
    /// Keywords the answer should contain.
    #[serde(default)]
    pub expected_keywords: Vec<String>,
    /// Whether the decision should ask for several agents.
    #[serde(default)]
    pub requires_multi_agent: bool,
    /// Acceptable primaries when `expected_domain` is `multi`.
    #[serde(default)]
    pub secondary_domains: Vec<Domain>,
    /// Difficulty tag.
    #[serde(default)]
    pub difficulty: Difficulty,
    /// Free-form note.
    #[serde(default)]
    pub description: String,
}

impl EvalCase {
    /// Case with no tool, keyword or multi-agent expectations.
    #[must_use]
    pub fn new(id: &str, query: &str, expected_domain: ExpectedDomain) -> Self {
        Self {
            id: id.to_string(),
            query: query.to_string(),
            expected_domain,
            expected_tools: Vec::new(),
            expected_keywords: Vec::new(),
            requires_multi_agent: false,
            secondary_domains: Vec::new(),
            difficulty: Difficulty::default(),
            description: String::new(),
        }
    }

    /// Sets expected tools.
    #[must_use]
    pub fn tools(mut self, tools: &[&str]) -> Self {
        self.expected_tools = tools.iter().map(ToString::to_string).collect();
        self
    }

    /// Sets expected keywords.
    #[must_use]
    pub fn keywords(mut self, keywords: &[&str]) -> Self {
        self.expected_keywords = keywords.iter().map(ToString::to_string).collect();
        self
    }

    /// Expects a multi-agent decision whose primary is one of `domains`.
    #[must_use]
    pub fn multi(mut self, domains: &[Domain]) -> Self {
        self.requires_multi_agent = true;
        self.secondary_domains = domains.to_vec();
        self
    }

    /// Sets the difficulty tag.
    #[must_use]
    pub const fn difficulty(mut self, difficulty: Difficulty) -> Self {
        self.difficulty = difficulty;
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }
}

/// A named collection of cases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvalDataset {
    /// Dataset name.
    pub name: String,
    /// What the dataset exercises.
    #[serde(default)]
    pub description: String,
    /// Cases, in evaluation order.
    pub cases: Vec<EvalCase>,
}

impl EvalDataset {
    /// Looks up a built-in dataset by short name.
    ///
    /// # Errors
    ///
    /// Returns [`EvalError::UnknownDataset`] for names outside
    /// [`BUILTIN_DATASETS`].
    pub fn builtin(name: &str) -> Result<Self, EvalError> {
        match name {
            "routing" => Ok(routing_dataset()),
            "tools" => Ok(tool_usage_dataset()),
            "quality" => Ok(response_quality_dataset()),
            "full" => Ok(full_suite()),
            _ => Err(EvalError::UnknownDataset {
                name: name.to_string(),
            }),
        }
    }

    /// Parses a dataset from JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`EvalError::DatasetLoad`] if the JSON is malformed or two
    /// cases share an id.
    pub fn from_json(json: &str) -> Result<Self, EvalError> {
        let dataset: Self = serde_json::from_str(json).map_err(|e| EvalError::DatasetLoad {
            message: e.to_string(),
        })?;
        let mut seen = HashSet::new();
        for case in &dataset.cases {
            if !seen.insert(case.id.as_str()) {
                return Err(EvalError::DatasetLoad {
                    message: format!("duplicate case id '{}'", case.id),
                });
            }
        }
        Ok(dataset)
    }

    /// Loads a dataset from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`EvalError::DatasetLoad`] if the file cannot be read or
    /// parsed.
    pub fn load(path: &Path) -> Result<Self, EvalError> {
        let json = std::fs::read_to_string(path).map_err(|e| EvalError::DatasetLoad {
            message: format!("{}: {e}", path.display()),
        })?;
        Self::from_json(&json)
    }

    /// Cases expecting `domain`, as a new dataset named `{name}_{domain}`.
    #[must_use]
    pub fn filter_by_domain(&self, domain: ExpectedDomain) -> Self {
        Self {
            name: format!("{}_{domain}", self.name),
            description: format!("{} (filtered: {domain})", self.description),
            cases: self
                .cases
                .iter()
                .filter(|c| c.expected_domain == domain)
                .cloned()
                .collect(),
        }
    }

    /// Cases tagged `difficulty`, as a new dataset named `{name}_{difficulty}`.
    #[must_use]
    pub fn filter_by_difficulty(&self, difficulty: Difficulty) -> Self {
        Self {
            name: format!("{}_{difficulty}", self.name),
            description: format!("{} (filtered: {difficulty})", self.description),
            cases: self
                .cases
                .iter()
                .filter(|c| c.difficulty == difficulty)
                .cloned()
                .collect(),
        }
    }

    /// Number of cases.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cases.len()
    }

    /// Returns `true` if there are no cases.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }
}

/// Routing accuracy cases.
#[must_use]
pub fn routing_dataset() -> EvalDataset {
    use Difficulty::{Easy, Hard, Medium};
    use ExpectedDomain::{Finance, Healthcare, Legal, Multi};

    let cases = vec![
        EvalCase::new(
            "route_fin_01",
            "What is the current P/E ratio for AAPL and how does it compare to the sector average?",
            Finance,
        )
        .tools(&["analyze_financial_ratios"])
        .keywords(&["P/E", "ratio", "AAPL"])
        .difficulty(Easy)
        .description("Clear finance query with ticker symbol"),
        EvalCase::new(
            "route_fin_02",
            "Run a DCF valuation on Tesla with 10% discount rate and 3% terminal growth",
            Finance,
        )
        .tools(&["calculate_dcf_valuation"])
        .keywords(&["DCF", "valuation", "discount rate"])
        .difficulty(Easy),
        EvalCase::new(
            "route_fin_03",
            "Calculate VaR and Sharpe ratio for a portfolio with 40% AAPL, 30% MSFT, 30% GOOGL",
            Finance,
        )
        .tools(&["calculate_risk_metrics"])
        .keywords(&["VaR", "Sharpe", "portfolio"])
        .difficulty(Easy),
        EvalCase::new(
            "route_fin_04",
            "What were the key takeaways from the latest NVIDIA earnings call?",
            Finance,
        )
        .tools(&["analyze_earnings"])
        .keywords(&["earnings"])
        .difficulty(Medium),
        EvalCase::new(
            "route_leg_01",
            "Review this NDA and identify any non-standard clauses or risks",
            Legal,
        )
        .tools(&["analyze_nda"])
        .keywords(&["NDA", "clauses", "risks"])
        .difficulty(Easy),
        EvalCase::new(
            "route_leg_02",
            "Check if our data processing practices comply with GDPR and CCPA requirements",
            Legal,
        )
        .tools(&["check_compliance"])
        .keywords(&["GDPR", "CCPA", "compliance"])
        .difficulty(Easy),
        EvalCase::new(
            "route_leg_03",
            "Extract all termination clauses and liability caps from this vendor contract",
            Legal,
        )
        .tools(&["extract_contract_clauses"])
        .keywords(&["clauses", "contract", "liability"])
        .difficulty(Easy),
        EvalCase::new(
            "route_hc_01",
            "Parse this clinical note and extract diagnoses, medications, and procedures",
            Healthcare,
        )
        .tools(&["parse_clinical_note"])
        .keywords(&["clinical", "diagnoses", "medications"])
        .difficulty(Easy),
        EvalCase::new(
            "route_hc_02",
            "Check for drug interactions between metformin, lisinopril, and warfarin",
            Healthcare,
        )
        .tools(&["check_drug_interactions"])
        .keywords(&["drug interactions", "metformin"])
        .difficulty(Easy),
        EvalCase::new(
            "route_hc_03",
            "Suggest ICD-10 codes for a patient with type 2 diabetes and hypertension",
            Healthcare,
        )
        .tools(&["suggest_icd_codes"])
        .keywords(&["ICD-10", "diabetes"])
        .difficulty(Easy),
        EvalCase::new(
            "route_amb_01",
            "What are the risks involved in this situation?",
            Finance,
        )
        .keywords(&["risk"])
        .difficulty(Hard)
        .description("Ambiguous - 'risk' appears in all domains"),
        EvalCase::new(
            "route_amb_02",
            "Summarize the key points from this document",
            Legal,
        )
        .difficulty(Hard)
        .description("No clear domain signal"),
        EvalCase::new(
            "route_multi_01",
            "What are the legal and financial implications of a healthcare data breach?",
            Multi,
        )
        .multi(&[Domain::Legal, Domain::Finance, Domain::Healthcare])
        .keywords(&["legal", "financial", "healthcare"])
        .difficulty(Medium),
        EvalCase::new(
            "route_multi_02",
            "Review the compliance requirements and financial impact of HIPAA violations",
            Multi,
        )
        .multi(&[Domain::Legal, Domain::Finance])
        .keywords(&["compliance", "financial", "HIPAA"])
        .difficulty(Medium),
        EvalCase::new(
            "route_multi_03",
            "Analyze the contract terms for a pharmaceutical company acquisition including drug portfolio risks",
            Multi,
        )
        .multi(&[Domain::Legal, Domain::Finance, Domain::Healthcare])
        .keywords(&["contract", "acquisition", "pharmaceutical", "drug"])
        .difficulty(Hard),
    ];

    EvalDataset {
        name: "routing_accuracy".to_string(),
        description: "Tests whether the orchestrator routes queries to the correct agent"
            .to_string(),
        cases,
    }
}

/// Tool selection cases.
#[must_use]
pub fn tool_usage_dataset() -> EvalDataset {
    use Difficulty::{Easy, Medium};
    use ExpectedDomain::{Finance, Healthcare, Legal};

    let cases = vec![
        EvalCase::new(
            "tool_fin_01",
            "Calculate the risk metrics for my tech-heavy portfolio: 50% AAPL, 30% GOOGL, 20% MSFT",
            Finance,
        )
        .tools(&["calculate_risk_metrics"])
        .difficulty(Easy),
        EvalCase::new(
            "tool_fin_02",
            "What is Apple's P/E ratio and return on equity?",
            Finance,
        )
        .tools(&["analyze_financial_ratios"])
        .difficulty(Easy),
        EvalCase::new(
            "tool_fin_03",
            "I need a full valuation of Microsoft using DCF analysis with 8% WACC",
            Finance,
        )
        .tools(&["calculate_dcf_valuation"])
        .difficulty(Medium),
        EvalCase::new(
            "tool_leg_01",
            "Extract all indemnification and limitation of liability clauses from this agreement",
            Legal,
        )
        .tools(&["extract_contract_clauses"])
        .difficulty(Easy),
        EvalCase::new(
            "tool_leg_02",
            "Is our European customer data handling GDPR compliant?",
            Legal,
        )
        .tools(&["check_compliance"])
        .difficulty(Medium),
        EvalCase::new(
            "tool_hc_01",
            "Patient presents with chest pain, shortness of breath, and elevated troponin. Parse this note.",
            Healthcare,
        )
        .tools(&["parse_clinical_note"])
        .difficulty(Easy),
        EvalCase::new(
            "tool_hc_02",
            "Can a patient safely take aspirin with clopidogrel and omeprazole together?",
            Healthcare,
        )
        .tools(&["check_drug_interactions"])
        .difficulty(Medium),
    ];

    EvalDataset {
        name: "tool_usage".to_string(),
        description: "Tests whether agents select and use the correct tools".to_string(),
        cases,
    }
}

/// Answer content cases.
#[must_use]
pub fn response_quality_dataset() -> EvalDataset {
    use ExpectedDomain::{Finance, Healthcare, Legal};

    let cases = vec![
        EvalCase::new(
            "qual_fin_01",
            "Analyze the risk profile of a 60/40 stock/bond portfolio",
            Finance,
        )
        .tools(&["calculate_risk_metrics"])
        .keywords(&["VaR", "volatility", "Sharpe", "risk"])
        .description("Response should mention key risk metrics"),
        EvalCase::new(
            "qual_leg_01",
            "What GDPR requirements apply to processing EU customer data?",
            Legal,
        )
        .tools(&["check_compliance"])
        .keywords(&["data protection", "consent", "right to erasure", "DPO"])
        .description("Response should cover core GDPR principles"),
        EvalCase::new(
            "qual_hc_01",
            "What ICD-10 codes apply to a patient with congestive heart failure and type 2 diabetes?",
            Healthcare,
        )
        .tools(&["suggest_icd_codes"])
        .keywords(&["I50", "E11", "ICD"])
        .description("Response should include relevant ICD codes"),
    ];

    EvalDataset {
        name: "response_quality".to_string(),
        description: "Tests whether agent responses contain expected information".to_string(),
        cases,
    }
}

/// Every built-in case.
#[must_use]
pub fn full_suite() -> EvalDataset {
    let mut cases = routing_dataset().cases;
    cases.extend(tool_usage_dataset().cases);
    cases.extend(response_quality_dataset().cases);
    EvalDataset {
        name: "full_suite".to_string(),
        description: "Complete evaluation across routing, tool usage, and response quality"
            .to_string(),
        cases,
    }
}
