//! Legal agent: clause extraction, NDA review, compliance, risk.
//!
//! The tools scan the supplied text for indicator phrases, so reports
//! reflect what the document actually contains.

use std::fmt::Write as _;
use std::sync::Arc;

use serde_json::json;

use super::{excerpt, mentions, mentions_any};
use crate::agent::domain::{Domain, DomainAgent};
use crate::agent::tool::{FnTool, ParamSpec, ParameterSchema, Tool, ToolArgs};

const SYSTEM_PROMPT: &str = "You are an expert Legal Analyst AI specializing in:
- Contract law and agreement analysis
- Regulatory compliance (GDPR, CCPA, HIPAA, SOC2, SOX)
- Risk assessment and mitigation
- Corporate governance
- Intellectual property

## Guidelines
1. Always identify potential legal risks and flag them clearly
2. Use precise legal terminology with plain-English explanations
3. Note jurisdiction-specific considerations
4. Highlight non-standard or unusual clauses
5. Provide actionable recommendations
6. Be conservative in risk assessments

## Disclaimer
- This is AI-assisted analysis, not legal advice
- Recommend human legal review for all critical decisions
- Note when issues require specialized legal expertise";

const DISCLAIMER: &str =
    "*This analysis is for informational purposes only and does not constitute legal advice.*";

/// Clause type, indicator phrases, risk when present, recommendation.
const CLAUSES: &[(&str, &[&str], &str, &str)] = &[
    (
        "indemnification",
        &["indemnif", "hold harmless"],
        "Medium",
        "Negotiate a cap tied to contract value or insurance limits",
    ),
    (
        "limitation_of_liability",
        &["limitation of liability", "consequential damages", "liable"],
        "Low",
        "Confirm direct damages cap and carve-outs",
    ),
    (
        "termination",
        &["terminat", "notice period", "cure period"],
        "Medium",
        "Check notice and cure periods are symmetric",
    ),
    (
        "confidentiality",
        &["confidential", "non-disclosure"],
        "Low",
        "Confirm survival period and legal-disclosure exceptions",
    ),
    (
        "ip_ownership",
        &["intellectual property", "work product", "ownership", "assign"],
        "High",
        "Negotiate a pre-existing IP carve-out and license-back",
    ),
    (
        "governing_law",
        &["governing law", "governed by", "laws of"],
        "Low",
        "Confirm the chosen jurisdiction is acceptable",
    ),
    (
        "dispute_resolution",
        &["arbitration", "dispute", "mediation"],
        "Medium",
        "Consider adding a mediation step before arbitration",
    ),
];

/// Regulation, indicator phrases that suggest it is addressed.
const REGULATIONS: &[(&str, &[&str])] = &[
    (
        "GDPR",
        &["data subject", "lawful basis", "gdpr", "right to erasure", "data protection officer"],
    ),
    ("CCPA", &["ccpa", "do not sell", "california consumer", "opt-out"]),
    (
        "HIPAA",
        &["hipaa", "protected health information", "phi", "business associate"],
    ),
    ("SOX", &["internal control", "sarbanes", "sox", "audit committee"]),
    ("SOC2", &["soc 2", "soc2", "security controls", "availability"]),
];

/// NDA red flags: phrase, description.
const NDA_FLAGS: &[(&str, &str)] = &[
    ("perpetual", "Perpetual confidentiality obligation"),
    ("any information", "Very broad definition of confidential information"),
    ("non-compete", "Embedded non-compete restriction"),
    ("non-solicit", "Non-solicitation clause"),
    ("injunctive relief", "Pre-agreed injunctive relief"),
    ("sole discretion", "Unilateral discretion for one party"),
];

/// Legal assistant agent.
#[derive(Debug, Clone, Copy, Default)]
pub struct LegalAgent;

impl DomainAgent for LegalAgent {
    fn domain(&self) -> Domain {
        Domain::Legal
    }

    fn name(&self) -> &str {
        "LegalAgent"
    }

    fn description(&self) -> &str {
        "Legal document analyst AI for contracts, compliance, and risk assessment"
    }

    fn system_prompt(&self) -> &str {
        SYSTEM_PROMPT
    }

    fn tools(&self) -> Vec<Arc<dyn Tool>> {
        let clause_names: Vec<&str> = CLAUSES.iter().map(|c| c.0).collect();
        vec![
            Arc::new(FnTool::new(
                "extract_contract_clauses",
                "Extract and categorize all clauses from a contract",
                ParameterSchema::new()
                    .required(ParamSpec::string("contract_text", "Full contract text"))
                    .optional(
                        ParamSpec::array("clause_types", "Clause types to extract")
                            .with_default(json!(clause_names)),
                    ),
                extract_contract_clauses,
            )),
            Arc::new(FnTool::new(
                "analyze_nda",
                "Analyze NDA terms, identify one-sided provisions and risks",
                ParameterSchema::new()
                    .required(ParamSpec::string("nda_text", "NDA document text"))
                    .optional(
                        ParamSpec::string("party_perspective", "Which party's perspective")
                            .one_of(&["disclosing", "receiving", "mutual"])
                            .with_default(json!("receiving")),
                    ),
                analyze_nda,
            )),
            Arc::new(FnTool::new(
                "check_compliance",
                "Check document for regulatory compliance issues",
                ParameterSchema::new()
                    .required(ParamSpec::string("document_text", "Document to check"))
                    .required(
                        ParamSpec::array("regulations", "Regulations to check against")
                            .with_default(json!(["GDPR", "CCPA", "HIPAA"])),
                    )
                    .optional(ParamSpec::string(
                        "document_type",
                        "Type of document (privacy policy, contract, etc.)",
                    )),
                check_compliance,
            )),
            Arc::new(FnTool::new(
                "compare_contracts",
                "Compare two contract versions and identify differences",
                ParameterSchema::new()
                    .required(ParamSpec::string("contract_a", "First contract version"))
                    .required(ParamSpec::string("contract_b", "Second contract version"))
                    .optional(ParamSpec::array("focus_areas", "Areas to focus comparison on")),
                compare_contracts,
            )),
            Arc::new(FnTool::new(
                "assess_legal_risk",
                "Comprehensive legal risk assessment of a document or situation",
                ParameterSchema::new()
                    .required(ParamSpec::string(
                        "context",
                        "Description of the situation or document",
                    ))
                    .optional(
                        ParamSpec::string("jurisdiction", "Applicable jurisdiction")
                            .with_default(json!("United States")),
                    )
                    .optional(
                        ParamSpec::array("risk_categories", "Risk categories to assess")
                            .with_default(json!([
                                "contractual",
                                "regulatory",
                                "litigation",
                                "ip",
                                "employment"
                            ])),
                    ),
                assess_legal_risk,
            )),
        ]
    }
}

fn extract_contract_clauses(args: &ToolArgs) -> Result<String, String> {
    let text = args.str_or("contract_text", "");
    let wanted = args.strings("clause_types");

    let mut out = String::from(
        "## Contract Clause Analysis\n\n| Clause Type | Found | Risk Level | Action |\n|-------------|-------|------------|--------|\n",
    );
    let mut concerns = Vec::new();
    for (name, indicators, risk, action) in CLAUSES {
        if !wanted.is_empty() && !wanted.iter().any(|w| w.eq_ignore_ascii_case(name)) {
            continue;
        }
        let found = mentions_any(text, indicators);
        let (shown_risk, shown_action) = if found {
            (*risk, *action)
        } else {
            ("Review", "Clause missing; consider adding it")
        };
        if found && *risk == "High" {
            concerns.push(format!("{name}: {action}"));
        }
        let _ = writeln!(
            out,
            "| {name} | {} | {shown_risk} | {shown_action} |",
            if found { "yes" } else { "no" }
        );
    }
    if !concerns.is_empty() {
        out.push_str("\n### Key Concerns\n");
        for concern in &concerns {
            let _ = writeln!(out, "- {concern}");
        }
    }
    let _ = write!(out, "\n{DISCLAIMER}\n");
    Ok(out)
}

fn analyze_nda(args: &ToolArgs) -> Result<String, String> {
    let text = args.str_or("nda_text", "");
    let perspective = args.str_or("party_perspective", "receiving");
    let mutual = mentions_any(text, &["mutual", "each party"]);

    let mut out = format!(
        "## NDA Analysis\n**Perspective:** {perspective} party\n**Type:** {}\n\n### Red Flags\n",
        if mutual { "Mutual NDA" } else { "One-way NDA" }
    );
    let flags: Vec<&str> = NDA_FLAGS
        .iter()
        .filter(|(phrase, _)| mentions(text, phrase))
        .map(|(_, desc)| *desc)
        .collect();
    if flags.is_empty() {
        out.push_str("- No common one-sided provisions detected\n");
    } else {
        for flag in &flags {
            let _ = writeln!(out, "- {flag}");
        }
    }
    let risk = match flags.len() {
        0 => "Low",
        1 | 2 => "Medium",
        _ => "High",
    };
    let _ = write!(
        out,
        "\n**Overall risk for the {perspective} party:** {risk}\n\n{DISCLAIMER}\n"
    );
    Ok(out)
}

fn check_compliance(args: &ToolArgs) -> Result<String, String> {
    let text = args.str_or("document_text", "");
    let regulations = args.strings("regulations");
    if regulations.is_empty() {
        return Err("at least one regulation is required".to_string());
    }
    let doc_type = args.str_or("document_type", "document");

    let mut out = format!(
        "## Compliance Review ({doc_type})\n\n| Regulation | Status | Notes |\n|------------|--------|-------|\n"
    );
    for reg in &regulations {
        let known = REGULATIONS
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(reg));
        let (status, notes) = match known {
            Some((_, indicators)) if mentions_any(text, indicators) => {
                ("Addressed", "Relevant provisions present")
            }
            Some(_) => ("Gap", "No provisions addressing this regulation were found"),
            None => ("Unknown", "Regulation not in the review catalog"),
        };
        let _ = writeln!(out, "| {} | {status} | {notes} |", reg.to_uppercase());
    }
    let _ = write!(out, "\n{DISCLAIMER}\n");
    Ok(out)
}

fn compare_contracts(args: &ToolArgs) -> Result<String, String> {
    let a = args.str_or("contract_a", "");
    let b = args.str_or("contract_b", "");
    let lines_a: Vec<&str> = a.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
    let lines_b: Vec<&str> = b.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
    let removed: Vec<&&str> = lines_a.iter().filter(|l| !lines_b.contains(l)).collect();
    let added: Vec<&&str> = lines_b.iter().filter(|l| !lines_a.contains(l)).collect();

    let mut out = format!(
        "## Contract Comparison\n\n- Provisions removed: {}\n- Provisions added: {}\n",
        removed.len(),
        added.len()
    );
    for line in removed.iter().take(10) {
        let _ = writeln!(out, "  - REMOVED: {}", excerpt(line, 120));
    }
    for line in added.iter().take(10) {
        let _ = writeln!(out, "  - ADDED: {}", excerpt(line, 120));
    }
    let focus = args.strings("focus_areas");
    for area in &focus {
        let in_a = mentions(a, area);
        let in_b = mentions(b, area);
        let change = match (in_a, in_b) {
            (true, true) => "present in both",
            (true, false) => "removed in version B",
            (false, true) => "added in version B",
            (false, false) => "absent from both",
        };
        let _ = writeln!(out, "- Focus `{area}`: {change}");
    }
    let _ = write!(out, "\n{DISCLAIMER}\n");
    Ok(out)
}

fn assess_legal_risk(args: &ToolArgs) -> Result<String, String> {
    let context = args.str_or("context", "");
    let jurisdiction = args.str_or("jurisdiction", "United States");
    let categories = args.strings("risk_categories");

    let mut out = format!(
        "## Legal Risk Assessment\n**Jurisdiction:** {jurisdiction}\n\n| Category | Risk | Driver |\n|----------|------|--------|\n"
    );
    let mut high = 0usize;
    for category in &categories {
        let indicators: &[&str] = match category.as_str() {
            "contractual" => &["breach", "contract", "obligation", "warranty"],
            "regulatory" => &["regulat", "compliance", "gdpr", "hipaa", "fine", "penalt"],
            "litigation" => &["lawsuit", "litigation", "class action", "claim", "sue"],
            "ip" => &["patent", "trademark", "copyright", "intellectual property"],
            "employment" => &["employee", "termination", "discrimination", "wage"],
            _ => &[],
        };
        let hits = indicators
            .iter()
            .filter(|i| mentions(context, i))
            .count();
        let level = match hits {
            0 => "Low",
            1 => "Medium",
            _ => {
                high += 1;
                "High"
            }
        };
        let _ = writeln!(out, "| {category} | {level} | {hits} indicator(s) |");
    }
    let _ = write!(
        out,
        "\n**Overall:** {}\n\n{DISCLAIMER}\n",
        if high > 0 {
            "Elevated risk; obtain legal review"
        } else {
            "Manageable risk"
        }
    );
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::registry::ToolRegistry;
    use crate::agent::tool::ActionInput;

    fn registry() -> ToolRegistry {
        ToolRegistry::from_tools(LegalAgent.tools())
    }

    #[tokio::test]
    async fn test_nda_flags_perpetual_terms() {
        let input = ActionInput::Raw(
            "This mutual agreement imposes perpetual obligations and a non-compete.".to_string(),
        );
        let text = registry().invoke("analyze_nda", &input).await.observation();
        assert!(text.contains("Mutual NDA"));
        assert!(text.contains("Perpetual confidentiality obligation"));
        assert!(text.contains("Embedded non-compete restriction"));
    }

    #[tokio::test]
    async fn test_compliance_reports_gaps() {
        let input = ActionInput::parse(Some(
            r#"{"document_text": "We honor data subject rights.", "regulations": ["GDPR", "HIPAA"]}"#,
        ));
        let text = registry().invoke("check_compliance", &input).await.observation();
        assert!(text.contains("| GDPR | Addressed"));
        assert!(text.contains("| HIPAA | Gap"));
    }

    #[tokio::test]
    async fn test_clause_extraction_marks_missing() {
        let input = ActionInput::Raw("Either party may terminate with notice.".to_string());
        let text = registry()
            .invoke("extract_contract_clauses", &input)
            .await
            .observation();
        assert!(text.contains("| termination | yes |"));
        assert!(text.contains("| governing_law | no |"));
    }

    #[tokio::test]
    async fn test_compare_contracts_counts_changes() {
        let input = ActionInput::parse(Some(
            r#"{"contract_a": "Term: 1 year\nFee: $10", "contract_b": "Term: 1 year\nFee: $20"}"#,
        ));
        let text = registry().invoke("compare_contracts", &input).await.observation();
        assert!(text.contains("Provisions removed: 1"));
        assert!(text.contains("ADDED: Fee: $20"));
    }
}
