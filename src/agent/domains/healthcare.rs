//! Healthcare agent: clinical notes, coding, medications, scores.

use std::fmt::Write as _;
use std::sync::Arc;

use regex::{Regex, RegexBuilder};
use serde_json::{Map, Value, json};

use super::{excerpt, mentions};
use crate::agent::domain::{Domain, DomainAgent};
use crate::agent::tool::{FnTool, ParamSpec, ParameterSchema, Tool, ToolArgs};

const SYSTEM_PROMPT: &str = "You are a Healthcare Documentation Analyst AI specializing in:
- Clinical note parsing and structuring
- Medical coding (ICD-10, CPT)
- Drug information and interactions
- Medical literature analysis
- Healthcare compliance (HIPAA)

## CRITICAL DISCLAIMERS
1. You are NOT a medical professional and do NOT provide medical advice
2. All outputs are for administrative/documentation support only
3. Clinical decisions must be made by licensed healthcare providers
4. Drug interaction information is for reference only - verify with pharmacist
5. Coding suggestions require professional coder review

## HIPAA Awareness
- Never store or log PHI (Protected Health Information)
- Treat all patient data as confidential
- Support minimum necessary principle
- Flag any potential HIPAA concerns

## Guidelines
1. Use standard medical terminology with lay explanations
2. Always cite sources for medical information
3. Flag uncertainty and recommend specialist review
4. Maintain objectivity in clinical summaries
5. Highlight safety-critical information prominently";

const DISCLAIMER: &str = "*For documentation support only. Clinical decisions must be made by licensed healthcare providers.*";

/// Trigger phrase, ICD-10 code, description.
const ICD_CODES: &[(&str, &str, &str)] = &[
    ("unstable angina", "I20.0", "Unstable angina"),
    ("chest pain", "R07.9", "Chest pain, unspecified"),
    ("coronary artery disease", "I25.10", "ASCVD of native coronary artery"),
    ("myocardial infarction", "I21.9", "Acute myocardial infarction, unspecified"),
    ("hypertension", "I10", "Essential hypertension"),
    ("type 2 diabetes", "E11.9", "Type 2 diabetes mellitus without complications"),
    ("hyperlipidemia", "E78.5", "Hyperlipidemia, unspecified"),
    ("atrial fibrillation", "I48.91", "Unspecified atrial fibrillation"),
    ("heart failure", "I50.9", "Heart failure, unspecified"),
    ("pneumonia", "J18.9", "Pneumonia, unspecified organism"),
    ("asthma", "J45.909", "Unspecified asthma, uncomplicated"),
    ("copd", "J44.9", "Chronic obstructive pulmonary disease, unspecified"),
    ("shortness of breath", "R06.02", "Shortness of breath"),
    ("dyspnea", "R06.00", "Dyspnea, unspecified"),
    ("stent", "Z95.5", "Presence of coronary angioplasty implant and graft"),
    ("penicillin allergy", "Z88.0", "Allergy status to penicillin"),
    ("fatigue", "R53.83", "Other fatigue"),
    ("depression", "F32.9", "Major depressive disorder, single episode, unspecified"),
];

/// Drug A, drug B, severity, effect, management.
const INTERACTIONS: &[(&str, &str, &str, &str, &str)] = &[
    (
        "warfarin",
        "aspirin",
        "Major",
        "Increased bleeding risk",
        "Avoid unless clearly indicated; monitor INR and bleeding signs",
    ),
    (
        "warfarin",
        "ibuprofen",
        "Major",
        "Increased bleeding risk and GI hemorrhage",
        "Avoid NSAIDs; consider acetaminophen",
    ),
    (
        "metformin",
        "contrast",
        "Major",
        "Risk of contrast-induced nephropathy and lactic acidosis",
        "Hold metformin 48h around contrast; check renal function",
    ),
    (
        "lisinopril",
        "spironolactone",
        "Major",
        "Hyperkalemia",
        "Monitor potassium closely",
    ),
    (
        "simvastatin",
        "clarithromycin",
        "Major",
        "Rhabdomyolysis risk from raised statin levels",
        "Suspend statin during antibiotic course",
    ),
    (
        "sertraline",
        "tramadol",
        "Major",
        "Serotonin syndrome risk",
        "Avoid combination or monitor closely",
    ),
    (
        "lisinopril",
        "metformin",
        "Moderate",
        "Additive hypoglycemic effect",
        "Monitor blood glucose",
    ),
    (
        "clopidogrel",
        "omeprazole",
        "Moderate",
        "Reduced antiplatelet effect",
        "Prefer pantoprazole",
    ),
    (
        "aspirin",
        "clopidogrel",
        "Minor",
        "Enhanced antiplatelet effect (intended dual therapy)",
        "Monitor for bleeding",
    ),
];

/// Drug, alternative, rationale.
const ALTERNATIVES: &[(&str, &str, &str)] = &[
    ("ibuprofen", "acetaminophen", "No antiplatelet effect"),
    ("omeprazole", "pantoprazole", "Less CYP2C19 inhibition"),
    ("simvastatin", "pravastatin", "Not CYP3A4 metabolized"),
    ("tramadol", "non-serotonergic analgesic", "Avoids serotonin syndrome"),
];

/// Healthcare documentation agent.
#[derive(Debug, Clone, Copy, Default)]
pub struct HealthcareAgent;

impl DomainAgent for HealthcareAgent {
    fn domain(&self) -> Domain {
        Domain::Healthcare
    }

    fn name(&self) -> &str {
        "HealthcareAgent"
    }

    fn description(&self) -> &str {
        "Healthcare document analyst AI for clinical notes, coding, and medical research"
    }

    fn system_prompt(&self) -> &str {
        SYSTEM_PROMPT
    }

    fn tools(&self) -> Vec<Arc<dyn Tool>> {
        vec![
            Arc::new(FnTool::new(
                "parse_clinical_note",
                "Parse and structure unstructured clinical notes into standardized format",
                ParameterSchema::new()
                    .required(ParamSpec::string("clinical_text", "Raw clinical note text"))
                    .optional(ParamSpec::string("note_type", "Type of clinical note").one_of(&[
                        "progress_note",
                        "h_and_p",
                        "discharge_summary",
                        "consult",
                        "operative",
                    ]))
                    .optional(
                        ParamSpec::string("output_format", "Output format")
                            .one_of(&["structured", "soap", "narrative"])
                            .with_default(json!("structured")),
                    ),
                parse_clinical_note,
            )),
            Arc::new(FnTool::new(
                "suggest_icd_codes",
                "Suggest ICD-10 diagnosis codes based on clinical documentation",
                ParameterSchema::new()
                    .required(ParamSpec::string("clinical_text", "Clinical documentation"))
                    .optional(
                        ParamSpec::string("code_type", "Type of codes to suggest")
                            .one_of(&["diagnosis", "procedure", "both"])
                            .with_default(json!("diagnosis")),
                    )
                    .optional(
                        ParamSpec::integer("max_suggestions", "Maximum number of suggestions")
                            .with_default(json!(10)),
                    ),
                suggest_icd_codes,
            )),
            Arc::new(FnTool::new(
                "check_drug_interactions",
                "Check for potential drug-drug interactions",
                ParameterSchema::new()
                    .required(ParamSpec::array("medications", "List of medications"))
                    .optional(
                        ParamSpec::boolean("include_severity", "Include severity ratings")
                            .with_default(json!(true)),
                    )
                    .optional(
                        ParamSpec::boolean("include_alternatives", "Suggest alternatives")
                            .with_default(json!(true)),
                    ),
                check_drug_interactions,
            )),
            Arc::new(FnTool::new(
                "summarize_medical_literature",
                "Summarize medical research papers or clinical guidelines",
                ParameterSchema::new()
                    .required(ParamSpec::string("text", "Medical literature text"))
                    .optional(
                        ParamSpec::string("audience", "Target audience")
                            .one_of(&["clinician", "researcher", "patient", "administrator"])
                            .with_default(json!("clinician")),
                    )
                    .optional(ParamSpec::array("focus_areas", "Specific areas to focus on")),
                summarize_medical_literature,
            )),
            Arc::new(FnTool::new(
                "extract_patient_data",
                "Extract structured patient data from clinical documents (HIPAA-aware)",
                ParameterSchema::new()
                    .required(ParamSpec::string("document_text", "Clinical document text"))
                    .optional(
                        ParamSpec::array("data_elements", "Data elements to extract").with_default(
                            json!(["demographics", "diagnoses", "medications", "allergies", "vitals"]),
                        ),
                    )
                    .optional(
                        ParamSpec::boolean("deidentify", "Remove PHI identifiers")
                            .with_default(json!(true)),
                    ),
                extract_patient_data,
            )),
            Arc::new(FnTool::new(
                "calculate_clinical_scores",
                "Calculate clinical risk scores and assessments",
                ParameterSchema::new()
                    .required(ParamSpec::string("score_type", "Clinical score to calculate").one_of(
                        &["cha2ds2_vasc", "wells_dvt", "wells_pe", "meld", "apache_ii", "sofa", "news2"],
                    ))
                    .required(ParamSpec::object(
                        "parameters",
                        "Score-specific input parameters",
                    )),
                calculate_clinical_scores,
            )),
        ]
    }
}

/// Compiles a case-insensitive pattern, mapping failure to a tool error.
fn pattern(source: &str) -> Result<Regex, String> {
    RegexBuilder::new(source)
        .case_insensitive(true)
        .build()
        .map_err(|e| format!("invalid pattern: {e}"))
}

/// Pulls standard vital signs out of free text.
fn extract_vitals(text: &str) -> Result<Vec<(&'static str, String)>, String> {
    let specs = [
        ("Blood Pressure", r"\bBP[:\s]*(\d{2,3}/\d{2,3})"),
        ("Heart Rate", r"\bHR[:\s]*(\d{2,3})"),
        ("Respiratory Rate", r"\bRR[:\s]*(\d{1,2})"),
        ("SpO2", r"\bSpO2[:\s]*(\d{2,3})\s*%?"),
        ("Temperature", r"\bTemp(?:erature)?[:\s]*(\d{2,3}(?:\.\d)?)"),
    ];
    let mut vitals = Vec::new();
    for (label, source) in specs {
        if let Some(caps) = pattern(source)?.captures(text)
            && let Some(m) = caps.get(1)
        {
            vitals.push((label, m.as_str().to_string()));
        }
    }
    Ok(vitals)
}

fn parse_clinical_note(args: &ToolArgs) -> Result<String, String> {
    let text = args.str_or("clinical_text", "");
    let note_type = args.str_or("note_type", "progress_note").replace('_', " ");
    let format = args.str_or("output_format", "structured");

    let section_re = pattern(
        r"^\s*(chief complaint|cc|hpi|history of present illness|pmh|past medical history|medications|meds|allergies|assessment|plan|subjective|objective)\s*:\s*(.*)$",
    )?;
    let mut out = format!("## Clinical Note Analysis\n**Note Type:** {note_type}\n**Format:** {format}\n\n");
    let mut sections = 0usize;
    for line in text.lines() {
        if let Some(caps) = section_re.captures(line) {
            sections += 1;
            let heading = caps.get(1).map_or("", |m| m.as_str());
            let body = caps.get(2).map_or("", |m| m.as_str().trim());
            let _ = writeln!(out, "#### {}\n{}\n", heading.to_uppercase(), excerpt(body, 300));
        }
    }
    if sections == 0 {
        let _ = writeln!(out, "#### Narrative\n{}\n", excerpt(text.trim(), 500));
    }

    let vitals = extract_vitals(text)?;
    if !vitals.is_empty() {
        out.push_str("#### Vitals\n| Vital | Value |\n|-------|-------|\n");
        for (label, value) in &vitals {
            let _ = writeln!(out, "| {label} | {value} |");
        }
        out.push('\n');
    }

    let mut alerts = Vec::new();
    if mentions(text, "allerg") {
        alerts.push("Allergies documented; verify before prescribing");
    }
    if mentions(text, "chest pain") {
        alerts.push("Chest pain documented; rule out ACS");
    }
    if !alerts.is_empty() {
        out.push_str("### Safety Alerts\n");
        for alert in alerts {
            let _ = writeln!(out, "- {alert}");
        }
        out.push('\n');
    }
    let _ = write!(out, "Sections captured: {sections}\n\n{DISCLAIMER}\n");
    Ok(out)
}

fn suggest_icd_codes(args: &ToolArgs) -> Result<String, String> {
    let text = args.str_or("clinical_text", "");
    let code_type = args.str_or("code_type", "diagnosis");
    let max = usize::try_from(args.i64_or("max_suggestions", 10).max(1)).unwrap_or(10);

    let matches: Vec<&(&str, &str, &str)> = ICD_CODES
        .iter()
        .filter(|(trigger, _, _)| mentions(text, trigger))
        .take(max)
        .collect();

    let mut out = format!(
        "## ICD-10 Code Suggestions ({code_type})\n\n\
         **DISCLAIMER:** AI-suggested codes for review by certified medical coders.\n\n"
    );
    if matches.is_empty() {
        out.push_str("No codable conditions were identified in the documentation.\n");
    } else {
        out.push_str("| Rank | ICD-10 Code | Description | Supporting Text |\n|------|-------------|-------------|-----------------|\n");
        for (rank, (trigger, code, desc)) in matches.iter().enumerate() {
            let _ = writeln!(out, "| {} | {code} | {desc} | \"{trigger}\" |", rank + 1);
        }
        if let Some((_, code, desc)) = matches.first() {
            let _ = write!(out, "\n**Principal Diagnosis:** {code} ({desc})\n");
        }
    }
    if code_type != "diagnosis" {
        out.push_str("\nProcedure (CPT) coding requires the operative report.\n");
    }
    let _ = write!(out, "\n{DISCLAIMER}\n");
    Ok(out)
}

fn check_drug_interactions(args: &ToolArgs) -> Result<String, String> {
    let meds: Vec<String> = args
        .strings("medications")
        .iter()
        .map(|m| m.trim().to_lowercase())
        .filter(|m| !m.is_empty())
        .collect();
    if meds.len() < 2 {
        return Err("at least two medications are required".to_string());
    }
    let include_severity = args.bool_or("include_severity", true);
    let include_alternatives = args.bool_or("include_alternatives", true);

    let taking = |drug: &str| meds.iter().any(|m| m.contains(drug));
    let found: Vec<_> = INTERACTIONS
        .iter()
        .filter(|(a, b, ..)| taking(a) && taking(b))
        .collect();

    let mut out = format!(
        "## Drug Interaction Analysis\n\n**Medications Analyzed:** {}\n\n",
        meds.join(", ")
    );
    if found.is_empty() {
        out.push_str("No known interactions found among these medications.\n");
    } else {
        for (i, (a, b, severity, effect, management)) in found.iter().enumerate() {
            let _ = writeln!(out, "#### Interaction {}: {a} + {b}", i + 1);
            if include_severity {
                let _ = writeln!(out, "- **Severity:** {severity}");
            }
            let _ = write!(out, "- **Effect:** {effect}\n- **Management:** {management}\n\n");
        }
    }
    if include_alternatives {
        let alternatives: Vec<_> = ALTERNATIVES.iter().filter(|(d, ..)| taking(d)).collect();
        if !alternatives.is_empty() {
            out.push_str("### Alternative Suggestions\n| Current | Alternative | Rationale |\n|---------|-------------|-----------|\n");
            for (drug, alt, why) in alternatives {
                let _ = writeln!(out, "| {drug} | {alt} | {why} |");
            }
            out.push('\n');
        }
    }
    out.push_str("*Reference only. Verify with a clinical pharmacist.*\n");
    Ok(out)
}

fn summarize_medical_literature(args: &ToolArgs) -> Result<String, String> {
    let text = args.str_or("text", "");
    let audience = args.str_or("audience", "clinician");
    let focus = args.strings("focus_areas");

    let sentences: Vec<&str> = text
        .split_inclusive(['.', '!', '?'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();
    let study_type = [
        ("randomized", "Randomized Controlled Trial"),
        ("meta-analysis", "Meta-analysis"),
        ("cohort", "Cohort Study"),
        ("case-control", "Case-Control Study"),
        ("guideline", "Clinical Guideline"),
    ]
    .iter()
    .find(|(needle, _)| mentions(text, needle))
    .map_or("Unspecified design", |(_, label)| *label);

    let stats_re = pattern(r"(p\s*[<=]\s*0?\.\d+|\d+(?:\.\d+)?\s*%|hr\s*[=:]?\s*\d\.\d+|ci\b)")?;
    let stats: Vec<&str> = stats_re.find_iter(text).map(|m| m.as_str()).take(6).collect();

    let take = if audience == "patient" { 2 } else { 4 };
    let mut out = format!(
        "## Medical Literature Summary\n**Target Audience:** {audience}\n**Study Type:** {study_type}\n**Focus Areas:** {}\n\n### Key Points\n",
        if focus.is_empty() {
            "General overview".to_string()
        } else {
            focus.join(", ")
        }
    );
    for sentence in sentences.iter().take(take) {
        let _ = writeln!(out, "- {}", excerpt(sentence, 240));
    }
    for area in &focus {
        let hits = sentences.iter().filter(|s| mentions(s, area)).count();
        let _ = writeln!(out, "- `{area}` discussed in {hits} sentence(s)");
    }
    if !stats.is_empty() && audience != "patient" {
        let _ = write!(out, "\n### Reported Statistics\n{}\n", stats.join("; "));
    }
    out.push_str("\n*Summary for educational purposes. Review the original source for clinical decisions.*\n");
    Ok(out)
}

fn extract_patient_data(args: &ToolArgs) -> Result<String, String> {
    let text = args.str_or("document_text", "");
    let elements = args.strings("data_elements");
    let deidentify = args.bool_or("deidentify", true);

    let mut out = format!(
        "## Extracted Patient Data\n{}\n\n",
        if deidentify {
            "**[DE-IDENTIFIED]**"
        } else {
            "**[CONTAINS PHI]**"
        }
    );
    for element in &elements {
        let _ = writeln!(out, "### {}", element.replace('_', " "));
        match element.as_str() {
            "demographics" => {
                let age = pattern(r"(\d{1,3})[\s-]*(?:year[\s-]*old|yo|y/o)")?
                    .captures(text)
                    .and_then(|c| c.get(1))
                    .map_or("not documented", |m| m.as_str());
                let sex = if pattern(r"\b(female|woman|f)\b")?.is_match(text) {
                    "Female"
                } else if pattern(r"\b(male|man|m)\b")?.is_match(text) {
                    "Male"
                } else {
                    "not documented"
                };
                let _ = writeln!(out, "- Age: {age}\n- Sex: {sex}");
            }
            "diagnoses" => {
                let codes: Vec<String> = ICD_CODES
                    .iter()
                    .filter(|(trigger, ..)| mentions(text, trigger))
                    .map(|(_, code, desc)| format!("{code} {desc}"))
                    .collect();
                push_list(&mut out, &codes);
            }
            "medications" => {
                let meds: Vec<String> = INTERACTIONS
                    .iter()
                    .flat_map(|(a, b, ..)| [*a, *b])
                    .filter(|d| mentions(text, d))
                    .map(str::to_string)
                    .fold(Vec::new(), |mut acc, d| {
                        if !acc.contains(&d) {
                            acc.push(d);
                        }
                        acc
                    });
                push_list(&mut out, &meds);
            }
            "allergies" => {
                let allergies: Vec<String> = pattern(r"allerg(?:y|ies|ic)(?:\s+to)?\s*:?\s*([^\n.;]+)")?
                    .captures_iter(text)
                    .filter_map(|c| c.get(1).map(|m| m.as_str().trim().to_string()))
                    .collect();
                push_list(&mut out, &allergies);
            }
            "vitals" => {
                let vitals: Vec<String> = extract_vitals(text)?
                    .into_iter()
                    .map(|(label, value)| format!("{label}: {value}"))
                    .collect();
                push_list(&mut out, &vitals);
            }
            _ => out.push_str("- not a supported data element\n"),
        }
        out.push('\n');
    }
    if deidentify {
        let redacted = redact(text)?;
        let _ = write!(out, "### De-identified Source\n{}\n\n", excerpt(&redacted, 400));
    }
    out.push_str("*Handle per HIPAA minimum necessary standard.*\n");
    Ok(out)
}

fn push_list(out: &mut String, items: &[String]) {
    if items.is_empty() {
        out.push_str("- none documented\n");
    }
    for item in items {
        let _ = writeln!(out, "- {item}");
    }
}

/// Replaces common PHI identifiers with `[REDACTED]`.
fn redact(text: &str) -> Result<String, String> {
    let rules = [
        r"\b\d{4}-\d{2}-\d{2}\b",
        r"\b\d{1,2}/\d{1,2}/\d{2,4}\b",
        r"\b\d{3}[-.\s]\d{3}[-.\s]\d{4}\b",
        r"\bMRN[:#\s]*\d+\b",
        r"\b\d{3}-\d{2}-\d{4}\b",
        r"\b(?:Mr|Mrs|Ms|Dr)\.?\s+[A-Z][a-z]+(?:\s+[A-Z][a-z]+)?",
    ];
    let mut redacted = text.to_string();
    for rule in rules {
        redacted = pattern(rule)?
            .replace_all(&redacted, "[REDACTED]")
            .into_owned();
    }
    Ok(redacted)
}

fn calculate_clinical_scores(args: &ToolArgs) -> Result<String, String> {
    let score_type = args.str_or("score_type", "");
    let empty = Map::new();
    let params = args.object("parameters").unwrap_or(&empty);
    match score_type {
        "cha2ds2_vasc" => Ok(cha2ds2_vasc(params)),
        "wells_dvt" => Ok(wells_dvt(params)),
        "news2" => Ok(news2(params)),
        other => Err(format!(
            "score type '{other}' is not available (supported: cha2ds2_vasc, wells_dvt, news2)"
        )),
    }
}

fn flag(params: &Map<String, Value>, key: &str) -> bool {
    params.get(key).and_then(Value::as_bool).unwrap_or(false)
}

fn number(params: &Map<String, Value>, key: &str) -> Option<f64> {
    params.get(key).and_then(Value::as_f64)
}

fn cha2ds2_vasc(params: &Map<String, Value>) -> String {
    let age = number(params, "age").unwrap_or(0.0);
    let mut score = 0u32;
    let mut breakdown = Vec::new();
    let mut add = |cond: bool, points: u32, label: &str| {
        if cond {
            score += points;
            breakdown.push(format!("{label}: +{points}"));
        }
    };
    add(flag(params, "chf"), 1, "CHF/LV dysfunction");
    add(flag(params, "hypertension"), 1, "Hypertension");
    add(age >= 75.0, 2, "Age >= 75");
    add((65.0..75.0).contains(&age), 1, "Age 65-74");
    add(flag(params, "diabetes"), 1, "Diabetes");
    add(flag(params, "stroke_tia"), 2, "Prior stroke/TIA");
    add(flag(params, "vascular_disease"), 1, "Vascular disease");
    add(flag(params, "female"), 1, "Female sex");

    let annual_risk = match score {
        0 => "0%",
        1 => "1.3%",
        2 => "2.2%",
        3 => "3.2%",
        4 => "4.0%",
        5 => "6.7%",
        6 => "9.8%",
        7 => "9.6%",
        8 => "12.5%",
        9 => "15.2%",
        _ => ">15%",
    };
    let recommendation = match score {
        0 => "No anticoagulation needed",
        1 => "Consider anticoagulation",
        _ => "Anticoagulation recommended",
    };
    let items = if breakdown.is_empty() {
        "- No risk factors: 0".to_string()
    } else {
        breakdown
            .iter()
            .map(|b| format!("- {b}"))
            .collect::<Vec<_>>()
            .join("\n")
    };
    format!(
        "## CHA2DS2-VASc Score\n\n{items}\n\n**Total Score: {score}**\n\
         Annual stroke risk: {annual_risk}\n\n**{recommendation}**\n\n{DISCLAIMER}\n"
    )
}

fn wells_dvt(params: &Map<String, Value>) -> String {
    let criteria = [
        ("active_cancer", 1, "Active cancer"),
        ("paralysis", 1, "Paralysis or recent immobilization"),
        ("bedridden", 1, "Bedridden > 3 days or recent surgery"),
        ("localized_tenderness", 1, "Localized tenderness along deep veins"),
        ("entire_leg_swollen", 1, "Entire leg swollen"),
        ("calf_swelling", 1, "Calf swelling > 3 cm"),
        ("pitting_edema", 1, "Pitting edema"),
        ("collateral_veins", 1, "Collateral superficial veins"),
        ("previous_dvt", 1, "Previously documented DVT"),
        ("alternative_diagnosis_likely", -2, "Alternative diagnosis as likely"),
    ];
    let mut score = 0i32;
    let mut rows = String::new();
    for (key, points, label) in criteria {
        let present = flag(params, key);
        if present {
            score += points;
        }
        let _ = writeln!(rows, "| {label} | {} |", if present { points } else { 0 });
    }
    let (probability, workup) = match score {
        i32::MIN..=0 => ("Low", "D-dimer; if negative, DVT excluded"),
        1 | 2 => ("Moderate", "D-dimer, ultrasound if positive"),
        _ => ("High", "Compression ultrasound"),
    };
    format!(
        "## Wells Score for DVT\n\n| Criteria | Points |\n|----------|--------|\n{rows}\n\
         **Score: {score} ({probability} probability)**\nRecommended workup: {workup}\n\n{DISCLAIMER}\n"
    )
}

fn news2(params: &Map<String, Value>) -> String {
    let band = |value: Option<f64>, bands: &[(f64, f64, u32)]| -> u32 {
        value.map_or(0, |v| {
            bands
                .iter()
                .find(|(lo, hi, _)| v >= *lo && v <= *hi)
                .map_or(3, |(_, _, s)| *s)
        })
    };
    let rr = band(
        number(params, "respiratory_rate"),
        &[(12.0, 20.0, 0), (9.0, 11.0, 1), (21.0, 24.0, 2)],
    );
    let spo2 = band(
        number(params, "spo2"),
        &[(96.0, 100.0, 0), (94.0, 95.0, 1), (92.0, 93.0, 2)],
    );
    let sbp = band(
        number(params, "systolic_bp"),
        &[(111.0, 219.0, 0), (101.0, 110.0, 1), (91.0, 100.0, 2)],
    );
    let hr = band(
        number(params, "heart_rate"),
        &[(51.0, 90.0, 0), (41.0, 50.0, 1), (91.0, 110.0, 1), (111.0, 130.0, 2)],
    );
    let temp = band(
        number(params, "temperature"),
        &[(36.1, 38.0, 0), (35.1, 36.0, 1), (38.1, 39.0, 1), (39.1, 45.0, 2)],
    );
    let oxygen = if flag(params, "on_oxygen") { 2 } else { 0 };
    let consciousness = if flag(params, "new_confusion") { 3 } else { 0 };

    let parts = [rr, spo2, sbp, hr, temp, oxygen, consciousness];
    let total: u32 = parts.iter().sum();
    let any_three = parts.contains(&3);
    let (risk, response) = match total {
        0..=4 if any_three => ("Low-medium", "Urgent ward-based response"),
        0..=4 => ("Low", "Assess by registered nurse"),
        5 | 6 => ("Medium", "Urgent response"),
        _ => ("High", "Emergency response"),
    };
    format!(
        "## NEWS2 (National Early Warning Score 2)\n\n\
         | Parameter | Score |\n|-----------|-------|\n\
         | Respiratory rate | {rr} |\n| SpO2 | {spo2} |\n| Systolic BP | {sbp} |\n\
         | Heart rate | {hr} |\n| Temperature | {temp} |\n| Supplemental O2 | {oxygen} |\n\
         | Consciousness | {consciousness} |\n\n\
         **Total NEWS2 Score: {total}**\nRisk: {risk}. Response: {response}.\n\n{DISCLAIMER}\n"
    )
}
