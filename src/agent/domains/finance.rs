//! Finance agent: portfolio risk, ratios, filings, earnings, valuation.

use std::fmt::Write as _;
use std::sync::Arc;

use serde_json::json;

use rand::Rng;

use super::seeded_rng;
use crate::agent::domain::{Domain, DomainAgent};
use crate::agent::tool::{FnTool, ParamSpec, ParameterSchema, Tool, ToolArgs};

const SYSTEM_PROMPT: &str = "You are an expert Financial Analyst AI with deep expertise in:
- Portfolio management and risk analysis
- SEC filings (10-K, 10-Q, 8-K, proxy statements)
- Financial statement analysis
- Market sentiment and trends
- Quantitative finance and risk metrics

## Guidelines
1. Always provide data-driven insights with specific numbers
2. Cite sources and explain your methodology
3. Highlight risks and uncertainties
4. Use industry-standard metrics (Sharpe ratio, VaR, P/E, etc.)
5. Consider both technical and fundamental factors
6. Provide actionable recommendations when appropriate

## Compliance
- Do not provide specific buy/sell recommendations
- Always include appropriate risk disclaimers
- Note when data may be stale or incomplete";

const RISK_FREE_RATE: f64 = 0.045;

/// Financial analysis agent.
#[derive(Debug, Clone, Copy, Default)]
pub struct FinanceAgent;

impl DomainAgent for FinanceAgent {
    fn domain(&self) -> Domain {
        Domain::Finance
    }

    fn name(&self) -> &str {
        "FinanceAgent"
    }

    fn description(&self) -> &str {
        "Expert financial analyst AI for portfolio analysis, SEC filings, and market insights"
    }

    fn system_prompt(&self) -> &str {
        SYSTEM_PROMPT
    }

    fn tools(&self) -> Vec<Arc<dyn Tool>> {
        vec![
            Arc::new(FnTool::new(
                "calculate_risk_metrics",
                "Calculate portfolio risk metrics including VaR, Sharpe ratio, beta, and volatility",
                ParameterSchema::new()
                    .required(ParamSpec::object(
                        "portfolio",
                        "Portfolio holdings as ticker -> weight",
                    ))
                    .optional(
                        ParamSpec::string("benchmark", "Benchmark ticker (e.g., SPY)")
                            .with_default(json!("SPY")),
                    )
                    .optional(
                        ParamSpec::integer("period_days", "Historical period for calculations")
                            .with_default(json!(252)),
                    ),
                calculate_risk_metrics,
            )),
            Arc::new(FnTool::new(
                "analyze_financial_ratios",
                "Calculate and analyze key financial ratios from company data",
                ParameterSchema::new()
                    .required(ParamSpec::string("ticker", "Stock ticker symbol"))
                    .optional(
                        ParamSpec::array(
                            "metrics",
                            "Specific ratios to calculate (e.g., P/E, ROE, debt_to_equity)",
                        )
                        .with_default(json!([
                            "P/E",
                            "P/B",
                            "ROE",
                            "ROA",
                            "debt_to_equity",
                            "current_ratio"
                        ])),
                    ),
                analyze_financial_ratios,
            )),
            Arc::new(FnTool::new(
                "parse_sec_filing",
                "Extract and summarize key information from SEC filings",
                ParameterSchema::new()
                    .required(ParamSpec::string("ticker", "Company ticker symbol"))
                    .required(
                        ParamSpec::string("filing_type", "Type of SEC filing")
                            .one_of(&["10-K", "10-Q", "8-K", "DEF 14A"]),
                    )
                    .optional(
                        ParamSpec::array("sections", "Specific sections to extract").with_default(
                            json!(["risk_factors", "business_overview", "financial_highlights"]),
                        ),
                    ),
                parse_sec_filing,
            )),
            Arc::new(FnTool::new(
                "analyze_earnings",
                "Analyze earnings reports and calls for key insights",
                ParameterSchema::new()
                    .required(ParamSpec::string("ticker", "Company ticker symbol"))
                    .optional(
                        ParamSpec::string("quarter", "Quarter to analyze (e.g., Q4 2024)")
                            .with_default(json!("latest")),
                    )
                    .optional(ParamSpec::array("focus_areas", "Areas to focus on").with_default(
                        json!(["guidance", "surprises", "management_tone", "key_metrics"]),
                    )),
                analyze_earnings,
            )),
            Arc::new(FnTool::new(
                "calculate_dcf_valuation",
                "Perform discounted cash flow valuation analysis",
                ParameterSchema::new()
                    .required(ParamSpec::string("ticker", "Company ticker symbol"))
                    .optional(
                        ParamSpec::number("growth_rate", "Expected revenue growth rate")
                            .with_default(json!(0.10)),
                    )
                    .optional(
                        ParamSpec::number("discount_rate", "Discount rate (WACC)")
                            .with_default(json!(0.10)),
                    )
                    .optional(
                        ParamSpec::number("terminal_growth", "Terminal growth rate")
                            .with_default(json!(0.025)),
                    )
                    .optional(
                        ParamSpec::integer("projection_years", "Years to project")
                            .with_default(json!(5)),
                    ),
                calculate_dcf_valuation,
            )),
        ]
    }
}

fn calculate_risk_metrics(args: &ToolArgs) -> Result<String, String> {
    let portfolio = args
        .object("portfolio")
        .ok_or_else(|| "portfolio must be an object of ticker weights".to_string())?;
    let holdings: Vec<(String, f64)> = portfolio
        .iter()
        .map(|(ticker, w)| (ticker.to_uppercase(), w.as_f64().unwrap_or(0.0)))
        .collect();
    let total: f64 = holdings.iter().map(|(_, w)| w).sum();
    if holdings.is_empty() || total <= 0.0 {
        return Err("portfolio weights must sum to a positive value".to_string());
    }
    let benchmark = args.str_or("benchmark", "SPY");
    let period_days = args.i64_or("period_days", 252);

    let seed: Vec<String> = holdings.iter().map(|(t, w)| format!("{t}={w}")).collect();
    let mut rng = seeded_rng(&seed.join(","));

    let normalized: Vec<(String, f64)> =
        holdings.into_iter().map(|(t, w)| (t, w / total)).collect();
    let expected_return: f64 = normalized
        .iter()
        .map(|(_, w)| w * (0.08 + rng.random_range(-0.05..0.15)))
        .sum();
    let volatility = 0.15 + rng.random_range(-0.05..0.10);
    let sharpe = (expected_return - RISK_FREE_RATE) / volatility;
    let beta = 0.8 + rng.random_range(-0.3..0.5);
    let max_drawdown = 0.10 + rng.random_range(0.0..0.15);
    let max_weight = normalized.iter().map(|(_, w)| *w).fold(0.0, f64::max);

    let sharpe_label = if sharpe > 1.0 {
        "Good"
    } else if sharpe > 0.5 {
        "Moderate"
    } else {
        "Low"
    };
    let concentration = if max_weight > 0.4 {
        "High"
    } else if max_weight > 0.25 {
        "Moderate"
    } else {
        "Low"
    };

    let mut out = format!(
        "## Portfolio Risk Analysis\n**Period:** {period_days} trading days | **Benchmark:** {benchmark}\n\n### Holdings\n"
    );
    for (ticker, weight) in &normalized {
        let _ = writeln!(out, "- {ticker}: {:.1}%", weight * 100.0);
    }
    let _ = write!(
        out,
        "\n### Key Metrics\n\
         | Metric | Value |\n|--------|-------|\n\
         | Expected Return | {:.2}% |\n\
         | Volatility | {:.2}% |\n\
         | Sharpe Ratio | {sharpe:.2} ({sharpe_label} risk-adjusted return) |\n\
         | Beta | {beta:.2} |\n\
         | VaR (95%) | {:.2}% |\n\
         | VaR (99%) | {:.2}% |\n\
         | Max Drawdown | {:.2}% |\n\n\
         ### Risk Assessment\n\
         - Diversification: {}\n\
         - Concentration Risk: {concentration}\n\n\
         *Past performance does not guarantee future results.*\n",
        expected_return * 100.0,
        volatility * 100.0,
        volatility * 1.645 * 100.0,
        volatility * 2.326 * 100.0,
        max_drawdown * 100.0,
        if normalized.len() >= 5 {
            "Well diversified"
        } else {
            "Consider adding more positions"
        },
    );
    Ok(out)
}

fn interpret_ratio(name: &str, value: f64) -> &'static str {
    match name {
        "P/E" if value < 15.0 => "undervalued",
        "P/E" if value < 25.0 => "fairly valued",
        "P/E" => "premium valuation",
        "P/B" if value < 1.0 => "below book",
        "P/B" if value < 2.0 => "at book",
        "P/B" => "above book value",
        "ROE" if value > 0.15 => "strong",
        "ROE" if value > 0.10 => "moderate",
        "ROE" => "weak",
        "ROA" if value > 0.08 => "efficient",
        "ROA" if value > 0.05 => "moderate",
        "ROA" => "low efficiency",
        "debt_to_equity" if value < 0.5 => "low leverage",
        "debt_to_equity" if value < 1.0 => "moderate",
        "debt_to_equity" => "high leverage",
        "current_ratio" if value > 1.5 => "strong liquidity",
        "current_ratio" if value > 1.0 => "adequate",
        "current_ratio" => "liquidity risk",
        _ => "n/a",
    }
}

fn analyze_financial_ratios(args: &ToolArgs) -> Result<String, String> {
    let ticker = args.str_or("ticker", "").to_uppercase();
    if ticker.is_empty() {
        return Err("ticker must not be empty".to_string());
    }
    let mut rng = seeded_rng(&ticker);
    let all = [
        ("P/E", 15.0 + rng.random_range(-5.0..25.0)),
        ("P/B", 2.0 + rng.random_range(-1.0..4.0)),
        ("ROE", 0.12 + rng.random_range(-0.05..0.15)),
        ("ROA", 0.06 + rng.random_range(-0.02..0.08)),
        ("debt_to_equity", 0.5 + rng.random_range(-0.3..1.0)),
        ("current_ratio", 1.5 + rng.random_range(-0.5..1.0)),
    ];
    let requested = args.strings("metrics");

    let mut out = format!(
        "## Financial Ratio Analysis: {ticker}\n\n| Ratio | Value | Assessment |\n|-------|-------|------------|\n"
    );
    for (name, value) in all
        .iter()
        .filter(|(n, _)| requested.is_empty() || requested.iter().any(|r| r.eq_ignore_ascii_case(n)))
    {
        let shown = if matches!(*name, "ROE" | "ROA") {
            format!("{:.1}%", value * 100.0)
        } else {
            format!("{value:.2}")
        };
        let _ = writeln!(out, "| {name} | {shown} | {} |", interpret_ratio(name, *value));
    }
    let pe = all[0].1;
    let strong = all[2].1 > 0.15 && all[5].1 > 1.5;
    let _ = write!(
        out,
        "\n### Summary\nThe company shows {} fundamentals with a {} P/E ratio of {pe:.2}.\n",
        if strong { "strong" } else { "mixed" },
        interpret_ratio("P/E", pe),
    );
    Ok(out)
}

fn parse_sec_filing(args: &ToolArgs) -> Result<String, String> {
    let ticker = args.str_or("ticker", "").to_uppercase();
    let filing_type = args.str_or("filing_type", "10-K");
    let sections = args.strings("sections");
    let mut rng = seeded_rng(&format!("{ticker}:{filing_type}"));
    let revenue = 2.0 + rng.random_range(0.0..6.0);
    let growth = rng.random_range(-4.0..20.0);
    let net_income = revenue * rng.random_range(0.05..0.15);

    let mut out = format!("## SEC {filing_type} Analysis: {ticker}\n");
    for section in &sections {
        match section.as_str() {
            "business_overview" => {
                let _ = write!(
                    out,
                    "\n### Business Overview\n{ticker} reports consistent revenue with an expanding market presence.\n"
                );
            }
            "financial_highlights" => {
                let _ = write!(
                    out,
                    "\n### Financial Highlights\n- Revenue: ${revenue:.1}B ({growth:+.1}% YoY)\n- Net Income: ${:.0}M\n",
                    net_income * 1000.0
                );
            }
            "risk_factors" => {
                out.push_str(
                    "\n### Key Risk Factors\n\
                     1. Competition from established players and new entrants\n\
                     2. Regulatory: evolving data privacy rules (GDPR, CCPA)\n\
                     3. Macroeconomic sensitivity to spending cycles\n\
                     4. Customer concentration in the top accounts\n",
                );
            }
            other => {
                let _ = write!(out, "\n### {other}\nSection not present in this filing.\n");
            }
        }
    }
    out.push_str("\n*Source: SEC EDGAR (simulated)*\n");
    Ok(out)
}

fn analyze_earnings(args: &ToolArgs) -> Result<String, String> {
    let ticker = args.str_or("ticker", "").to_uppercase();
    let quarter = args.str_or("quarter", "latest");
    let mut rng = seeded_rng(&format!("{ticker}:{quarter}"));
    let eps_est = 1.0 + rng.random_range(0.0..1.5);
    let eps = eps_est * (1.0 + rng.random_range(-0.08..0.12));
    let rev_est = 3.0 + rng.random_range(0.0..3.0);
    let rev = rev_est * (1.0 + rng.random_range(-0.05..0.08));
    let tone = rng.random_range(4.0..9.5);
    let focus = args.strings("focus_areas").join(", ");

    Ok(format!(
        "## Earnings Analysis: {ticker} - {quarter}\n\n\
         | Metric | Actual | Estimate | Surprise |\n|--------|--------|----------|----------|\n\
         | EPS | ${eps:.2} | ${eps_est:.2} | {:+.1}% |\n\
         | Revenue | ${rev:.2}B | ${rev_est:.2}B | {:+.1}% |\n\n\
         ### Management Tone\nOverall sentiment: {} ({tone:.0}/10)\n\n\
         **Focus areas:** {focus}\n",
        (eps / eps_est - 1.0) * 100.0,
        (rev / rev_est - 1.0) * 100.0,
        if tone >= 7.0 {
            "Positive"
        } else if tone >= 5.0 {
            "Neutral"
        } else {
            "Cautious"
        },
    ))
}

#[allow(clippy::cast_possible_truncation)]
fn calculate_dcf_valuation(args: &ToolArgs) -> Result<String, String> {
    let ticker = args.str_or("ticker", "").to_uppercase();
    let growth = args.f64_or("growth_rate", 0.10);
    let discount = args.f64_or("discount_rate", 0.10);
    let terminal = args.f64_or("terminal_growth", 0.025);
    let years = args.i64_or("projection_years", 5);
    if discount <= terminal {
        return Err("discount_rate must exceed terminal_growth".to_string());
    }
    if !(1..=30).contains(&years) {
        return Err("projection_years must be between 1 and 30".to_string());
    }
    let years = years as i32;

    let mut rng = seeded_rng(&ticker);
    let base_fcf = 500.0 + rng.random_range(-100.0..300.0);
    let shares = 200.0 + rng.random_range(-50.0..100.0);

    let mut out = format!(
        "## DCF Valuation Analysis: {ticker}\n\n\
         | Parameter | Value |\n|-----------|-------|\n\
         | Base FCF | ${base_fcf:.0}M |\n\
         | Growth Rate | {:.1}% |\n\
         | Discount Rate (WACC) | {:.1}% |\n\
         | Terminal Growth | {:.1}% |\n\n\
         | Year | FCF ($M) | PV ($M) |\n|------|----------|---------|\n",
        growth * 100.0,
        discount * 100.0,
        terminal * 100.0,
    );
    let mut fcf = base_fcf;
    let mut pv_sum = 0.0;
    for year in 1..=years {
        fcf *= 1.0 + growth;
        let pv = fcf / (1.0 + discount).powi(year);
        pv_sum += pv;
        let _ = writeln!(out, "| {year} | ${fcf:.0} | ${pv:.0} |");
    }
    let terminal_value = fcf * (1.0 + terminal) / (discount - terminal);
    let pv_terminal = terminal_value / (1.0 + discount).powi(years);
    let enterprise = pv_sum + pv_terminal;
    let fair_value = enterprise / shares;
    let price = fair_value * (0.8 + rng.random_range(-0.2..0.4));
    let upside = (fair_value - price) / price * 100.0;
    let verdict = if upside > 15.0 {
        "undervalued"
    } else if upside > -10.0 {
        "fairly valued"
    } else {
        "overvalued"
    };

    let _ = write!(
        out,
        "| Terminal | ${terminal_value:.0} | ${pv_terminal:.0} |\n\n\
         **Enterprise Value:** ${enterprise:.0}M\n\
         **Fair Value/Share:** ${fair_value:.2} (current ${price:.2}, implied upside {upside:+.1}%)\n\n\
         Based on DCF analysis, the stock appears {verdict}.\n\n\
         *DCF models are highly sensitive to assumptions. This is not investment advice.*\n"
    );
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::registry::{ToolOutcome, ToolRegistry};
    use crate::agent::tool::ActionInput;

    fn registry() -> ToolRegistry {
        ToolRegistry::from_tools(FinanceAgent.tools())
    }

    #[test]
    fn test_tool_names() {
        assert_eq!(
            registry().names(),
            vec![
                "analyze_earnings",
                "analyze_financial_ratios",
                "calculate_dcf_valuation",
                "calculate_risk_metrics",
                "parse_sec_filing",
            ]
        );
    }

    #[tokio::test]
    async fn test_ratios_are_deterministic() {
        let reg = registry();
        let input = ActionInput::Raw("aapl".to_string());
        let first = reg.invoke("analyze_financial_ratios", &input).await;
        let second = reg.invoke("analyze_financial_ratios", &input).await;
        assert_eq!(first, second);
        assert!(first.observation().contains("AAPL"));
        assert!(first.observation().contains("P/E"));
    }

    #[tokio::test]
    async fn test_dcf_rejects_bad_rates() {
        let input = ActionInput::parse(Some(
            r#"{"ticker": "MSFT", "discount_rate": 0.02, "terminal_growth": 0.03}"#,
        ));
        let outcome = registry().invoke("calculate_dcf_valuation", &input).await;
        assert!(matches!(outcome, ToolOutcome::Failed(_)));
    }

    #[tokio::test]
    async fn test_risk_metrics_lists_holdings() {
        let input = ActionInput::parse(Some(r#"{"portfolio": {"aapl": 0.6, "msft": 0.4}}"#));
        let outcome = registry().invoke("calculate_risk_metrics", &input).await;
        let text = outcome.observation();
        assert!(text.contains("AAPL: 60.0%"));
        assert!(text.contains("Sharpe Ratio"));
        assert!(text.contains("Concentration Risk: High"));
    }

    #[tokio::test]
    async fn test_sec_filing_requires_known_type() {
        let input = ActionInput::parse(Some(r#"{"ticker": "AAPL", "filing_type": "S-1"}"#));
        let outcome = registry().invoke("parse_sec_filing", &input).await;
        assert!(outcome.observation().starts_with("Invalid arguments for parse_sec_filing"));
    }
}
