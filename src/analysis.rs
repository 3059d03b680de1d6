//! LLM-backed contract analysis: summaries, key clauses, metadata extraction
//! and risk scoring.
//!
//! Prompt construction and response parsing are plain functions so they can be
//! tested without a model; the async wrappers just glue them to a
//! [`TextGenerator`].

use crate::document::ContractMetadata;
use crate::gemini::TextGenerator;
use anyhow::{Context, Result};
use chrono::Local;
use log::{debug, error};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Longest contract excerpt sent for summaries, clauses and risk
pub const MAX_ANALYSIS_CHARS: usize = 30_000;
/// Metadata lives at the top of a contract, so less text is needed
pub const MAX_METADATA_CHARS: usize = 15_000;
/// Risk reasons are shown in a table cell
const MAX_REASON_CHARS: usize = 150;
const UNKNOWN: &str = "Unknown";
const DEFAULT_REASON: &str = "Risk level determined by contract analysis";

/// Cut `text` to at most `max_chars` characters, appending `...` when `ellipsis` is set
pub fn truncate_chars(text: &str, max_chars: usize, ellipsis: bool) -> String {
    match text.char_indices().nth(max_chars) {
        Some((offset, _)) if ellipsis => format!("{}...", &text[..offset]),
        Some((offset, _)) => text[..offset].to_string(),
        None => text.to_string(),
    }
}

pub fn summary_prompt(contract_text: &str) -> String {
    format!(
        r#"You are a legal contract analyst. Summarize the contract below using main sections and sub-sections.

Formatting rules:
1. **BOLD CAPS** for main section headers
2. **Bold Title Case** for sub-section headers
3. Short bullet points under each sub-section
4. Bold party names, dates, amounts, percentages and penalties

Required sections:
**MAIN PARTIES** - each party's name, role and location
**KEY OBLIGATIONS** - vendor, client and mutual obligations
**DURATION & TERMINATION** - contract period, renewal terms, termination rights and notice periods
**FINANCIAL TERMS** - total value, payment frequency and terms, penalties and fees, expenses and taxes
**RISK & COMPLIANCE** - risk level, insurance requirements, compliance standards (if applicable)

Contract:
{}

Structured Summary:"#,
        truncate_chars(contract_text, MAX_ANALYSIS_CHARS, true)
    )
}

pub fn key_clauses_prompt(contract_text: &str) -> String {
    format!(
        r#"You are a legal contract analyst. Extract the following key clauses from this contract:
- Payment Terms
- Termination Clause
- Renewal Terms
- Liability Limitations
- Confidentiality Obligations
- Dispute Resolution
- Penalties/Damages

Contract:
{}

Format your response as:
**Payment Terms:** [content]
**Termination Clause:** [content]
... and so on for each clause"#,
        truncate_chars(contract_text, MAX_ANALYSIS_CHARS, true)
    )
}

pub fn metadata_prompt(contract_text: &str) -> String {
    format!(
        r#"You are a contract metadata extractor. Return ONLY a JSON object with these fields (null when not found):
{{
    "contract_name": "type of agreement, e.g. Software License Agreement",
    "contract_number": "contract number or ID",
    "party_a": "first party name",
    "party_b": "second party name",
    "start_date": "YYYY-MM-DD",
    "end_date": "YYYY-MM-DD",
    "contract_value": numeric value or null,
    "currency": "ISO currency code, e.g. USD"
}}

Do not add explanations or markdown.

Contract Text:
{}"#,
        truncate_chars(contract_text, MAX_METADATA_CHARS, false)
    )
}

pub fn risk_prompt(contract_text: &str) -> String {
    format!(
        r#"You are a risk assessment specialist for legal contracts. Assess:
1. Financial risks (penalties, payment terms, contract value)
2. Compliance risks (regulatory obligations)
3. Operational risks (delivery timelines, SLA failures)
4. Legal risks (ambiguous terms, termination conditions)

Respond in exactly this format:

RISK LEVEL: [LOW/MEDIUM/HIGH/CRITICAL]

PRIMARY REASON: [one sentence naming the most significant risk factor]

KEY RISKS:
- [Risk 1]
- [Risk 2]
- [Risk 3]

Contract:
{}

Risk Assessment:"#,
        truncate_chars(contract_text, MAX_ANALYSIS_CHARS, true)
    )
}

/// Structured facts pulled out of a contract by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedMetadata {
    pub contract_name: String,
    pub contract_number: String,
    pub party_a: String,
    pub party_b: String,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub contract_value: Option<f64>,
    pub currency: String,
}

impl ExtractedMetadata {
    /// Placeholder used when the model response cannot be parsed
    pub fn fallback() -> Self {
        ExtractedMetadata {
            contract_name: "Untitled Contract".to_string(),
            contract_number: format!("AUTO-{}", Local::now().format("%Y%m%d%H%M%S")),
            party_a: UNKNOWN.to_string(),
            party_b: UNKNOWN.to_string(),
            start_date: None,
            end_date: None,
            contract_value: None,
            currency: "USD".to_string(),
        }
    }
}

impl From<ExtractedMetadata> for ContractMetadata {
    fn from(extracted: ExtractedMetadata) -> Self {
        let mut metadata = ContractMetadata {
            name: Some(extracted.contract_name),
            number: Some(extracted.contract_number),
            party_a: Some(extracted.party_a),
            party_b: Some(extracted.party_b),
            ..Default::default()
        };

        let optional = [
            ("start_date", extracted.start_date),
            ("end_date", extracted.end_date),
            ("contract_value", extracted.contract_value.map(|v| v.to_string())),
        ];
        for (key, value) in optional {
            if let Some(value) = value {
                metadata.extra.insert(key.to_string(), value);
            }
        }
        metadata
            .extra
            .insert("currency".to_string(), extracted.currency);

        metadata
    }
}

/// Pull the JSON object out of a model response that may wrap it in prose or fences
fn json_object_slice(response: &str) -> Option<&str> {
    let mut text = response.trim();

    if let Some((_, rest)) = text.split_once("```json") {
        text = rest.split("```").next().unwrap_or(rest);
    } else if let Some((_, rest)) = text.split_once("```") {
        text = rest.split("```").next().unwrap_or(rest);
    }

    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| &text[start..=end])
}

fn string_field(object: &Value, key: &str) -> Option<String> {
    match object.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn number_field(object: &Value, key: &str) -> Option<f64> {
    match object.get(key)? {
        Value::Number(n) => n.as_f64(),
        // Models like to answer "$1,250,000.00" or "USD 1,000 (approx.)"
        Value::String(s) => s
            .replace([',', '$'], "")
            .split(|c: char| !(c.is_ascii_digit() || c == '.'))
            .find(|token| token.starts_with(|c: char| c.is_ascii_digit()))?
            .trim_end_matches('.')
            .parse()
            .ok(),
        _ => None,
    }
}

/// Parse the metadata JSON returned by the model
pub fn parse_metadata_response(response: &str) -> Result<ExtractedMetadata> {
    let json = json_object_slice(response).context("No JSON object in metadata response")?;
    let object: Value = serde_json::from_str(json).context("Metadata response is not valid JSON")?;
    if !object.is_object() {
        return Err(anyhow::anyhow!("Metadata response is not a JSON object"));
    }

    let text_or_unknown =
        |key: &str| string_field(&object, key).unwrap_or_else(|| UNKNOWN.to_string());

    Ok(ExtractedMetadata {
        contract_name: text_or_unknown("contract_name"),
        contract_number: text_or_unknown("contract_number"),
        party_a: text_or_unknown("party_a"),
        party_b: text_or_unknown("party_b"),
        start_date: string_field(&object, "start_date"),
        end_date: string_field(&object, "end_date"),
        contract_value: number_field(&object, "contract_value"),
        currency: string_field(&object, "currency").unwrap_or_else(|| "USD".to_string()),
    })
}

/// Overall risk of a contract
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    /// Most severe of critical, high and medium mentioned anywhere in `text`;
    /// low when none is
    fn mentioned_in(text: &str) -> RiskLevel {
        let lower = text.to_lowercase();
        [
            ("critical", RiskLevel::Critical),
            ("high", RiskLevel::High),
            ("medium", RiskLevel::Medium),
        ]
        .into_iter()
        .find(|(word, _)| lower.contains(word))
        .map_or(RiskLevel::Low, |(_, level)| level)
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub level: RiskLevel,
    /// One-line reason, at most 150 characters
    pub reason: String,
    /// The model's full answer
    pub analysis: String,
}

/// Value following `label` (ASCII case-insensitive) on its line, or on the next non-empty line
fn labelled_value<'a>(response: &'a str, label: &str) -> Option<&'a str> {
    let mut lines = response.lines();
    for line in lines.by_ref() {
        let Some(pos) = line.to_ascii_lowercase().find(label) else {
            continue;
        };
        let rest = line[pos + label.len()..].trim();
        if !rest.is_empty() {
            return Some(rest);
        }
        return lines.map(str::trim).find(|l| !l.is_empty());
    }
    None
}

/// Parse a risk answer in the `RISK LEVEL:` / `PRIMARY REASON:` format
pub fn parse_risk_response(response: &str) -> RiskAssessment {
    // The whole answer is scanned, not just the RISK LEVEL line
    let level = RiskLevel::mentioned_in(response);

    let reason = labelled_value(response, "primary reason:")
        .map(str::to_string)
        .or_else(|| {
            response
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .nth(1)
                .map(str::to_string)
        })
        .unwrap_or_else(|| DEFAULT_REASON.to_string());

    let reason = if reason.chars().count() > MAX_REASON_CHARS {
        truncate_chars(&reason, MAX_REASON_CHARS - 3, true)
    } else {
        reason
    };

    RiskAssessment {
        level,
        reason,
        analysis: response.to_string(),
    }
}

pub async fn generate_summary<G: TextGenerator>(generator: &G, contract_text: &str) -> Result<String> {
    generator.generate(&summary_prompt(contract_text)).await
}

pub async fn extract_key_clauses<G: TextGenerator>(
    generator: &G,
    contract_text: &str,
) -> Result<String> {
    generator.generate(&key_clauses_prompt(contract_text)).await
}

/// Extract metadata, falling back to placeholders when the model or its answer fails
pub async fn extract_metadata<G: TextGenerator>(generator: &G, contract_text: &str) -> ExtractedMetadata {
    let response = match generator.generate(&metadata_prompt(contract_text)).await {
        Ok(response) => response,
        Err(e) => {
            error!("Metadata extraction request failed: {:#}", e);
            return ExtractedMetadata::fallback();
        }
    };
    debug!("Metadata response: {}", truncate_chars(&response, 200, true));

    parse_metadata_response(&response).unwrap_or_else(|e| {
        error!("Could not parse metadata response: {:#}", e);
        ExtractedMetadata::fallback()
    })
}

pub async fn assess_risk<G: TextGenerator>(generator: &G, contract_text: &str) -> Result<RiskAssessment> {
    let response = generator.generate(&risk_prompt(contract_text)).await?;
    Ok(parse_risk_response(&response))
}

/// Everything the analysis prompts produce for one contract
#[derive(Debug, Clone, Serialize)]
pub struct ContractAnalysis {
    pub metadata: ExtractedMetadata,
    pub summary: String,
    pub key_clauses: String,
    pub risk: RiskAssessment,
}

/// Run all analyses for a contract, one prompt after another
pub async fn analyze_contract<G: TextGenerator>(
    generator: &G,
    contract_text: &str,
) -> Result<ContractAnalysis> {
    let metadata = extract_metadata(generator, contract_text).await;
    let summary = generate_summary(generator, contract_text)
        .await
        .context("Failed to generate summary")?;
    let key_clauses = extract_key_clauses(generator, contract_text)
        .await
        .context("Failed to extract key clauses")?;
    let risk = assess_risk(generator, contract_text)
        .await
        .context("Failed to assess risk")?;

    Ok(ContractAnalysis {
        metadata,
        summary,
        key_clauses,
        risk,
    })
}
