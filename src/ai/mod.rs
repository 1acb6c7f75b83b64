//! Optional external assessor.
//!
//! Posts the input (excerpt) and the current report to an OpenAI-compatible
//! chat-completion endpoint and validates the model's recommendation. The
//! integration contract is escalation-only and fail-open toward the base
//! decision: every failure mode (timeout, network error, HTTP error,
//! missing content, unparseable JSON, bogus verdict) collapses to
//! `invalid_response`, which the pipeline records but never lets touch the
//! decision.

use std::time::Duration;

use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::config::AiConfig;
use crate::error::GatewayError;
use crate::report::{AiAssessment, AiVerdict, Report};
use crate::sanitize::sanitize_error_message;

/// Max characters of input text embedded in the assessment prompt.
const PROMPT_INPUT_CHARS: usize = 3000;

/// Outcome of one assessment attempt.
#[derive(Debug)]
pub enum AiOutcome {
    /// Assessor disabled or not fully configured; `Some` carries the
    /// reason when it was supposed to run.
    Skipped(Option<String>),
    /// An assessment was produced (its verdict may be `invalid_response`).
    Completed(AiAssessment),
}

/// Client for the external assessor endpoint.
pub struct AiAssessor {
    config: AiConfig,
    client: reqwest::Client,
}

impl AiAssessor {
    pub fn new(config: &AiConfig) -> Result<Self, GatewayError> {
        let timeout = Duration::from_secs(config.timeout_s.clamp(1, 120));
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Ai(format!("cannot build http client: {e}")))?;
        Ok(Self {
            config: config.clone(),
            client,
        })
    }

    /// Ask the external assessor to review one scan.
    pub async fn assess(&self, raw_text: &str, report: &Report) -> AiOutcome {
        if !self.config.enabled {
            return AiOutcome::Skipped(None);
        }
        if self.config.endpoint.trim().is_empty()
            || self.config.api_key.trim().is_empty()
            || self.config.model.trim().is_empty()
        {
            return AiOutcome::Skipped(Some(
                "ai enabled but endpoint/api_key/model is missing".to_string(),
            ));
        }

        let report_json = match serde_json::to_string(report) {
            Ok(json) => json,
            Err(e) => {
                return AiOutcome::Completed(AiAssessment::invalid(format!(
                    "cannot serialize report for prompt: {e}"
                )))
            }
        };
        let excerpt: String = raw_text.chars().take(PROMPT_INPUT_CHARS).collect();
        let prompt = format!(
            "You are a security validator. Return strict JSON with keys \
             recommended_decision (allow|warn|block), confidence (0-1), explanation. \
             Input: {excerpt}\nCurrent report: {report_json}"
        );
        let payload = json!({
            "model": self.config.model,
            "messages": [{"role": "user", "content": prompt}],
            "temperature": 0,
        });

        debug!(endpoint = %self.config.endpoint, model = %self.config.model, "assessing input");
        let response = match self
            .client
            .post(&self.config.endpoint)
            .bearer_auth(&self.config.api_key)
            .json(&payload)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) if e.is_timeout() => {
                warn!("ai assessment timed out");
                return AiOutcome::Completed(AiAssessment::invalid(format!(
                    "request timed out after {}s",
                    self.config.timeout_s
                )));
            }
            Err(e) => {
                return AiOutcome::Completed(AiAssessment::invalid(sanitize_error_message(
                    &format!("network error: {e}"),
                )))
            }
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail: String = body.chars().take(300).collect();
            return AiOutcome::Completed(AiAssessment::invalid(sanitize_error_message(
                &format!("HTTP {status}: {detail}"),
            )));
        }

        match response.json::<Value>().await {
            Ok(body) => AiOutcome::Completed(interpret_body(&body)),
            Err(e) => AiOutcome::Completed(AiAssessment::invalid(format!(
                "response body was not JSON: {e}"
            ))),
        }
    }
}

/// Validate a chat-completion response body into an assessment.
fn interpret_body(body: &Value) -> AiAssessment {
    let Some(content) = extract_content(body) else {
        return AiAssessment::invalid("response content was missing or invalid");
    };
    let Some(parsed) = parse_model_json(&content) else {
        return AiAssessment::invalid("response content was not valid JSON");
    };

    let recommended = parsed
        .get("recommended_decision")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    let verdict = match recommended.as_str() {
        "allow" => AiVerdict::Allow,
        "warn" => AiVerdict::Warn,
        "block" => AiVerdict::Block,
        _ => return AiAssessment::invalid("recommended_decision was missing or invalid"),
    };

    let confidence = parsed
        .get("confidence")
        .and_then(Value::as_f64)
        .unwrap_or(0.5)
        .clamp(0.0, 1.0);
    let raw_reason = parsed
        .get("explanation")
        .and_then(Value::as_str)
        .unwrap_or("No explanation.")
        .to_string();

    AiAssessment {
        verdict,
        confidence,
        raw_reason,
    }
}

/// Pull the assistant message content out of `choices[0]`; string content
/// or a list of `{text}` blocks.
fn extract_content(body: &Value) -> Option<String> {
    let content = body.get("choices")?.get(0)?.get("message")?.get("content")?;
    match content {
        Value::String(text) => Some(text.clone()),
        Value::Array(blocks) => {
            let parts: Vec<&str> = blocks
                .iter()
                .filter_map(|b| b.get("text").and_then(Value::as_str))
                .collect();
            if parts.is_empty() {
                None
            } else {
                Some(parts.join("\n"))
            }
        }
        _ => None,
    }
}

fn strip_code_fence(text: &str) -> &str {
    let value = text.trim();
    if value.starts_with("```") && value.ends_with("```") {
        let lines: Vec<&str> = value.lines().collect();
        if lines.len() >= 3 {
            let inner_start = value.find('\n').map(|i| i + 1).unwrap_or(0);
            let inner_end = value.rfind('\n').unwrap_or(value.len());
            if inner_start <= inner_end {
                return value[inner_start..inner_end].trim();
            }
        }
    }
    value
}

/// Models wrap their JSON in fences or prose; try the cleaned text first,
/// then the outermost brace span.
fn parse_model_json(content: &str) -> Option<Value> {
    let cleaned = strip_code_fence(content);
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(cleaned) {
        return Some(Value::Object(map));
    }
    let start = cleaned.find('{')?;
    let end = cleaned.rfind('}')?;
    if end <= start {
        return None;
    }
    match serde_json::from_str::<Value>(&cleaned[start..=end]) {
        Ok(Value::Object(map)) => Some(Value::Object(map)),
        _ => None,
    }
}
