//! Assessment generation
//!
//! Turns a completed intake into a structured assessment by asking the model
//! to fill in a forced `record_assessment` tool.

use crate::db::AssessmentResult;
use crate::llm::{
    LlmError, LlmMessage, LlmRequest, LlmResponse, ModelRegistry, SystemContent, ToolDefinition,
};
use crate::runtime::AssessmentClient;
use crate::state_machine::IntakeRecord;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

pub const ASSESSMENT_TOOL: &str = "record_assessment";

pub const DEFAULT_ASSESSMENT_TIMEOUT: Duration = Duration::from_secs(60);

const MAX_TOKENS: u32 = 2048;

const SYSTEM_PROMPT: &str = "You are a medical AI assistant providing symptom assessment. \
You give helpful but general guidance only and never a diagnosis.";

/// Build the user prompt for an intake
pub fn build_prompt(intake: &IntakeRecord) -> String {
    format!(
        "Based on the following information, provide an assessment.

Primary symptoms: {symptoms}
Duration: {duration}
Severity: {severity}

Please provide:
1. Up to 3 possible conditions that could match these symptoms (with confidence levels high, medium or low)
2. Appropriate recommendations for next steps
3. Any red flags that require immediate attention, in the notes

Remember to:
- Be conservative in assessments
- Always recommend consulting healthcare professionals
- Identify serious symptoms that need immediate attention
- Provide helpful but general guidance only

Record your answer with the {ASSESSMENT_TOOL} tool.",
        symptoms = intake.symptoms.join(", "),
        duration = intake.duration,
        severity = intake.severity_or_default(),
    )
}

/// JSON schema of the structured answer
pub fn assessment_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "possible_conditions": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "condition": { "type": "string" },
                        "confidence": { "type": "string", "enum": ["high", "medium", "low"] },
                        "description": { "type": "string" }
                    },
                    "required": ["condition", "confidence", "description"]
                }
            },
            "recommendations": {
                "type": "array",
                "items": { "type": "string" }
            },
            "notes": { "type": "string" }
        },
        "required": ["possible_conditions", "recommendations"]
    })
}

/// Build the complete model request for an intake
pub fn build_request(intake: &IntakeRecord) -> LlmRequest {
    LlmRequest {
        system: vec![SystemContent::new(SYSTEM_PROMPT)],
        messages: vec![LlmMessage::user(build_prompt(intake))],
        tools: vec![ToolDefinition {
            name: ASSESSMENT_TOOL.to_string(),
            description: "Record the structured symptom assessment".to_string(),
            input_schema: assessment_schema(),
        }],
        tool_choice: Some(ASSESSMENT_TOOL.to_string()),
        max_tokens: Some(MAX_TOKENS),
    }
}

/// Extract the structured answer from a model response
///
/// Prefers the forced tool call; falls back to a JSON object in the text,
/// optionally wrapped in a markdown fence.
pub fn parse_response(response: &LlmResponse) -> Result<AssessmentResult, LlmError> {
    if let Some(input) = response.tool_input(ASSESSMENT_TOOL) {
        return serde_json::from_value(input.clone())
            .map_err(|e| LlmError::invalid_response(format!("Malformed tool input: {e}")));
    }

    let text = response.text();
    let body = strip_code_fence(&text);
    if body.is_empty() {
        return Err(LlmError::invalid_response("Response contained no assessment"));
    }

    serde_json::from_str(body)
        .map_err(|e| LlmError::invalid_response(format!("Response is not valid JSON: {e}")))
}

fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop an optional language tag on the opening line
    let rest = rest.split_once('\n').map_or(rest, |(_, body)| body);
    rest.trim_end().trim_end_matches("```").trim()
}

/// Production assessment client backed by the model registry
pub struct LlmAssessmentClient {
    registry: Arc<ModelRegistry>,
    timeout: Duration,
}

impl LlmAssessmentClient {
    pub fn new(registry: Arc<ModelRegistry>, timeout: Duration) -> Self {
        Self { registry, timeout }
    }
}

#[async_trait]
impl AssessmentClient for LlmAssessmentClient {
    async fn assess(&self, intake: &IntakeRecord) -> Result<AssessmentResult, LlmError> {
        let llm = self
            .registry
            .default()
            .ok_or_else(|| LlmError::network("No LLM available"))?;

        let request = build_request(intake);
        let response = timeout(self.timeout, llm.complete(&request))
            .await
            .map_err(|_| {
                LlmError::network(format!(
                    "Assessment timed out after {}s",
                    self.timeout.as_secs()
                ))
            })??;

        parse_response(&response)
    }
}
