//! Database schema and types

use crate::state_machine::{IntakeRecord, Severity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// SQL schema for initialization
pub const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS assessments (
    id TEXT PRIMARY KEY,
    primary_complaint TEXT NOT NULL,
    symptoms TEXT NOT NULL,
    duration TEXT NOT NULL,
    severity TEXT NOT NULL,
    age_range TEXT NOT NULL,
    possible_conditions TEXT NOT NULL,
    recommendations TEXT NOT NULL,
    notes TEXT NOT NULL DEFAULT '',
    chat_history TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_assessments_created ON assessments(created_at DESC);
";

// ============================================================================
// Transcript
// ============================================================================

/// Who wrote a transcript entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    Bot,
    User,
}

/// One transcript entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    pub fn bot(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Bot,
            text: text.into(),
            created_at: Utc::now(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            text: text.into(),
            created_at: Utc::now(),
        }
    }
}

// ============================================================================
// Assessment Result
// ============================================================================

/// Model confidence in a possible condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase", from = "Option<String>")]
pub enum Confidence {
    High,
    Medium,
    #[default]
    Low,
}

impl From<Option<String>> for Confidence {
    /// Models answer with free text like "High" or "medium/low", or null; normalize it
    fn from(value: Option<String>) -> Self {
        let lower = value.unwrap_or_default().to_lowercase();
        if lower.contains("high") {
            Confidence::High
        } else if lower.contains("medium") || lower.contains("moderate") {
            Confidence::Medium
        } else {
            Confidence::Low
        }
    }
}

/// A condition the assessment considers possible
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PossibleCondition {
    #[serde(default, deserialize_with = "null_as_default")]
    pub condition: String,
    #[serde(default)]
    pub confidence: Confidence,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
}

/// Structured output of the assessment service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct AssessmentResult {
    #[serde(default, deserialize_with = "null_as_default")]
    pub possible_conditions: Vec<PossibleCondition>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub recommendations: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub notes: String,
}

/// Treat an explicit `null` the same as a missing field
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// ============================================================================
// Assessment Record
// ============================================================================

/// Archived assessment: intake, result and transcript snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssessmentRecord {
    pub id: String,
    pub primary_complaint: String,
    pub symptoms: Vec<String>,
    pub duration: String,
    pub severity: Severity,
    pub age_range: String,
    pub possible_conditions: Vec<PossibleCondition>,
    pub recommendations: Vec<String>,
    pub notes: String,
    pub chat_history: Vec<ChatMessage>,
    pub created_at: DateTime<Utc>,
}

impl AssessmentRecord {
    pub fn new(
        id: impl Into<String>,
        intake: &IntakeRecord,
        result: AssessmentResult,
        chat_history: Vec<ChatMessage>,
    ) -> Self {
        Self {
            id: id.into(),
            primary_complaint: intake.primary_complaint.clone(),
            symptoms: intake.symptoms.clone(),
            duration: intake.duration.clone(),
            severity: intake.severity_or_default(),
            age_range: intake.age_range.clone(),
            possible_conditions: result.possible_conditions,
            recommendations: result.recommendations,
            notes: result.notes,
            chat_history,
            created_at: Utc::now(),
        }
    }
}
