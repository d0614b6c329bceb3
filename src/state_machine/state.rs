//! Conversation state types

use serde::{Deserialize, Serialize};

// ============================================================================
// Intake Steps
// ============================================================================

/// Step of the scripted intake conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    /// Waiting for the primary complaint
    #[default]
    Greeting,
    /// Waiting for how long the symptom has lasted
    Duration,
    /// Waiting for a severity rating
    Severity,
    /// Waiting for additional symptoms, then assessing
    AdditionalSymptoms,
    /// Assessment delivered; only meta actions remain
    Complete,
}

impl Step {
    pub fn as_str(self) -> &'static str {
        match self {
            Step::Greeting => "greeting",
            Step::Duration => "duration",
            Step::Severity => "severity",
            Step::AdditionalSymptoms => "additional_symptoms",
            Step::Complete => "complete",
        }
    }
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Severity
// ============================================================================

/// Severity band derived from the 1-10 rating quick reply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Mild,
    Moderate,
    Severe,
    Emergency,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Mild => "mild",
            Severity::Moderate => "moderate",
            Severity::Severe => "severe",
            Severity::Emergency => "emergency",
        }
    }

    /// Parse the stored form back into a band. Unknown text is treated as mild.
    pub fn from_stored(s: &str) -> Self {
        match s {
            "moderate" => Severity::Moderate,
            "severe" => Severity::Severe,
            "emergency" => Severity::Emergency,
            _ => Severity::Mild,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Map raw severity text to a band.
///
/// Substring match on the quick-reply labels, checked in the order
/// `4-6`, `7-8`, `9-10`; everything else is mild.
pub fn map_severity(input: &str) -> Severity {
    if input.contains("4-6") {
        Severity::Moderate
    } else if input.contains("7-8") {
        Severity::Severe
    } else if input.contains("9-10") {
        Severity::Emergency
    } else {
        Severity::Mild
    }
}

// ============================================================================
// Intake Record
// ============================================================================

/// Default age range; not collected interactively
pub const DEFAULT_AGE_RANGE: &str = "adult";

/// Structured data collected from the user before the assessment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntakeRecord {
    pub primary_complaint: String,
    pub symptoms: Vec<String>,
    pub duration: String,
    pub severity: Option<Severity>,
    pub age_range: String,
}

impl Default for IntakeRecord {
    fn default() -> Self {
        Self {
            primary_complaint: String::new(),
            symptoms: Vec::new(),
            duration: String::new(),
            severity: None,
            age_range: DEFAULT_AGE_RANGE.to_string(),
        }
    }
}

impl IntakeRecord {
    /// Rebuild the symptom list from the primary complaint and one addition
    pub fn with_additional_symptoms(mut self, additional: &str) -> Self {
        self.symptoms = [self.primary_complaint.as_str(), additional]
            .into_iter()
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();
        self
    }

    /// Severity as stored and sent to the model (mild when never rated)
    pub fn severity_or_default(&self) -> Severity {
        self.severity.unwrap_or(Severity::Mild)
    }
}

// ============================================================================
// Conversation State
// ============================================================================

/// Where the assessment call stands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AssessmentPhase {
    /// No assessment call outstanding
    #[default]
    Idle,
    /// Assessment request in flight
    Assessing,
    /// Assessment failed; the session only continues after a reset
    Stalled,
}

/// Conversation state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ConvState {
    pub step: Step,
    pub intake: IntakeRecord,
    pub phase: AssessmentPhase,
}

impl ConvState {
    /// Check if an assessment request is outstanding
    pub fn is_assessing(&self) -> bool {
        self.phase == AssessmentPhase::Assessing
    }
}
