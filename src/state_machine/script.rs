//! Canned bot messages and quick-reply sets for the intake script

pub const WELCOME: &str = "Hello! I'm HealthCheck AI, your symptom assessment assistant. \
I'll ask you some questions about your symptoms to provide general guidance. \
Remember, this is not a substitute for professional medical advice. \
What's your main concern or symptom today?";

pub const RESTART_GREETING: &str =
    "Let's start fresh! What's your main concern or symptom today?";

pub const ASK_DURATION: &str = "Thank you for sharing that. \
Can you tell me how long you've been experiencing this symptom?";

pub const ASK_SEVERITY: &str = "On a scale of 1-10, how would you rate the severity of your \
symptoms, where 1 is very mild and 10 is extremely severe?";

pub const EMERGENCY_WARNING: &str = "\u{26a0}\u{fe0f} Based on your severity rating, you should \
seek immediate medical attention. Please call emergency services (911) or go to the nearest \
emergency room right away. The assessment below is for additional information only.";

pub const ASK_ADDITIONAL_SYMPTOMS: &str = "Could you describe any additional symptoms you're \
experiencing? This will help me provide a more accurate assessment.";

pub const ASSESSMENT_COMPLETE: &str = "I've completed your symptom assessment. Please review \
the results below and remember to consult with a healthcare professional for proper diagnosis \
and treatment.";

pub const ASSESSMENT_UNAVAILABLE: &str = "I apologize, but I'm having trouble processing your \
symptoms right now. For your safety, please consider contacting a healthcare provider directly \
or calling emergency services if you have serious symptoms.";

pub const ALREADY_ASSESSED: &str = "I've already provided your assessment above. Would you \
like to start a new symptom check or do you have questions about the results?";

pub const EMERGENCY_CONTACTS: &str = "If you think you may be having a medical emergency, call \
911 (or your local emergency number) immediately. For poison emergencies in the US, call Poison \
Control at 1-800-222-1222. If you are in crisis or having thoughts of self-harm, call or text \
988 to reach the Suicide & Crisis Lifeline.";

pub const MEDICAL_DISCLAIMER: &str = "HealthCheck AI provides general information only and is \
not a substitute for professional medical advice, diagnosis, or treatment. Always seek the \
advice of a physician or other qualified health provider with any questions you may have \
about a medical condition.";

pub const ASSESSMENT_SAVED: &str = "Your assessment has been saved to your history. You can \
review it there at any time.";

pub const DURATION_OPTIONS: &[&str] = &[
    "A few hours",
    "1-2 days",
    "A week",
    "More than a week",
    "Several weeks",
];

pub const SEVERITY_OPTIONS: &[&str] = &[
    "1-3 (Mild)",
    "4-6 (Moderate)",
    "7-8 (Severe)",
    "9-10 (Emergency)",
];

pub const POST_ASSESSMENT_OPTIONS: &[&str] = &[
    "Start new check",
    "Save this assessment",
    "Emergency contacts",
];

pub const META_OPTIONS: &[&str] = &["Start new check", "Emergency contacts", "Medical disclaimer"];

/// Actions offered once the assessment is delivered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetaAction {
    StartNewCheck,
    SaveAssessment,
    EmergencyContacts,
    MedicalDisclaimer,
}

impl MetaAction {
    /// Match input against the quick-reply labels, ignoring case
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().to_lowercase().as_str() {
            "start new check" => Some(MetaAction::StartNewCheck),
            "save this assessment" => Some(MetaAction::SaveAssessment),
            "emergency contacts" => Some(MetaAction::EmergencyContacts),
            "medical disclaimer" => Some(MetaAction::MedicalDisclaimer),
            _ => None,
        }
    }
}
