//! Events that can occur in a session

use crate::db::AssessmentResult;
use crate::llm::LlmErrorKind;

/// Events that trigger state transitions
#[derive(Debug, Clone)]
pub enum Event {
    // User events
    /// Free text typed by the user
    UserInput { text: String },
    /// A suggested quick reply was selected
    QuickReply { text: String },
    /// Start over from the greeting
    Reset,

    // Assessment service events
    AssessmentReady { result: AssessmentResult },
    AssessmentFailed {
        message: String,
        error_kind: LlmErrorKind,
    },
}

impl Event {
    pub fn user_input(text: impl Into<String>) -> Self {
        Event::UserInput { text: text.into() }
    }

    pub fn quick_reply(text: impl Into<String>) -> Self {
        Event::QuickReply { text: text.into() }
    }

    /// Text supplied by the user, if this is a user input event
    pub fn input_text(&self) -> Option<&str> {
        match self {
            Event::UserInput { text } | Event::QuickReply { text } => Some(text),
            _ => None,
        }
    }
}
