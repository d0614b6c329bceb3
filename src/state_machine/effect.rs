//! Effects produced by state transitions

use crate::db::AssessmentResult;
use crate::state_machine::state::IntakeRecord;

/// Effects to be executed after state transition
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Append a user message to the transcript
    AppendUserMessage { text: String },

    /// Show the typing indicator, pause, then append a bot message
    BotReply { text: String },

    /// Replace the offered quick replies (empty clears them)
    SetQuickReplies { options: Vec<String> },

    /// Call the assessment service (spawns as background task)
    RequestAssessment { intake: IntakeRecord },

    /// Abort the outstanding assessment request
    AbortAssessment,

    /// Merge the result with the transcript snapshot, archive and expose it
    RecordAssessment {
        intake: IntakeRecord,
        result: AssessmentResult,
    },

    /// Replace the transcript with a single greeting and drop the held assessment
    ResetTranscript { greeting: String },

    /// Notify connected clients that the step changed
    NotifyStep,
}

impl Effect {
    pub fn bot(text: impl Into<String>) -> Self {
        Effect::BotReply { text: text.into() }
    }

    pub fn quick_replies(options: &[&str]) -> Self {
        Effect::SetQuickReplies {
            options: options.iter().map(|s| (*s).to_string()).collect(),
        }
    }

    pub fn clear_quick_replies() -> Self {
        Effect::SetQuickReplies { options: vec![] }
    }

    /// Bot message text, if this effect delivers one
    #[cfg(test)]
    pub fn bot_text(&self) -> Option<&str> {
        match self {
            Effect::BotReply { text } => Some(text),
            _ => None,
        }
    }
}
