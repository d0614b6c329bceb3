//! Pure state transition function
//!
//! Given the same state and event this always produces the same new state
//! and effects; all I/O happens in the runtime.

use super::script::{self, MetaAction};
use super::state::{map_severity, AssessmentPhase, Severity, Step};
use super::{ConvState, Effect, Event};
use crate::db::AssessmentResult;
use thiserror::Error;

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: ConvState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: ConvState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    pub fn with_effects(mut self, effects: impl IntoIterator<Item = Effect>) -> Self {
        self.effects.extend(effects);
        self
    }
}

/// Errors that can occur during transition
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("Assistant is busy preparing your assessment")]
    Busy,
    #[error("Assessment is unavailable for this session; start a new check")]
    AssessmentUnavailable,
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
}

/// Pure transition function
pub fn transition(state: &ConvState, event: Event) -> Result<TransitionResult, TransitionError> {
    match (state, event) {
        // ============================================================
        // User Input
        // ============================================================
        (state, Event::UserInput { text } | Event::QuickReply { text }) => {
            handle_input(state, &text)
        }

        // ============================================================
        // Session Reset (callable from any state)
        // ============================================================
        (state, Event::Reset) => Ok(reset(state)),

        // ============================================================
        // Assessment Outcome
        // ============================================================

        // Assessing + AssessmentReady -> Complete
        (state, Event::AssessmentReady { result }) if state.is_assessing() => {
            Ok(assessment_ready(state, result))
        }

        // Assessing + AssessmentFailed -> Stalled, step unchanged
        (state, Event::AssessmentFailed { .. }) if state.is_assessing() => {
            let new_state = ConvState {
                phase: AssessmentPhase::Stalled,
                ..state.clone()
            };
            Ok(TransitionResult::new(new_state)
                .with_effect(Effect::bot(script::ASSESSMENT_UNAVAILABLE)))
        }

        // ============================================================
        // Invalid Transitions
        // ============================================================
        (state, event) => Err(TransitionError::InvalidTransition(format!(
            "No transition from {:?}/{:?} with event {event:?}",
            state.step, state.phase
        ))),
    }
}

fn handle_input(state: &ConvState, raw: &str) -> Result<TransitionResult, TransitionError> {
    let text = raw.trim();

    // Blank input is ignored outright: no transcript entry, no transition
    if text.is_empty() {
        return Ok(TransitionResult::new(state.clone()));
    }

    match state.phase {
        AssessmentPhase::Assessing => return Err(TransitionError::Busy),
        AssessmentPhase::Stalled => return Err(TransitionError::AssessmentUnavailable),
        AssessmentPhase::Idle => {}
    }

    if state.step == Step::Complete && MetaAction::parse(text) == Some(MetaAction::StartNewCheck) {
        return Ok(reset(state));
    }

    let mut next = state.clone();
    let mut effects = vec![
        Effect::AppendUserMessage {
            text: text.to_string(),
        },
        Effect::clear_quick_replies(),
    ];

    match state.step {
        Step::Greeting => {
            next.intake.primary_complaint = text.to_string();
            next.step = Step::Duration;
            effects.push(Effect::bot(script::ASK_DURATION));
            effects.push(Effect::quick_replies(script::DURATION_OPTIONS));
        }

        Step::Duration => {
            next.intake.duration = text.to_string();
            next.step = Step::Severity;
            effects.push(Effect::bot(script::ASK_SEVERITY));
            effects.push(Effect::quick_replies(script::SEVERITY_OPTIONS));
        }

        Step::Severity => {
            let severity = map_severity(text);
            next.intake.severity = Some(severity);
            next.step = Step::AdditionalSymptoms;
            if severity == Severity::Emergency {
                effects.push(Effect::bot(script::EMERGENCY_WARNING));
            }
            effects.push(Effect::bot(script::ASK_ADDITIONAL_SYMPTOMS));
        }

        Step::AdditionalSymptoms => {
            next.intake = state.intake.clone().with_additional_symptoms(text);
            next.phase = AssessmentPhase::Assessing;
            effects.push(Effect::RequestAssessment {
                intake: next.intake.clone(),
            });
        }

        Step::Complete => {
            let reply = match MetaAction::parse(text) {
                Some(MetaAction::EmergencyContacts) => script::EMERGENCY_CONTACTS,
                Some(MetaAction::MedicalDisclaimer) => script::MEDICAL_DISCLAIMER,
                Some(MetaAction::SaveAssessment) => script::ASSESSMENT_SAVED,
                Some(MetaAction::StartNewCheck) | None => script::ALREADY_ASSESSED,
            };
            effects.push(Effect::bot(reply));
            effects.push(Effect::quick_replies(script::META_OPTIONS));
        }
    }

    if next.step != state.step {
        effects.push(Effect::NotifyStep);
    }

    Ok(TransitionResult::new(next).with_effects(effects))
}

fn assessment_ready(state: &ConvState, result: AssessmentResult) -> TransitionResult {
    let new_state = ConvState {
        step: Step::Complete,
        intake: state.intake.clone(),
        phase: AssessmentPhase::Idle,
    };

    TransitionResult::new(new_state)
        .with_effect(Effect::RecordAssessment {
            intake: state.intake.clone(),
            result,
        })
        .with_effect(Effect::bot(script::ASSESSMENT_COMPLETE))
        .with_effect(Effect::quick_replies(script::POST_ASSESSMENT_OPTIONS))
        .with_effect(Effect::NotifyStep)
}

fn reset(state: &ConvState) -> TransitionResult {
    let mut result = TransitionResult::new(ConvState::default());
    if state.is_assessing() {
        result = result.with_effect(Effect::AbortAssessment);
    }
    result.with_effects([
        Effect::ResetTranscript {
            greeting: script::RESTART_GREETING.to_string(),
        },
        Effect::clear_quick_replies(),
        Effect::NotifyStep,
    ])
}
