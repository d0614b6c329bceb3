//! Property-based tests for the state machine
//!
//! These tests verify key invariants hold across all possible inputs.

use super::script;
use super::state::*;
use super::transition::*;
use super::*;
use crate::db::{AssessmentResult, Confidence, PossibleCondition};
use crate::llm::LlmErrorKind;
use proptest::prelude::*;

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_confidence() -> impl Strategy<Value = Confidence> {
    prop_oneof![
        Just(Confidence::High),
        Just(Confidence::Medium),
        Just(Confidence::Low),
    ]
}

fn arb_assessment_result() -> impl Strategy<Value = AssessmentResult> {
    (
        proptest::collection::vec(
            ("[A-Za-z ]{1,20}", arb_confidence(), "[a-z ]{0,40}").prop_map(
                |(condition, confidence, description)| PossibleCondition {
                    condition,
                    confidence,
                    description,
                },
            ),
            0..4,
        ),
        proptest::collection::vec("[a-zA-Z ]{1,30}", 0..3),
        "[a-z ]{0,30}",
    )
        .prop_map(|(possible_conditions, recommendations, notes)| AssessmentResult {
            possible_conditions,
            recommendations,
            notes,
        })
}

fn arb_error_kind() -> impl Strategy<Value = LlmErrorKind> {
    prop_oneof![
        Just(LlmErrorKind::Network),
        Just(LlmErrorKind::RateLimit),
        Just(LlmErrorKind::ServerError),
        Just(LlmErrorKind::Auth),
        Just(LlmErrorKind::InvalidRequest),
        Just(LlmErrorKind::InvalidResponse),
        Just(LlmErrorKind::Unknown),
    ]
}

fn arb_text() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-zA-Z0-9 ]{0,30}",
        "[ \t]{0,4}",
        proptest::sample::select(
            script::DURATION_OPTIONS
                .iter()
                .chain(script::SEVERITY_OPTIONS)
                .chain(script::META_OPTIONS)
                .chain(script::POST_ASSESSMENT_OPTIONS)
                .map(|s| (*s).to_string())
                .collect::<Vec<_>>()
        ),
    ]
}

fn arb_step() -> impl Strategy<Value = Step> {
    prop_oneof![
        Just(Step::Greeting),
        Just(Step::Duration),
        Just(Step::Severity),
        Just(Step::AdditionalSymptoms),
        Just(Step::Complete),
    ]
}

fn arb_phase() -> impl Strategy<Value = AssessmentPhase> {
    prop_oneof![
        Just(AssessmentPhase::Idle),
        Just(AssessmentPhase::Assessing),
        Just(AssessmentPhase::Stalled),
    ]
}

fn arb_state() -> impl Strategy<Value = ConvState> {
    (arb_step(), arb_phase(), "[a-z ]{0,15}", "[a-z ]{0,15}").prop_map(
        |(step, phase, primary_complaint, duration)| ConvState {
            step,
            intake: IntakeRecord {
                primary_complaint,
                duration,
                ..IntakeRecord::default()
            },
            phase,
        },
    )
}

fn arb_user_event() -> impl Strategy<Value = Event> {
    prop_oneof![
        arb_text().prop_map(Event::user_input),
        arb_text().prop_map(Event::quick_reply),
    ]
}

fn arb_event() -> impl Strategy<Value = Event> {
    prop_oneof![
        6 => arb_user_event(),
        1 => Just(Event::Reset),
        2 => arb_assessment_result().prop_map(|result| Event::AssessmentReady { result }),
        1 => ("[a-z ]{1,20}", arb_error_kind()).prop_map(|(message, error_kind)| {
            Event::AssessmentFailed { message, error_kind }
        }),
    ]
}

// ============================================================================
// Helpers
// ============================================================================

fn bot_texts(effects: &[Effect]) -> Vec<&str> {
    effects.iter().filter_map(Effect::bot_text).collect()
}

/// Run events from a state, collecting every successful transition's output
fn run(start: ConvState, events: &[Event]) -> (ConvState, Vec<Vec<Effect>>) {
    let mut state = start;
    let mut outputs = Vec::new();
    for event in events {
        if let Ok(result) = transition(&state, event.clone()) {
            state = result.new_state;
            outputs.push(result.effects);
        }
    }
    (state, outputs)
}

fn effects_are_valid(effects: &[Effect], new_state: &ConvState) -> bool {
    let has_request = effects
        .iter()
        .any(|e| matches!(e, Effect::RequestAssessment { .. }));
    let has_record = effects
        .iter()
        .any(|e| matches!(e, Effect::RecordAssessment { .. }));

    // RequestAssessment only when entering the assessing phase
    if has_request && !new_state.is_assessing() {
        return false;
    }

    // RecordAssessment only when the intake completes
    if has_record && new_state.step != Step::Complete {
        return false;
    }

    true
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    // Any non-empty greeting input moves to duration with the trimmed complaint
    #[test]
    fn prop_greeting_records_trimmed_complaint(text in "[ ]{0,3}[a-zA-Z0-9][a-zA-Z0-9 ]{0,30}") {
        let result = transition(&ConvState::default(), Event::user_input(text.clone())).unwrap();
        prop_assert_eq!(result.new_state.step, Step::Duration);
        prop_assert_eq!(result.new_state.intake.primary_complaint, text.trim());
    }

    // map_severity is total and follows the substring precedence
    #[test]
    fn prop_map_severity_total(input in ".{0,40}") {
        let severity = map_severity(&input);
        let expected = if input.contains("4-6") {
            Severity::Moderate
        } else if input.contains("7-8") {
            Severity::Severe
        } else if input.contains("9-10") {
            Severity::Emergency
        } else {
            Severity::Mild
        };
        prop_assert_eq!(severity, expected);
        if severity == Severity::Emergency {
            prop_assert!(input.contains("9-10"));
        }
    }

    // The emergency warning appears iff the derived severity is emergency
    #[test]
    fn prop_emergency_warning_iff_emergency(input in arb_text()) {
        let state = ConvState { step: Step::Severity, ..ConvState::default() };
        if let Ok(result) = transition(&state, Event::quick_reply(input.clone())) {
            let warned = bot_texts(&result.effects).contains(&script::EMERGENCY_WARNING);
            let is_emergency = result.new_state.intake.severity == Some(Severity::Emergency);
            if input.trim().is_empty() {
                prop_assert!(!warned);
            } else {
                prop_assert_eq!(warned, is_emergency);
            }
        }
    }

    // Symptoms never exceed primary complaint + one addition
    #[test]
    fn prop_symptoms_bounded(events in proptest::collection::vec(arb_event(), 0..40)) {
        let mut state = ConvState::default();
        for event in events {
            let last_input = event.input_text().map(|t| t.trim().to_string());
            let was_additional = state.step == Step::AdditionalSymptoms
                && state.phase == AssessmentPhase::Idle;
            let primary = state.intake.primary_complaint.clone();

            if let Ok(result) = transition(&state, event) {
                state = result.new_state;
                prop_assert!(state.intake.symptoms.len() <= 2);

                if was_additional && state.is_assessing() {
                    let expected: Vec<String> = [primary, last_input.unwrap_or_default()]
                        .into_iter()
                        .filter(|s| !s.is_empty())
                        .collect();
                    prop_assert_eq!(&state.intake.symptoms, &expected);
                }
            }
        }
    }

    // Effects are consistent with the resulting state
    #[test]
    fn prop_effects_match_state(state in arb_state(), event in arb_event()) {
        if let Ok(result) = transition(&state, event) {
            prop_assert!(
                effects_are_valid(&result.effects, &result.new_state),
                "Invalid effects for state {:?}: {:?}",
                result.new_state,
                result.effects
            );
        }
    }

    // Assessing rejects user input
    #[test]
    fn prop_assessing_rejects_input(step in arb_step(), event in arb_user_event()) {
        let state = ConvState { step, phase: AssessmentPhase::Assessing, ..ConvState::default() };
        let blank = event.input_text().is_some_and(|t| t.trim().is_empty());
        let result = transition(&state, event);
        if blank {
            prop_assert!(result.unwrap().effects.is_empty());
        } else {
            prop_assert_eq!(result.unwrap_err(), TransitionError::Busy);
        }
    }

    // Failure keeps the step, creates no record and apologizes exactly once
    #[test]
    fn prop_failure_stalls(message in "[a-z ]{1,20}", error_kind in arb_error_kind()) {
        let state = ConvState {
            step: Step::AdditionalSymptoms,
            phase: AssessmentPhase::Assessing,
            ..ConvState::default()
        };
        let result = transition(&state, Event::AssessmentFailed { message, error_kind }).unwrap();

        prop_assert_eq!(result.new_state.step, Step::AdditionalSymptoms);
        prop_assert_eq!(result.new_state.phase, AssessmentPhase::Stalled);
        let records = result.effects.iter().any(|e| matches!(e, Effect::RecordAssessment { .. }));
        let offers_replies = result.effects.iter().any(|e| matches!(e, Effect::SetQuickReplies { .. }));
        prop_assert!(!records);
        prop_assert_eq!(bot_texts(&result.effects), vec![script::ASSESSMENT_UNAVAILABLE]);
        prop_assert!(!offers_replies);
    }

    // Reset from anywhere behaves exactly like a fresh session afterwards
    #[test]
    fn prop_reset_matches_fresh_session(
        start in arb_state(),
        events in proptest::collection::vec(arb_event(), 0..20)
    ) {
        let reset = transition(&start, Event::Reset).unwrap();
        prop_assert_eq!(&reset.new_state, &ConvState::default());

        let (after_reset, reset_outputs) = run(reset.new_state, &events);
        let (fresh, fresh_outputs) = run(ConvState::default(), &events);

        prop_assert_eq!(after_reset, fresh);
        prop_assert_eq!(reset_outputs, fresh_outputs);
    }

    // Complete is re-entrant for anything but starting over
    #[test]
    fn prop_complete_is_reentrant(text in "[a-z]{1,20}") {
        let state = ConvState { step: Step::Complete, ..ConvState::default() };
        let result = transition(&state, Event::user_input(text)).unwrap();
        prop_assert_eq!(result.new_state.step, Step::Complete);
        prop_assert!(result.effects.contains(&Effect::quick_replies(script::META_OPTIONS)));
    }
}

// ============================================================================
// Scenario Tests
// ============================================================================

#[test]
fn test_full_intake_walkthrough() {
    let events = [
        Event::user_input("headache"),
        Event::user_input("2 days"),
        Event::quick_reply("7-8 (Severe)"),
        Event::user_input("also nausea"),
    ];
    let (state, outputs) = run(ConvState::default(), &events);

    assert_eq!(outputs.len(), 4);
    assert_eq!(state.step, Step::AdditionalSymptoms);
    assert!(state.is_assessing());
    assert_eq!(state.intake.severity, Some(Severity::Severe));
    assert_eq!(state.intake.symptoms, vec!["headache", "also nausea"]);
    assert_eq!(state.intake.duration, "2 days");

    let done = transition(
        &state,
        Event::AssessmentReady {
            result: AssessmentResult::default(),
        },
    )
    .unwrap();
    assert_eq!(done.new_state.step, Step::Complete);
}
