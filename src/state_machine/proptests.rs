//! Property-based tests for the state machine
//!
//! Random event sequences are driven through `transition`, and the emitted
//! transcript effects are applied to a real `Transcript` to check the
//! invariants that the runtime relies on.

use super::transition::*;
use super::*;
use crate::transcript::{Speaker, Transcript, TurnId, TurnStamp, TurnStatus};
use chrono::Utc;
use proptest::prelude::*;

// ============================================================================
// Test Helpers
// ============================================================================

fn test_context() -> ConvContext {
    ConvContext::new("Namaste", "I apologize")
}

/// Apply the transcript-facing effects, as the runtime does
fn apply(transcript: &mut Transcript, effects: &[Effect]) -> Result<(), String> {
    for effect in effects {
        match effect {
            Effect::AppendTurn(turn) => transcript.append(turn.clone()),
            Effect::UpdateText { id, text } => transcript.update_text(id, text),
            Effect::FinalizeTurn { id } => transcript.finalize(id),
            Effect::FailTurn { id } => transcript.mark_failed(id),
            Effect::ResetTranscript { seed } => {
                transcript.reset(seed.clone());
                Ok(())
            }
            Effect::ResetSession | Effect::OpenStream { .. } | Effect::NotifyState { .. } => Ok(()),
        }
        .map_err(|e| e.to_string())?;
    }
    Ok(())
}

fn pending_count(transcript: &Transcript) -> usize {
    transcript.snapshot().iter().filter(|t| t.is_pending()).count()
}

// ============================================================================
// Arbitrary Generators
// ============================================================================

/// Abstract step; stream steps are bound to the live cycle when generated
/// events are materialized, or to a foreign id for stale deliveries.
#[derive(Debug, Clone)]
enum Step {
    Begin,
    Message(String),
    Reset,
    Opened { stale: bool },
    Fragment { text: String, stale: bool },
    Ended { stale: bool },
    Failed { stale: bool },
}

fn arb_step() -> impl Strategy<Value = Step> {
    prop_oneof![
        1 => Just(Step::Begin),
        3 => "[ a-zA-Z?]{0,12}".prop_map(Step::Message),
        1 => Just(Step::Reset),
        1 => any::<bool>().prop_map(|stale| Step::Opened { stale }),
        6 => ("[a-zA-Z .]{0,8}", prop::bool::weighted(0.1))
            .prop_map(|(text, stale)| Step::Fragment { text, stale }),
        2 => prop::bool::weighted(0.1).prop_map(|stale| Step::Ended { stale }),
        1 => prop::bool::weighted(0.1).prop_map(|stale| Step::Failed { stale }),
    ]
}

fn materialize(step: Step, state: &ConvState, counter: &mut u32) -> Event {
    *counter += 1;
    let n = *counter;
    let stamp = |prefix: &str| TurnStamp::new(TurnId::new(format!("{prefix}-{n}")), Utc::now());
    let bound = |stale: bool| match (stale, state.reply_id()) {
        (false, Some(id)) => id.clone(),
        _ => TurnId::new("stale"),
    };

    match step {
        Step::Begin => Event::Begin {
            greeting: stamp("g"),
        },
        Step::Message(text) => Event::UserMessage {
            text,
            user_turn: stamp("u"),
            reply_turn: stamp("r"),
        },
        Step::Reset => Event::Reset {
            greeting: stamp("g"),
        },
        Step::Opened { stale } => Event::StreamOpened {
            reply_id: bound(stale),
        },
        Step::Fragment { text, stale } => Event::Fragment {
            reply_id: bound(stale),
            text,
        },
        Step::Ended { stale } => Event::StreamEnded {
            reply_id: bound(stale),
        },
        Step::Failed { stale } => Event::StreamFailed {
            reply_id: bound(stale),
            message: "boom".to_string(),
            apology: stamp("e"),
        },
    }
}

fn arb_fragments() -> impl Strategy<Value = Vec<String>> {
    proptest::collection::vec("[a-zA-Z .,]{0,10}", 0..10)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    // Every accepted transition leaves a transcript the runtime can apply,
    // with at most one pending turn and busy exactly when one is pending.
    #[test]
    fn prop_single_pending_turn(steps in proptest::collection::vec(arb_step(), 0..40)) {
        let ctx = test_context();
        let mut state = ConvState::Intro;
        let mut transcript = Transcript::new();
        let mut counter = 0;

        for step in steps {
            let event = materialize(step, &state, &mut counter);
            let before = transcript.snapshot();
            match transition(&state, &ctx, event) {
                Ok(result) => {
                    prop_assert!(apply(&mut transcript, &result.effects).is_ok());
                    state = result.new_state;
                }
                Err(_) => {
                    // Rejected events never touch the transcript
                    prop_assert_eq!(before, transcript.snapshot());
                }
            }

            prop_assert!(pending_count(&transcript) <= 1);
            prop_assert_eq!(state.is_busy(), pending_count(&transcript) == 1);
            if let Some(reply_id) = state.reply_id() {
                prop_assert_eq!(transcript.pending().map(|t| &t.id), Some(reply_id));
            }
        }
    }

    // N successful cycles after begin give 2N + 1 alternating turns
    #[test]
    fn prop_successful_cycles_alternate(
        cycles in proptest::collection::vec(("[a-zA-Z]{1,10}", arb_fragments()), 0..8)
    ) {
        let ctx = test_context();
        let mut transcript = Transcript::new();
        let begin = transition(&ConvState::Intro, &ctx, Event::begin()).unwrap();
        apply(&mut transcript, &begin.effects).unwrap();
        let mut state = begin.new_state;

        for (question, fragments) in &cycles {
            let event = Event::user_message(question.clone());
            let result = transition(&state, &ctx, event).unwrap();
            apply(&mut transcript, &result.effects).unwrap();
            state = result.new_state;
            let reply_id = state.reply_id().cloned().unwrap();

            for fragment in fragments {
                let event = Event::Fragment { reply_id: reply_id.clone(), text: fragment.clone() };
                let result = transition(&state, &ctx, event).unwrap();
                apply(&mut transcript, &result.effects).unwrap();
                state = result.new_state;
            }

            let result = transition(&state, &ctx, Event::StreamEnded { reply_id: reply_id.clone() }).unwrap();
            apply(&mut transcript, &result.effects).unwrap();
            state = result.new_state;

            let reply = transcript.get(&reply_id).unwrap();
            prop_assert_eq!(&reply.text, &fragments.concat());
            prop_assert_eq!(reply.status, TurnStatus::Complete);
        }

        let turns = transcript.snapshot();
        prop_assert_eq!(turns.len(), 2 * cycles.len() + 1);
        prop_assert_eq!(state, ConvState::Idle);
        for (i, turn) in turns.iter().enumerate() {
            let expected = if i % 2 == 0 { Speaker::Assistant } else { Speaker::User };
            prop_assert_eq!(turn.speaker, expected);
            prop_assert!(!turn.is_pending());
        }
    }

    // A failed cycle keeps the partial text and adds exactly one apology
    #[test]
    fn prop_failure_keeps_partial_text(fragments in arb_fragments()) {
        let ctx = test_context();
        let mut transcript = Transcript::new();
        let begin = transition(&ConvState::Intro, &ctx, Event::begin()).unwrap();
        apply(&mut transcript, &begin.effects).unwrap();

        let result = transition(&begin.new_state, &ctx, Event::user_message("Explain Karma")).unwrap();
        apply(&mut transcript, &result.effects).unwrap();
        let mut state = result.new_state;
        let reply_id = state.reply_id().cloned().unwrap();

        for fragment in &fragments {
            let event = Event::Fragment { reply_id: reply_id.clone(), text: fragment.clone() };
            let result = transition(&state, &ctx, event).unwrap();
            apply(&mut transcript, &result.effects).unwrap();
            state = result.new_state;
        }

        let result = transition(&state, &ctx, Event::stream_failed(reply_id.clone(), "reset")).unwrap();
        apply(&mut transcript, &result.effects).unwrap();

        let turns = transcript.snapshot();
        prop_assert_eq!(turns.len(), 4);
        prop_assert_eq!(&turns[2].text, &fragments.concat());
        prop_assert_eq!(turns[2].status, TurnStatus::Failed);
        prop_assert_eq!(&turns[3].text, "I apologize");
        prop_assert_eq!(turns[3].status, TurnStatus::Complete);
        prop_assert_eq!(result.new_state, ConvState::Idle);
    }

    // Whatever the text, a busy conversation rejects new messages
    #[test]
    fn prop_busy_rejects_messages(text in ".*", partial in "[a-z ]{0,20}") {
        let state = ConvState::Streaming { reply_id: TurnId::new("r"), text: partial };
        let result = transition(&state, &test_context(), Event::user_message(text));
        prop_assert_eq!(result.unwrap_err(), TransitionError::AgentBusy);
    }
}
