//! Property-based tests for the state machine
//!
//! Random operation sequences are run through `transition` and the effects
//! applied to a real `MessageStore`, then transcript invariants are checked.

use super::state::*;
use super::transition::*;
use super::*;
use crate::store::{Message, MessageStore, Role};
use crate::transport::TransportError;
use proptest::prelude::*;

// ============================================================================
// Operations
// ============================================================================

#[derive(Debug, Clone)]
enum Op {
    Submit(String),
    Cancel,
    Reset,
    /// `current` targets the in-flight exchange, otherwise a stale one
    Fragment { current: bool, text: String },
    End { current: bool },
    Fail { current: bool },
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => prop_oneof!["[a-zA-Z ]{1,20}", Just("   ".to_string()), Just(String::new())]
            .prop_map(Op::Submit),
        1 => Just(Op::Cancel),
        1 => Just(Op::Reset),
        5 => (any::<bool>(), "[a-z ]{1,8}")
            .prop_map(|(current, text)| Op::Fragment { current, text }),
        1 => any::<bool>().prop_map(|current| Op::End { current }),
        1 => any::<bool>().prop_map(|current| Op::Fail { current }),
    ]
}

fn arb_effort() -> impl Strategy<Value = EffortLevel> {
    prop_oneof![
        Just(EffortLevel::Low),
        Just(EffortLevel::Medium),
        Just(EffortLevel::High),
    ]
}

// ============================================================================
// Model
// ============================================================================

/// Applies effects the way the runtime does, with plain concatenation
#[derive(Default)]
struct Model {
    state: LifecycleState,
    store: MessageStore,
    /// Fragments accepted for the in-flight exchange
    accepted: String,
}

impl Model {
    fn event_for(&self, op: Op) -> Event {
        let stale = ExchangeId::from("stale-exchange");
        let target = |current: bool| match (current, self.state.exchange()) {
            (true, Some(exchange)) => exchange.id.clone(),
            _ => stale.clone(),
        };
        match op {
            Op::Submit(text) => Event::submit(text, RequestOptions::default()),
            Op::Cancel => Event::Cancel,
            Op::Reset => Event::Reset,
            Op::Fragment { current, text } => Event::Fragment {
                exchange_id: target(current),
                text,
            },
            Op::End { current } => Event::StreamEnd {
                exchange_id: target(current),
            },
            Op::Fail { current } => Event::StreamFailed {
                exchange_id: target(current),
                error: TransportError::network("connection reset"),
            },
        }
    }

    fn apply(&mut self, result: TransitionResult) {
        for effect in result.effects {
            match effect {
                Effect::AppendMessage {
                    id,
                    role,
                    content,
                    complete,
                } => {
                    let mut message = match role {
                        Role::User => Message::user(id, content),
                        Role::Assistant => Message::pending_assistant(id),
                    };
                    message.is_complete = complete;
                    self.store.append(message);
                    if role == Role::Assistant {
                        self.accepted.clear();
                    }
                }
                Effect::ApplyFragment { exchange, fragment } => {
                    self.store
                        .update_content(&exchange.assistant_message_id, &fragment)
                        .unwrap();
                    self.accepted.push_str(&fragment);
                }
                Effect::AppendFailureNotice { message_id, error } => {
                    let received = !self.store.get(&message_id).unwrap().content.is_empty();
                    let notice = failure_notice(&error, received);
                    self.store.update_content(&message_id, &notice).unwrap();
                }
                Effect::MarkComplete { message_id } => {
                    self.store.mark_complete(&message_id).unwrap();
                }
                Effect::ClearMessages => {
                    self.store.clear();
                    self.accepted.clear();
                }
                Effect::OpenStream { .. } | Effect::ReleaseStream => {}
            }
        }
        self.state = result.new_state;
    }
}

// ============================================================================
// Invariant Checkers
// ============================================================================

fn check_transcript(model: &Model) -> Result<(), TestCaseError> {
    let messages = model.store.snapshot();

    // User and assistant messages alternate, starting with the user
    for (i, message) in messages.iter().enumerate() {
        let expected = if i % 2 == 0 { Role::User } else { Role::Assistant };
        prop_assert_eq!(message.role, expected, "Role out of order at {}", i);
    }
    prop_assert_eq!(messages.len() % 2, 0, "Dangling user message");

    // At most one incomplete message, always the last, and only while busy
    let incomplete: Vec<usize> = messages
        .iter()
        .enumerate()
        .filter(|(_, m)| !m.is_complete)
        .map(|(i, _)| i)
        .collect();
    if model.state.is_busy() {
        prop_assert_eq!(incomplete, vec![messages.len() - 1]);
        let exchange = model.state.exchange().unwrap();
        let last = messages.last().unwrap();
        prop_assert_eq!(&last.id, &exchange.assistant_message_id);
        prop_assert_eq!(&last.content, &model.accepted);
    } else {
        prop_assert!(incomplete.is_empty(), "Incomplete message while not busy");
    }

    Ok(())
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    // Any operation sequence keeps the transcript well formed
    #[test]
    fn prop_transcript_stays_well_formed(ops in proptest::collection::vec(arb_op(), 0..40)) {
        let mut model = Model::default();
        for op in ops {
            let event = model.event_for(op);
            match transition(&model.state, event) {
                Ok(result) => model.apply(result),
                Err(TransitionError::InvalidInput | TransitionError::Busy) => {}
            }
            check_transcript(&model)?;
        }
    }

    // Completed messages never change afterwards (until reset)
    #[test]
    fn prop_completed_messages_are_frozen(ops in proptest::collection::vec(arb_op(), 0..40)) {
        let mut model = Model::default();
        for op in ops {
            let is_reset = matches!(op, Op::Reset);
            let before: Vec<Message> = model
                .store
                .iter()
                .filter(|m| m.is_complete)
                .cloned()
                .collect();

            let event = model.event_for(op);
            if let Ok(result) = transition(&model.state, event) {
                model.apply(result);
            }

            if !is_reset {
                for message in before {
                    prop_assert_eq!(model.store.get(&message.id), Some(&message));
                }
            }
        }
    }

    // Rejected submissions produce no effects and leave the state untouched
    #[test]
    fn prop_rejection_has_no_side_effects(
        ops in proptest::collection::vec(arb_op(), 0..20),
        text in prop_oneof!["[a-z ]{1,10}", Just("  ".to_string())],
    ) {
        let mut model = Model::default();
        for op in ops {
            let event = model.event_for(op);
            if let Ok(result) = transition(&model.state, event) {
                model.apply(result);
            }
        }

        let before = model.state.clone();
        let messages_before = model.store.snapshot();
        match transition(&model.state, Event::submit(text.clone(), RequestOptions::default())) {
            Err(TransitionError::InvalidInput) => prop_assert!(text.trim().is_empty()),
            Err(TransitionError::Busy) => prop_assert!(before.is_busy()),
            Ok(result) => {
                prop_assert!(!before.is_busy() && !text.trim().is_empty());
                model.apply(result);
            }
        }
        if model.state == before {
            prop_assert_eq!(model.store.snapshot(), messages_before);
        }
    }

    // Stale transport events never change anything
    #[test]
    fn prop_stale_events_ignored(
        ops in proptest::collection::vec(arb_op(), 0..20),
        text in "[a-z]{1,8}",
    ) {
        let mut model = Model::default();
        for op in ops {
            let event = model.event_for(op);
            if let Ok(result) = transition(&model.state, event) {
                model.apply(result);
            }
        }

        for event in [
            model.event_for(Op::Fragment { current: false, text }),
            model.event_for(Op::End { current: false }),
            model.event_for(Op::Fail { current: false }),
        ] {
            let result = transition(&model.state, event).unwrap();
            prop_assert_eq!(&result.new_state, &model.state);
            prop_assert!(result.effects.is_empty());
        }
    }

    // Effort level travels unchanged to OpenStream
    #[test]
    fn prop_effort_forwarded(effort in arb_effort(), text in "[a-z]{1,10}") {
        let options = RequestOptions::with_effort(effort);
        let result = transition(&LifecycleState::Idle, Event::submit(text, options)).unwrap();
        let forwarded = result.effects.iter().find_map(|e| match e {
            Effect::OpenStream { options, .. } => Some(*options),
            _ => None,
        });
        prop_assert_eq!(forwarded, Some(options));
    }

    // Cancel and reset always leave a state that accepts a submission
    #[test]
    fn prop_cancel_and_reset_free_the_session(
        ops in proptest::collection::vec(arb_op(), 0..20),
        reset in any::<bool>(),
    ) {
        let mut model = Model::default();
        for op in ops {
            let event = model.event_for(op);
            if let Ok(result) = transition(&model.state, event) {
                model.apply(result);
            }
        }

        let event = if reset { Event::Reset } else { Event::Cancel };
        let result = transition(&model.state, event).unwrap();
        model.apply(result);
        prop_assert!(!model.state.is_busy());
        if reset {
            prop_assert!(model.store.is_empty());
            prop_assert_eq!(&model.state, &LifecycleState::Idle);
        }
        check_transcript(&model)?;
    }
}
