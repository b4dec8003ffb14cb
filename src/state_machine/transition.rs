//! Pure state transition function
//!
//! Given the same state and event this always produces the same result,
//! with no I/O. The runtime executes the returned effects.

use super::{DispatchState, Effect, Event};
use crate::session::Message;
use thiserror::Error;

/// Appended in place of a reply whenever the remote call fails
pub const FALLBACK_REPLY: &str =
    "متأسفانه در پردازش پیام شما مشکلی پیش آمد. لطفاً دوباره تلاش کنید.";

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: DispatchState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: DispatchState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }
}

/// Reasons an event is refused. Submission refusals are silent no-ops for
/// the user; the runtime only logs them.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("Message is empty")]
    EmptyInput,
    #[error("Still waiting for the previous reply")]
    AwaitingResponse,
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
}

pub fn transition(
    state: &DispatchState,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    match (state, event) {
        // ============================================================
        // Submission
        // ============================================================
        (DispatchState::AwaitingResponse { .. }, Event::Submit { .. }) => {
            Err(TransitionError::AwaitingResponse)
        }

        (DispatchState::Idle, Event::Submit { text, .. }) if text.trim().is_empty() => {
            Err(TransitionError::EmptyInput)
        }

        (
            DispatchState::Idle,
            Event::Submit {
                message_id,
                text,
                reply_to,
                at,
            },
        ) => {
            let new_state = DispatchState::AwaitingResponse {
                message_id: message_id.clone(),
            };
            let message = Message::user(message_id.clone(), text, reply_to.clone(), at);

            Ok(TransitionResult::new(new_state.clone())
                .with_effect(Effect::ResetComposer)
                .with_effect(Effect::AppendMessage(message))
                .with_effect(Effect::notify_state_change(&new_state))
                .with_effect(Effect::RequestReply {
                    message_id,
                    reply_to,
                }))
        }

        // ============================================================
        // Remote completion
        // ============================================================
        (
            DispatchState::AwaitingResponse { message_id },
            Event::ReplyReceived {
                request_id,
                reply_id,
                text,
                at,
            },
        ) if *message_id == request_id => Ok(TransitionResult::new(DispatchState::Idle)
            .with_effect(Effect::AppendMessage(Message::assistant(reply_id, text, at)))
            .with_effect(Effect::notify_state_change(&DispatchState::Idle))),

        (
            DispatchState::AwaitingResponse { message_id },
            Event::ReplyFailed {
                request_id,
                reply_id,
                error,
                at,
            },
        ) if *message_id == request_id => Ok(TransitionResult::new(DispatchState::Idle)
            .with_effect(Effect::LogFailure { request_id, error })
            .with_effect(Effect::AppendMessage(Message::assistant(
                reply_id,
                FALLBACK_REPLY,
                at,
            )))
            .with_effect(Effect::notify_state_change(&DispatchState::Idle))),

        (
            _,
            Event::ReplyReceived { request_id, .. } | Event::ReplyFailed { request_id, .. },
        ) => Err(TransitionError::InvalidTransition(format!(
            "no request in flight for message {request_id} (state: {})",
            state.name()
        ))),
    }
}
