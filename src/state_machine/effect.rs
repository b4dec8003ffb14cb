//! Effects produced by state transitions

use super::DispatchState;
use crate::session::{Message, MessageId};

/// Effects to be executed after state transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Empty the composer's draft and reply target
    ResetComposer,

    /// Append to the conversation and persist it
    AppendMessage(Message),

    /// Build the prompt for this user message and call the remote model
    RequestReply {
        message_id: MessageId,
        reply_to: Option<MessageId>,
    },

    /// Record a remote failure on the diagnostic channel only
    LogFailure { request_id: MessageId, error: String },

    /// Notify connected clients
    NotifyStateChange { state: DispatchState },
}

impl Effect {
    pub fn notify_state_change(state: &DispatchState) -> Self {
        Effect::NotifyStateChange {
            state: state.clone(),
        }
    }
}
