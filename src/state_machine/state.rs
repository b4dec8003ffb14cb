//! Dispatcher state

use crate::session::MessageId;
use serde::{Deserialize, Serialize};

/// At most one outbound request exists at a time
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DispatchState {
    /// Ready to accept a submission
    #[default]
    Idle,

    /// Waiting for the reply to the given user message
    AwaitingResponse { message_id: MessageId },
}

impl DispatchState {
    pub fn is_awaiting(&self) -> bool {
        matches!(self, DispatchState::AwaitingResponse { .. })
    }

    pub fn name(&self) -> &'static str {
        match self {
            DispatchState::Idle => "idle",
            DispatchState::AwaitingResponse { .. } => "awaiting_response",
        }
    }
}
