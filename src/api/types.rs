//! API request and response types

use crate::session::{Message, MessageId, Sender};
use crate::state_machine::DispatchState;
use serde::{Deserialize, Serialize};

/// Request to unlock the session
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub passphrase: String,
}

/// Response for a successful login
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub authenticated: bool,
}

/// Request to send a chat message. Without `text` the composer draft is sent.
#[derive(Debug, Default, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub text: Option<String>,
}

/// Response for chat action
#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub queued: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<MessageId>,
}

/// Request to replace the composer draft
#[derive(Debug, Deserialize)]
pub struct DraftRequest {
    pub text: String,
}

/// Request to set the reply target
#[derive(Debug, Deserialize)]
pub struct ReplyRequest {
    pub message_id: MessageId,
}

/// Request to clear the conversation
#[derive(Debug, Default, Deserialize)]
pub struct ClearRequest {
    #[serde(default)]
    pub confirmed: bool,
}

/// Response for clear action. Carries the question to ask when the
/// request was not confirmed.
#[derive(Debug, Serialize)]
pub struct ClearResponse {
    pub cleared: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confirmation: Option<&'static str>,
}

/// A message as shown to the client, with its reply quote resolved
#[derive(Debug, Clone, Serialize)]
pub struct MessageView {
    pub id: MessageId,
    pub text: String,
    pub sender: Sender,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<MessageId>,
    /// Text of the quoted message, if it still exists
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_quote: Option<String>,
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
}

impl MessageView {
    pub fn new(message: &Message, reply_quote: Option<String>) -> Self {
        Self {
            id: message.id.clone(),
            text: message.text.clone(),
            sender: message.sender,
            reply_to: message.reply_to.clone(),
            reply_quote,
            timestamp: message.timestamp.timestamp_millis(),
        }
    }

    /// Build views for a whole conversation, resolving quotes against it
    pub fn from_conversation(messages: &[Message]) -> Vec<Self> {
        messages
            .iter()
            .map(|m| {
                let quote = m
                    .reply_to
                    .as_deref()
                    .and_then(|id| messages.iter().find(|t| t.id == id))
                    .map(|t| t.text.clone());
                Self::new(m, quote)
            })
            .collect()
    }
}

/// Response with the whole conversation
#[derive(Debug, Serialize)]
pub struct MessagesResponse {
    pub messages: Vec<MessageView>,
}

/// Response describing the session
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub authenticated: bool,
    pub state: DispatchState,
    pub awaiting_response: bool,
    pub draft: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_target: Option<MessageId>,
    pub message_count: usize,
}

/// Response for composer and other actions with nothing to report
#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}
