//! Chat message record

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type MessageId = String;

/// Generate a fresh message id
pub fn new_message_id() -> MessageId {
    Uuid::new_v4().to_string()
}

/// Author of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sender {
    User,
    /// Older histories spell this `ai`
    #[serde(alias = "ai")]
    Assistant,
}

impl Sender {
    /// Role label used in the prompt transcript
    pub fn role_label(self) -> &'static str {
        match self {
            Sender::User => "user",
            Sender::Assistant => "assistant",
        }
    }
}

/// Messages carry millisecond timestamps, the precision they are stored at
fn to_millis(at: DateTime<Utc>) -> DateTime<Utc> {
    at.trunc_subsecs(3)
}

/// A single entry in the conversation. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: MessageId,
    pub text: String,
    pub sender: Sender,
    /// Message this one quotes; may dangle after a clear
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<MessageId>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn user(
        id: impl Into<MessageId>,
        text: impl Into<String>,
        reply_to: Option<MessageId>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            sender: Sender::User,
            reply_to,
            timestamp: to_millis(timestamp),
        }
    }

    pub fn assistant(
        id: impl Into<MessageId>,
        text: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            sender: Sender::Assistant,
            reply_to: None,
            timestamp: to_millis(timestamp),
        }
    }
}
