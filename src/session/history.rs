//! Encoding of the persisted message history
//!
//! Written as `{"version":1,"messages":[...]}`. A bare array is the
//! pre-versioning layout and is still accepted on read.

use super::Message;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub const HISTORY_VERSION: u64 = 1;

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("history is not valid JSON: {0}")]
    Unreadable(#[source] serde_json::Error),
    #[error("history messages have an unexpected shape: {0}")]
    BadMessages(#[source] serde_json::Error),
    #[error("unsupported history version {0}")]
    UnsupportedVersion(u64),
    #[error("history is neither an array nor a versioned envelope")]
    UnexpectedShape,
}

#[derive(Serialize)]
struct Envelope<'a> {
    version: u64,
    messages: &'a [Message],
}

#[derive(Deserialize)]
struct StoredEnvelope {
    version: u64,
    messages: Value,
}

pub fn encode(messages: &[Message]) -> Result<String, serde_json::Error> {
    serde_json::to_string(&Envelope {
        version: HISTORY_VERSION,
        messages,
    })
}

pub fn decode(raw: &str) -> Result<Vec<Message>, HistoryError> {
    let value: Value = serde_json::from_str(raw).map_err(HistoryError::Unreadable)?;

    match value {
        Value::Array(_) => serde_json::from_value(value).map_err(HistoryError::BadMessages),
        Value::Object(_) => {
            let envelope: StoredEnvelope =
                serde_json::from_value(value).map_err(|_| HistoryError::UnexpectedShape)?;
            if envelope.version != HISTORY_VERSION {
                return Err(HistoryError::UnsupportedVersion(envelope.version));
            }
            serde_json::from_value(envelope.messages).map_err(HistoryError::BadMessages)
        }
        _ => Err(HistoryError::UnexpectedShape),
    }
}
