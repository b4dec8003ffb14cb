//! Events that drive the dispatcher
//!
//! Ids and timestamps are minted by the caller so that the transition
//! function stays pure.

use crate::session::MessageId;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone)]
pub enum Event {
    // User events
    Submit {
        message_id: MessageId,
        text: String,
        reply_to: Option<MessageId>,
        at: DateTime<Utc>,
    },

    // Remote events
    ReplyReceived {
        /// User message this reply answers
        request_id: MessageId,
        reply_id: MessageId,
        text: String,
        at: DateTime<Utc>,
    },
    ReplyFailed {
        request_id: MessageId,
        reply_id: MessageId,
        error: String,
        at: DateTime<Utc>,
    },
}
