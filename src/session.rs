//! Session gate and conversation store
//!
//! `ChatSession` owns both durable slots. It is loaded once at startup and
//! writes the affected slot back in full after every mutation.

mod history;
mod message;

pub use message::{new_message_id, Message, MessageId, Sender};

use crate::storage::{KvStore, StorageResult, AUTH_SLOT, HISTORY_SLOT};
use chrono::Utc;

/// Passphrase accepted when none is configured
pub const DEFAULT_PASSPHRASE: &str = "hosna";

/// Seeded into an empty conversation on first login
pub const GREETING: &str = "سلام! من یک دستیار هوش مصنوعی هستم که برای کمک به حسنا ساخته شده‌ام. چطور می‌تونم کمکتون کنم؟";

/// Alert shown when the passphrase does not match
pub const LOGIN_FAILED_ALERT: &str = "رمز عبور اشتباه است!";

/// Question the user must answer before history is cleared
pub const CLEAR_CONFIRMATION: &str =
    "آیا مطمئن هستید که می‌خواهید تاریخچه چت را پاک کنید؟";

pub struct ChatSession<S: KvStore> {
    store: S,
    passphrase: String,
    authenticated: bool,
    messages: Vec<Message>,
}

impl<S: KvStore> ChatSession<S> {
    /// Initialise from durable storage. Missing or unreadable slots fall
    /// back to a locked session with an empty history.
    pub fn load(store: S, passphrase: impl Into<String>) -> Self {
        let authenticated = match store.get(AUTH_SLOT) {
            Ok(value) => value.as_deref() == Some("true"),
            Err(e) => {
                tracing::error!(error = %e, "Failed to read authentication slot");
                false
            }
        };

        let messages = match store.get(HISTORY_SLOT) {
            Ok(Some(raw)) => history::decode(&raw).unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Discarding unreadable chat history");
                if let Err(e) = store.remove(HISTORY_SLOT) {
                    tracing::error!(error = %e, "Failed to drop unreadable chat history");
                }
                Vec::new()
            }),
            Ok(None) => Vec::new(),
            Err(e) => {
                tracing::error!(error = %e, "Failed to read chat history slot");
                Vec::new()
            }
        };

        tracing::info!(
            authenticated,
            message_count = messages.len(),
            "Chat session loaded"
        );

        Self {
            store,
            passphrase: passphrase.into(),
            authenticated,
            messages,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Compare `secret` with the passphrase. On a match a locked session
    /// unlocks and an empty conversation gets the greeting; repeat logins
    /// change nothing.
    pub fn authenticate(&mut self, secret: &str) -> bool {
        if secret != self.passphrase {
            tracing::info!("Passphrase rejected");
            return false;
        }

        if self.authenticated {
            return true;
        }

        self.authenticated = true;
        if let Err(e) = self.store.set(AUTH_SLOT, "true") {
            tracing::error!(error = %e, "Failed to persist authentication flag");
        }

        if self.messages.is_empty() {
            let greeting = Message::assistant(new_message_id(), GREETING, Utc::now());
            if let Err(e) = self.append(greeting) {
                tracing::error!(error = %e, "Failed to persist greeting");
            }
        }

        tracing::info!("Session unlocked");
        true
    }

    /// Add a message to the end of the conversation. The in-memory sequence
    /// keeps the message even if the write fails.
    pub fn append(&mut self, message: Message) -> StorageResult<()> {
        self.messages.push(message);
        self.save_history()
    }

    /// Empty the conversation. Does nothing unless `confirmed`.
    pub fn clear(&mut self, confirmed: bool) -> StorageResult<bool> {
        if !confirmed {
            return Ok(false);
        }
        self.messages.clear();
        self.save_history()?;
        tracing::info!("Chat history cleared");
        Ok(true)
    }

    pub fn find_by_id(&self, id: &str) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    fn save_history(&self) -> StorageResult<()> {
        let raw = history::encode(&self.messages)?;
        self.store.set(HISTORY_SLOT, &raw)
    }
}
