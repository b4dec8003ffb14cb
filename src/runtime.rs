//! Runtime for the chat session
//!
//! A single task owns the session, the composer and the dispatcher state.
//! Callers talk to it through a cloneable `ChatHandle`; every command is
//! processed in order, so no other locking is needed.

mod executor;

#[cfg(test)]
pub mod testing;

pub use executor::ChatRuntime;

use crate::config::DispatchConfig;
use crate::llm::LlmService;
use crate::session::{ChatSession, Message, MessageId};
use crate::state_machine::DispatchState;
use crate::storage::KvStore;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RuntimeError {
    #[error("Session is locked")]
    Locked,
    #[error("Message not found: {0}")]
    UnknownMessage(String),
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Chat runtime has stopped")]
    Closed,
}

/// What became of a submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// A user message was appended and a reply requested
    Queued { message_id: MessageId },
    /// Blank input, or a reply is still pending
    Ignored,
}

/// Point-in-time view of the whole session
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub authenticated: bool,
    pub state: DispatchState,
    pub draft: String,
    pub reply_target: Option<MessageId>,
    /// Empty while locked
    pub messages: Vec<Message>,
}

/// Events sent to stream subscribers
#[derive(Debug, Clone)]
pub enum ChatEvent {
    Message {
        message: Message,
        /// Text of the message it replies to, if that still exists
        reply_quote: Option<String>,
    },
    StateChange { state: DispatchState },
    Cleared,
}

type Reply<T> = oneshot::Sender<Result<T, RuntimeError>>;

/// Requests handled by the runtime task
#[derive(Debug)]
pub enum Command {
    Authenticate {
        secret: String,
        reply: oneshot::Sender<bool>,
    },
    Submit {
        /// `None` submits the composer's draft
        text: Option<String>,
        reply: Reply<SubmitOutcome>,
    },
    SetDraft {
        text: String,
        reply: Reply<()>,
    },
    SetReplyTarget {
        message_id: MessageId,
        reply: Reply<()>,
    },
    CancelReply {
        reply: Reply<()>,
    },
    Clear {
        confirmed: bool,
        reply: Reply<bool>,
    },
    Snapshot {
        reply: oneshot::Sender<Snapshot>,
    },
}

/// Handle to interact with the running session
#[derive(Clone)]
pub struct ChatHandle {
    command_tx: mpsc::Sender<Command>,
    broadcast_tx: broadcast::Sender<ChatEvent>,
}

impl ChatHandle {
    /// Start the runtime task for `session`
    pub fn spawn<S: KvStore + 'static>(
        session: ChatSession<S>,
        llm: Arc<dyn LlmService>,
        config: DispatchConfig,
    ) -> Self {
        let (command_tx, command_rx) = mpsc::channel(32);
        let (broadcast_tx, _) = broadcast::channel(128);

        let runtime = ChatRuntime::new(session, llm, config, command_rx, broadcast_tx.clone());
        tokio::spawn(runtime.run());

        Self {
            command_tx,
            broadcast_tx,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChatEvent> {
        self.broadcast_tx.subscribe()
    }

    pub async fn authenticate(&self, secret: impl Into<String>) -> Result<bool, RuntimeError> {
        let secret = secret.into();
        self.request(|reply| Command::Authenticate { secret, reply })
            .await
    }

    pub async fn submit(&self, text: Option<String>) -> Result<SubmitOutcome, RuntimeError> {
        self.request(|reply| Command::Submit { text, reply }).await?
    }

    pub async fn set_draft(&self, text: impl Into<String>) -> Result<(), RuntimeError> {
        let text = text.into();
        self.request(|reply| Command::SetDraft { text, reply }).await?
    }

    pub async fn set_reply_target(
        &self,
        message_id: impl Into<MessageId>,
    ) -> Result<(), RuntimeError> {
        let message_id = message_id.into();
        self.request(|reply| Command::SetReplyTarget { message_id, reply })
            .await?
    }

    pub async fn cancel_reply(&self) -> Result<(), RuntimeError> {
        self.request(|reply| Command::CancelReply { reply }).await?
    }

    pub async fn clear(&self, confirmed: bool) -> Result<bool, RuntimeError> {
        self.request(|reply| Command::Clear { confirmed, reply })
            .await?
    }

    pub async fn snapshot(&self) -> Result<Snapshot, RuntimeError> {
        self.request(|reply| Command::Snapshot { reply }).await
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.command_tx
            .send(make(tx))
            .await
            .map_err(|_| RuntimeError::Closed)?;
        rx.await.map_err(|_| RuntimeError::Closed)
    }
}
