//! Chat runtime executor

use super::{ChatEvent, Command, RuntimeError, Snapshot, SubmitOutcome};
use crate::composer::Composer;
use crate::config::DispatchConfig;
use crate::llm::{LlmRequest, LlmService};
use crate::prompt;
use crate::session::{new_message_id, ChatSession, Message, MessageId};
use crate::state_machine::{transition, DispatchState, Effect, Event, TransitionError};
use crate::storage::KvStore;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};

pub struct ChatRuntime<S: KvStore + 'static> {
    config: DispatchConfig,
    state: DispatchState,
    session: ChatSession<S>,
    composer: Composer,
    llm: Arc<dyn LlmService>,
    command_rx: mpsc::Receiver<Command>,
    /// Completion events from spawned requests
    event_rx: mpsc::Receiver<Event>,
    event_tx: mpsc::Sender<Event>,
    broadcast_tx: broadcast::Sender<ChatEvent>,
}

impl<S: KvStore + 'static> ChatRuntime<S> {
    pub fn new(
        session: ChatSession<S>,
        llm: Arc<dyn LlmService>,
        config: DispatchConfig,
        command_rx: mpsc::Receiver<Command>,
        broadcast_tx: broadcast::Sender<ChatEvent>,
    ) -> Self {
        let (event_tx, event_rx) = mpsc::channel(8);
        Self {
            config,
            state: DispatchState::Idle,
            session,
            composer: Composer::default(),
            llm,
            command_rx,
            event_rx,
            event_tx,
            broadcast_tx,
        }
    }

    pub async fn run(mut self) {
        tracing::info!(model = %self.llm.model_id(), "Starting chat runtime");

        loop {
            tokio::select! {
                command = self.command_rx.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => break,
                },
                Some(event) = self.event_rx.recv() => self.handle_event(event),
            }
        }

        tracing::info!("Chat runtime stopped");
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Authenticate { secret, reply } => {
                let _ = reply.send(self.authenticate(&secret));
            }
            Command::Submit { text, reply } => {
                let _ = reply.send(self.submit(text));
            }
            Command::SetDraft { text, reply } => {
                let result = self.ensure_unlocked().map(|()| self.composer.set_draft(text));
                let _ = reply.send(result);
            }
            Command::SetReplyTarget { message_id, reply } => {
                let _ = reply.send(self.set_reply_target(message_id));
            }
            Command::CancelReply { reply } => {
                let result = self.ensure_unlocked().map(|()| self.composer.cancel_reply());
                let _ = reply.send(result);
            }
            Command::Clear { confirmed, reply } => {
                let _ = reply.send(self.clear(confirmed));
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(self.snapshot());
            }
        }
    }

    fn handle_event(&mut self, event: Event) {
        if let Err(e) = self.apply(event) {
            tracing::warn!(error = %e, state = self.state.name(), "Dropped dispatcher event");
        }
    }

    fn apply(&mut self, event: Event) -> Result<(), TransitionError> {
        let result = transition(&self.state, event)?;
        self.state = result.new_state;
        for effect in result.effects {
            self.execute_effect(effect);
        }
        Ok(())
    }

    fn ensure_unlocked(&self) -> Result<(), RuntimeError> {
        if self.session.is_authenticated() {
            Ok(())
        } else {
            Err(RuntimeError::Locked)
        }
    }

    fn authenticate(&mut self, secret: &str) -> bool {
        let before = self.session.messages().len();
        let accepted = self.session.authenticate(secret);
        let seeded: Vec<_> = self.session.messages()[before..].to_vec();
        for message in seeded {
            self.broadcast_message(message);
        }
        accepted
    }

    fn submit(&mut self, text: Option<String>) -> Result<SubmitOutcome, RuntimeError> {
        self.ensure_unlocked()?;

        let text = text.unwrap_or_else(|| self.composer.draft().to_string());
        let message_id = new_message_id();
        let event = Event::Submit {
            message_id: message_id.clone(),
            text,
            reply_to: self.composer.reply_target().map(String::from),
            at: Utc::now(),
        };

        match self.apply(event) {
            Ok(()) => Ok(SubmitOutcome::Queued { message_id }),
            Err(e) => {
                tracing::debug!(reason = %e, "Submission ignored");
                Ok(SubmitOutcome::Ignored)
            }
        }
    }

    /// Only ids present right now are accepted; the target may still be
    /// cleared away before the message is sent.
    fn set_reply_target(&mut self, message_id: MessageId) -> Result<(), RuntimeError> {
        self.ensure_unlocked()?;
        if self.session.find_by_id(&message_id).is_none() {
            return Err(RuntimeError::UnknownMessage(message_id));
        }
        self.composer.set_reply_target(message_id);
        Ok(())
    }

    fn clear(&mut self, confirmed: bool) -> Result<bool, RuntimeError> {
        self.ensure_unlocked()?;
        let cleared = self
            .session
            .clear(confirmed)
            .map_err(|e| RuntimeError::Storage(e.to_string()))?;
        if cleared {
            let _ = self.broadcast_tx.send(ChatEvent::Cleared);
        }
        Ok(cleared)
    }

    fn snapshot(&self) -> Snapshot {
        let authenticated = self.session.is_authenticated();
        Snapshot {
            authenticated,
            state: self.state.clone(),
            draft: self.composer.draft().to_string(),
            reply_target: self.composer.reply_target().map(String::from),
            messages: if authenticated {
                self.session.messages().to_vec()
            } else {
                Vec::new()
            },
        }
    }

    fn execute_effect(&mut self, effect: Effect) {
        match effect {
            Effect::ResetComposer => self.composer.reset(),

            Effect::AppendMessage(message) => {
                if let Err(e) = self.session.append(message.clone()) {
                    tracing::error!(error = %e, message_id = %message.id, "Failed to persist message");
                }
                self.broadcast_message(message);
            }

            Effect::RequestReply {
                message_id,
                reply_to,
            } => self.request_reply(message_id, reply_to.as_deref()),

            Effect::LogFailure { request_id, error } => {
                tracing::warn!(
                    request_id = %request_id,
                    error = %error,
                    "Reply failed; appending fallback message"
                );
            }

            Effect::NotifyStateChange { state } => {
                let _ = self.broadcast_tx.send(ChatEvent::StateChange { state });
            }
        }
    }

    fn broadcast_message(&self, message: Message) {
        let reply_quote = message
            .reply_to
            .as_deref()
            .and_then(|id| self.session.find_by_id(id))
            .map(|target| target.text.clone());
        let _ = self.broadcast_tx.send(ChatEvent::Message {
            message,
            reply_quote,
        });
    }

    /// Build the prompt now and run the call on its own task; the outcome
    /// comes back through `event_rx`.
    fn request_reply(&self, message_id: MessageId, reply_to: Option<&str>) {
        let messages = self.session.messages();
        let Some(current) = messages.iter().rev().find(|m| m.id == message_id) else {
            // The user message is appended before the request effect runs
            let _ = self.event_tx.try_send(Event::ReplyFailed {
                request_id: message_id.clone(),
                reply_id: new_message_id(),
                error: format!("user message {message_id} missing from conversation"),
                at: Utc::now(),
            });
            return;
        };

        let window = prompt::context_window(messages, self.config.context_messages);
        let quote = prompt::reply_context(messages, reply_to);
        let request = LlmRequest::new(prompt::compose(
            &self.config.persona,
            &window,
            &quote,
            &current.text,
        ));

        tracing::info!(
            message_id = %message_id,
            context_messages = window.len(),
            replying = !quote.is_empty(),
            "Requesting reply"
        );

        let llm = Arc::clone(&self.llm);
        let event_tx = self.event_tx.clone();
        tokio::spawn(async move {
            let event = match llm.complete(&request).await {
                Ok(response) => Event::ReplyReceived {
                    request_id: message_id,
                    reply_id: new_message_id(),
                    text: response.text,
                    at: Utc::now(),
                },
                Err(e) => Event::ReplyFailed {
                    request_id: message_id,
                    reply_id: new_message_id(),
                    error: e.to_string(),
                    at: Utc::now(),
                },
            };
            let _ = event_tx.send(event).await;
        });
    }
}
