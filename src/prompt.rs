//! Prompt construction for a single turn
//!
//! The remote model sees one text payload: the persona instruction, a short
//! transcript of the most recent messages, an optional quote of the message
//! being replied to, and the new user text.

use crate::session::Message;
use std::fmt::Write;

/// Number of recent messages sent with each turn
pub const DEFAULT_CONTEXT_MESSAGES: usize = 5;

/// Who the assistant serves and which language it answers in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Persona {
    pub user_name: String,
    pub language: String,
}

impl Default for Persona {
    fn default() -> Self {
        Self {
            user_name: "Hosna".to_string(),
            language: "Persian (Farsi)".to_string(),
        }
    }
}

impl Persona {
    pub fn instruction(&self) -> String {
        let name = &self.user_name;
        format!(
            "You are an AI assistant created to help {name}. Always respond in {} language with a helpful and supportive tone. Remember that you are not {name} - you are an AI assistant created to help {name}.",
            self.language
        )
    }
}

/// One line of the transcript
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextEntry<'a> {
    pub role: &'static str,
    pub text: &'a str,
}

/// The last `size` messages in chronological order
pub fn context_window(messages: &[Message], size: usize) -> Vec<ContextEntry<'_>> {
    let start = messages.len().saturating_sub(size);
    messages[start..]
        .iter()
        .map(|m| ContextEntry {
            role: m.sender.role_label(),
            text: &m.text,
        })
        .collect()
}

/// Verbatim quote of the reply target, or empty if there is none or it no
/// longer exists
pub fn reply_context(messages: &[Message], reply_to: Option<&str>) -> String {
    reply_to
        .and_then(|id| messages.iter().find(|m| m.id == id))
        .map(|target| format!("In reply to message: \"{}\"\n\n", target.text))
        .unwrap_or_default()
}

pub fn compose(
    persona: &Persona,
    window: &[ContextEntry<'_>],
    reply_context: &str,
    current_text: &str,
) -> String {
    let mut prompt = persona.instruction();
    prompt.push_str("\n\nPrevious conversation:\n");
    let transcript: Vec<String> = window
        .iter()
        .map(|entry| format!("{}: {}", entry.role, entry.text))
        .collect();
    prompt.push_str(&transcript.join("\n"));
    let _ = write!(prompt, "\n\n{reply_context}Current message: {current_text}");
    prompt
}
