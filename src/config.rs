//! Process configuration from the environment

use crate::llm::{GeminiConfig, DEFAULT_BASE_URL, DEFAULT_MODEL};
use crate::prompt::{Persona, DEFAULT_CONTEXT_MESSAGES};
use crate::session::DEFAULT_PASSPHRASE;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_path: String,
    pub port: u16,
    pub passphrase: String,
    /// `None` when no API key is set; every turn then gets the fallback reply
    pub gemini: Option<GeminiConfig>,
    pub dispatch: DispatchConfig,
}

/// Settings the runtime needs to build each turn
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    pub persona: Persona,
    pub context_messages: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            persona: Persona::default(),
            context_messages: DEFAULT_CONTEXT_MESSAGES,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let db_path = get("CHAT_DB_PATH").unwrap_or_else(|| {
            let home = get("HOME").unwrap_or_else(|| "/tmp".to_string());
            format!("{home}/.companion-chat/chat.db")
        });

        let port = get("CHAT_PORT")
            .and_then(|p| p.parse().ok())
            .unwrap_or(8000);

        let gemini = get("GEMINI_API_KEY")
            .filter(|key| !key.is_empty())
            .map(|api_key| GeminiConfig {
                model: get("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
                base_url: get("GEMINI_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
                proxy: get("GEMINI_PROXY").filter(|p| !p.is_empty()),
                timeout: get("CHAT_REQUEST_TIMEOUT_SECS")
                    .and_then(|s| s.parse::<u64>().ok())
                    .filter(|secs| *secs > 0)
                    .map(Duration::from_secs),
                ..GeminiConfig::new(api_key)
            });

        let defaults = Persona::default();
        let persona = Persona {
            user_name: get("CHAT_USER_NAME").unwrap_or(defaults.user_name),
            language: get("CHAT_RESPONSE_LANGUAGE").unwrap_or(defaults.language),
        };

        let context_messages = get("CHAT_CONTEXT_MESSAGES")
            .and_then(|n| n.parse().ok())
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_CONTEXT_MESSAGES);

        Self {
            db_path,
            port,
            passphrase: get("CHAT_PASSPHRASE").unwrap_or_else(|| DEFAULT_PASSPHRASE.to_string()),
            gemini,
            dispatch: DispatchConfig {
                persona,
                context_messages,
            },
        }
    }
}
