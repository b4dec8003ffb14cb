//! HTTP API for the chat session
//!
//! Thin JSON layer over `ChatHandle`; all state lives in the runtime task.

mod handlers;
mod sse;
mod types;

pub use handlers::create_router;
#[allow(unused_imports)] // Public API re-exports
pub use types::*;

use crate::runtime::ChatHandle;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub chat: ChatHandle,
}

impl AppState {
    pub fn new(chat: ChatHandle) -> Self {
        Self { chat }
    }
}
