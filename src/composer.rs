//! Pending input and reply target

use crate::session::MessageId;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Composer {
    draft: String,
    reply_target: Option<MessageId>,
}

impl Composer {
    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn reply_target(&self) -> Option<&str> {
        self.reply_target.as_deref()
    }

    pub fn set_draft(&mut self, text: impl Into<String>) {
        self.draft = text.into();
    }

    /// Enter reply mode for the given message
    pub fn set_reply_target(&mut self, id: impl Into<MessageId>) {
        self.reply_target = Some(id.into());
    }

    pub fn cancel_reply(&mut self) {
        self.reply_target = None;
    }

    /// Drop both the draft and the reply target
    pub fn reset(&mut self) {
        self.draft.clear();
        self.reply_target = None;
    }
}
