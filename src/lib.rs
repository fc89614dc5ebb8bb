pub mod constants;
pub mod gemini;
pub mod inventory;
pub mod session;
pub mod web;

use serde::Serialize;

/// Who produced a turn in the conversation.
///
/// The remote model API speaks of a "model" role; everywhere user-facing we
/// call it "assistant". The wire mapping lives in [`gemini`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One entry in a conversation transcript. Append-only once recorded.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatTurn {
    pub role: Role,
    pub text: String,
}

impl ChatTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self { role: Role::User, text: text.into() }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self { role: Role::Assistant, text: text.into() }
    }
}
