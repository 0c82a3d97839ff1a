//! Conversation history normalization.
//!
//! Clients speak `user`/`assistant`; providers each have their own role
//! names for the model side. Normalization maps turns into the active
//! provider's vocabulary and nothing else.

use gargi_core::{ChatRole, ChatTurn};

/// Role names a provider expects for each side of the conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleVocabulary {
    pub user: &'static str,
    pub assistant: &'static str,
}

impl RoleVocabulary {
    /// OpenAI chat completions roles.
    pub const OPENAI: RoleVocabulary = RoleVocabulary {
        user: "user",
        assistant: "assistant",
    };

    /// Gemini `contents` roles.
    pub const GEMINI: RoleVocabulary = RoleVocabulary {
        user: "user",
        assistant: "model",
    };

    pub fn role_for(&self, role: ChatRole) -> &'static str {
        match role {
            ChatRole::User => self.user,
            ChatRole::Assistant => self.assistant,
        }
    }
}

/// A history turn expressed in a provider's role vocabulary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderTurn {
    pub role: &'static str,
    pub text: String,
}

/// Map client turns onto provider roles, preserving order and content.
pub fn normalize_history(history: &[ChatTurn], vocabulary: RoleVocabulary) -> Vec<ProviderTurn> {
    history
        .iter()
        .map(|turn| ProviderTurn {
            role: vocabulary.role_for(turn.role),
            text: turn.content.clone(),
        })
        .collect()
}
