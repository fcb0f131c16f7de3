//! Shared types used across the agent.

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Conversation
// ---------------------------------------------------------------------------

/// One role-tagged turn in the conversation history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }

    /// Whether this turn was injected by the loop to carry tool results.
    pub fn is_observation(&self) -> bool {
        self.role == ChatRole::User && self.content.starts_with("<observation>")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

impl fmt::Display for ChatRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::System => write!(f, "system"),
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
        }
    }
}

// ---------------------------------------------------------------------------
// Loop state machine
// ---------------------------------------------------------------------------

/// States the reasoning loop moves through within one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopState {
    /// Waiting on the chat model.
    AwaitingModel,
    /// Extracting tags from the latest model output.
    ProcessingOutput,
    /// Running the tool calls of the latest turn.
    DispatchingTools,
    /// A terminal response was produced.
    Done,
    /// The run stopped without a response.
    Aborted,
}

impl fmt::Display for LoopState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AwaitingModel => write!(f, "awaiting_model"),
            Self::ProcessingOutput => write!(f, "processing_output"),
            Self::DispatchingTools => write!(f, "dispatching_tools"),
            Self::Done => write!(f, "done"),
            Self::Aborted => write!(f, "aborted"),
        }
    }
}

impl Default for LoopState {
    fn default() -> Self {
        Self::AwaitingModel
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_serialize_lowercase() {
        let json = serde_json::to_string(&ChatMessage::assistant("hi")).unwrap();
        assert_eq!(json, r#"{"role":"assistant","content":"hi"}"#);
    }

    #[test]
    fn observation_turns_are_recognised() {
        assert!(ChatMessage::user("<observation>{}</observation>").is_observation());
        assert!(!ChatMessage::user("<question>q</question>").is_observation());
        assert!(!ChatMessage::assistant("<observation>{}</observation>").is_observation());
    }
}
