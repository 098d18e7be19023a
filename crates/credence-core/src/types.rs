//! Identifiers and small enums shared by scripts and results.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConversationId(pub String);

impl ConversationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ConversationId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Stable identity of one scripted interaction, used to correlate results
/// back to the script source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InteractionId(pub String);

impl InteractionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl std::fmt::Display for InteractionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for InteractionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Who produced a turn in the message log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "user")]
    User,
    #[serde(rename = "assistant")]
    Chatbot,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Chatbot => "assistant",
        }
    }

    pub fn invert(self) -> Self {
        match self {
            Role::User => Role::Chatbot,
            Role::Chatbot => Role::User,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a single check or interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Passed,
    Failed,
    Skipped,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Passed => "passed",
            Status::Failed => "failed",
            Status::Skipped => "skipped",
        }
    }

    pub fn is_passed(self) -> bool {
        matches!(self, Status::Passed)
    }

    pub fn is_failed(self) -> bool {
        matches!(self, Status::Failed)
    }

    pub fn is_skipped(self) -> bool {
        matches!(self, Status::Skipped)
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_serializes_with_chat_completion_names() {
        assert_eq!(serde_json::to_string(&Role::User).unwrap(), "\"user\"");
        assert_eq!(
            serde_json::to_string(&Role::Chatbot).unwrap(),
            "\"assistant\""
        );
        let decoded: Role = serde_json::from_str("\"assistant\"").unwrap();
        assert_eq!(decoded, Role::Chatbot);
    }

    #[test]
    fn role_invert_swaps_sides() {
        assert_eq!(Role::User.invert(), Role::Chatbot);
        assert_eq!(Role::Chatbot.invert(), Role::User);
    }

    #[test]
    fn status_serializes_as_snake_case() {
        assert_eq!(serde_json::to_string(&Status::Skipped).unwrap(), "\"skipped\"");
        assert!(Status::Failed.is_failed());
        assert!(!Status::Skipped.is_passed());
        assert_eq!(Status::Passed.to_string(), "passed");
    }

    #[test]
    fn generated_interaction_ids_are_unique() {
        let a = InteractionId::generate();
        let b = InteractionId::generate();
        assert_ne!(a, b);
        assert_eq!(a.as_ref().len(), 36);
    }
}
