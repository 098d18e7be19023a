use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::types::Role;

/// Metadata captured from the chatbot while it produced one reply.
pub type MetadataSnapshot = BTreeMap<String, String>;

/// One recorded turn. Created once by the engine and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub index: usize,
    pub role: Role,
    pub body: String,
    /// Present only on chatbot turns.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<MetadataSnapshot>,
}

impl Message {
    pub fn user(index: usize, body: impl Into<String>) -> Self {
        Self {
            index,
            role: Role::User,
            body: body.into(),
            metadata: None,
        }
    }

    pub fn chatbot(index: usize, body: impl Into<String>, metadata: MetadataSnapshot) -> Self {
        Self {
            index,
            role: Role::Chatbot,
            body: body.into(),
            metadata: Some(metadata),
        }
    }

    pub fn is_chatbot(&self) -> bool {
        matches!(self.role, Role::Chatbot)
    }

    /// Metadata of a chatbot turn; user turns report an empty map.
    pub fn metadata(&self) -> &MetadataSnapshot {
        static EMPTY: MetadataSnapshot = BTreeMap::new();
        self.metadata.as_ref().unwrap_or(&EMPTY)
    }
}

/// Render a transcript as `role: body` lines.
pub fn transcript_lines(messages: &[Message]) -> String {
    let mut out = String::new();
    for message in messages {
        out.push_str(message.role.as_str());
        out.push_str(": ");
        out.push_str(&message.body);
        out.push('\n');
    }
    out
}
