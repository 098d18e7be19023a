use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::interaction::{Interaction, InteractionKind};
use crate::types::ConversationId;

/// An ordered script of interactions. Built once and shared by reference
/// when nested; per-run state lives in the result tree, never here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ConversationId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_id: Option<String>,
    pub title: String,
    pub interactions: Vec<Interaction>,
}

impl Conversation {
    pub fn new(title: impl Into<String>, interactions: Vec<Interaction>) -> Self {
        Self {
            id: None,
            version_id: None,
            title: title.into(),
            interactions,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(ConversationId::new(id));
        self
    }

    pub fn with_version(mut self, version_id: impl Into<String>) -> Self {
        self.version_id = Some(version_id.into());
        self
    }

    /// Inline `conversation` under its own title.
    pub fn nested(conversation: impl Into<Arc<Conversation>>) -> Interaction {
        let conversation = conversation.into();
        let name = conversation.title.clone();
        Self::nested_as(name, conversation)
    }

    /// Inline `conversation` under `name`.
    pub fn nested_as(
        name: impl Into<String>,
        conversation: impl Into<Arc<Conversation>>,
    ) -> Interaction {
        Interaction::new(InteractionKind::NestedConversation {
            name: name.into(),
            conversation: conversation.into(),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.interactions.is_empty()
    }

    /// Depth-first walk over every interaction, nested ones included.
    pub fn walk<'a>(&'a self, visit: &mut dyn FnMut(&'a Interaction)) {
        for interaction in &self.interactions {
            visit(interaction);
            if let InteractionKind::NestedConversation { conversation, .. } = &interaction.kind {
                conversation.walk(visit);
            }
        }
    }

    /// Names of every function the script calls, in first-use order.
    pub fn function_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        self.walk(&mut |interaction| {
            if let InteractionKind::FunctionCall { name, .. } = &interaction.kind {
                if !names.contains(&name.as_str()) {
                    names.push(name.as_str());
                }
            }
        });
        names
    }

    pub fn to_script(&self) -> String {
        let mut out = format!("Conversation(\n  title={:?},\n  interactions=[", self.title);
        for interaction in &self.interactions {
            for line in interaction.to_script().lines() {
                out.push_str("\n    ");
                out.push_str(line);
            }
            out.push(',');
        }
        if self.interactions.is_empty() {
            out.push_str("],\n)");
        } else {
            out.push_str("\n  ],\n)");
        }
        out
    }
}
