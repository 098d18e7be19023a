//! The scriptable steps of a conversation.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::check::Check;
use crate::conversation::Conversation;
use crate::types::InteractionId;

/// Named arguments passed to a registered adapter function.
pub type FunctionArgs = BTreeMap<String, Value>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    pub id: InteractionId,
    #[serde(flatten)]
    pub kind: InteractionKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InteractionKind {
    /// `generated = true` treats `text` as a prompt for the user simulator.
    UserMessage { text: String, generated: bool },
    ChatbotResponds { expectations: Vec<Check> },
    ChatbotIgnoresMessage,
    FunctionCall { name: String, args: FunctionArgs },
    NestedConversation {
        name: String,
        conversation: Arc<Conversation>,
    },
}

impl InteractionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            InteractionKind::UserMessage { .. } => "user_message",
            InteractionKind::ChatbotResponds { .. } => "chatbot_responds",
            InteractionKind::ChatbotIgnoresMessage => "chatbot_ignores_message",
            InteractionKind::FunctionCall { .. } => "function_call",
            InteractionKind::NestedConversation { .. } => "nested_conversation",
        }
    }
}

impl Interaction {
    pub fn new(kind: InteractionKind) -> Self {
        Self {
            id: InteractionId::generate(),
            kind,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = InteractionId::new(id);
        self
    }

    pub fn is_user_interaction(&self) -> bool {
        matches!(self.kind, InteractionKind::UserMessage { .. })
    }

    pub fn is_chatbot_interaction(&self) -> bool {
        matches!(
            self.kind,
            InteractionKind::ChatbotResponds { .. } | InteractionKind::ChatbotIgnoresMessage
        )
    }

    /// The builder call that produces this interaction, indented for nesting.
    pub fn to_script(&self) -> String {
        match &self.kind {
            InteractionKind::UserMessage {
                text,
                generated: false,
            } => format!("User.message({text:?})"),
            InteractionKind::UserMessage {
                text,
                generated: true,
            } => format!("User.generated({text:?})"),
            InteractionKind::ChatbotResponds { expectations } if expectations.is_empty() => {
                "Chatbot.responds([])".to_string()
            }
            InteractionKind::ChatbotResponds { expectations } => {
                let mut out = "Chatbot.responds([".to_string();
                for check in expectations {
                    out.push_str("\n    ");
                    out.push_str(&check.to_script());
                    out.push(',');
                }
                out.push_str("\n])");
                out
            }
            InteractionKind::ChatbotIgnoresMessage => "Chatbot.ignores_message()".to_string(),
            InteractionKind::FunctionCall { name, args } if args.is_empty() => {
                format!("FunctionCall({name:?})")
            }
            InteractionKind::FunctionCall { name, args } => {
                let args = Value::Object(args.clone().into_iter().collect());
                format!("FunctionCall({name:?}, {args})")
            }
            InteractionKind::NestedConversation { conversation, .. } => {
                let inner = conversation
                    .to_script()
                    .lines()
                    .map(|line| format!("  {line}"))
                    .collect::<Vec<_>>()
                    .join("\n");
                format!("Conversation.nested(\n{inner},\n)")
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Builders
// ─────────────────────────────────────────────────────────────────────────────

/// Builders for simulated user turns.
pub struct User;

impl User {
    /// Send `text` to the chatbot verbatim.
    pub fn message(text: impl Into<String>) -> Interaction {
        Interaction::new(InteractionKind::UserMessage {
            text: text.into(),
            generated: false,
        })
    }

    /// Ask the user simulator to write the message from `prompt`.
    pub fn generated(prompt: impl Into<String>) -> Interaction {
        Interaction::new(InteractionKind::UserMessage {
            text: prompt.into(),
            generated: true,
        })
    }
}

/// Builders for chatbot turns.
pub struct Chatbot;

impl Chatbot {
    pub fn responds(expectations: Vec<Check>) -> Interaction {
        Interaction::new(InteractionKind::ChatbotResponds { expectations })
    }

    pub fn ignores_message() -> Interaction {
        Interaction::new(InteractionKind::ChatbotIgnoresMessage)
    }
}

/// Builder for a call to a function registered on the adapter.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionCall {
    name: String,
    args: FunctionArgs,
}

impl FunctionCall {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: FunctionArgs::new(),
        }
    }

    pub fn arg(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.args.insert(key.into(), value.into());
        self
    }

    pub fn build(self) -> Interaction {
        Interaction::new(InteractionKind::FunctionCall {
            name: self.name,
            args: self.args,
        })
    }
}

impl From<FunctionCall> for Interaction {
    fn from(call: FunctionCall) -> Self {
        call.build()
    }
}
