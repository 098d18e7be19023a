//! Seams between the engine and the chatbot under test.

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::functions::FunctionRegistry;
use crate::transcript::ChatbotContext;

/// Binding between the engine and one chatbot implementation.
pub trait ChatbotAdapter {
    /// Hand `message` to the chatbot. A returned reply is recorded as the
    /// chatbot's turn; replies dispatched internally go through
    /// [`ChatbotContext::record_chatbot_message`] instead.
    fn handle_message(
        &mut self,
        message: &str,
        ctx: &mut ChatbotContext<'_>,
    ) -> anyhow::Result<Option<String>>;

    /// Client used for generated user messages and AI checks.
    fn completion_client(&self) -> Option<&dyn CompletionClient> {
        None
    }

    fn model_name(&self) -> &str {
        ""
    }

    /// Register the functions scripts may call by name.
    fn register_functions(registry: &mut FunctionRegistry<Self>) -> Result<(), EngineError>
    where
        Self: Sized,
    {
        let _ = registry;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

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
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
}

/// Text-completion service. Implementations wrap whatever provider the
/// adapter talks to.
pub trait CompletionClient {
    fn complete(&self, request: &CompletionRequest) -> anyhow::Result<String>;
}

impl<F> CompletionClient for F
where
    F: Fn(&CompletionRequest) -> anyhow::Result<String>,
{
    fn complete(&self, request: &CompletionRequest) -> anyhow::Result<String> {
        self(request)
    }
}
