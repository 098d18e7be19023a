//! Scripted adapter and completion client used by the engine tests.

use credence_core::FunctionArgs;
use std::cell::RefCell;
use std::collections::VecDeque;

use crate::adapter::{ChatbotAdapter, CompletionClient, CompletionRequest};
use crate::error::EngineError;
use crate::functions::{string_arg, FunctionRegistry};
use crate::transcript::ChatbotContext;

/// Completion client that replays queued replies and remembers requests.
#[derive(Default)]
pub struct ScriptedClient {
    replies: RefCell<VecDeque<anyhow::Result<String>>>,
    requests: RefCell<Vec<CompletionRequest>>,
    delay: Option<std::time::Duration>,
}

impl ScriptedClient {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: RefCell::new(replies.into_iter().map(|reply| Ok(reply.into())).collect()),
            ..Self::default()
        }
    }

    pub fn failing(message: &str) -> Self {
        let client = Self::default();
        client
            .replies
            .borrow_mut()
            .push_back(Err(anyhow::anyhow!(message.to_string())));
        client
    }

    pub fn with_delay(mut self, delay: std::time::Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.borrow().clone()
    }

    pub fn verdict(met: bool, reason: &str) -> String {
        serde_json::json!({ "requirement_met": met, "reason": reason }).to_string()
    }
}

impl CompletionClient for ScriptedClient {
    fn complete(&self, request: &CompletionRequest) -> anyhow::Result<String> {
        self.requests.borrow_mut().push(request.clone());
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        self.replies
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Err(anyhow::anyhow!("scripted client has no reply left")))
    }
}

/// Greets everyone; answers `math:` questions only for an enrolled user.
#[derive(Default)]
pub struct MathChatbot {
    pub user: Option<String>,
    pub client: Option<ScriptedClient>,
    pub handled: usize,
}

impl MathChatbot {
    pub fn with_client(client: ScriptedClient) -> Self {
        Self {
            client: Some(client),
            ..Self::default()
        }
    }

    pub fn client(&self) -> &ScriptedClient {
        self.client
            .as_ref()
            .expect("test adapter was built without a client")
    }
}

impl ChatbotAdapter for MathChatbot {
    fn handle_message(
        &mut self,
        message: &str,
        ctx: &mut ChatbotContext<'_>,
    ) -> anyhow::Result<Option<String>> {
        self.handled += 1;

        if message.contains("Hi") || message.contains("Hello") {
            let greeting = match &self.user {
                Some(user) => format!("Hi {user}."),
                None => "Hello there.".to_string(),
            };
            return Ok(Some(format!("{greeting} My name is credence")));
        }

        if let Some(question) = message.strip_prefix("math:") {
            if self.user.is_none() {
                return Ok(None);
            }
            ctx.collect_metadata("chatbot.handler", "math");
            ctx.collect_metadata("chatbot.operands", 2);
            return evaluate(question).map(|answer| Some(answer.to_string()));
        }

        if message.starts_with("quiet:") {
            ctx.collect_metadata("flow", "ignored");
            return Ok(None);
        }

        if let Some(text) = message.strip_prefix("later:") {
            ctx.collect_metadata("chatbot.handler", "dispatch");
            ctx.record_chatbot_message(text.trim());
            return Ok(None);
        }

        Ok(None)
    }

    fn completion_client(&self) -> Option<&dyn CompletionClient> {
        self.client
            .as_ref()
            .map(|client| client as &dyn CompletionClient)
    }

    fn model_name(&self) -> &str {
        "scripted-model"
    }

    fn register_functions(registry: &mut FunctionRegistry<Self>) -> Result<(), EngineError> {
        registry.register(
            "enrol_user",
            |bot: &mut MathChatbot, args: &FunctionArgs, _ctx: &mut ChatbotContext<'_>| {
                bot.user = Some(string_arg(args, "name")?.to_string());
                Ok(())
            },
        )?;
        registry.register(
            "announce",
            |_bot: &mut MathChatbot, args: &FunctionArgs, ctx: &mut ChatbotContext<'_>| {
                ctx.record_chatbot_message(string_arg(args, "text")?);
                Ok(())
            },
        )?;
        registry.register(
            "reset",
            |bot: &mut MathChatbot, _args: &FunctionArgs, _ctx: &mut ChatbotContext<'_>| {
                bot.user = None;
                Ok(())
            },
        )?;
        Ok(())
    }
}

/// `<int> <op> <int>` for `+ - * /`.
fn evaluate(question: &str) -> anyhow::Result<i64> {
    let parts: Vec<&str> = question.split_whitespace().collect();
    let [lhs, op, rhs] = parts.as_slice() else {
        anyhow::bail!("cannot evaluate {question:?}");
    };
    let lhs: i64 = lhs.parse()?;
    let rhs: i64 = rhs.parse()?;
    match *op {
        "+" => Ok(lhs + rhs),
        "-" => Ok(lhs - rhs),
        "*" => Ok(lhs * rhs),
        "/" if rhs == 0 => anyhow::bail!("division by zero"),
        "/" => Ok(lhs / rhs),
        other => anyhow::bail!("unsupported operator {other}"),
    }
}
