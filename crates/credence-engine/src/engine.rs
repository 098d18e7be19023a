//! The conversation execution engine.
//!
//! A run walks the interaction tree depth-first, threading one `has_failed`
//! flag. Once anything fails, every later interaction (nested ones
//! included) is reported as skipped instead of executed, so the result tree
//! always has one entry per scripted interaction.

use chrono::Utc;
use credence_core::{
    Check, CheckContext, CheckResult, Conversation, ConversationResult, EngineConfig,
    FunctionArgs, Interaction, InteractionKind, InteractionOutcome, InteractionResult,
    RequirementEvaluator, Role, Status,
};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::adapter::ChatbotAdapter;
use crate::error::{error_chain, EngineError, GenerationError};
use crate::functions::FunctionRegistry;
use crate::llm::{LlmRequirementEvaluator, UserSimulator};
use crate::transcript::{ChatbotContext, Transcript};

pub struct Engine<A: ChatbotAdapter> {
    adapter: A,
    functions: FunctionRegistry<A>,
    config: EngineConfig,
}

impl<A: ChatbotAdapter> Engine<A> {
    /// Wrap `adapter`, collecting the functions it registers.
    pub fn new(adapter: A) -> Result<Self, EngineError> {
        let mut functions = FunctionRegistry::new();
        A::register_functions(&mut functions)?;
        Ok(Self {
            adapter,
            functions,
            config: EngineConfig::default(),
        })
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn functions(&self) -> &FunctionRegistry<A> {
        &self.functions
    }

    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    pub fn adapter_mut(&mut self) -> &mut A {
        &mut self.adapter
    }

    pub fn into_adapter(self) -> A {
        self.adapter
    }

    /// Run `conversation` against the adapter with a fresh transcript.
    ///
    /// Chatbot misbehaviour is recorded in the returned result; only a
    /// malformed script (a function name nothing registered) is an error,
    /// and it is reported before any interaction runs.
    pub fn test(&mut self, conversation: &Conversation) -> Result<ConversationResult, EngineError> {
        self.preflight(conversation)?;

        info!(title = %conversation.title, "testing conversation");
        let mut run = Run {
            adapter: &mut self.adapter,
            functions: &self.functions,
            config: &self.config,
            transcript: Transcript::new(),
            testing_time: Duration::ZERO,
        };
        let result = run.conversation(conversation, false);

        if result.failed {
            warn!(
                title = %result.title,
                errors = result.error_messages().len(),
                chatbot_ms = result.chatbot_time_ms,
                testing_ms = result.testing_time_ms,
                "conversation failed"
            );
        } else {
            info!(
                title = %result.title,
                chatbot_ms = result.chatbot_time_ms,
                testing_ms = result.testing_time_ms,
                "conversation passed"
            );
        }
        Ok(result)
    }

    /// Run every conversation in order. All scripts are checked up front.
    pub fn test_suite(
        &mut self,
        conversations: &[Conversation],
    ) -> Result<Vec<ConversationResult>, EngineError> {
        for conversation in conversations {
            self.preflight(conversation)?;
        }
        conversations
            .iter()
            .map(|conversation| self.test(conversation))
            .collect()
    }

    fn preflight(&self, conversation: &Conversation) -> Result<(), EngineError> {
        match conversation
            .function_names()
            .into_iter()
            .find(|name| !self.functions.contains(name))
        {
            Some(name) => Err(EngineError::UnknownFunction {
                name: name.to_string(),
                conversation: conversation.title.clone(),
            }),
            None => Ok(()),
        }
    }
}

/// State of one top-level `test` call, shared by nested conversations.
struct Run<'e, A> {
    adapter: &'e mut A,
    functions: &'e FunctionRegistry<A>,
    config: &'e EngineConfig,
    transcript: Transcript,
    /// Time spent generating user turns and evaluating checks.
    testing_time: Duration,
}

impl<A: ChatbotAdapter> Run<'_, A> {
    fn conversation(&mut self, conversation: &Conversation, skipped: bool) -> ConversationResult {
        let started_at = Utc::now();
        let clock = Instant::now();
        let testing_before = self.testing_time;
        let first_turn = self.transcript.len();

        let mut has_failed = skipped;
        let mut results = Vec::with_capacity(conversation.interactions.len());
        for interaction in &conversation.interactions {
            debug!(
                id = %interaction.id,
                kind = interaction.kind.as_str(),
                skipped = has_failed,
                "dispatching interaction"
            );
            let result = self.interaction(interaction, has_failed);
            has_failed |= !result.status.is_passed();
            results.push(result);
        }

        let testing = self.testing_time.saturating_sub(testing_before);
        let elapsed = clock.elapsed();
        ConversationResult {
            conversation_id: conversation.id.clone(),
            version_id: conversation.version_id.clone(),
            title: conversation.title.clone(),
            messages: self.transcript.messages()[first_turn..].to_vec(),
            failed: ConversationResult::any_failed(&results),
            interaction_results: results,
            chatbot_time_ms: millis(elapsed.saturating_sub(testing)),
            testing_time_ms: millis(testing),
            started_at,
            finished_at: Utc::now(),
        }
    }

    fn interaction(&mut self, interaction: &Interaction, skipped: bool) -> InteractionResult {
        let (status, outcome) = match &interaction.kind {
            InteractionKind::UserMessage { text, generated } => {
                self.user_message(text, *generated, skipped)
            }
            InteractionKind::ChatbotResponds { expectations } => {
                self.chatbot_responds(expectations, skipped)
            }
            InteractionKind::ChatbotIgnoresMessage => self.chatbot_ignores_message(skipped),
            InteractionKind::FunctionCall { name, args } => self.function_call(name, args, skipped),
            InteractionKind::NestedConversation { name, conversation } => {
                debug!(name = %name, skipped, "entering nested conversation");
                let result = self.conversation(conversation, skipped);
                let status = if skipped {
                    Status::Skipped
                } else if result.failed {
                    Status::Failed
                } else {
                    Status::Passed
                };
                (status, InteractionOutcome::NestedConversation { result })
            }
        };

        InteractionResult {
            interaction: interaction.clone(),
            status,
            outcome,
        }
    }

    fn user_message(
        &mut self,
        text: &str,
        generated: bool,
        skipped: bool,
    ) -> (Status, InteractionOutcome) {
        let outcome = |sent: Option<String>,
                       unexpected_message: Option<String>,
                       generation_error: Option<String>,
                       handler_error: Option<String>| {
            InteractionOutcome::UserMessage {
                sent,
                unexpected_message,
                generation_error,
                handler_error,
            }
        };

        if skipped {
            return (Status::Skipped, outcome(None, None, None, None));
        }

        if let Some(pending) = self.transcript.take_next_chatbot_message() {
            warn!(message = %pending.body, "unexpected chatbot message before user turn");
            return (Status::Failed, outcome(None, Some(pending.body), None, None));
        }

        let message = if generated {
            match self.generate(text) {
                Ok(message) => message,
                Err(err) => {
                    warn!(prompt = text, error = %err, "user message generation failed");
                    // Keep the prompt in the log for diagnosis.
                    self.transcript.record(Role::User, text);
                    let trace = trace_tail(&err.to_string(), self.config.report.error_trace_limit);
                    return (Status::Failed, outcome(None, None, Some(trace), None));
                }
            }
        } else {
            text.to_string()
        };

        self.transcript.record(Role::User, message.as_str());
        self.transcript.clear_metadata();
        let reply = {
            let mut ctx = ChatbotContext::new(&mut self.transcript);
            self.adapter.handle_message(&message, &mut ctx)
        };

        match reply {
            Ok(Some(reply)) if !reply.is_empty() => {
                self.transcript.record(Role::Chatbot, reply);
                (Status::Passed, outcome(Some(message), None, None, None))
            }
            Ok(_) => (Status::Passed, outcome(Some(message), None, None, None)),
            Err(err) => {
                warn!(message = %message, error = %err, "chatbot failed to handle message");
                let trace = capture_trace(&err, self.config.report.error_trace_limit);
                (Status::Failed, outcome(Some(message), None, None, Some(trace)))
            }
        }
    }

    fn generate(&mut self, prompt: &str) -> Result<String, GenerationError> {
        let clock = Instant::now();
        let generated = match self.adapter.completion_client() {
            Some(client) => UserSimulator::new(
                client,
                self.adapter.model_name(),
                &self.config.generation.user_prompt,
            )
            .generate(self.transcript.messages(), prompt),
            None => Err(GenerationError::NoClient {
                purpose: "generated user messages",
            }),
        };
        self.testing_time += clock.elapsed();
        generated
    }

    fn chatbot_responds(
        &mut self,
        expectations: &[Check],
        skipped: bool,
    ) -> (Status, InteractionOutcome) {
        let response = self.transcript.take_next_chatbot_message();

        if skipped {
            return (
                Status::Skipped,
                InteractionOutcome::ChatbotResponds {
                    response,
                    check_results: expectations.iter().map(Check::skip).collect(),
                    missing_message: false,
                },
            );
        }

        let Some(response) = response else {
            warn!("expected a chatbot message but none had been sent");
            return (
                Status::Failed,
                InteractionOutcome::ChatbotResponds {
                    response: None,
                    check_results: Vec::new(),
                    missing_message: true,
                },
            );
        };

        let clock = Instant::now();
        let evaluator = self.adapter.completion_client().map(|client| {
            LlmRequirementEvaluator::new(
                client,
                self.adapter.model_name(),
                &self.config.checks.system_prompt,
                self.config.checks.invalid_response_retries,
            )
        });
        let context = CheckContext {
            response: &response,
            transcript: self.transcript.history_through(response.index),
            evaluator: evaluator
                .as_ref()
                .map(|evaluator| evaluator as &dyn RequirementEvaluator),
        };
        let check_results: Vec<CheckResult> = expectations
            .iter()
            .map(|check| check.evaluate(&context, false))
            .collect();
        self.testing_time += clock.elapsed();

        for result in check_results.iter().filter(|r| r.status.is_failed()) {
            warn!(
                check = %result.check.describe(),
                response = %response.body,
                failure = ?result.failure,
                "check failed"
            );
        }

        let status = if check_results.iter().any(|r| r.status.is_failed()) {
            Status::Failed
        } else {
            Status::Passed
        };
        (
            status,
            InteractionOutcome::ChatbotResponds {
                response: Some(response),
                check_results,
                missing_message: false,
            },
        )
    }

    fn chatbot_ignores_message(&mut self, skipped: bool) -> (Status, InteractionOutcome) {
        let unhandled_message = self
            .transcript
            .take_next_chatbot_message()
            .map(|message| message.body);

        let status = match (&unhandled_message, skipped) {
            (_, true) => Status::Skipped,
            (None, false) => Status::Passed,
            (Some(message), false) => {
                warn!(message = %message, "chatbot replied to a message it should ignore");
                Status::Failed
            }
        };
        (
            status,
            InteractionOutcome::ChatbotIgnoresMessage { unhandled_message },
        )
    }

    fn function_call(
        &mut self,
        name: &str,
        args: &FunctionArgs,
        skipped: bool,
    ) -> (Status, InteractionOutcome) {
        if skipped {
            return (
                Status::Skipped,
                InteractionOutcome::FunctionCall {
                    execution_error: None,
                },
            );
        }

        let called = {
            let mut ctx = ChatbotContext::new(&mut self.transcript);
            self.functions
                .call(name, &mut *self.adapter, args, &mut ctx)
        };

        match called {
            Ok(()) => (
                Status::Passed,
                InteractionOutcome::FunctionCall {
                    execution_error: None,
                },
            ),
            Err(err) => {
                warn!(function = name, error = %err, "function call failed");
                (
                    Status::Failed,
                    InteractionOutcome::FunctionCall {
                        execution_error: Some(capture_trace(
                            &err,
                            self.config.report.error_trace_limit,
                        )),
                    },
                )
            }
        }
    }
}

/// The error chain, `Caused by` lines included, cut to its last `limit`
/// characters.
fn capture_trace(err: &anyhow::Error, limit: usize) -> String {
    trace_tail(&error_chain(err), limit)
}

pub fn trace_tail(trace: &str, limit: usize) -> String {
    let count = trace.chars().count();
    if count <= limit {
        return trace.to_string();
    }
    match trace.char_indices().nth(count - limit) {
        Some((start, _)) => trace[start..].to_string(),
        None => String::new(),
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
