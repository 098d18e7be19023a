//! Result tree produced by one conversation execution.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::check::{CheckFailure, CheckResult};
use crate::interaction::Interaction;
use crate::message::Message;
use crate::types::{ConversationId, Status};

/// Variant-specific detail of an interaction result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InteractionOutcome {
    UserMessage {
        /// Text actually sent to the chatbot (the generated text for
        /// generated messages).
        #[serde(default)]
        sent: Option<String>,
        /// A chatbot reply that was still pending when the user turn began.
        #[serde(default)]
        unexpected_message: Option<String>,
        #[serde(default)]
        generation_error: Option<String>,
        #[serde(default)]
        handler_error: Option<String>,
    },
    ChatbotResponds {
        #[serde(default)]
        response: Option<Message>,
        #[serde(default)]
        check_results: Vec<CheckResult>,
        /// No chatbot reply was pending; checks were not evaluated.
        #[serde(default)]
        missing_message: bool,
    },
    ChatbotIgnoresMessage {
        #[serde(default)]
        unhandled_message: Option<String>,
    },
    FunctionCall {
        #[serde(default)]
        execution_error: Option<String>,
    },
    NestedConversation { result: ConversationResult },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionResult {
    pub interaction: Interaction,
    pub status: Status,
    pub outcome: InteractionOutcome,
}

impl InteractionResult {
    /// True when this result or anything nested below it failed.
    pub fn contains_failure(&self) -> bool {
        match &self.outcome {
            InteractionOutcome::NestedConversation { result } => {
                self.status.is_failed() || result.failed
            }
            _ => self.status.is_failed(),
        }
    }

    /// Human-readable diagnostics for a failed result.
    pub fn error_messages(&self) -> Vec<String> {
        if !self.status.is_failed() {
            return Vec::new();
        }

        match &self.outcome {
            InteractionOutcome::UserMessage {
                unexpected_message,
                generation_error,
                handler_error,
                ..
            } => {
                let mut errors = Vec::new();
                if let Some(message) = unexpected_message {
                    errors.push(format!("Unexpected chatbot message:\n{message}"));
                }
                if let Some(trace) = generation_error {
                    errors.push(format!("Error while generating response:\n{trace}"));
                }
                if let Some(trace) = handler_error {
                    errors.push(format!("Error while handling message:\n{trace}"));
                }
                errors
            }
            InteractionOutcome::ChatbotResponds {
                missing_message: true,
                ..
            } => vec!["Expected a chatbot message but none had been sent".to_string()],
            InteractionOutcome::ChatbotResponds { check_results, .. } => check_results
                .iter()
                .filter(|result| result.status.is_failed())
                .map(check_error_message)
                .collect(),
            InteractionOutcome::ChatbotIgnoresMessage { unhandled_message } => unhandled_message
                .iter()
                .map(|message| format!("Unhandled chatbot message:\n{message}"))
                .collect(),
            InteractionOutcome::FunctionCall { execution_error } => execution_error
                .iter()
                .map(|trace| format!("Error while calling function:\n{trace}"))
                .collect(),
            InteractionOutcome::NestedConversation { result } => result.error_messages(),
        }
    }
}

fn check_error_message(result: &CheckResult) -> String {
    use crate::check::Check;

    match (&result.failure, &result.check) {
        (Some(CheckFailure::MissingKey { key, .. }), _) => {
            format!("Metadata key is missing:\n{key}")
        }
        (Some(CheckFailure::UnmetRequirement { reason }), _) => {
            format!("Requirement not met:\n{reason}")
        }
        (Some(CheckFailure::GenerationError { trace }), _) => {
            format!("Error while generating response:\n{trace}")
        }
        (_, Check::Metadata(check)) => format!(
            "Metadata value for {} did not meet requirement:\n{}",
            check.key,
            result.check.describe()
        ),
        (_, _) => format!(
            "Chatbot response did not meet requirement:\n{}",
            result.check.describe()
        ),
    }
}

/// Outcome of running one conversation (recursively for nested ones).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationResult {
    pub conversation_id: Option<ConversationId>,
    pub version_id: Option<String>,
    pub title: String,
    pub messages: Vec<Message>,
    pub failed: bool,
    pub interaction_results: Vec<InteractionResult>,
    pub chatbot_time_ms: u64,
    pub testing_time_ms: u64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Per-status counts over a result tree, nested interactions included.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultSummary {
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl ResultSummary {
    pub fn total(&self) -> usize {
        self.passed + self.failed + self.skipped
    }
}

impl ConversationResult {
    /// `failed` as derived from a list of interaction results.
    pub fn any_failed(results: &[InteractionResult]) -> bool {
        results.iter().any(InteractionResult::contains_failure)
    }

    pub fn total_time_ms(&self) -> u64 {
        self.chatbot_time_ms + self.testing_time_ms
    }

    pub fn error_messages(&self) -> Vec<String> {
        self.interaction_results
            .iter()
            .flat_map(InteractionResult::error_messages)
            .collect()
    }

    /// Counts leaf interactions; nested conversations contribute their
    /// children rather than themselves.
    pub fn summary(&self) -> ResultSummary {
        let mut summary = ResultSummary::default();
        for result in &self.interaction_results {
            match &result.outcome {
                InteractionOutcome::NestedConversation { result: nested } => {
                    let inner = nested.summary();
                    summary.passed += inner.passed;
                    summary.failed += inner.failed;
                    summary.skipped += inner.skipped;
                }
                _ => match result.status {
                    Status::Passed => summary.passed += 1,
                    Status::Failed => summary.failed += 1,
                    Status::Skipped => summary.skipped += 1,
                },
            }
        }
        summary
    }
}
