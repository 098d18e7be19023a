//! Completion-backed user simulation and requirement evaluation.

use credence_core::{
    transcript_lines, EvaluationError, Message, RequirementEvaluator, RequirementVerdict,
};
use tracing::debug;

use crate::adapter::{ChatMessage, CompletionClient, CompletionRequest};
use crate::error::{error_chain, GenerationError};

/// Writes the next user turn from a prompt and the running transcript.
pub struct UserSimulator<'a> {
    client: &'a dyn CompletionClient,
    model: &'a str,
    system_prompt: &'a str,
}

impl<'a> UserSimulator<'a> {
    pub fn new(client: &'a dyn CompletionClient, model: &'a str, system_prompt: &'a str) -> Self {
        Self {
            client,
            model,
            system_prompt,
        }
    }

    pub fn request(&self, history: &[Message], prompt: &str) -> CompletionRequest {
        let mut system = self.system_prompt.trim().to_string();
        if !history.is_empty() {
            system.push_str("\nContext:\n");
            system.push_str(&transcript_lines(history));
        }

        CompletionRequest {
            model: self.model.to_string(),
            messages: vec![ChatMessage::system(system), ChatMessage::user(prompt)],
        }
    }

    pub fn generate(&self, history: &[Message], prompt: &str) -> Result<String, GenerationError> {
        let request = self.request(history, prompt);
        let text = self
            .client
            .complete(&request)
            .map_err(|source| GenerationError::Request { source })?;
        debug!(prompt, generated = %text, "generated user message");
        Ok(text.trim().to_string())
    }
}

/// [`RequirementEvaluator`] that asks a completion client for a JSON verdict.
pub struct LlmRequirementEvaluator<'a> {
    client: &'a dyn CompletionClient,
    model: &'a str,
    system_prompt: &'a str,
    invalid_response_retries: u32,
}

impl<'a> LlmRequirementEvaluator<'a> {
    pub fn new(
        client: &'a dyn CompletionClient,
        model: &'a str,
        system_prompt: &'a str,
        invalid_response_retries: u32,
    ) -> Self {
        Self {
            client,
            model,
            system_prompt,
            invalid_response_retries,
        }
    }

    pub fn request(&self, transcript: &[Message], requirement: &str) -> CompletionRequest {
        let mut messages = vec![ChatMessage::system(self.system_prompt.trim())];
        if !transcript.is_empty() {
            messages.push(ChatMessage::user(format!(
                "This is the chatbot log:\n\n{}",
                transcript_lines(transcript).trim_end()
            )));
        }
        messages.push(ChatMessage::user(format!(
            "Does the assistant's response meet the following requirement:\n\n\
             The assistant should {requirement}\n\n\
             Reply with only a JSON object of the form \
             {{\"reason\": \"<why the requirement is or is not met>\", \"requirement_met\": <true|false>}}"
        )));

        CompletionRequest {
            model: self.model.to_string(),
            messages,
        }
    }

    pub fn evaluate(
        &self,
        transcript: &[Message],
        requirement: &str,
    ) -> Result<RequirementVerdict, GenerationError> {
        let request = self.request(transcript, requirement);
        let attempts = self.invalid_response_retries + 1;
        let mut last_problem = String::new();

        for attempt in 1..=attempts {
            let reply = self
                .client
                .complete(&request)
                .map_err(|source| GenerationError::Request { source })?;
            match parse_verdict(&reply) {
                Ok(verdict) => {
                    debug!(
                        requirement,
                        met = verdict.requirement_met,
                        reason = %verdict.reason,
                        "requirement evaluated"
                    );
                    return Ok(verdict);
                }
                Err(problem) => {
                    debug!(attempt, %problem, "unparseable evaluator reply");
                    last_problem = problem;
                }
            }
        }

        Err(GenerationError::InvalidResponse {
            attempts,
            message: last_problem,
        })
    }
}

impl RequirementEvaluator for LlmRequirementEvaluator<'_> {
    fn check_requirement(
        &self,
        transcript: &[Message],
        requirement: &str,
    ) -> Result<RequirementVerdict, EvaluationError> {
        self.evaluate(transcript, requirement).map_err(|err| match err {
            GenerationError::NoClient { purpose } => EvaluationError::NoClient { purpose },
            GenerationError::Request { source } => EvaluationError::Request {
                trace: error_chain(&source),
            },
            GenerationError::InvalidResponse { message, .. } => {
                EvaluationError::InvalidResponse { message }
            }
        })
    }
}

/// Pull the outermost `{...}` out of a reply, tolerating prose or code fences
/// around it.
fn parse_verdict(reply: &str) -> Result<RequirementVerdict, String> {
    let start = reply.find('{');
    let end = reply.rfind('}');
    let body = match (start, end) {
        (Some(start), Some(end)) if start < end => &reply[start..=end],
        _ => return Err(format!("no JSON object in reply: {reply:?}")),
    };
    serde_json::from_str(body).map_err(|err| format!("{err}: {body}"))
}
