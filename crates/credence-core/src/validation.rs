//! Static checks over scripts and configuration, run before execution.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::check::{Check, MetadataOperation};
use crate::config::EngineConfig;
use crate::conversation::Conversation;
use crate::interaction::InteractionKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationLevel {
    Error,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub level: ValidationLevel,
    pub code: &'static str,
    pub message: String,
}

impl ValidationIssue {
    pub fn is_error(&self) -> bool {
        self.level == ValidationLevel::Error
    }
}

pub trait Validate {
    fn validate(&self) -> Vec<ValidationIssue>;
}

impl Validate for EngineConfig {
    fn validate(&self) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();

        if self.report.error_trace_limit == 0 {
            issues.push(ValidationIssue {
                level: ValidationLevel::Error,
                code: "report.error_trace_limit.zero",
                message: "error_trace_limit of 0 would drop every captured trace".to_string(),
            });
        }

        if self.generation.user_prompt.trim().is_empty() {
            issues.push(ValidationIssue {
                level: ValidationLevel::Warning,
                code: "generation.user_prompt.empty",
                message: "user_prompt is empty; generated messages may read like an assistant"
                    .to_string(),
            });
        }

        if self.checks.system_prompt.trim().is_empty() {
            issues.push(ValidationIssue {
                level: ValidationLevel::Warning,
                code: "checks.system_prompt.empty",
                message: "checks system_prompt is empty".to_string(),
            });
        }

        issues
    }
}

impl Validate for Conversation {
    fn validate(&self) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();

        if self.title.trim().is_empty() {
            issues.push(ValidationIssue {
                level: ValidationLevel::Error,
                code: "conversation.title.empty",
                message: "conversation title must not be empty".to_string(),
            });
        }

        let title = self.title.as_str();
        self.walk(&mut |interaction| match &interaction.kind {
            InteractionKind::UserMessage { text, generated } if text.trim().is_empty() => {
                let (code, what) = if *generated {
                    ("interaction.user_generated.empty", "generation prompt")
                } else {
                    ("interaction.user_message.empty", "user message")
                };
                issues.push(ValidationIssue {
                    level: ValidationLevel::Error,
                    code,
                    message: format!("{what} {} in {title:?} is empty", interaction.id),
                });
            }
            InteractionKind::FunctionCall { name, .. } if name.trim().is_empty() => {
                issues.push(ValidationIssue {
                    level: ValidationLevel::Error,
                    code: "interaction.function_call.name_empty",
                    message: format!(
                        "function call {} in {title:?} has no function name",
                        interaction.id
                    ),
                });
            }
            InteractionKind::ChatbotResponds { expectations } => {
                for check in expectations {
                    match check {
                        Check::Ai(ai) if ai.requirement.trim().is_empty() => {
                            issues.push(ValidationIssue {
                                level: ValidationLevel::Error,
                                code: "check.ai.requirement_empty",
                                message: format!(
                                    "ai check in {} of {title:?} has an empty requirement",
                                    interaction.id
                                ),
                            });
                        }
                        Check::Metadata(metadata) => {
                            if metadata.key.trim().is_empty() {
                                issues.push(ValidationIssue {
                                    level: ValidationLevel::Error,
                                    code: "check.metadata.key_empty",
                                    message: format!(
                                        "metadata check in {} of {title:?} has an empty key",
                                        interaction.id
                                    ),
                                });
                            }
                            if matches!(&metadata.operation, MetadataOperation::OneOf(values) if values.is_empty())
                            {
                                issues.push(ValidationIssue {
                                    level: ValidationLevel::Warning,
                                    code: "check.metadata.one_of_empty",
                                    message: format!(
                                        "metadata[{:?}] one_of in {} of {title:?} can never pass",
                                        metadata.key, interaction.id
                                    ),
                                });
                            }
                        }
                        _ => {}
                    }
                }
            }
            _ => {}
        });

        issues
    }
}

impl Validate for [Conversation] {
    fn validate(&self) -> Vec<ValidationIssue> {
        let mut issues: Vec<ValidationIssue> =
            self.iter().flat_map(Conversation::validate).collect();

        let mut seen: BTreeMap<&str, usize> = BTreeMap::new();
        for conversation in self {
            *seen.entry(conversation.title.as_str()).or_default() += 1;
        }
        for (title, count) in seen {
            if count > 1 {
                issues.push(ValidationIssue {
                    level: ValidationLevel::Error,
                    code: "suite.title.duplicate",
                    message: format!("title {title:?} is used by {count} conversations"),
                });
            }
        }

        issues
    }
}
