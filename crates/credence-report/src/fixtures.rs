use chrono::Utc;
use credence_core::{
    Chatbot, CheckFailure, CheckResult, Conversation, ConversationResult, FunctionCall,
    InteractionOutcome, InteractionResult, Message, Metadata, MetadataSnapshot, Response, Status,
    User,
};
use std::sync::Arc;

fn result(title: &str, messages: Vec<Message>, interaction_results: Vec<InteractionResult>) -> ConversationResult {
    let now = Utc::now();
    ConversationResult {
        conversation_id: None,
        version_id: None,
        title: title.to_string(),
        messages,
        failed: ConversationResult::any_failed(&interaction_results),
        interaction_results,
        chatbot_time_ms: 30,
        testing_time_ms: 12,
        started_at: now,
        finished_at: now,
    }
}

fn greeting_messages() -> Vec<Message> {
    let mut snapshot = MetadataSnapshot::new();
    snapshot.insert("chatbot.handler".to_string(), "greeting".to_string());
    vec![
        Message::user(0, "Hello"),
        Message::chatbot(1, "Hello there. My name is credence", snapshot),
    ]
}

fn sent(text: &str) -> InteractionResult {
    InteractionResult {
        interaction: User::message(text),
        status: Status::Passed,
        outcome: InteractionOutcome::UserMessage {
            sent: Some(text.to_string()),
            unexpected_message: None,
            generation_error: None,
            handler_error: None,
        },
    }
}

pub(crate) fn passing_result() -> ConversationResult {
    let messages = greeting_messages();
    let check = Response::contains("there");
    let metadata = Metadata::key("chatbot.handler").equals("greeting");
    result(
        "greeting",
        messages.clone(),
        vec![
            InteractionResult {
                interaction: FunctionCall::new("enrol_user").arg("name", "John").build(),
                status: Status::Passed,
                outcome: InteractionOutcome::FunctionCall {
                    execution_error: None,
                },
            },
            sent("Hello"),
            InteractionResult {
                interaction: Chatbot::responds(vec![check.clone(), metadata.clone()]),
                status: Status::Passed,
                outcome: InteractionOutcome::ChatbotResponds {
                    response: Some(messages[1].clone()),
                    check_results: vec![
                        CheckResult {
                            check,
                            status: Status::Passed,
                            failure: None,
                        },
                        CheckResult {
                            check: metadata,
                            status: Status::Passed,
                            failure: None,
                        },
                    ],
                    missing_message: false,
                },
            },
        ],
    )
}

/// Outer conversation whose nested greeting fails its check, leaving the
/// last step skipped.
pub(crate) fn failing_result() -> ConversationResult {
    let messages = greeting_messages();
    let check = Response::contains("Goodbye");
    let inner = result(
        "wrong <greeting>",
        messages.clone(),
        vec![
            sent("Hello"),
            InteractionResult {
                interaction: Chatbot::responds(vec![check.clone()]),
                status: Status::Failed,
                outcome: InteractionOutcome::ChatbotResponds {
                    response: Some(messages[1].clone()),
                    check_results: vec![CheckResult {
                        check,
                        status: Status::Failed,
                        failure: Some(CheckFailure::Mismatch {
                            actual: messages[1].body.clone(),
                        }),
                    }],
                    missing_message: false,
                },
            },
        ],
    );

    result(
        "outer",
        messages,
        vec![
            InteractionResult {
                interaction: Conversation::nested(Arc::new(Conversation::new(
                    "wrong <greeting>",
                    vec![],
                ))),
                status: Status::Failed,
                outcome: InteractionOutcome::NestedConversation { result: inner },
            },
            InteractionResult {
                interaction: Chatbot::ignores_message(),
                status: Status::Skipped,
                outcome: InteractionOutcome::ChatbotIgnoresMessage {
                    unhandled_message: None,
                },
            },
        ],
    )
}
