//! Decoding of serialized conversation suites.
//!
//! A suite is a JSON array of conversations keyed by id. Nested
//! conversations refer to other entries by id, so entries are decoded in
//! passes: an entry is decoded once every conversation it nests has been,
//! and a pass that decodes nothing means the remaining references dangle or
//! form a cycle.

use credence_core::{
    Chatbot, Check, Conversation, FunctionArgs, Interaction, InteractionKind, Metadata, Response,
    User,
};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

use crate::error::DecodeError;

// ─────────────────────────────────────────────────────────────────────────────
// Wire format
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct RawConversation {
    id: String,
    #[serde(default)]
    version_id: Option<String>,
    name: String,
    #[serde(default)]
    interactions: Vec<RawInteraction>,
}

#[derive(Debug, Deserialize)]
struct RawInteraction {
    #[serde(default)]
    id: Option<String>,
    #[serde(flatten)]
    body: RawInteractionBody,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum RawInteractionBody {
    UserMessage {
        user_message: RawUserMessage,
    },
    ChatbotResponse {
        chatbot_response: RawChatbotResponse,
    },
    ChatbotIgnore {
        #[serde(default)]
        #[allow(dead_code)]
        chatbot_ignore: Option<Value>,
    },
    FunctionCall {
        function_call: RawFunctionCall,
    },
    NestedConversation {
        nested_conversation: RawNestedConversation,
    },
}

#[derive(Debug, Deserialize)]
struct RawUserMessage {
    message: String,
    #[serde(default)]
    generated: bool,
}

#[derive(Debug, Deserialize)]
struct RawChatbotResponse {
    #[serde(default)]
    checks: Vec<RawCheck>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum RawCheck {
    AiCheck { ai_check: RawAiCheck },
    MessageCheck { message_check: RawMessageCheck },
    MetadataCheck { metadata_check: RawMetadataCheck },
}

#[derive(Debug, Deserialize)]
struct RawAiCheck {
    prompt: String,
    #[serde(default)]
    retries: u32,
}

#[derive(Debug, Deserialize)]
struct RawMessageCheck {
    op: String,
    value: Value,
}

#[derive(Debug, Deserialize)]
struct RawMetadataCheck {
    key: String,
    op: String,
    value: Value,
}

#[derive(Debug, Deserialize)]
struct RawFunctionCall {
    name: String,
    /// Identifier the authoring tool assigns; carried by the format but not
    /// needed to run the call.
    #[serde(default)]
    #[allow(dead_code)]
    function_id: Option<Value>,
    #[serde(default)]
    args: Vec<RawArgument>,
}

#[derive(Debug, Deserialize)]
struct RawArgument {
    name: String,
    #[serde(rename = "type", default = "default_argument_type")]
    kind: String,
    value: Value,
}

fn default_argument_type() -> String {
    "string".to_string()
}

#[derive(Debug, Deserialize)]
struct RawNestedConversation {
    conversation_id: String,
}

impl RawConversation {
    fn nested_ids(&self) -> impl Iterator<Item = &str> {
        self.interactions
            .iter()
            .filter_map(|interaction| match &interaction.body {
                RawInteractionBody::NestedConversation {
                    nested_conversation,
                } => Some(nested_conversation.conversation_id.as_str()),
                _ => None,
            })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Decoding
// ─────────────────────────────────────────────────────────────────────────────

pub fn load_suite(path: impl AsRef<Path>) -> Result<Vec<Conversation>, DecodeError> {
    let path_ref = path.as_ref();
    let body = std::fs::read_to_string(path_ref).map_err(|source| DecodeError::Read {
        path: path_ref.to_path_buf(),
        source,
    })?;
    decode_suite(&body)
}

pub fn decode_suite(json: &str) -> Result<Vec<Conversation>, DecodeError> {
    let raw: Vec<RawConversation> =
        serde_json::from_str(json).map_err(|source| DecodeError::Json { source })?;
    decode_entries(raw)
}

pub fn decode_suite_value(value: Value) -> Result<Vec<Conversation>, DecodeError> {
    let raw: Vec<RawConversation> =
        serde_json::from_value(value).map_err(|source| DecodeError::Json { source })?;
    decode_entries(raw)
}

fn decode_entries(raw: Vec<RawConversation>) -> Result<Vec<Conversation>, DecodeError> {
    let mut positions: HashMap<&str, usize> = HashMap::new();
    for (position, entry) in raw.iter().enumerate() {
        if positions.insert(entry.id.as_str(), position).is_some() {
            return Err(DecodeError::DuplicateId {
                id: entry.id.clone(),
            });
        }
    }

    let mut decoded: HashMap<&str, Arc<Conversation>> = HashMap::new();
    let mut remaining: Vec<&RawConversation> = raw.iter().collect();
    let mut passes = 0;

    while !remaining.is_empty() {
        passes += 1;
        let before = remaining.len();
        let mut deferred = Vec::new();

        for entry in remaining {
            if entry.nested_ids().all(|id| decoded.contains_key(id)) {
                let conversation = decode_conversation(entry, &decoded)?;
                decoded.insert(entry.id.as_str(), Arc::new(conversation));
            } else {
                deferred.push(entry);
            }
        }

        if deferred.len() == before {
            return Err(DecodeError::UnresolvedDependencies {
                ids: deferred.iter().map(|entry| entry.id.clone()).collect(),
            });
        }
        remaining = deferred;
    }
    debug!(conversations = raw.len(), passes, "decoded suite");

    let mut conversations = Vec::with_capacity(raw.len());
    for entry in &raw {
        if let Some(conversation) = decoded.remove(entry.id.as_str()) {
            conversations.push(Arc::try_unwrap(conversation).unwrap_or_else(|shared| (*shared).clone()));
        }
    }
    Ok(conversations)
}

fn decode_conversation(
    entry: &RawConversation,
    decoded: &HashMap<&str, Arc<Conversation>>,
) -> Result<Conversation, DecodeError> {
    let interactions = entry
        .interactions
        .iter()
        .map(|interaction| decode_interaction(entry, interaction, decoded))
        .collect::<Result<Vec<_>, _>>()?;

    let mut conversation = Conversation::new(entry.name.clone(), interactions).with_id(&entry.id);
    conversation.version_id = entry.version_id.clone();
    Ok(conversation)
}

fn decode_interaction(
    entry: &RawConversation,
    raw: &RawInteraction,
    decoded: &HashMap<&str, Arc<Conversation>>,
) -> Result<Interaction, DecodeError> {
    let interaction = match &raw.body {
        RawInteractionBody::UserMessage { user_message } if user_message.generated => {
            User::generated(&user_message.message)
        }
        RawInteractionBody::UserMessage { user_message } => User::message(&user_message.message),
        RawInteractionBody::ChatbotResponse { chatbot_response } => {
            let checks = chatbot_response
                .checks
                .iter()
                .map(|check| decode_check(&entry.name, check))
                .collect::<Result<Vec<_>, _>>()?;
            Chatbot::responds(checks)
        }
        RawInteractionBody::ChatbotIgnore { .. } => Chatbot::ignores_message(),
        RawInteractionBody::FunctionCall { function_call } => {
            let mut args = FunctionArgs::new();
            for arg in &function_call.args {
                let value = argument_value(arg).map_err(|message| DecodeError::InvalidArgument {
                    conversation: entry.name.clone(),
                    function: function_call.name.clone(),
                    argument: arg.name.clone(),
                    message,
                })?;
                args.insert(arg.name.clone(), value);
            }
            Interaction::new(InteractionKind::FunctionCall {
                name: function_call.name.clone(),
                args,
            })
        }
        RawInteractionBody::NestedConversation {
            nested_conversation,
        } => {
            let id = nested_conversation.conversation_id.as_str();
            let Some(inner) = decoded.get(id) else {
                return Err(DecodeError::UnresolvedDependencies {
                    ids: vec![entry.id.clone()],
                });
            };
            Conversation::nested_as(inner.title.clone(), Arc::clone(inner))
        }
    };

    Ok(match &raw.id {
        Some(id) => interaction.with_id(id),
        None => interaction,
    })
}

fn decode_check(conversation: &str, raw: &RawCheck) -> Result<Check, DecodeError> {
    let invalid_check = |source| DecodeError::InvalidCheck {
        conversation: conversation.to_string(),
        source,
    };

    match raw {
        RawCheck::AiCheck { ai_check } => Ok(Response::ai_check_with_retries(
            &ai_check.prompt,
            ai_check.retries,
        )),
        RawCheck::MessageCheck { message_check } => {
            let op = message_check.op.as_str();
            let text = text_value(&message_check.value);
            match op {
                "equals" => Ok(Response::equals(text)),
                "not_equals" => Ok(Response::not_equals(text)),
                "contains" => Ok(Response::contains(text)),
                "not_contains" => Ok(Response::not_contains(text)),
                "regex_match" => Response::re_match(&text).map_err(invalid_check),
                _ => Err(DecodeError::UnsupportedOperation {
                    conversation: conversation.to_string(),
                    check: "message_check",
                    op: op.to_string(),
                }),
            }
        }
        RawCheck::MetadataCheck { metadata_check } => {
            let key = Metadata::key(&metadata_check.key);
            let op = metadata_check.op.as_str();
            let value = &metadata_check.value;
            match op {
                "equals" => Ok(key.equals(text_value(value))),
                "not_equals" => Ok(key.not_equals(text_value(value))),
                "contains" => Ok(key.contains(value.clone())),
                "not_contains" => Ok(key.not_contains(value.clone())),
                "regex_match" => key.re_match(&text_value(value)).map_err(invalid_check),
                "one_of" => match value {
                    Value::Array(values) => Ok(key.one_of(values.iter().cloned())),
                    other => Err(DecodeError::InvalidValue {
                        conversation: conversation.to_string(),
                        check: "metadata_check",
                        op: op.to_string(),
                        message: format!("expected an array, got {other}"),
                    }),
                },
                _ => Err(DecodeError::UnsupportedOperation {
                    conversation: conversation.to_string(),
                    check: "metadata_check",
                    op: op.to_string(),
                }),
            }
        }
    }
}

/// String values as-is, anything else in its JSON form.
fn text_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn argument_value(arg: &RawArgument) -> Result<Value, String> {
    match (arg.kind.as_str(), &arg.value) {
        ("string", value) => Ok(Value::String(text_value(value))),
        ("number", Value::Number(number)) => Ok(Value::Number(number.clone())),
        ("number", Value::String(text)) => parse_number(text.trim()),
        ("boolean", Value::Bool(flag)) => Ok(Value::Bool(*flag)),
        ("boolean", Value::String(text)) => match text.trim().to_ascii_lowercase().as_str() {
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            _ => Err(format!("{text:?} is not a boolean")),
        },
        ("number" | "boolean", other) => Err(format!("cannot read {other} as a {}", arg.kind)),
        (kind, _) => Err(format!("unsupported argument type {kind:?}")),
    }
}

/// Integer first, then float.
fn parse_number(text: &str) -> Result<Value, String> {
    if let Ok(int) = text.parse::<i64>() {
        return Ok(Value::from(int));
    }
    text.parse::<f64>()
        .ok()
        .and_then(serde_json::Number::from_f64)
        .map(Value::Number)
        .ok_or_else(|| format!("{text:?} is not a number"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use credence_core::{CheckFailure, MetadataOperation, ResponseOperation};

    const SUITE: &str = r#"[
      {
        "id": "c-outer",
        "version_id": "v3",
        "name": "registered user does math",
        "interactions": [
          {"id": "i-1", "type": "nested_conversation", "nested_conversation": {"conversation_id": "c-enrol"}},
          {"id": "i-2", "type": "user_message", "user_message": {"message": "math:1 + 1"}},
          {"id": "i-3", "type": "chatbot_response", "chatbot_response": {"checks": [
            {"type": "message_check", "message_check": {"op": "equals", "value": "2"}},
            {"type": "metadata_check", "metadata_check": {"key": "chatbot.handler", "op": "one_of", "value": ["math", 2]}},
            {"type": "ai_check", "ai_check": {"prompt": "answer the question", "retries": 2}}
          ]}},
          {"type": "chatbot_ignore", "chatbot_ignore": {}}
        ]
      },
      {
        "id": "c-enrol",
        "name": "enrol John",
        "interactions": [
          {"id": "i-4", "type": "function_call", "function_call": {
            "name": "enrol_user",
            "function_id": 12,
            "args": [
              {"name": "name", "type": "string", "value": "John"},
              {"name": "age", "type": "number", "value": "42"},
              {"name": "score", "type": "number", "value": "4.5"},
              {"name": "admin", "type": "boolean", "value": "false"}
            ]
          }},
          {"id": "i-5", "type": "user_message", "user_message": {"message": "Say hello as John", "generated": true}}
        ]
      }
    ]"#;

    #[test]
    fn decodes_in_input_order_with_nested_resolution() {
        let suite = decode_suite(SUITE).expect("decode suite");
        assert_eq!(suite.len(), 2);
        assert_eq!(suite[0].title, "registered user does math");
        assert_eq!(suite[0].version_id.as_deref(), Some("v3"));
        assert_eq!(suite[1].id.as_ref().map(|id| id.0.as_str()), Some("c-enrol"));

        match &suite[0].interactions[0].kind {
            InteractionKind::NestedConversation { name, conversation } => {
                assert_eq!(name, "enrol John");
                assert_eq!(conversation.as_ref(), &suite[1]);
            }
            other => panic!("unexpected kind {other:?}"),
        }
        assert_eq!(suite[0].interactions[0].id.0, "i-1");
        assert!(suite[0].interactions[3].is_chatbot_interaction());
    }

    #[test]
    fn decodes_checks_and_typed_arguments() {
        let suite = decode_suite(SUITE).expect("decode suite");

        match &suite[0].interactions[2].kind {
            InteractionKind::ChatbotResponds { expectations } => {
                assert!(matches!(
                    &expectations[0],
                    Check::Response(check) if check.operation == ResponseOperation::Equals("2".to_string())
                ));
                assert!(matches!(
                    &expectations[1],
                    Check::Metadata(check) if matches!(&check.operation, MetadataOperation::OneOf(values) if values.len() == 2)
                ));
                assert!(matches!(&expectations[2], Check::Ai(check) if check.retries == 2));
            }
            other => panic!("unexpected kind {other:?}"),
        }

        match &suite[1].interactions[0].kind {
            InteractionKind::FunctionCall { name, args } => {
                assert_eq!(name, "enrol_user");
                assert_eq!(args["name"], Value::from("John"));
                assert_eq!(args["age"], Value::from(42));
                assert_eq!(args["score"], Value::from(4.5));
                assert_eq!(args["admin"], Value::from(false));
            }
            other => panic!("unexpected kind {other:?}"),
        }

        assert!(matches!(
            &suite[1].interactions[1].kind,
            InteractionKind::UserMessage { generated: true, .. }
        ));
    }

    #[test]
    fn dangling_and_cyclic_references_are_unresolved() {
        let dangling = r#"[{"id": "a", "name": "a", "interactions": [
            {"type": "nested_conversation", "nested_conversation": {"conversation_id": "missing"}}
        ]}]"#;
        let err = decode_suite(dangling).expect_err("dangling reference");
        assert!(matches!(err, DecodeError::UnresolvedDependencies { ref ids } if ids == &["a"]));

        let cyclic = r#"[
            {"id": "a", "name": "a", "interactions": [
                {"type": "nested_conversation", "nested_conversation": {"conversation_id": "b"}}
            ]},
            {"id": "b", "name": "b", "interactions": [
                {"type": "nested_conversation", "nested_conversation": {"conversation_id": "a"}}
            ]},
            {"id": "c", "name": "c", "interactions": []}
        ]"#;
        let err = decode_suite(cyclic).expect_err("cycle");
        assert!(matches!(err, DecodeError::UnresolvedDependencies { ref ids } if ids == &["a", "b"]));
    }

    #[test]
    fn malformed_entries_fail_immediately() {
        let bad_regex = r#"[{"id": "a", "name": "a", "interactions": [
            {"type": "chatbot_response", "chatbot_response": {"checks": [
                {"type": "message_check", "message_check": {"op": "regex_match", "value": "("}}
            ]}}
        ]}]"#;
        assert!(matches!(
            decode_suite(bad_regex).expect_err("invalid regex"),
            DecodeError::InvalidCheck { .. }
        ));

        let bad_op = r#"[{"id": "a", "name": "a", "interactions": [
            {"type": "chatbot_response", "chatbot_response": {"checks": [
                {"type": "metadata_check", "metadata_check": {"key": "k", "op": "starts_with", "value": "x"}}
            ]}}
        ]}]"#;
        assert!(matches!(
            decode_suite(bad_op).expect_err("unsupported op"),
            DecodeError::UnsupportedOperation { check: "metadata_check", .. }
        ));

        let bad_type = r#"[{"id": "a", "name": "a", "interactions": [{"type": "teleport"}]}]"#;
        assert!(matches!(
            decode_suite(bad_type).expect_err("unknown type"),
            DecodeError::Json { .. }
        ));

        let duplicate = r#"[{"id": "a", "name": "a"}, {"id": "a", "name": "b"}]"#;
        assert!(matches!(
            decode_suite(duplicate).expect_err("duplicate id"),
            DecodeError::DuplicateId { ref id } if id == "a"
        ));
    }

    #[test]
    fn metadata_contains_keeps_non_text_values_for_evaluation() {
        let suite = decode_suite(
            r#"[{"id": "a", "name": "a", "interactions": [
                {"type": "chatbot_response", "chatbot_response": {"checks": [
                    {"type": "metadata_check", "metadata_check": {"key": "n", "op": "contains", "value": 5}}
                ]}}
            ]}]"#,
        )
        .expect("decode");
        let InteractionKind::ChatbotResponds { expectations } = &suite[0].interactions[0].kind
        else {
            panic!("expected chatbot interaction");
        };
        let Check::Metadata(check) = &expectations[0] else {
            panic!("expected metadata check");
        };
        let mut snapshot = credence_core::MetadataSnapshot::new();
        snapshot.insert("n".to_string(), "5".to_string());
        assert!(matches!(
            check.evaluate(&snapshot),
            Some(CheckFailure::NotText { .. })
        ));
    }

    #[test]
    fn invalid_arguments_are_reported() {
        let suite = r#"[{"id": "a", "name": "a", "interactions": [
            {"type": "function_call", "function_call": {"name": "f", "args": [
                {"name": "n", "type": "number", "value": "lots"}
            ]}}
        ]}]"#;
        let err = decode_suite(suite).expect_err("bad number");
        assert_eq!(
            err.to_string(),
            "invalid argument \"n\" for f in \"a\": \"lots\" is not a number"
        );
    }

    #[test]
    fn load_suite_reads_files() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("suite.json");
        std::fs::write(&path, SUITE).expect("write suite");
        assert_eq!(load_suite(&path).expect("load suite").len(), 2);

        let err = load_suite(dir.path().join("missing.json")).expect_err("missing file");
        assert!(matches!(err, DecodeError::Read { .. }));
    }

    #[test]
    fn decodes_from_a_json_value() {
        let value: Value = serde_json::from_str(SUITE).expect("parse json");
        assert_eq!(decode_suite_value(value).expect("decode").len(), 2);
    }
}
