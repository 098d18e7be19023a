pub mod check;
pub mod config;
pub mod conversation;
pub mod error;
pub mod interaction;
pub mod message;
pub mod result;
pub mod types;
pub mod validation;

pub use check::*;
pub use config::*;
pub use conversation::*;
pub use error::*;
pub use interaction::*;
pub use message::*;
pub use result::*;
pub use types::*;
pub use validation::*;

#[cfg(test)]
mod tests {
    use super::{
        parse_engine_config, Check, Conversation, ConversationResult, Interaction, Message,
        Response, Status, User, Validate,
    };
    use std::any::TypeId;

    #[test]
    fn crate_root_reexports_core_types() {
        let _ = TypeId::of::<Conversation>();
        let _ = TypeId::of::<Interaction>();
        let _ = TypeId::of::<Check>();
        let _ = TypeId::of::<Message>();
        let _ = TypeId::of::<ConversationResult>();
        let _ = TypeId::of::<Status>();
    }

    #[test]
    fn crate_root_reexports_parse_and_validate_helpers() {
        let mut config = parse_engine_config(
            r#"
[checks]
invalid_response_retries = 2

[report]
error_trace_limit = 500
"#,
        )
        .expect("parse config");
        assert!(config.validate().is_empty());

        config.report.error_trace_limit = 0;
        assert!(config
            .validate()
            .iter()
            .any(|issue| issue.code == "report.error_trace_limit.zero"));

        let conversation = Conversation::new(
            "greeting",
            vec![User::message("Hello"), super::Chatbot::responds(vec![Response::contains("Hi")])],
        );
        assert!(conversation.validate().is_empty());
    }
}
