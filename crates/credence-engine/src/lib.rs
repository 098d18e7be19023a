pub mod adapter;
pub mod engine;
pub mod error;
pub mod functions;
pub mod llm;
pub mod transcript;

#[cfg(test)]
pub(crate) mod test_support;

pub use adapter::*;
pub use engine::*;
pub use error::*;
pub use functions::*;
pub use llm::*;
pub use transcript::*;

#[cfg(test)]
mod tests {
    use super::{
        ChatbotAdapter, ChatbotContext, CompletionClient, Engine, EngineError, FunctionRegistry,
        GenerationError, Transcript,
    };
    use std::any::TypeId;

    struct Echo;

    impl ChatbotAdapter for Echo {
        fn handle_message(
            &mut self,
            message: &str,
            _ctx: &mut ChatbotContext<'_>,
        ) -> anyhow::Result<Option<String>> {
            Ok(Some(message.to_string()))
        }
    }

    #[test]
    fn crate_root_reexports_engine_types() {
        let _ = TypeId::of::<Engine<Echo>>();
        let _ = TypeId::of::<FunctionRegistry<Echo>>();
        let _ = TypeId::of::<Transcript>();
        let _ = TypeId::of::<EngineError>();
        let _ = TypeId::of::<GenerationError>();
        let _ = TypeId::of::<dyn CompletionClient>();
    }

    #[test]
    fn adapter_defaults_have_no_client_or_functions() {
        let engine = Engine::new(Echo).expect("no functions to register");
        assert!(engine.adapter().completion_client().is_none());
        assert_eq!(engine.adapter().model_name(), "");
        assert_eq!(engine.functions().names().count(), 0);
    }
}
