use credence_core::ConversationResult;

pub fn render_json(result: &ConversationResult) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(result)
}

pub fn render_json_suite(results: &[ConversationResult]) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(results)
}
