/// Malformed scripts or registrations, raised before anything executes.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("function not defined: {name} (called from {conversation:?})")]
    UnknownFunction { name: String, conversation: String },
    #[error("function already registered: {name}")]
    DuplicateFunction { name: String },
}

/// Failure of the completion client while simulating the user or judging a
/// requirement. Captured into results, never raised out of a run.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("no completion client configured for {purpose}")]
    NoClient { purpose: &'static str },
    #[error("completion request failed: {source:#}")]
    Request {
        #[source]
        source: anyhow::Error,
    },
    #[error("completion returned an invalid response after {attempts} attempt(s): {message}")]
    InvalidResponse { attempts: u32, message: String },
}

/// The error followed by one `Caused by:` line per source. Any captured
/// backtrace is left out so the message survives truncation.
pub fn error_chain(err: &anyhow::Error) -> String {
    let mut causes = err.chain();
    let mut text = causes.next().map(ToString::to_string).unwrap_or_default();
    for cause in causes {
        text.push_str("\nCaused by: ");
        text.push_str(&cause.to_string());
    }
    text
}
