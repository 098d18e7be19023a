#[derive(Debug, thiserror::Error)]
pub enum CheckError {
    #[error("invalid regex `{pattern}`: {source}")]
    InvalidRegex {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// Failure of the external natural-language evaluator.
#[derive(Debug, thiserror::Error)]
pub enum EvaluationError {
    #[error("no completion client configured for {purpose}")]
    NoClient { purpose: &'static str },
    #[error("completion request failed: {trace}")]
    Request { trace: String },
    #[error("evaluator returned an invalid response: {message}")]
    InvalidResponse { message: String },
}

impl EvaluationError {
    /// Text stored on a failed result.
    pub fn trace(&self) -> String {
        match self {
            EvaluationError::Request { trace } => trace.clone(),
            other => other.to_string(),
        }
    }
}
