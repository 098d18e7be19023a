use credence_core::CheckError;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("failed to read suite file at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid suite JSON: {source}")]
    Json {
        #[source]
        source: serde_json::Error,
    },
    #[error("conversation id {id:?} is used more than once")]
    DuplicateId { id: String },
    #[error("invalid check in {conversation:?}: {source}")]
    InvalidCheck {
        conversation: String,
        #[source]
        source: CheckError,
    },
    #[error("unsupported {check} operation {op:?} in {conversation:?}")]
    UnsupportedOperation {
        conversation: String,
        check: &'static str,
        op: String,
    },
    #[error("invalid value for {check} operation {op:?} in {conversation:?}: {message}")]
    InvalidValue {
        conversation: String,
        check: &'static str,
        op: String,
        message: String,
    },
    #[error("invalid argument {argument:?} for {function} in {conversation:?}: {message}")]
    InvalidArgument {
        conversation: String,
        function: String,
        argument: String,
        message: String,
    },
    #[error("could not resolve nested conversations for: {}", ids.join(", "))]
    UnresolvedDependencies { ids: Vec<String> },
}

#[cfg(test)]
mod tests {
    use super::DecodeError;

    #[test]
    fn unresolved_dependencies_lists_ids() {
        let err = DecodeError::UnresolvedDependencies {
            ids: vec!["a".to_string(), "b".to_string()],
        };
        assert_eq!(err.to_string(), "could not resolve nested conversations for: a, b");
    }

    #[test]
    fn unsupported_operation_names_check_kind() {
        let err = DecodeError::UnsupportedOperation {
            conversation: "greeting".to_string(),
            check: "message_check",
            op: "starts_with".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "unsupported message_check operation \"starts_with\" in \"greeting\""
        );
    }
}
