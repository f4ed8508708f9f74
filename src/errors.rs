use thiserror::Error;

/// Everything that can go wrong while building or evaluating contexts.
///
/// Most failure modes in this crate resolve to a conservative boolean instead
/// of an error; the variants here are the ones a caller has to see.
#[derive(Debug, Error)]
pub enum ContextError {
    // A query-parameter context without a parameter name cannot default either way.
    #[error("context {uid}: no query parameter name configured")]
    MissingParameterName { uid: u64 },

    #[error("context type `{tag}` is bound to a shared instance")]
    SharedInstance { tag: String },

    #[error("context type `{tag}` is not a context implementation: {reason}")]
    Incompatible { tag: String, reason: String },

    #[error("expression error: {0}")]
    Expression(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ContextError>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn messages_name_the_failing_context() {
        assert_eq!(
            ContextError::MissingParameterName { uid: 4 }.to_string(),
            "context 4: no query parameter name configured"
        );
        assert_eq!(
            ContextError::SharedInstance { tag: "ip".into() }.to_string(),
            "context type `ip` is bound to a shared instance"
        );
    }

    #[test]
    fn decoding_failures_convert() {
        let err: ContextError = serde_json::from_str::<u64>("x").unwrap_err().into();
        assert!(matches!(err, ContextError::Json(_)));
    }
}
