//! Errors reported by renderer client implementations.

/// Failure of a single renderer call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RenderError {
    #[error("renderer rejected the request: {0}")]
    Rejected(String),

    #[error("renderer did not answer within {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    #[error("renderer connection lost")]
    Disconnected,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_message_names_the_duration() {
        let msg = RenderError::Timeout { duration_ms: 2500 }.to_string();
        assert!(msg.contains("2500ms"), "{msg}");
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<RenderError>();
    }
}
