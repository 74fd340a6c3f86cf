use rayview_core::RenderError;

#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    #[error("frame request failed: {0}")]
    Render(#[from] RenderError),

    #[error("no tokio runtime available to drive the frame stream")]
    NoRuntime,
}

/// Result type for stream operations.
pub type Result<T> = std::result::Result<T, StreamError>;
