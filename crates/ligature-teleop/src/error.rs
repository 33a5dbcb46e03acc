use thiserror::Error;

/// Errors raised by controller backends.
#[derive(Debug, Error)]
pub enum TeleopError {
    #[error("no controller found: {0}")]
    NotFound(String),

    #[error("controller disconnected")]
    Disconnected,

    #[error("controller backend error: {0}")]
    Backend(String),

    #[error("controller support not compiled in (enable the `{0}` feature)")]
    Unsupported(&'static str),
}
