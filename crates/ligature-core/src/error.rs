use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid time_step: {0} (must be > 0)")]
    InvalidTimeStep(f64),

    #[error("frame_skip must be >= 1")]
    ZeroFrameSkip,

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

/// Simulation runtime errors.
#[derive(Debug, Error)]
pub enum SimError {
    #[error("Reset failed: {0}")]
    ResetFailed(String),

    #[error("Step failed: {0}")]
    StepFailed(String),

    #[error("Render failed: {0}")]
    RenderFailed(String),

    #[error("step() called before reset()")]
    NotReset,

    #[error("Invalid action: {0}")]
    InvalidAction(#[from] ValidationError),

    /// A wrapper around the environment failed; `source` holds its own error.
    #[error("{wrapper}: {source}")]
    Wrapper {
        wrapper: &'static str,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl SimError {
    /// Downcast a [`SimError::Wrapper`] source to a concrete error type.
    pub fn wrapper_source<T: std::error::Error + 'static>(&self) -> Option<&T> {
        match self {
            Self::Wrapper { source, .. } => source.downcast_ref::<T>(),
            _ => None,
        }
    }
}

/// Action/observation validation errors.
///
/// Copy + static messages for cheap propagation in hot paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Action dimension mismatch: expected {expected}, got {got}")]
    ActionDimMismatch { expected: usize, got: usize },

    #[error("Action contains NaN")]
    ActionContainsNan,

    #[error("Action contains Inf")]
    ActionContainsInf,
}

/// Frame construction and image I/O errors.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("frame data length {actual} does not match {width}x{height} RGB ({expected} bytes)")]
    SizeMismatch {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

/// Errors raised by a [`FrameSink`](crate::traits::FrameSink).
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Encoder error: {0}")]
    Encoder(String),

    #[error("frame {got_width}x{got_height} does not match sink size {width}x{height}")]
    SizeMismatch {
        width: u32,
        height: u32,
        got_width: u32,
        got_height: u32,
    },

    #[error("sink already released")]
    Released,
}
