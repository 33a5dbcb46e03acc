use std::path::PathBuf;

use ligature_core::error::{FrameError, SimError};
use thiserror::Error;

/// Errors raised while capturing or persisting a trajectory.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("Simulation error: {0}")]
    Sim(#[from] SimError),

    #[error("Frame error: {0}")]
    Frame(#[from] FrameError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("MCAP error: {0}")]
    Mcap(#[from] mcap::McapError),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("stream '{stream}' has {actual} entries after tick {tick}, expected {expected}")]
    StreamMisaligned {
        stream: String,
        tick: u32,
        expected: usize,
        actual: usize,
    },

    #[error("stream '{stream}' received a second value in tick {tick}")]
    DuplicateAppend { stream: String, tick: u32 },

    #[error("handler '{handler}' appended to undeclared stream '{stream}'")]
    UndeclaredStream { handler: String, stream: String },

    #[error("handler '{handler}' did not append to its stream '{stream}'")]
    MissingAppend { handler: String, stream: String },

    #[error("append to '{0}' outside of a tick")]
    NoOpenTick(String),

    #[error("compressed stream '{0}' is not produced by any handler or automatic stream")]
    UnknownCompressedStream(String),

    #[error("compressed stream '{0}' was never written")]
    MissingStream(String),

    #[error("recorder is poisoned by an earlier invariant violation")]
    Poisoned,

    #[error("malformed trajectory file {path}: {message}")]
    Malformed { path: PathBuf, message: String },
}

impl RecordError {
    /// Whether this error breaks the one-value-per-stream-per-tick invariant.
    pub const fn is_invariant_violation(&self) -> bool {
        matches!(
            self,
            Self::StreamMisaligned { .. }
                | Self::DuplicateAppend { .. }
                | Self::UndeclaredStream { .. }
                | Self::MissingAppend { .. }
                | Self::NoOpenTick(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invariant_violation_classification() {
        assert!(
            RecordError::DuplicateAppend {
                stream: "rgb".into(),
                tick: 0
            }
            .is_invariant_violation()
        );
        assert!(!RecordError::MissingStream("rgb".into()).is_invariant_violation());
        assert!(!RecordError::Poisoned.is_invariant_violation());
    }

    #[test]
    fn display_messages() {
        assert_eq!(
            RecordError::StreamMisaligned {
                stream: "time".into(),
                tick: 3,
                expected: 4,
                actual: 5
            }
            .to_string(),
            "stream 'time' has 5 entries after tick 3, expected 4"
        );
        assert_eq!(
            RecordError::UnknownCompressedStream("depth".into()).to_string(),
            "compressed stream 'depth' is not produced by any handler or automatic stream"
        );
    }

    #[test]
    fn sim_error_converts() {
        let err: RecordError = SimError::NotReset.into();
        assert!(matches!(err, RecordError::Sim(SimError::NotReset)));
    }
}
