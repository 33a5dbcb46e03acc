use ligature_core::error::{FrameError, SimError, SinkError};
use ligature_teleop::TeleopError;
use thiserror::Error;

/// Errors that end an operator session.
#[derive(Debug, Error)]
pub enum ConsoleError {
    #[error("Simulation error: {0}")]
    Sim(#[from] SimError),

    #[error("Controller error: {0}")]
    Teleop(#[from] TeleopError),

    #[error("Video error: {0}")]
    Video(#[from] SinkError),

    #[error("Still image error: {0}")]
    StillImage(#[from] FrameError),

    #[error("session already ran")]
    AlreadyRun,
}
