//! Core types, traits, configuration, pacing and errors for the ligating-loop console.

pub mod config;
pub mod error;
pub mod frame;
pub mod pacing;
pub mod traits;
pub mod types;

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

pub mod prelude {
    pub use crate::{
        config::{ObservationType, SceneConfig},
        error::{ConfigError, SimError, ValidationError},
        frame::Frame,
        pacing::RealtimeWrapper,
        traits::{Environment, FrameSink, LigatingScene},
        types::{Action, Observation, ResetInfo, ResetResult, StepInfo, StepResult},
    };
}
