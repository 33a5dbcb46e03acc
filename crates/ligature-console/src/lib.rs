//! `ligature-console`: the operator session.
//!
//! - [`ControlLoop`]: polls the controller, steps the environment, writes
//!   video and handles the abort button
//! - [`FfmpegWriter`]: video sink piping raw frames to `ffmpeg`
//! - [`FpsTracker`]: rolling frame-rate statistics

pub mod error;
pub mod session;
pub mod stats;
pub mod video;

pub use error::ConsoleError;
pub use session::{ControlLoop, LoopState, Outcome, SessionOptions, SessionReport};
pub use stats::{FpsSample, FpsTracker};
pub use video::{FfmpegWriter, VideoConfig, playback_fps};

pub mod prelude {
    pub use crate::{
        ConsoleError, ControlLoop, FfmpegWriter, FpsTracker, LoopState, Outcome, SessionOptions,
        SessionReport, VideoConfig, playback_fps,
    };
}
