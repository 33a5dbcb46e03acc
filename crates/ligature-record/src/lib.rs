//! `ligature-record`: trajectory capture for the ligating-loop console.
//!
//! Wrap an environment in a [`TrajectoryRecorder`], register
//! [`TickHandler`]s, and every `reset`/`step` appends one value per stream.
//! Finished episodes are written as MCAP files (see [`storage`]); float
//! payloads keep NaN and infinities (see [`floats`]).
//!
//! # Example
//!
//! ```no_run
//! use ligature_record::prelude::*;
//! # fn wrap<E>(env: E) -> Result<TrajectoryRecorder<E>, RecordError>
//! # where E: ligature_core::traits::Environment + ligature_core::traits::LigatingScene {
//! let config = RecorderConfig::new("trajectories")
//!     .with_store_info(true)
//!     .with_compressed(["observation", "rgb"]);
//! let recorder = TrajectoryRecorder::new(env, config)?
//!     .with_handlers(scene_handlers(), HandlerPhases::Both);
//! # Ok(recorder)
//! # }
//! ```

pub mod error;
pub mod floats;
pub mod handler;
pub mod handlers;
pub mod recorder;
pub mod storage;
pub mod trajectory;
pub mod types;

pub use error::RecordError;
pub use handler::{TickContext, TickHandler};
pub use recorder::{HandlerPhases, RecorderConfig, TrajectoryRecorder};

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

pub mod prelude {
    pub use crate::{
        error::RecordError,
        handler::{TickContext, TickHandler},
        handlers::{
            DeformableTrackingHandler, InstrumentStateHandler, RgbFrameHandler, TimeHandler,
            scene_handlers,
        },
        recorder::{HandlerPhases, RecorderConfig, TrajectoryRecorder},
        storage::{RecordedStream, RecordedTrajectory, list_episodes},
        trajectory::{Stream, Trajectory},
        types::{EpisodeMetadata, ImageValue, StreamValue, TickPhase, streams},
    };
}
