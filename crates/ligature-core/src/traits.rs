use std::collections::BTreeMap;
use std::time::Duration;

use crate::error::{SimError, SinkError};
use crate::frame::Frame;
use crate::types::{Action, ResetResult, StepResult};

// ---------------------------------------------------------------------------
// Environment
// ---------------------------------------------------------------------------

/// A stepping simulation environment.
///
/// The console drives any implementation of this trait through the usual
/// `reset`/`step` loop. Wrappers (pacing, recording) implement it too and
/// forward to the environment they own.
pub trait Environment {
    /// Start a new episode, optionally with a seed.
    fn reset(&mut self, seed: Option<u64>) -> Result<ResetResult, SimError>;

    /// Advance one control tick with the given action.
    fn step(&mut self, action: &Action) -> Result<StepResult, SimError>;

    /// Render the current scene.
    fn render(&self) -> Result<Frame, SimError>;

    /// Physics time step in seconds.
    fn time_step(&self) -> f64;

    /// Physics steps per control tick.
    fn frame_skip(&self) -> u32;

    /// Name of the observation layout (e.g. `"STATE"`).
    fn observation_type(&self) -> &str;

    /// Weights applied to each reward term.
    fn reward_amount_dict(&self) -> &BTreeMap<String, f32>;

    /// Length of the action vector accepted by [`step`](Self::step).
    fn action_dim(&self) -> usize;

    /// Nominal wall-clock duration of one control tick.
    fn tick_period(&self) -> Duration {
        Duration::from_secs_f64(self.time_step() * f64::from(self.frame_skip()))
    }

    /// Human-readable name for this environment.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Release resources and flush anything buffered for the current episode.
    fn close(&mut self) -> Result<(), SimError> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// LigatingScene
// ---------------------------------------------------------------------------

/// Read-only view of the ligating-loop scene objects.
///
/// Trajectory handlers read instrument and tissue state through this
/// interface instead of reaching into the environment's internals.
pub trait LigatingScene {
    /// Loop instrument joint state: tilt, pan, spin, depth, closure.
    fn loop_articulated_state(&self) -> Vec<f32>;

    /// Loop instrument pose: position (x, y, z) then quaternion (x, y, z, w).
    fn loop_pose(&self) -> [f32; 7];

    /// World positions of all loop rope points.
    fn loop_positions(&self) -> Vec<[f32; 3]>;

    /// Indices into [`loop_positions`](Self::loop_positions) that are tracked.
    fn loop_tracking_indices(&self) -> &[usize];

    /// World positions of all cavity points.
    fn cavity_state(&self) -> Vec<[f32; 3]>;

    /// Indices into [`cavity_state`](Self::cavity_state) tracked on the cavity.
    fn cavity_tracking_indices(&self) -> &[usize];

    /// Indices into [`cavity_state`](Self::cavity_state) tracked on the marking.
    fn marking_tracking_indices(&self) -> &[usize];
}

// ---------------------------------------------------------------------------
// FrameSink
// ---------------------------------------------------------------------------

/// A consumer of rendered frames, such as a video encoder.
pub trait FrameSink {
    /// Append one frame.
    fn write_frame(&mut self, frame: &Frame) -> Result<(), SinkError>;

    /// Flush and close the sink. Calling it twice is a no-op.
    fn release(&mut self) -> Result<(), SinkError>;

    /// Number of frames written so far.
    fn frames_written(&self) -> u64;
}

/// Flatten the selected points of `points` into `[x0, y0, z0, x1, ...]`.
///
/// Indices past the end of `points` are skipped.
pub fn gather_flat(points: &[[f32; 3]], indices: &[usize]) -> Vec<f32> {
    indices
        .iter()
        .filter_map(|&i| points.get(i))
        .flat_map(|p| p.iter().copied())
        .collect()
}
