//! Handlers that capture the ligating-loop scene each tick.

use ligature_core::traits::{Environment, LigatingScene, gather_flat};

use crate::error::RecordError;
use crate::handler::{TickContext, TickHandler};
use crate::types::{TickPhase, streams};

/// Edge length of the RGB frames stored in the trajectory.
pub const SAVED_IMAGE_SIZE: u32 = 256;

// ---------------------------------------------------------------------------
// RgbFrameHandler
// ---------------------------------------------------------------------------

/// Renders the scene and stores a downscaled copy in `rgb`.
#[derive(Debug, Clone, Copy)]
pub struct RgbFrameHandler {
    width: u32,
    height: u32,
}

impl RgbFrameHandler {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl Default for RgbFrameHandler {
    fn default() -> Self {
        Self::new(SAVED_IMAGE_SIZE, SAVED_IMAGE_SIZE)
    }
}

impl<E: Environment + ?Sized> TickHandler<E> for RgbFrameHandler {
    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "rgb_frame"
    }

    fn streams(&self) -> &[&'static str] {
        &[streams::RGB]
    }

    fn on_tick(&mut self, ctx: &mut TickContext<'_, E>) -> Result<(), RecordError> {
        let frame = ctx.env().render()?;
        let frame = if frame.width() == self.width && frame.height() == self.height {
            frame
        } else {
            frame.resized(self.width, self.height)
        };
        ctx.append(streams::RGB, frame)
    }
}

// ---------------------------------------------------------------------------
// InstrumentStateHandler
// ---------------------------------------------------------------------------

/// Stores the loop's joint state, pose, and finite-difference joint velocity.
///
/// Velocity is zero on the reset tick and otherwise
/// `(state - previous) / (time_step * frame_skip)`. The previous state is
/// private to the handler, so register one instance for both phases.
#[derive(Debug, Clone, Default)]
pub struct InstrumentStateHandler {
    previous: Option<(u32, Vec<f32>)>,
}

impl InstrumentStateHandler {
    pub const fn new() -> Self {
        Self { previous: None }
    }
}

impl<E: Environment + LigatingScene + ?Sized> TickHandler<E> for InstrumentStateHandler {
    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "instrument_state"
    }

    fn streams(&self) -> &[&'static str] {
        &[
            streams::LOOP_TPSDC_STATE,
            streams::LOOP_POSE,
            streams::LOOP_TPSDC_VELOCITY,
        ]
    }

    #[allow(clippy::cast_possible_truncation)]
    fn on_tick(&mut self, ctx: &mut TickContext<'_, E>) -> Result<(), RecordError> {
        let env = ctx.env();
        let state = env.loop_articulated_state();
        let pose = env.loop_pose().to_vec();
        let dt = (env.time_step() * f64::from(env.frame_skip())) as f32;

        let tick = ctx.tick();
        if ctx.phase() == TickPhase::Reset {
            self.previous = None;
        }
        let velocity = match &self.previous {
            Some((prev_tick, prev)) if prev_tick + 1 == tick && prev.len() == state.len() => {
                state.iter().zip(prev).map(|(s, p)| (s - p) / dt).collect()
            }
            _ => vec![0.0; state.len()],
        };
        self.previous = Some((tick, state.clone()));

        ctx.append(streams::LOOP_TPSDC_STATE, state)?;
        ctx.append(streams::LOOP_POSE, pose)?;
        ctx.append(streams::LOOP_TPSDC_VELOCITY, velocity)
    }
}

// ---------------------------------------------------------------------------
// DeformableTrackingHandler
// ---------------------------------------------------------------------------

/// Stores the tracked cavity, marking, and loop points as flat xyz vectors.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeformableTrackingHandler;

impl<E: LigatingScene + ?Sized> TickHandler<E> for DeformableTrackingHandler {
    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "deformable_tracking"
    }

    fn streams(&self) -> &[&'static str] {
        &[
            streams::CAVITY_TRACKING_POSITIONS,
            streams::MARKING_TRACKING_POSITIONS,
            streams::LOOP_TRACKING_POSITIONS,
        ]
    }

    fn on_tick(&mut self, ctx: &mut TickContext<'_, E>) -> Result<(), RecordError> {
        let env = ctx.env();
        let cavity = env.cavity_state();
        let cavity_points = gather_flat(&cavity, env.cavity_tracking_indices());
        let marking_points = gather_flat(&cavity, env.marking_tracking_indices());
        let loop_points = gather_flat(&env.loop_positions(), env.loop_tracking_indices());

        ctx.append(streams::CAVITY_TRACKING_POSITIONS, cavity_points)?;
        ctx.append(streams::MARKING_TRACKING_POSITIONS, marking_points)?;
        ctx.append(streams::LOOP_TRACKING_POSITIONS, loop_points)
    }
}

// ---------------------------------------------------------------------------
// TimeHandler
// ---------------------------------------------------------------------------

/// Stores simulated time: `tick * time_step * frame_skip` seconds.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimeHandler;

impl<E: Environment + ?Sized> TickHandler<E> for TimeHandler {
    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "time"
    }

    fn streams(&self) -> &[&'static str] {
        &[streams::TIME]
    }

    fn on_tick(&mut self, ctx: &mut TickContext<'_, E>) -> Result<(), RecordError> {
        let env = ctx.env();
        let t = f64::from(ctx.tick()) * env.time_step() * f64::from(env.frame_skip());
        ctx.append(streams::TIME, t)
    }
}

/// The console's handler set, in recording order: RGB frame, instrument
/// state, deformable tracking points, time. Register each for both phases.
pub fn scene_handlers<E>() -> Vec<Box<dyn TickHandler<E>>>
where
    E: Environment + LigatingScene,
{
    vec![
        Box::new(RgbFrameHandler::default()),
        Box::new(InstrumentStateHandler::new()),
        Box::new(DeformableTrackingHandler),
        Box::new(TimeHandler),
    ]
}
