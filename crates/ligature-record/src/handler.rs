//! Per-tick data collection hooks run by the recorder.

use crate::error::RecordError;
use crate::trajectory::Trajectory;
use crate::types::{StreamValue, TickPhase};

// ---------------------------------------------------------------------------
// TickHandler
// ---------------------------------------------------------------------------

/// A data-collection hook invoked once per recorded tick.
///
/// Every stream listed by [`streams`](Self::streams) must receive exactly one
/// value per call to [`on_tick`](Self::on_tick); appending to any other
/// stream is rejected. Handlers may keep private state between ticks (such
/// as the previous instrument state for finite differences).
pub trait TickHandler<E: ?Sized> {
    /// Name used in error messages and logs.
    fn name(&self) -> &str;

    /// Dense streams this handler owns.
    fn streams(&self) -> &[&'static str];

    /// Read from the environment and append this tick's values.
    fn on_tick(&mut self, ctx: &mut TickContext<'_, E>) -> Result<(), RecordError>;
}

// ---------------------------------------------------------------------------
// TickContext
// ---------------------------------------------------------------------------

/// What a handler sees during one tick: the environment (read-only), the
/// tick index and phase, and an append-only view of the trajectory.
pub struct TickContext<'a, E: ?Sized> {
    env: &'a E,
    trajectory: &'a mut Trajectory,
    tick: u32,
    phase: TickPhase,
}

impl<'a, E: ?Sized> TickContext<'a, E> {
    pub(crate) fn new(env: &'a E, trajectory: &'a mut Trajectory, tick: u32, phase: TickPhase) -> Self {
        Self {
            env,
            trajectory,
            tick,
            phase,
        }
    }

    pub const fn env(&self) -> &'a E {
        self.env
    }

    /// Index of the tick being recorded; the reset tick is 0.
    pub const fn tick(&self) -> u32 {
        self.tick
    }

    pub const fn phase(&self) -> TickPhase {
        self.phase
    }

    /// Append this tick's value for `stream`.
    pub fn append(&mut self, stream: &str, value: impl Into<StreamValue>) -> Result<(), RecordError> {
        self.trajectory.append(stream, value.into())
    }
}

/// Run one handler and enforce its declared streams.
pub(crate) fn run_handler<E: ?Sized>(
    handler: &mut dyn TickHandler<E>,
    env: &E,
    trajectory: &mut Trajectory,
    phase: TickPhase,
) -> Result<(), RecordError> {
    let before: Vec<String> = trajectory
        .streams()
        .filter(|(name, _)| trajectory.touched(name))
        .map(|(name, _)| name.to_string())
        .collect();
    let tick = trajectory.ticks();

    handler.on_tick(&mut TickContext::new(env, trajectory, tick, phase))?;

    let declared = handler.streams();
    for stream in declared {
        if !trajectory.touched(stream) {
            return Err(RecordError::MissingAppend {
                handler: handler.name().to_string(),
                stream: (*stream).to_string(),
            });
        }
    }
    let undeclared = trajectory
        .streams()
        .map(|(name, _)| name)
        .find(|name| {
            trajectory.touched(name)
                && !before.iter().any(|b| b.as_str() == *name)
                && !declared.iter().any(|d| d == name)
        });
    if let Some(stream) = undeclared {
        return Err(RecordError::UndeclaredStream {
            handler: handler.name().to_string(),
            stream: stream.to_string(),
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
