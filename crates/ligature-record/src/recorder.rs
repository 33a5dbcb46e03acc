//! The recording wrapper.
//!
//! [`TrajectoryRecorder`] owns an environment and captures one tick of
//! data after every `reset` and `step`:
//!
//! | Call    | Capture order                                                     |
//! |---------|-------------------------------------------------------------------|
//! | `reset` | reset handlers, `info`, `observation`                             |
//! | `step`  | `observation`, `terminal_observation` (on done), `info`, step handlers |
//!
//! When a step reports `terminated || truncated` the episode is written to
//! `<log_dir>/<run stamp>_ep<NNN>.mcap` and the in-memory trajectory is
//! discarded. [`TrajectoryRecorder::flush`] does the same for an episode cut
//! short by the operator.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use ligature_core::error::SimError;
use ligature_core::frame::Frame;
use ligature_core::traits::{Environment, LigatingScene};
use ligature_core::types::{Action, ResetInfo, ResetResult, StepInfo, StepResult};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::error::RecordError;
use crate::floats::{f32_map_to_json, f32_to_json};
use crate::handler::{TickHandler, run_handler};
use crate::storage::{FILE_EXTENSION, write_trajectory};
use crate::trajectory::Trajectory;
use crate::types::{EpisodeMetadata, StreamValue, TickPhase, streams};

// ---------------------------------------------------------------------------
// RecorderConfig
// ---------------------------------------------------------------------------

/// Where and how episodes are persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct RecorderConfig {
    /// Directory episode files are written to; created if missing.
    pub log_dir: PathBuf,
    /// Static facts written with every episode.
    pub metadata: EpisodeMetadata,
    /// Capture the environment's info dictionary as the `info` stream.
    pub store_info: bool,
    /// Streams whose payloads are zstd-compressed on disk.
    pub compressed_streams: BTreeSet<String>,
}

impl RecorderConfig {
    pub fn new(log_dir: impl Into<PathBuf>) -> Self {
        Self {
            log_dir: log_dir.into(),
            metadata: EpisodeMetadata::new(),
            store_info: false,
            compressed_streams: BTreeSet::new(),
        }
    }

    #[must_use]
    pub fn with_metadata(mut self, metadata: EpisodeMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    #[must_use]
    pub const fn with_store_info(mut self, store_info: bool) -> Self {
        self.store_info = store_info;
        self
    }

    #[must_use]
    pub fn with_compressed<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.compressed_streams.extend(names.into_iter().map(Into::into));
        self
    }
}

// ---------------------------------------------------------------------------
// HandlerPhases
// ---------------------------------------------------------------------------

/// Which calls a registered handler runs after.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerPhases {
    Reset,
    Step,
    /// One shared instance runs after both `reset` and `step`.
    Both,
}

impl HandlerPhases {
    const fn on_reset(self) -> bool {
        matches!(self, Self::Reset | Self::Both)
    }

    const fn on_step(self) -> bool {
        matches!(self, Self::Step | Self::Both)
    }
}

// ---------------------------------------------------------------------------
// TrajectoryRecorder
// ---------------------------------------------------------------------------

/// Environment wrapper that records every tick into named streams.
///
/// Handlers run in registration order within each phase. Any violation of
/// the one-value-per-stream-per-tick rule poisons the recorder: every later
/// `reset`, `step` or `flush` fails with [`RecordError::Poisoned`].
pub struct TrajectoryRecorder<E> {
    env: E,
    config: RecorderConfig,
    handlers: Vec<Box<dyn TickHandler<E>>>,
    after_reset: Vec<usize>,
    after_step: Vec<usize>,
    trajectory: Trajectory,
    run_stamp: String,
    tick_period_ns: u64,
    episode: u32,
    poisoned: bool,
    saved: Vec<PathBuf>,
}

impl<E: Environment> TrajectoryRecorder<E> {
    /// Wrap `env`, creating the log directory.
    ///
    /// File names are prefixed with a millisecond wall-clock stamp taken
    /// here, so consecutive runs do not collide.
    pub fn new(env: E, config: RecorderConfig) -> Result<Self, RecordError> {
        fs::create_dir_all(&config.log_dir)?;
        let run_stamp = chrono::Local::now().format("%Y%m%d-%H%M%S-%3f").to_string();
        let tick_period_ns = u64::try_from(env.tick_period().as_nanos()).unwrap_or(u64::MAX);
        info!(
            log_dir = %config.log_dir.display(),
            run = %run_stamp,
            store_info = config.store_info,
            "trajectory recording enabled"
        );
        Ok(Self {
            env,
            config,
            handlers: Vec::new(),
            after_reset: Vec::new(),
            after_step: Vec::new(),
            trajectory: Trajectory::new(),
            run_stamp,
            tick_period_ns,
            episode: 0,
            poisoned: false,
            saved: Vec::new(),
        })
    }
}

impl<E> TrajectoryRecorder<E> {
    /// Register a handler for the given phases.
    #[must_use]
    pub fn with_handler(mut self, handler: Box<dyn TickHandler<E>>, phases: HandlerPhases) -> Self {
        let index = self.handlers.len();
        self.handlers.push(handler);
        if phases.on_reset() {
            self.after_reset.push(index);
        }
        if phases.on_step() {
            self.after_step.push(index);
        }
        self
    }

    /// Register several handlers, in order, for the given phases.
    #[must_use]
    pub fn with_handlers<I>(self, handlers: I, phases: HandlerPhases) -> Self
    where
        I: IntoIterator<Item = Box<dyn TickHandler<E>>>,
    {
        handlers
            .into_iter()
            .fold(self, |rec, handler| rec.with_handler(handler, phases))
    }

    pub const fn inner(&self) -> &E {
        &self.env
    }

    pub const fn inner_mut(&mut self) -> &mut E {
        &mut self.env
    }

    pub const fn config(&self) -> &RecorderConfig {
        &self.config
    }

    /// The episode currently being captured.
    pub const fn trajectory(&self) -> &Trajectory {
        &self.trajectory
    }

    pub const fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    /// Files written so far, oldest first.
    pub fn saved_paths(&self) -> &[PathBuf] {
        &self.saved
    }

    pub fn last_saved(&self) -> Option<&Path> {
        self.saved.last().map(PathBuf::as_path)
    }

    /// Persist the current episode even though it has not ended.
    ///
    /// Returns `Ok(None)` if nothing has been captured since the last save.
    pub fn flush(&mut self) -> Result<Option<PathBuf>, RecordError> {
        self.check_poisoned()?;
        self.persist()
    }

    /// Every stream name this recorder can produce.
    pub fn known_streams(&self) -> BTreeSet<&str> {
        let mut known = BTreeSet::from([streams::OBSERVATION, streams::TERMINAL_OBSERVATION]);
        if self.config.store_info {
            known.insert(streams::INFO);
        }
        for handler in &self.handlers {
            known.extend(handler.streams().iter().copied());
        }
        known
    }

    fn episode_path(&self) -> PathBuf {
        self.config.log_dir.join(format!(
            "{}_ep{:03}.{FILE_EXTENSION}",
            self.run_stamp, self.episode
        ))
    }

    const fn check_poisoned(&self) -> Result<(), RecordError> {
        if self.poisoned {
            Err(RecordError::Poisoned)
        } else {
            Ok(())
        }
    }

    /// Validate the compression selector against the captured streams.
    fn check_selector(&self) -> Result<(), RecordError> {
        let known = self.known_streams();
        for name in &self.config.compressed_streams {
            if !known.contains(name.as_str()) {
                return Err(RecordError::UnknownCompressedStream(name.clone()));
            }
            let sparse = name == streams::TERMINAL_OBSERVATION;
            if !sparse && !self.trajectory.contains(name) {
                return Err(RecordError::MissingStream(name.clone()));
            }
        }
        Ok(())
    }

    fn persist(&mut self) -> Result<Option<PathBuf>, RecordError> {
        if self.trajectory.ticks() == 0 {
            return Ok(None);
        }
        self.check_selector()?;

        let path = self.episode_path();
        write_trajectory(
            &path,
            &self.config.metadata,
            &self.trajectory,
            &self.config.compressed_streams,
            self.tick_period_ns,
        )?;
        info!(
            path = %path.display(),
            ticks = self.trajectory.ticks(),
            streams = self.trajectory.streams().count(),
            "trajectory saved"
        );
        self.trajectory.clear();
        self.episode += 1;
        self.saved.push(path.clone());
        Ok(Some(path))
    }

    fn run_handlers(&mut self, phase: TickPhase) -> Result<(), RecordError> {
        let order = match phase {
            TickPhase::Reset => &self.after_reset,
            TickPhase::Step => &self.after_step,
        };
        for &index in order {
            if let Some(handler) = self.handlers.get_mut(index) {
                run_handler(handler.as_mut(), &self.env, &mut self.trajectory, phase)?;
            }
        }
        Ok(())
    }

    fn capture_reset(&mut self, result: &ResetResult) -> Result<(), RecordError> {
        self.trajectory.clear();
        self.trajectory.begin_tick();
        self.run_handlers(TickPhase::Reset)?;
        if self.config.store_info {
            self.trajectory
                .append(streams::INFO, reset_info_value(&result.info))?;
        }
        self.trajectory
            .append(streams::OBSERVATION, (&result.observation).into())?;
        self.trajectory.end_tick()
    }

    fn capture_step(&mut self, result: &StepResult) -> Result<(), RecordError> {
        self.trajectory.begin_tick();
        self.trajectory
            .append(streams::OBSERVATION, (&result.observation).into())?;
        if result.is_done() {
            self.trajectory
                .append_sparse(streams::TERMINAL_OBSERVATION, (&result.observation).into())?;
        }
        if self.config.store_info {
            self.trajectory
                .append(streams::INFO, step_info_value(&result.info))?;
        }
        self.run_handlers(TickPhase::Step)?;
        self.trajectory.end_tick()
    }

    fn poison_on_err<T>(&mut self, result: Result<T, RecordError>) -> Result<T, RecordError> {
        if let Err(err) = &result {
            warn!(error = %err, "trajectory capture failed; recorder poisoned");
            self.poisoned = true;
        }
        result
    }
}

impl<E: Environment> TrajectoryRecorder<E> {
    /// `reset` with recorder errors kept typed.
    pub fn record_reset(&mut self, seed: Option<u64>) -> Result<ResetResult, RecordError> {
        self.check_poisoned()?;
        if self.trajectory.ticks() > 0 {
            warn!(
                ticks = self.trajectory.ticks(),
                "episode reset before it ended; saving partial trajectory"
            );
            self.persist()?;
        }
        let result = self.env.reset(seed)?;
        let captured = self.capture_reset(&result);
        self.poison_on_err(captured)?;
        debug!(episode = self.episode, "reset recorded");
        Ok(result)
    }

    /// `step` with recorder errors kept typed.
    pub fn record_step(&mut self, action: &Action) -> Result<StepResult, RecordError> {
        self.check_poisoned()?;
        let result = self.env.step(action)?;
        let captured = self.capture_step(&result);
        self.poison_on_err(captured)?;
        if result.is_done() {
            self.persist()?;
        }
        Ok(result)
    }
}

impl<E> Drop for TrajectoryRecorder<E> {
    fn drop(&mut self) {
        if self.poisoned || self.trajectory.ticks() == 0 {
            return;
        }
        if let Err(e) = self.persist() {
            warn!(error = %e, "failed to save trajectory on drop");
        }
    }
}

/// `info` stream entry for a reset. Floats keep NaN and infinities.
fn reset_info_value(info: &ResetInfo) -> StreamValue {
    StreamValue::Json(json!({
        "seed": info.seed,
        "custom": f32_map_to_json(&info.custom),
    }))
}

fn step_info_value(info: &StepInfo) -> StreamValue {
    StreamValue::Json(json!({
        "episode_length": info.episode_length,
        "episode_reward": f32_to_json(info.episode_reward),
        "custom": f32_map_to_json(&info.custom),
    }))
}

fn into_sim_error(err: RecordError) -> SimError {
    match err {
        RecordError::Sim(e) => e,
        other => SimError::Wrapper {
            wrapper: "TrajectoryRecorder",
            source: Box::new(other),
        },
    }
}

impl<E: Environment> Environment for TrajectoryRecorder<E> {
    fn reset(&mut self, seed: Option<u64>) -> Result<ResetResult, SimError> {
        self.record_reset(seed).map_err(into_sim_error)
    }

    fn step(&mut self, action: &Action) -> Result<StepResult, SimError> {
        self.record_step(action).map_err(into_sim_error)
    }

    fn render(&self) -> Result<Frame, SimError> {
        self.env.render()
    }

    fn time_step(&self) -> f64 {
        self.env.time_step()
    }

    fn frame_skip(&self) -> u32 {
        self.env.frame_skip()
    }

    fn observation_type(&self) -> &str {
        self.env.observation_type()
    }

    fn reward_amount_dict(&self) -> &BTreeMap<String, f32> {
        self.env.reward_amount_dict()
    }

    fn action_dim(&self) -> usize {
        self.env.action_dim()
    }

    fn tick_period(&self) -> std::time::Duration {
        self.env.tick_period()
    }

    fn name(&self) -> &str {
        self.env.name()
    }

    /// Save the episode in progress, then close the wrapped environment.
    fn close(&mut self) -> Result<(), SimError> {
        self.flush().map_err(into_sim_error)?;
        self.env.close()
    }
}

impl<E: LigatingScene> LigatingScene for TrajectoryRecorder<E> {
    fn loop_articulated_state(&self) -> Vec<f32> {
        self.env.loop_articulated_state()
    }

    fn loop_pose(&self) -> [f32; 7] {
        self.env.loop_pose()
    }

    fn loop_positions(&self) -> Vec<[f32; 3]> {
        self.env.loop_positions()
    }

    fn loop_tracking_indices(&self) -> &[usize] {
        self.env.loop_tracking_indices()
    }

    fn cavity_state(&self) -> Vec<[f32; 3]> {
        self.env.cavity_state()
    }

    fn cavity_tracking_indices(&self) -> &[usize] {
        self.env.cavity_tracking_indices()
    }

    fn marking_tracking_indices(&self) -> &[usize] {
        self.env.marking_tracking_indices()
    }
}
