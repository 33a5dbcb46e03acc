//! The operator control loop.
//!
//! ```text
//! INIT ──reset──▶ RUNNING ──terminated/truncated──▶ TERMINAL
//!                    │
//!                    └──────abort button──────────▶ ABORTED
//! ```
//!
//! Each RUNNING tick reads the controller, maps the snapshot to an action,
//! steps the environment, optionally writes the rendered frame to video,
//! handles the abort button, then reports frame-rate statistics. The video
//! sink is released and the environment closed on every exit path,
//! including errors.

use std::path::PathBuf;
use std::time::Instant;

use ligature_core::traits::{Environment, FrameSink};
use ligature_teleop::{ActionMapping, Controller};
use tracing::{debug, info, warn};

use crate::error::ConsoleError;
use crate::stats::{DEFAULT_FPS_WINDOW, FpsSample, FpsTracker};

/// Still image written when the operator aborts.
pub const DEFAULT_STILL_IMAGE: &str = "exit_image.png";

// ---------------------------------------------------------------------------
// State / outcome
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Init,
    Running,
    Terminal,
    Aborted,
}

impl LoopState {
    pub const fn is_finished(self) -> bool {
        matches!(self, Self::Terminal | Self::Aborted)
    }
}

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Terminated,
    Truncated,
    Aborted,
}

// ---------------------------------------------------------------------------
// SessionOptions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOptions {
    /// Where the abort still image is written.
    pub still_image_path: PathBuf,
    /// Seed passed to the initial `reset`.
    pub seed: Option<u64>,
    /// Frame-rate window size.
    pub fps_window: usize,
    /// Log frame-rate statistics every this many ticks.
    pub report_every: u32,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            still_image_path: PathBuf::from(DEFAULT_STILL_IMAGE),
            seed: None,
            fps_window: DEFAULT_FPS_WINDOW,
            report_every: 1,
        }
    }
}

// ---------------------------------------------------------------------------
// SessionReport
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct SessionReport {
    pub outcome: Outcome,
    /// Steps taken after the initial reset.
    pub ticks: u32,
    pub total_reward: f32,
    /// Frames handed to the video sink, including the initial frame.
    pub frames_written: u64,
    /// Set when the session was aborted.
    pub still_image: Option<PathBuf>,
    pub fps: Option<FpsSample>,
}

// ---------------------------------------------------------------------------
// ControlLoop
// ---------------------------------------------------------------------------

/// Drives one episode from operator input.
pub struct ControlLoop<E, C> {
    env: E,
    controller: C,
    mapping: ActionMapping,
    video: Option<Box<dyn FrameSink>>,
    options: SessionOptions,
    fps: FpsTracker,
    state: LoopState,
    started: bool,
}

impl<E: Environment, C: Controller> ControlLoop<E, C> {
    pub fn new(env: E, controller: C, options: SessionOptions) -> Self {
        let fps = FpsTracker::new(options.fps_window);
        Self {
            env,
            controller,
            mapping: ActionMapping::new(),
            video: None,
            options,
            fps,
            state: LoopState::Init,
            started: false,
        }
    }

    #[must_use]
    pub const fn with_mapping(mut self, mapping: ActionMapping) -> Self {
        self.mapping = mapping;
        self
    }

    /// Write the initial frame and one frame per tick to `sink`.
    #[must_use]
    pub fn with_video(mut self, sink: Box<dyn FrameSink>) -> Self {
        self.video = Some(sink);
        self
    }

    pub const fn state(&self) -> LoopState {
        self.state
    }

    pub const fn env(&self) -> &E {
        &self.env
    }

    pub const fn env_mut(&mut self) -> &mut E {
        &mut self.env
    }

    pub const fn controller(&self) -> &C {
        &self.controller
    }

    pub const fn fps(&self) -> &FpsTracker {
        &self.fps
    }

    /// Run the episode to completion. Callable once.
    pub fn run(&mut self) -> Result<SessionReport, ConsoleError> {
        if self.started {
            return Err(ConsoleError::AlreadyRun);
        }
        self.started = true;

        let result = self.drive();
        let cleanup = self.cleanup();
        match (result, cleanup) {
            (Ok(report), Ok(())) => Ok(report),
            (Ok(_), Err(e)) => Err(e),
            (Err(e), cleanup) => {
                if let Err(cleanup_err) = cleanup {
                    warn!(error = %cleanup_err, "cleanup after failed session also failed");
                }
                Err(e)
            }
        }
    }

    fn drive(&mut self) -> Result<SessionReport, ConsoleError> {
        self.state = LoopState::Init;
        self.env.reset(self.options.seed)?;
        if let Some(video) = self.video.as_mut() {
            video.write_frame(&self.env.render()?)?;
        }
        info!(env = self.env.name(), "session started");
        self.state = LoopState::Running;

        let mut ticks = 0_u32;
        let mut total_reward = 0.0_f32;
        let (outcome, still_image) = loop {
            let start = Instant::now();
            let input = self.controller.read()?;
            let action = self.mapping.map(&input);
            let step = self.env.step(&action)?;
            ticks += 1;
            total_reward += step.reward;

            if let Some(video) = self.video.as_mut() {
                video.write_frame(&self.env.render()?)?;
            }

            if ActionMapping::abort_requested(&input) {
                let path = self.options.still_image_path.clone();
                self.env.render()?.save_png(&path)?;
                self.state = LoopState::Aborted;
                info!(tick = ticks, image = %path.display(), "session aborted by operator");
                break (Outcome::Aborted, Some(path));
            }

            let sample = self.fps.record(start.elapsed());
            if ticks % self.options.report_every.max(1) == 0 {
                info!(
                    fps = format_args!("{:.5}", sample.instant),
                    mean = format_args!("{:.5}", sample.mean),
                    std = format_args!("{:.5}", sample.std),
                    "frame rate"
                );
            }

            if step.is_done() {
                self.state = LoopState::Terminal;
                let outcome = if step.terminated {
                    Outcome::Terminated
                } else {
                    Outcome::Truncated
                };
                info!(tick = ticks, ?outcome, total_reward, "episode finished");
                break (outcome, None);
            }
        };

        Ok(SessionReport {
            outcome,
            ticks,
            total_reward,
            frames_written: self.video.as_ref().map_or(0, |v| v.frames_written()),
            still_image,
            fps: self.fps.summary(),
        })
    }

    /// Release the video sink (at most once) and close the environment.
    fn cleanup(&mut self) -> Result<(), ConsoleError> {
        let video = self.video.take().map(|mut sink| {
            let frames = sink.frames_written();
            sink.release().inspect(|_| debug!(frames, "video released"))
        });
        let closed = self.env.close();
        if let Some(released) = video {
            released?;
        }
        closed?;
        Ok(())
    }
}
