//! Wall-clock pacing for interactive control loops.
//!
//! [`RealtimeWrapper`] caps the rate at which an [`Environment`] can be
//! stepped to one tick per `time_step × frame_skip`. Ticks are spaced at
//! least one period apart, measured from the moment each tick is handed to
//! the wrapped environment. A tick that overruns the period is not made up
//! for later: the next tick simply starts without sleeping.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::error::SimError;
use crate::frame::Frame;
use crate::traits::{Environment, LigatingScene};
use crate::types::{Action, ResetResult, StepResult};

// ---------------------------------------------------------------------------
// RealtimeWrapper
// ---------------------------------------------------------------------------

/// Environment wrapper that blocks in `step` until the target tick period
/// has elapsed.
///
/// Returned values are never altered; `reset` is not paced.
pub struct RealtimeWrapper<E> {
    env: E,
    period: Duration,
    last_tick: Instant,
}

impl<E: Environment> RealtimeWrapper<E> {
    /// Wrap `env`, pacing at its nominal [`tick_period`](Environment::tick_period).
    pub fn new(env: E) -> Self {
        let period = env.tick_period();
        Self::with_period(env, period)
    }
}

impl<E> RealtimeWrapper<E> {
    /// Wrap `env` with an explicit tick period.
    pub fn with_period(env: E, period: Duration) -> Self {
        Self {
            env,
            period,
            last_tick: Instant::now(),
        }
    }

    /// Target tick period.
    pub const fn period(&self) -> Duration {
        self.period
    }

    pub const fn inner(&self) -> &E {
        &self.env
    }

    pub const fn inner_mut(&mut self) -> &mut E {
        &mut self.env
    }

    pub fn into_inner(self) -> E {
        self.env
    }

    /// Block until one period has passed since the previous tick started.
    fn wait_for_slot(&mut self) {
        let elapsed = self.last_tick.elapsed();
        if let Some(remaining) = self.period.checked_sub(elapsed) {
            std::thread::sleep(remaining);
        } else {
            debug!(
                overrun_ms = (elapsed - self.period).as_secs_f64() * 1e3,
                "tick exceeded target period"
            );
        }
        self.last_tick = Instant::now();
    }
}

impl<E: Environment> Environment for RealtimeWrapper<E> {
    fn reset(&mut self, seed: Option<u64>) -> Result<ResetResult, SimError> {
        let result = self.env.reset(seed);
        self.last_tick = Instant::now();
        result
    }

    fn step(&mut self, action: &Action) -> Result<StepResult, SimError> {
        self.wait_for_slot();
        self.env.step(action)
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

    fn tick_period(&self) -> Duration {
        self.env.tick_period()
    }

    fn name(&self) -> &str {
        self.env.name()
    }

    fn close(&mut self) -> Result<(), SimError> {
        self.env.close()
    }
}

impl<E: LigatingScene> LigatingScene for RealtimeWrapper<E> {
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

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Observation, ResetInfo, StepInfo};

    /// Environment whose `step` busy-waits for a configurable duration.
    struct SlowEnv {
        work: Duration,
        steps: u32,
        rewards: BTreeMap<String, f32>,
    }

    impl SlowEnv {
        fn new(work: Duration) -> Self {
            Self {
                work,
                steps: 0,
                rewards: BTreeMap::new(),
            }
        }
    }

    impl Environment for SlowEnv {
        fn reset(&mut self, seed: Option<u64>) -> Result<ResetResult, SimError> {
            self.steps = 0;
            Ok(ResetResult {
                observation: Observation::zeros(1),
                info: ResetInfo {
                    seed,
                    ..ResetInfo::default()
                },
            })
        }

        fn step(&mut self, _action: &Action) -> Result<StepResult, SimError> {
            let start = Instant::now();
            while start.elapsed() < self.work {
                std::hint::spin_loop();
            }
            self.steps += 1;
            #[allow(clippy::cast_precision_loss)]
            Ok(StepResult {
                observation: Observation::new(vec![self.steps as f32]),
                reward: 1.5,
                terminated: false,
                truncated: false,
                info: StepInfo::default(),
            })
        }

        fn render(&self) -> Result<Frame, SimError> {
            Ok(Frame::new(1, 1))
        }

        fn time_step(&self) -> f64 {
            1.0 / 30.0
        }

        fn frame_skip(&self) -> u32 {
            1
        }

        fn observation_type(&self) -> &str {
            "STATE"
        }

        fn reward_amount_dict(&self) -> &BTreeMap<String, f32> {
            &self.rewards
        }

        fn action_dim(&self) -> usize {
            1
        }
    }

    const TOLERANCE: Duration = Duration::from_millis(3);

    #[test]
    fn period_derived_from_time_step_and_frame_skip() {
        let env = RealtimeWrapper::new(SlowEnv::new(Duration::ZERO));
        let expected = Duration::from_secs_f64(1.0 / 30.0);
        assert_eq!(env.period(), expected);
    }

    #[test]
    fn fast_tick_is_stretched_to_period() {
        let mut env = RealtimeWrapper::new(SlowEnv::new(Duration::from_millis(5)));
        env.reset(None).unwrap();
        let action = Action::zeros(1);

        // Steady state: the previous tick's work counts towards this tick's slot.
        env.step(&action).unwrap();
        let start = Instant::now();
        env.step(&action).unwrap();
        let elapsed = start.elapsed();

        let period = env.period();
        assert!(elapsed + TOLERANCE >= period, "step took {elapsed:?}");
        assert!(elapsed < period + Duration::from_millis(20), "step took {elapsed:?}");
    }

    #[test]
    fn first_step_after_reset_is_paced() {
        let mut env =
            RealtimeWrapper::with_period(SlowEnv::new(Duration::ZERO), Duration::from_millis(20));
        env.reset(None).unwrap();
        let start = Instant::now();
        env.step(&Action::zeros(1)).unwrap();
        assert!(start.elapsed() + TOLERANCE >= Duration::from_millis(20));
    }

    #[test]
    fn slow_tick_is_not_compensated() {
        let period = Duration::from_millis(10);
        let mut env = RealtimeWrapper::with_period(SlowEnv::new(Duration::from_millis(25)), period);
        env.reset(None).unwrap();
        let action = Action::zeros(1);
        env.step(&action).unwrap();

        // The previous tick overran, so this one starts immediately and
        // takes only its own work time.
        env.inner_mut().work = Duration::ZERO;
        let start = Instant::now();
        env.step(&action).unwrap();
        assert!(start.elapsed() < period, "took {:?}", start.elapsed());

        // No catch-up: the tick after that is paced normally again.
        let start = Instant::now();
        env.step(&action).unwrap();
        assert!(start.elapsed() + TOLERANCE >= period);
    }

    #[test]
    fn results_pass_through_unchanged() {
        let mut env =
            RealtimeWrapper::with_period(SlowEnv::new(Duration::ZERO), Duration::from_millis(1));
        let reset = env.reset(Some(7)).unwrap();
        assert_eq!(reset.info.seed, Some(7));

        let result = env.step(&Action::zeros(1)).unwrap();
        assert_eq!(result.observation.as_slice(), &[1.0]);
        assert!((result.reward - 1.5).abs() < f32::EPSILON);
        assert_eq!(env.inner().steps, 1);
    }

    #[test]
    fn reset_does_not_block() {
        let mut env =
            RealtimeWrapper::with_period(SlowEnv::new(Duration::ZERO), Duration::from_millis(200));
        let start = Instant::now();
        env.reset(None).unwrap();
        env.reset(None).unwrap();
        assert!(start.elapsed() < Duration::from_millis(100));
    }
}
