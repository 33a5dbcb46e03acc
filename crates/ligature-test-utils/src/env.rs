//! Deterministic stand-in for the ligating-loop environment.

use std::collections::BTreeMap;
use std::time::Duration;

use ligature_core::error::SimError;
use ligature_core::frame::Frame;
use ligature_core::traits::{Environment, LigatingScene};
use ligature_core::types::{Action, Observation, ResetInfo, ResetResult, StepInfo, StepResult};

pub const MOCK_ACTION_DIM: usize = 5;
const LOOP_POINTS: usize = 12;
const CAVITY_POINTS: usize = 20;

/// Environment whose state is the integral of its actions.
///
/// Observation is the 5-element joint state. Each step adds
/// `action * dt` to the state. The episode terminates or truncates after a
/// configured number of steps, and each step can burn a fixed amount of
/// wall-clock time.
#[derive(Debug, Clone)]
pub struct MockEnv {
    time_step: f64,
    frame_skip: u32,
    work: Duration,
    terminate_after: Option<u32>,
    truncate_after: Option<u32>,
    fail_step_at: Option<u32>,
    diverge_at: Option<u32>,
    render_size: (u32, u32),
    reward_amount_dict: BTreeMap<String, f32>,
    state: [f32; MOCK_ACTION_DIM],
    running: bool,
    steps: u32,
    resets: u32,
    closes: u32,
    actions: Vec<Action>,
    loop_tracking: Vec<usize>,
    cavity_tracking: Vec<usize>,
    marking_tracking: Vec<usize>,
}

impl MockEnv {
    pub fn new() -> Self {
        Self {
            time_step: 1.0 / 30.0,
            frame_skip: 1,
            work: Duration::ZERO,
            terminate_after: None,
            truncate_after: None,
            fail_step_at: None,
            diverge_at: None,
            render_size: (32, 32),
            reward_amount_dict: BTreeMap::from([("successful_task".to_string(), 100.0)]),
            state: [0.0; MOCK_ACTION_DIM],
            running: false,
            steps: 0,
            resets: 0,
            closes: 0,
            actions: Vec::new(),
            loop_tracking: (0..LOOP_POINTS).step_by(3).collect(),
            cavity_tracking: (0..CAVITY_POINTS).step_by(5).collect(),
            marking_tracking: vec![1, 2],
        }
    }

    #[must_use]
    pub const fn with_time_step(mut self, time_step: f64) -> Self {
        self.time_step = time_step;
        self
    }

    #[must_use]
    pub const fn with_frame_skip(mut self, frame_skip: u32) -> Self {
        self.frame_skip = frame_skip;
        self
    }

    /// Busy-wait this long inside every `step`.
    #[must_use]
    pub const fn with_work(mut self, work: Duration) -> Self {
        self.work = work;
        self
    }

    /// Report `terminated` on step number `steps`.
    #[must_use]
    pub const fn terminate_after(mut self, steps: u32) -> Self {
        self.terminate_after = Some(steps);
        self
    }

    /// Report `truncated` on step number `steps`.
    #[must_use]
    pub const fn truncate_after(mut self, steps: u32) -> Self {
        self.truncate_after = Some(steps);
        self
    }

    /// Fail with [`SimError::StepFailed`] on step number `steps`.
    #[must_use]
    pub const fn fail_step_at(mut self, steps: u32) -> Self {
        self.fail_step_at = Some(steps);
        self
    }

    /// From step number `steps` on, the state holds NaN, infinities and
    /// negative zero, as a diverged simulation would.
    #[must_use]
    pub const fn diverge_at(mut self, steps: u32) -> Self {
        self.diverge_at = Some(steps);
        self
    }

    #[must_use]
    pub const fn with_render_size(mut self, width: u32, height: u32) -> Self {
        self.render_size = (width, height);
        self
    }

    /// Steps taken in the current episode.
    pub const fn steps(&self) -> u32 {
        self.steps
    }

    pub const fn resets(&self) -> u32 {
        self.resets
    }

    pub const fn closes(&self) -> u32 {
        self.closes
    }

    /// Every action received, across episodes.
    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    pub const fn state(&self) -> [f32; MOCK_ACTION_DIM] {
        self.state
    }

    /// Colour of the frame rendered at the current tick; encodes the step count.
    #[allow(clippy::cast_possible_truncation)]
    pub const fn frame_colour(&self) -> [u8; 3] {
        [(self.steps % 256) as u8, (self.resets % 256) as u8, 128]
    }

    fn observation(&self) -> Observation {
        Observation::new(self.state.to_vec())
    }
}

impl Default for MockEnv {
    fn default() -> Self {
        Self::new()
    }
}

impl Environment for MockEnv {
    #[allow(clippy::cast_precision_loss)]
    fn reset(&mut self, seed: Option<u64>) -> Result<ResetResult, SimError> {
        self.state = [0.0; MOCK_ACTION_DIM];
        self.state[3] = 10.0;
        self.steps = 0;
        self.resets += 1;
        self.running = true;
        Ok(ResetResult {
            observation: self.observation(),
            info: ResetInfo {
                seed,
                custom: BTreeMap::from([("resets".to_string(), self.resets as f32)]),
            },
        })
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    fn step(&mut self, action: &Action) -> Result<StepResult, SimError> {
        if !self.running {
            return Err(SimError::NotReset);
        }
        action.validate_dim(MOCK_ACTION_DIM)?;
        crate::spin_for(self.work);

        self.steps += 1;
        self.actions.push(action.clone());
        if self.fail_step_at == Some(self.steps) {
            self.running = false;
            return Err(SimError::StepFailed(format!("scripted failure at step {}", self.steps)));
        }

        let dt = (self.time_step * f64::from(self.frame_skip)) as f32;
        for (s, a) in self.state.iter_mut().zip(action.as_slice()) {
            *s += a * dt;
        }
        if self.diverge_at.is_some_and(|at| self.steps >= at) {
            self.state = [f32::NAN, f32::INFINITY, -0.0, f32::NAN, f32::NEG_INFINITY];
        }

        let terminated = self.terminate_after == Some(self.steps);
        let truncated = !terminated && self.truncate_after == Some(self.steps);
        if terminated || truncated {
            self.running = false;
        }
        let reward = 0.1 * self.steps as f32;
        Ok(StepResult {
            observation: self.observation(),
            reward,
            terminated,
            truncated,
            info: StepInfo {
                episode_length: self.steps,
                episode_reward: reward,
                custom: BTreeMap::from([("depth".to_string(), self.state[3])]),
            },
        })
    }

    fn render(&self) -> Result<Frame, SimError> {
        let (w, h) = self.render_size;
        let mut frame = Frame::new(w, h);
        frame.fill(self.frame_colour());
        Ok(frame)
    }

    fn time_step(&self) -> f64 {
        self.time_step
    }

    fn frame_skip(&self) -> u32 {
        self.frame_skip
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn observation_type(&self) -> &str {
        "STATE"
    }

    fn reward_amount_dict(&self) -> &BTreeMap<String, f32> {
        &self.reward_amount_dict
    }

    fn action_dim(&self) -> usize {
        MOCK_ACTION_DIM
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "MockEnv"
    }

    fn close(&mut self) -> Result<(), SimError> {
        self.closes += 1;
        Ok(())
    }
}

#[allow(clippy::cast_precision_loss)]
impl LigatingScene for MockEnv {
    fn loop_articulated_state(&self) -> Vec<f32> {
        self.state.to_vec()
    }

    fn loop_pose(&self) -> [f32; 7] {
        [self.state[0], self.state[1], self.state[3], 0.0, 0.0, 0.0, 1.0]
    }

    fn loop_positions(&self) -> Vec<[f32; 3]> {
        (0..LOOP_POINTS)
            .map(|i| [i as f32, self.state[4], self.state[3]])
            .collect()
    }

    fn loop_tracking_indices(&self) -> &[usize] {
        &self.loop_tracking
    }

    fn cavity_state(&self) -> Vec<[f32; 3]> {
        (0..CAVITY_POINTS)
            .map(|i| [0.0, i as f32, self.steps as f32])
            .collect()
    }

    fn cavity_tracking_indices(&self) -> &[usize] {
        &self.cavity_tracking
    }

    fn marking_tracking_indices(&self) -> &[usize] {
        &self.marking_tracking
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_before_reset_fails() {
        let mut env = MockEnv::new();
        assert!(matches!(
            env.step(&Action::zeros(MOCK_ACTION_DIM)),
            Err(SimError::NotReset)
        ));
    }

    #[test]
    fn terminates_on_schedule() {
        let mut env = MockEnv::new().terminate_after(2);
        env.reset(None).unwrap();
        let a = Action::zeros(MOCK_ACTION_DIM);
        assert!(!env.step(&a).unwrap().is_done());
        let last = env.step(&a).unwrap();
        assert!(last.terminated && !last.truncated);
        assert!(matches!(env.step(&a), Err(SimError::NotReset)));
    }

    #[test]
    fn state_integrates_actions() {
        let mut env = MockEnv::new().with_time_step(0.5);
        env.reset(None).unwrap();
        env.step(&Action::from(vec![1.0, 0.0, 0.0, -2.0, 0.0])).unwrap();
        assert_eq!(env.state(), [0.5, 0.0, 0.0, 9.0, 0.0]);
    }

    #[test]
    fn diverged_state_is_non_finite() {
        let mut env = MockEnv::new().diverge_at(2);
        env.reset(None).unwrap();
        let first = env.step(&Action::zeros(MOCK_ACTION_DIM)).unwrap();
        assert!(first.observation.as_slice().iter().all(|v| v.is_finite()));
        let second = env.step(&Action::zeros(MOCK_ACTION_DIM)).unwrap();
        assert!(second.observation.as_slice()[0].is_nan());
        assert!(second.info.custom["depth"].is_nan());
    }

    #[test]
    fn render_encodes_step_count() {
        let mut env = MockEnv::new().with_render_size(4, 2);
        env.reset(None).unwrap();
        env.step(&Action::zeros(MOCK_ACTION_DIM)).unwrap();
        let frame = env.render().unwrap();
        assert_eq!((frame.width(), frame.height()), (4, 2));
        assert_eq!(&frame.data()[..3], &[1, 1, 128]);
    }
}
