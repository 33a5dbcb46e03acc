//! Gymnasium-style ligating-loop environment around a Bevy App.
//!
//! [`LigatingLoopEnv`] drives the scene step-by-step, exposing the
//! [`Environment`] API the console expects and the read-only
//! [`LigatingScene`] view used by trajectory handlers.

use std::collections::BTreeMap;

use bevy::prelude::*;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::debug;

use ligature_core::config::{ObservationType, SceneConfig};
use ligature_core::error::{ConfigError, SimError};
use ligature_core::frame::Frame;
use ligature_core::traits::{Environment, LigatingScene};
use ligature_core::types::{Action, Observation, ResetInfo, ResetResult, StepInfo, StepResult};

use crate::LigatingLoopScenePlugin;
use crate::episode::{Episode, EpisodeState};
use crate::render::render_scene;
use crate::resources::{
    Cavity, DEFAULT_MARKING_HEIGHT, LoopInstrument, MARKING_HEIGHT_RANGE, PendingAction,
    RewardTerms, Substep,
};

/// Number of action channels: tilt, pan, spin, depth and closure rates.
pub const ACTION_DIM: usize = 5;

// ---------------------------------------------------------------------------
// LigatingLoopEnv
// ---------------------------------------------------------------------------

/// Ligating-loop task environment.
///
/// Owns the Bevy App and a seeded RNG for marking placement. Each call to
/// [`step`](Environment::step) writes the action, runs `frame_skip` ECS
/// updates, then reads the observation and episode state.
pub struct LigatingLoopEnv {
    app: App,
    config: SceneConfig,
    rng: ChaCha8Rng,
    loop_tracking: Vec<usize>,
    cavity_tracking: Vec<usize>,
    marking_tracking: Vec<usize>,
}

impl LigatingLoopEnv {
    /// Build the scene. The episode starts `Idle`; call
    /// [`reset`](Environment::reset) before stepping.
    pub fn new(config: SceneConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let instrument = LoopInstrument::new(config.loop_radius, config.num_rope_points);
        let cavity = Cavity::new(DEFAULT_MARKING_HEIGHT, config.band_width);

        let mut app = App::new();
        app.insert_resource(config.clone())
            .insert_resource(instrument.clone())
            .insert_resource(cavity.clone())
            .add_plugins(LigatingLoopScenePlugin);
        app.finish();
        app.cleanup();

        Ok(Self {
            app,
            rng: ChaCha8Rng::from_entropy(),
            loop_tracking: instrument.tracking_indices(),
            cavity_tracking: cavity.cavity_tracking_indices,
            marking_tracking: cavity.marking_tracking_indices,
            config,
        })
    }

    pub const fn config(&self) -> &SceneConfig {
        &self.config
    }

    /// Current episode bookkeeping.
    pub fn episode(&self) -> &Episode {
        self.app.world().resource::<Episode>()
    }

    /// Mutable access to the underlying [`App`].
    pub const fn app_mut(&mut self) -> &mut App {
        &mut self.app
    }

    fn instrument(&self) -> &LoopInstrument {
        self.app.world().resource::<LoopInstrument>()
    }

    fn cavity(&self) -> &Cavity {
        self.app.world().resource::<Cavity>()
    }

    fn run_tick(&mut self, action: Vec<f32>) {
        let count = self.config.frame_skip;
        self.app.world_mut().resource_mut::<PendingAction>().0 = action;
        for index in 0..count {
            *self.app.world_mut().resource_mut::<Substep>() = Substep { index, count };
            self.app.update();
        }
    }

    fn current_observation(&self) -> Result<Observation, SimError> {
        match self.config.observation_type {
            ObservationType::State => {
                let instrument = self.instrument();
                let marking = self.cavity().marking_center();
                let mut data = Vec::with_capacity(15);
                data.extend_from_slice(&instrument.state);
                data.extend_from_slice(&instrument.pose());
                data.extend_from_slice(&marking.to_array());
                Ok(Observation::new(data))
            }
            ObservationType::Rgb => {
                let frame = self.render()?;
                Ok(Observation::new(
                    frame.data().iter().map(|&b| f32::from(b) / 255.0).collect(),
                ))
            }
        }
    }
}

impl Environment for LigatingLoopEnv {
    /// Rebuild the scene, let the tissue settle, and start a new episode.
    fn reset(&mut self, seed: Option<u64>) -> Result<ResetResult, SimError> {
        if let Some(seed) = seed {
            self.rng = ChaCha8Rng::seed_from_u64(seed);
        }
        let marking_height = if self.config.randomize_marking_position {
            self.rng.gen_range(MARKING_HEIGHT_RANGE.0..=MARKING_HEIGHT_RANGE.1)
        } else {
            DEFAULT_MARKING_HEIGHT
        };

        let instrument = LoopInstrument::new(self.config.loop_radius, self.config.num_rope_points);
        let cavity = Cavity::new(marking_height, self.config.band_width);
        self.marking_tracking.clone_from(&cavity.marking_tracking_indices);
        self.cavity_tracking.clone_from(&cavity.cavity_tracking_indices);

        {
            let world = self.app.world_mut();
            world.insert_resource(instrument);
            world.insert_resource(cavity);
            world.insert_resource(RewardTerms::default());
            world.resource_mut::<Episode>().settle();
        }
        for _ in 0..self.config.settle_steps {
            self.run_tick(vec![0.0; ACTION_DIM]);
        }
        self.app.world_mut().resource_mut::<Episode>().start(seed);

        debug!(?seed, marking_height, "ligating loop scene reset");

        Ok(ResetResult {
            observation: self.current_observation()?,
            info: ResetInfo {
                seed,
                custom: BTreeMap::from([("marking_height".to_string(), marking_height)]),
            },
        })
    }

    fn step(&mut self, action: &Action) -> Result<StepResult, SimError> {
        action.validate_dim(ACTION_DIM)?;
        if self.episode().state != EpisodeState::Running {
            return Err(match self.episode().state {
                EpisodeState::Settling => SimError::NotReset,
                _ => SimError::StepFailed("episode already finished; call reset()".into()),
            });
        }

        self.run_tick(action.as_slice().to_vec());

        let observation = self.current_observation()?;
        let episode = self.episode();
        let terms = self.app.world().resource::<RewardTerms>();
        Ok(StepResult {
            observation,
            reward: terms.reward,
            terminated: episode.state == EpisodeState::Ligated,
            truncated: episode.state == EpisodeState::Truncated,
            info: StepInfo {
                episode_length: episode.ticks,
                episode_reward: episode.total_reward,
                custom: terms.features.clone(),
            },
        })
    }

    fn render(&self) -> Result<Frame, SimError> {
        let [width, height] = self.config.image_shape;
        Ok(render_scene(self.instrument(), self.cavity(), width, height))
    }

    fn time_step(&self) -> f64 {
        self.config.time_step
    }

    fn frame_skip(&self) -> u32 {
        self.config.frame_skip
    }

    fn observation_type(&self) -> &str {
        self.config.observation_type.name()
    }

    fn reward_amount_dict(&self) -> &BTreeMap<String, f32> {
        &self.config.reward_amount_dict
    }

    fn action_dim(&self) -> usize {
        ACTION_DIM
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "LigatingLoopEnv"
    }
}

impl LigatingScene for LigatingLoopEnv {
    fn loop_articulated_state(&self) -> Vec<f32> {
        self.instrument().state.to_vec()
    }

    fn loop_pose(&self) -> [f32; 7] {
        self.instrument().pose()
    }

    fn loop_positions(&self) -> Vec<[f32; 3]> {
        self.instrument()
            .positions()
            .into_iter()
            .map(|p| p.to_array())
            .collect()
    }

    fn loop_tracking_indices(&self) -> &[usize] {
        &self.loop_tracking
    }

    fn cavity_state(&self) -> Vec<[f32; 3]> {
        self.cavity().current.iter().map(|p| p.to_array()).collect()
    }

    fn cavity_tracking_indices(&self) -> &[usize] {
        &self.cavity_tracking
    }

    fn marking_tracking_indices(&self) -> &[usize] {
        &self.marking_tracking
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use ligature_core::traits::gather_flat;

    fn small_config() -> SceneConfig {
        SceneConfig {
            image_shape: [64, 64],
            settle_steps: 2,
            ..SceneConfig::default()
        }
    }

    fn build_env() -> LigatingLoopEnv {
        LigatingLoopEnv::new(small_config()).unwrap()
    }

    #[test]
    fn invalid_config_rejected() {
        let config = SceneConfig {
            frame_skip: 0,
            ..small_config()
        };
        assert!(LigatingLoopEnv::new(config).is_err());
    }

    #[test]
    fn reset_returns_state_observation() {
        let mut env = build_env();
        let result = env.reset(Some(42)).unwrap();
        assert_eq!(result.observation.len(), 15);
        assert_eq!(result.info.seed, Some(42));
        assert!(env.episode().state.is_running());
    }

    #[test]
    fn step_before_reset_fails() {
        let mut env = build_env();
        let err = env.step(&Action::zeros(ACTION_DIM)).unwrap_err();
        assert!(matches!(err, SimError::NotReset));
    }

    #[test]
    fn step_rejects_wrong_action_dim() {
        let mut env = build_env();
        env.reset(None).unwrap();
        let err = env.step(&Action::zeros(3)).unwrap_err();
        assert!(matches!(err, SimError::InvalidAction(_)));
    }

    #[test]
    fn step_counts_ticks_not_substeps() {
        let mut env = LigatingLoopEnv::new(SceneConfig {
            frame_skip: 3,
            ..small_config()
        })
        .unwrap();
        env.reset(None).unwrap();
        let r1 = env.step(&Action::zeros(ACTION_DIM)).unwrap();
        let r2 = env.step(&Action::zeros(ACTION_DIM)).unwrap();
        assert_eq!(r1.info.episode_length, 1);
        assert_eq!(r2.info.episode_length, 2);
    }

    #[test]
    fn depth_action_moves_loop_down() {
        let mut env = build_env();
        env.reset(None).unwrap();
        let before = env.loop_pose()[2];
        env.step(&Action::new(vec![0.0, 0.0, 0.0, 1.0, 0.0])).unwrap();
        let after = env.loop_pose()[2];
        assert!(after < before);
    }

    #[test]
    fn truncation_after_max_steps() {
        let mut env = LigatingLoopEnv::new(SceneConfig {
            max_episode_steps: 3,
            ..small_config()
        })
        .unwrap();
        env.reset(None).unwrap();
        let action = Action::zeros(ACTION_DIM);
        assert!(!env.step(&action).unwrap().truncated);
        assert!(!env.step(&action).unwrap().truncated);
        assert!(env.step(&action).unwrap().truncated);
        assert!(env.step(&action).is_err());
    }

    #[test]
    fn closing_over_marking_terminates() {
        let mut env = build_env();
        env.reset(None).unwrap();

        // Lower the loop to the marking band (depth 55 puts it at z = 35).
        let down = Action::new(vec![0.0, 0.0, 0.0, 1.0, 0.0]);
        while env.loop_articulated_state()[3] < 55.0 {
            env.step(&down).unwrap();
        }
        let close = Action::new(vec![0.0, 0.0, 0.0, 0.0, 1.0]);
        let mut terminated = false;
        for _ in 0..200 {
            let result = env.step(&close).unwrap();
            if result.terminated {
                assert!(result.info.custom["successful_task"] > 0.5);
                assert!(result.reward > 50.0);
                terminated = true;
                break;
            }
        }
        assert!(terminated);
    }

    #[test]
    fn closing_loop_constricts_tissue() {
        let mut env = build_env();
        env.reset(None).unwrap();
        let rest = env.cavity_state();

        let down = Action::new(vec![0.0, 0.0, 0.0, 1.0, 0.0]);
        while env.loop_articulated_state()[3] < 55.0 {
            env.step(&down).unwrap();
        }
        // Close partially, below the success threshold.
        let close = Action::new(vec![0.0, 0.0, 0.0, 0.0, 1.0]);
        while env.loop_articulated_state()[4] < 0.7 {
            env.step(&close).unwrap();
        }
        let squeezed = env.cavity_state();
        let moved = rest
            .iter()
            .zip(&squeezed)
            .any(|(a, b)| (a[0] - b[0]).abs() > 0.1 || (a[1] - b[1]).abs() > 0.1);
        assert!(moved);
    }

    #[test]
    fn seeded_marking_randomisation_is_reproducible() {
        let config = SceneConfig {
            randomize_marking_position: true,
            ..small_config()
        };
        let mut a = LigatingLoopEnv::new(config.clone()).unwrap();
        let mut b = LigatingLoopEnv::new(config).unwrap();
        let ra = a.reset(Some(9)).unwrap();
        let rb = b.reset(Some(9)).unwrap();
        assert_eq!(ra.info.custom["marking_height"], rb.info.custom["marking_height"]);
        assert_eq!(a.marking_tracking_indices(), b.marking_tracking_indices());
    }

    #[test]
    fn render_uses_image_shape() {
        let env = build_env();
        let frame = env.render().unwrap();
        assert_eq!((frame.width(), frame.height()), (64, 64));
    }

    #[test]
    fn tracking_indices_are_in_range() {
        let mut env = build_env();
        env.reset(None).unwrap();
        let cavity = env.cavity_state();
        assert!(env.cavity_tracking_indices().iter().all(|&i| i < cavity.len()));
        assert!(env.marking_tracking_indices().iter().all(|&i| i < cavity.len()));
        let rope = env.loop_positions();
        assert!(env.loop_tracking_indices().iter().all(|&i| i < rope.len()));
        assert_eq!(gather_flat(&rope, env.loop_tracking_indices()).len(), 30);
    }

    #[test]
    fn rgb_observation_matches_render_size() {
        let mut env = LigatingLoopEnv::new(SceneConfig {
            observation_type: ObservationType::Rgb,
            image_shape: [16, 8],
            ..small_config()
        })
        .unwrap();
        let result = env.reset(None).unwrap();
        assert_eq!(result.observation.len(), 16 * 8 * 3);
        assert_eq!(env.observation_type(), "RGB");
    }
}
