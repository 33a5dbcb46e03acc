//! Kinematic ligating-loop scene for the operator console.
//!
//! The scene stands in for the full soft-tissue simulator: a loop
//! instrument pivoting about a remote centre of motion, a cylindrical
//! cavity with a marking band, and a closing loop that constricts the
//! tissue it encircles. It runs as a Bevy [`App`] so the scene logic is
//! plain ECS systems over a handful of resources.
//!
//! - [`env`](mod@env): [`LigatingLoopEnv`], the [`Environment`](ligature_core::traits::Environment)
//!   implementation
//! - [`resources`]: instrument and cavity models
//! - [`systems`]: kinematics, tissue deformation, rewards, episode bookkeeping
//! - [`render`]: software side-view renderer

pub mod env;
pub mod episode;
pub mod render;
pub mod resources;
pub mod systems;

use bevy::prelude::*;

use crate::episode::Episode;
use crate::resources::{PendingAction, RewardTerms, Substep};
use crate::systems::{
    apply_action_system, deform_cavity_system, episode_step_system, on_last_substep,
    reward_system,
};

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

pub use env::{ACTION_DIM, LigatingLoopEnv};

// ---------------------------------------------------------------------------
// LigatingLoopScenePlugin
// ---------------------------------------------------------------------------

/// Bevy plugin registering the scene bookkeeping resources and systems.
///
/// [`SceneConfig`](ligature_core::config::SceneConfig),
/// [`LoopInstrument`](resources::LoopInstrument) and
/// [`Cavity`](resources::Cavity) must be inserted by the caller; they
/// depend on the configuration.
pub struct LigatingLoopScenePlugin;

impl Plugin for LigatingLoopScenePlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<PendingAction>()
            .init_resource::<Substep>()
            .init_resource::<RewardTerms>()
            .init_resource::<Episode>()
            .add_systems(
                Update,
                (
                    apply_action_system,
                    deform_cavity_system,
                    (reward_system, episode_step_system)
                        .chain()
                        .run_if(on_last_substep),
                )
                    .chain(),
            );
    }
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

pub mod prelude {
    pub use crate::{
        ACTION_DIM, LigatingLoopEnv, LigatingLoopScenePlugin,
        episode::{Episode, EpisodeState},
        resources::{Cavity, LoopInstrument},
    };
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use ligature_core::config::SceneConfig;
    use resources::{Cavity, LoopInstrument};

    #[test]
    fn plugin_builds_without_panic() {
        let mut app = App::new();
        app.insert_resource(SceneConfig::default())
            .insert_resource(LoopInstrument::new(20.0, 60))
            .insert_resource(Cavity::new(35.0, 8.0))
            .add_plugins(LigatingLoopScenePlugin);
        app.finish();
        app.cleanup();
        app.update();

        assert!(app.world().get_resource::<Episode>().is_some());
        assert!(app.world().get_resource::<RewardTerms>().is_some());
    }

    #[test]
    fn settling_episode_does_not_count_ticks() {
        let mut app = App::new();
        app.insert_resource(SceneConfig::default())
            .insert_resource(LoopInstrument::new(20.0, 60))
            .insert_resource(Cavity::new(35.0, 8.0))
            .add_plugins(LigatingLoopScenePlugin);
        app.update();
        app.update();
        assert_eq!(app.world().resource::<Episode>().ticks, 0);
    }

    #[test]
    fn reward_only_on_last_substep() {
        let mut app = App::new();
        app.insert_resource(SceneConfig::default())
            .insert_resource(LoopInstrument::new(20.0, 60))
            .insert_resource(Cavity::new(35.0, 8.0))
            .add_plugins(LigatingLoopScenePlugin);
        app.world_mut().resource_mut::<Episode>().start(None);

        *app.world_mut().resource_mut::<Substep>() = Substep { index: 0, count: 2 };
        app.update();
        assert_eq!(app.world().resource::<Episode>().ticks, 0);

        *app.world_mut().resource_mut::<Substep>() = Substep { index: 1, count: 2 };
        app.update();
        assert_eq!(app.world().resource::<Episode>().ticks, 1);
    }
}
