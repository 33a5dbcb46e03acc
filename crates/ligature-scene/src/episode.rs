//! Episode bookkeeping for the ligating-loop scene.
//!
//! After a reset the scene first settles under a zero action, then runs
//! until the loop closes on the marking band or the tick limit is hit.

use bevy::prelude::*;

/// Where the scene is in its reset/run cycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum EpisodeState {
    /// Never reset, or settling after a reset. Ticks are not counted.
    #[default]
    Settling,
    Running,
    /// The loop closed around the marking band.
    Ligated,
    /// `max_episode_steps` reached first.
    Truncated,
}

impl EpisodeState {
    pub const fn is_finished(self) -> bool {
        matches!(self, Self::Ligated | Self::Truncated)
    }

    pub const fn is_running(self) -> bool {
        matches!(self, Self::Running)
    }
}

/// Per-episode counters, stored as a Bevy resource.
#[derive(Resource, Clone, Debug, Default)]
pub struct Episode {
    pub state: EpisodeState,
    /// Control ticks since the episode started running.
    pub ticks: u32,
    pub total_reward: f32,
    pub seed: Option<u64>,
    /// 1-based; zero until the first episode starts.
    pub index: u32,
}

impl Episode {
    pub const fn settle(&mut self) {
        self.state = EpisodeState::Settling;
        self.ticks = 0;
        self.total_reward = 0.0;
    }

    pub const fn start(&mut self, seed: Option<u64>) {
        self.settle();
        self.state = EpisodeState::Running;
        self.seed = seed;
        self.index += 1;
    }

    /// Count one control tick and resolve the outcome. A ligation on the
    /// limit tick reports `Ligated`. Returns `false` outside `Running`.
    pub fn record_tick(&mut self, reward: f32, ligated: bool, max_ticks: u32) -> bool {
        if !self.state.is_running() {
            return false;
        }
        self.ticks += 1;
        self.total_reward += reward;
        if ligated {
            self.state = EpisodeState::Ligated;
        } else if max_ticks > 0 && self.ticks >= max_ticks {
            self.state = EpisodeState::Truncated;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settling_is_not_counted() {
        let mut ep = Episode::default();
        assert!(!ep.record_tick(1.0, false, 0));
        assert_eq!(ep.ticks, 0);
        assert!(!ep.state.is_finished());
    }

    #[test]
    fn start_bumps_index_and_keeps_seed() {
        let mut ep = Episode::default();
        ep.start(Some(3));
        ep.start(Some(4));
        assert!(ep.state.is_running());
        assert_eq!(ep.seed, Some(4));
        assert_eq!(ep.index, 2);
    }

    #[test]
    fn ticks_accumulate_reward() {
        let mut ep = Episode::default();
        ep.start(None);
        assert!(ep.record_tick(0.5, false, 0));
        assert!(ep.record_tick(0.25, false, 0));
        assert_eq!(ep.ticks, 2);
        assert!((ep.total_reward - 0.75).abs() < f32::EPSILON);
    }

    #[test]
    fn ligation_finishes_the_episode() {
        let mut ep = Episode::default();
        ep.start(None);
        ep.record_tick(1.0, true, 0);
        assert_eq!(ep.state, EpisodeState::Ligated);
        assert!(!ep.record_tick(1.0, false, 0));
        assert_eq!(ep.ticks, 1);
    }

    #[test]
    fn limit_truncates_unless_ligated() {
        let mut ep = Episode::default();
        ep.start(None);
        ep.record_tick(0.0, false, 2);
        assert!(ep.state.is_running());
        ep.record_tick(0.0, false, 2);
        assert_eq!(ep.state, EpisodeState::Truncated);

        ep.start(None);
        ep.record_tick(0.0, false, 1);
        assert_eq!(ep.state, EpisodeState::Truncated);
        ep.start(None);
        ep.record_tick(0.0, true, 1);
        assert_eq!(ep.state, EpisodeState::Ligated);
    }

    #[test]
    fn settle_clears_counters() {
        let mut ep = Episode::default();
        ep.start(None);
        ep.record_tick(2.0, false, 0);
        ep.settle();
        assert_eq!(ep.state, EpisodeState::Settling);
        assert_eq!(ep.ticks, 0);
        assert!(ep.total_reward.abs() < f32::EPSILON);
    }
}
