use std::collections::BTreeMap;
use std::fmt;

use bevy::prelude::Resource;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

// ---------------------------------------------------------------------------
// Serde default functions
// ---------------------------------------------------------------------------

const fn default_time_step() -> f64 {
    1.0 / 30.0
}
const fn default_frame_skip() -> u32 {
    1
}
const fn default_image_shape() -> [u32; 2] {
    [1024, 1024]
}
const fn default_settle_steps() -> u32 {
    50
}
const fn default_band_width() -> f32 {
    8.0
}
const fn default_true() -> bool {
    true
}
const fn default_num_rope_points() -> usize {
    60
}
const fn default_loop_radius() -> f32 {
    20.0
}
fn default_reward_amount_dict() -> BTreeMap<String, f32> {
    [
        ("distance_loop_to_marking_center", -0.05),
        ("delta_distance_loop_to_marking_center", -100.0),
        ("loop_center_in_cavity", 0.01),
        ("instrument_not_in_cavity", -0.0),
        ("loop_marking_overlap", 0.8),
        ("loop_closed_around_marking", 0.5),
        ("loop_closed_in_thin_air", -0.1),
        ("successful_task", 100.0),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect()
}

// ---------------------------------------------------------------------------
// ObservationType
// ---------------------------------------------------------------------------

/// Layout of the observation vector returned by the scene.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ObservationType {
    /// Instrument state, pose and marking centre.
    #[default]
    State,
    /// Rendered RGB image, flattened and scaled to [0, 1].
    Rgb,
}

impl ObservationType {
    /// Upper-case name as written into trajectory metadata.
    pub const fn name(self) -> &'static str {
        match self {
            Self::State => "STATE",
            Self::Rgb => "RGB",
        }
    }
}

impl fmt::Display for ObservationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// SceneConfig
// ---------------------------------------------------------------------------

/// Ligating-loop scene configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Resource)]
pub struct SceneConfig {
    /// Physics timestep in seconds (default: 1/30).
    #[serde(default = "default_time_step")]
    pub time_step: f64,

    /// Physics steps per control tick (default: 1).
    #[serde(default = "default_frame_skip")]
    pub frame_skip: u32,

    /// Render resolution [width, height] (default: [1024, 1024]).
    #[serde(default = "default_image_shape")]
    pub image_shape: [u32; 2],

    #[serde(default)]
    pub observation_type: ObservationType,

    /// Zero-action updates run after every reset so the tissue settles.
    #[serde(default = "default_settle_steps")]
    pub settle_steps: u32,

    /// Sample a new marking height on every reset.
    #[serde(default)]
    pub randomize_marking_position: bool,

    /// Height of the marking band on the cavity.
    #[serde(default = "default_band_width")]
    pub band_width: f32,

    /// Skip the instrument-in-cavity penalty terms.
    #[serde(default = "default_true")]
    pub disable_in_cavity_checks: bool,

    /// A stiff loop does not constrict tissue when closing.
    #[serde(default)]
    pub stiff_loop: bool,

    #[serde(default = "default_num_rope_points")]
    pub num_rope_points: usize,

    /// Radius of the fully open loop.
    #[serde(default = "default_loop_radius")]
    pub loop_radius: f32,

    /// Maximum ticks before truncation. `0` means no limit.
    #[serde(default)]
    pub max_episode_steps: u32,

    #[serde(default = "default_reward_amount_dict")]
    pub reward_amount_dict: BTreeMap<String, f32>,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            time_step: default_time_step(),
            frame_skip: default_frame_skip(),
            image_shape: default_image_shape(),
            observation_type: ObservationType::default(),
            settle_steps: default_settle_steps(),
            randomize_marking_position: false,
            band_width: default_band_width(),
            disable_in_cavity_checks: true,
            stiff_loop: false,
            num_rope_points: default_num_rope_points(),
            loop_radius: default_loop_radius(),
            max_episode_steps: 0,
            reward_amount_dict: default_reward_amount_dict(),
        }
    }
}

impl SceneConfig {
    /// Validate configuration. Returns Err on invalid values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.time_step > 0.0) {
            return Err(ConfigError::InvalidTimeStep(self.time_step));
        }
        if self.frame_skip == 0 {
            return Err(ConfigError::ZeroFrameSkip);
        }
        if self.image_shape.contains(&0) {
            return Err(invalid("image_shape", "width and height must be > 0"));
        }
        if self.num_rope_points < 3 {
            return Err(invalid("num_rope_points", "must be >= 3"));
        }
        if !(self.loop_radius > 0.0) {
            return Err(invalid("loop_radius", "must be > 0"));
        }
        if !(self.band_width > 0.0) {
            return Err(invalid("band_width", "must be > 0"));
        }
        Ok(())
    }

    /// Duration of one control tick in seconds.
    pub fn tick_secs(&self) -> f64 {
        self.time_step * f64::from(self.frame_skip)
    }

    /// Control rate in Hz.
    pub fn control_hz(&self) -> f64 {
        1.0 / self.tick_secs()
    }
}

fn invalid(field: &str, message: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.into(),
        message: message.into(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn default_config_is_valid() {
        assert!(SceneConfig::default().validate().is_ok());
    }

    #[test]
    fn control_rate_from_defaults() {
        let config = SceneConfig::default();
        assert_relative_eq!(config.control_hz(), 30.0, epsilon = 1e-9);
    }

    #[test]
    fn frame_skip_scales_tick() {
        let config = SceneConfig {
            frame_skip: 3,
            ..SceneConfig::default()
        };
        assert_relative_eq!(config.tick_secs(), 0.1, epsilon = 1e-12);
    }

    #[test]
    fn rejects_bad_time_step() {
        let config = SceneConfig {
            time_step: 0.0,
            ..SceneConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidTimeStep(_))
        ));

        let config = SceneConfig {
            time_step: f64::NAN,
            ..SceneConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_zero_frame_skip() {
        let config = SceneConfig {
            frame_skip: 0,
            ..SceneConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::ZeroFrameSkip)));
    }

    #[test]
    fn rejects_degenerate_loop() {
        let config = SceneConfig {
            num_rope_points: 2,
            ..SceneConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "num_rope_points"
        ));
    }

    #[test]
    fn serde_defaults_fill_missing_fields() {
        let config: SceneConfig = serde_json::from_str(r#"{"frame_skip": 2}"#).unwrap();
        assert_eq!(config.frame_skip, 2);
        assert_eq!(config.image_shape, [1024, 1024]);
        assert_eq!(config.observation_type, ObservationType::State);
        assert!(config.reward_amount_dict.contains_key("successful_task"));
    }

    #[test]
    fn observation_type_names() {
        assert_eq!(ObservationType::State.name(), "STATE");
        assert_eq!(ObservationType::Rgb.to_string(), "RGB");
    }
}
