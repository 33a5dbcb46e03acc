//! Controller-to-action mapping.
//!
//! | Action index | Source                     | Instrument DOF |
//! |--------------|----------------------------|----------------|
//! | 0            | right stick X              | tilt           |
//! | 1            | right stick Y              | pan            |
//! | 2            | left stick X               | spin           |
//! | 3            | right trigger − left trigger | depth        |
//! | 4            | A − B                      | loop closure   |
//!
//! The X button aborts the session.

use ligature_core::types::Action;

/// Length of the action vector produced by [`ActionMapping::map`].
pub const ACTION_DIM: usize = 5;

// ---------------------------------------------------------------------------
// AxisMapping
// ---------------------------------------------------------------------------

/// Scale and dead zone for one action channel.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AxisMapping {
    /// Scale factor applied to the raw input value.
    pub scale: f32,
    /// Values below this threshold are treated as zero.
    pub dead_zone: f32,
}

impl AxisMapping {
    /// Create a mapping with scale 1.0 and no dead zone.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            scale: 1.0,
            dead_zone: 0.0,
        }
    }

    #[must_use]
    pub const fn with_scale(mut self, scale: f32) -> Self {
        self.scale = scale;
        self
    }

    #[must_use]
    pub const fn with_dead_zone(mut self, dead_zone: f32) -> Self {
        self.dead_zone = dead_zone;
        self
    }

    /// Apply dead zone and scaling to a raw input value.
    #[must_use]
    pub fn apply(&self, raw: f32) -> f32 {
        if raw.abs() < self.dead_zone {
            0.0
        } else {
            raw * self.scale
        }
    }
}

impl Default for AxisMapping {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// ActionMapping
// ---------------------------------------------------------------------------

/// Deterministic map from a [`ControllerState`](crate::ControllerState) to an [`Action`].
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ActionMapping {
    pub channels: [AxisMapping; ACTION_DIM],
}

impl ActionMapping {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            channels: [AxisMapping::new(); ACTION_DIM],
        }
    }

    /// Apply the same dead zone to the four analog channels. The button
    /// channel is digital and left untouched.
    #[must_use]
    pub const fn with_stick_dead_zone(mut self, dead_zone: f32) -> Self {
        let mut i = 0;
        while i < 4 {
            self.channels[i].dead_zone = dead_zone;
            i += 1;
        }
        self
    }

    /// Replace the mapping of one action channel.
    ///
    /// Panics if `index` is not below [`ACTION_DIM`].
    #[must_use]
    pub const fn with_channel(mut self, index: usize, mapping: AxisMapping) -> Self {
        assert!(index < ACTION_DIM, "action channel out of range");
        self.channels[index] = mapping;
        self
    }

    /// Raw per-channel inputs before scaling.
    pub fn raw(state: &crate::ControllerState) -> [f32; ACTION_DIM] {
        [
            state.rx,
            state.ry,
            state.lx,
            state.rt - state.lt,
            f32::from(u8::from(state.a)) - f32::from(u8::from(state.b)),
        ]
    }

    /// Map one controller snapshot to an action.
    #[must_use]
    pub fn map(&self, state: &crate::ControllerState) -> Action {
        let raw = Self::raw(state);
        let values = raw
            .iter()
            .zip(&self.channels)
            .map(|(&r, m)| m.apply(r))
            .collect();
        Action::Continuous(values)
    }

    /// Whether the snapshot requests the session to stop.
    #[must_use]
    pub const fn abort_requested(state: &crate::ControllerState) -> bool {
        state.x
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ControllerState;

    #[test]
    fn axis_mapping_default_scale() {
        let mapping = AxisMapping::new();
        assert!((mapping.scale - 1.0).abs() < f32::EPSILON);
        assert!(mapping.dead_zone.abs() < f32::EPSILON);
    }

    #[test]
    fn axis_mapping_apply_with_dead_zone() {
        let mapping = AxisMapping::new().with_dead_zone(0.1).with_scale(2.0);
        assert!(mapping.apply(0.05).abs() < f32::EPSILON);
        assert!((mapping.apply(-0.5) + 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn maps_sticks_triggers_and_buttons() {
        let state = ControllerState {
            lx: 0.25,
            ly: 0.9,
            rx: -0.5,
            ry: 0.75,
            lt: 0.2,
            rt: 0.6,
            a: true,
            b: false,
            ..ControllerState::default()
        };
        let action = ActionMapping::new().map(&state);
        let values = action.as_slice();
        assert_eq!(values.len(), ACTION_DIM);
        assert!((values[0] + 0.5).abs() < 1e-6);
        assert!((values[1] - 0.75).abs() < 1e-6);
        assert!((values[2] - 0.25).abs() < 1e-6);
        assert!((values[3] - 0.4).abs() < 1e-6);
        assert!((values[4] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn opposing_buttons_cancel() {
        let state = ControllerState {
            a: true,
            b: true,
            ..ControllerState::default()
        };
        assert!(ActionMapping::new().map(&state).as_slice()[4].abs() < f32::EPSILON);

        let state = ControllerState {
            b: true,
            ..ControllerState::default()
        };
        assert!((ActionMapping::new().map(&state).as_slice()[4] + 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn idle_controller_maps_to_zero_action() {
        let action = ActionMapping::new().map(&ControllerState::default());
        assert_eq!(action, Action::zeros(ACTION_DIM));
    }

    #[test]
    fn stick_dead_zone_skips_button_channel() {
        let mapping = ActionMapping::new().with_stick_dead_zone(0.2);
        let state = ControllerState {
            rx: 0.1,
            ry: 0.3,
            a: true,
            ..ControllerState::default()
        };
        let values = mapping.map(&state);
        assert!(values.as_slice()[0].abs() < f32::EPSILON);
        assert!((values.as_slice()[1] - 0.3).abs() < 1e-6);
        assert!((values.as_slice()[4] - 1.0).abs() < f32::EPSILON);
        assert!(mapping.channels[4].dead_zone.abs() < f32::EPSILON);
    }

    #[test]
    fn with_channel_replaces_one_channel() {
        let mapping = ActionMapping::new().with_channel(3, AxisMapping::new().with_scale(0.5));
        let state = ControllerState {
            rt: 1.0,
            rx: 1.0,
            ..ControllerState::default()
        };
        let values = mapping.map(&state);
        assert!((values.as_slice()[3] - 0.5).abs() < f32::EPSILON);
        assert!((values.as_slice()[0] - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    #[should_panic(expected = "action channel out of range")]
    fn with_channel_rejects_out_of_range_index() {
        let _ = ActionMapping::new().with_channel(ACTION_DIM, AxisMapping::new());
    }

    #[test]
    fn x_button_aborts() {
        assert!(!ActionMapping::abort_requested(&ControllerState::default()));
        assert!(ActionMapping::abort_requested(&ControllerState {
            x: true,
            ..ControllerState::default()
        }));
    }
}
