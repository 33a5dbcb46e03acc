//! Scene resources: the loop instrument, the cavity tissue, and per-tick
//! bookkeeping shared between the systems.

use std::collections::BTreeMap;
use std::f32::consts::TAU;

use bevy::prelude::*;

// ---------------------------------------------------------------------------
// Scene geometry
// ---------------------------------------------------------------------------

/// Remote centre of motion the loop shaft pivots around.
pub const RCM: Vec3 = Vec3::new(0.0, 0.0, 110.0);
/// Distance from the RCM to the loop centre at zero depth.
pub const SHAFT_OFFSET: f32 = 20.0;
pub const CAVITY_RADIUS: f32 = 12.0;
pub const CAVITY_HEIGHT: f32 = 60.0;
pub const CAVITY_RINGS: usize = 31;
pub const POINTS_PER_RING: usize = 24;
/// Default marking height when the position is not randomised.
pub const DEFAULT_MARKING_HEIGHT: f32 = 35.0;
/// Range of marking heights sampled when randomising.
pub const MARKING_HEIGHT_RANGE: (f32, f32) = (20.0, 45.0);
/// Half the vertical extent of the loop band used for overlap checks.
pub const LOOP_HALF_HEIGHT: f32 = 2.0;
/// Closure above which the loop counts as closed.
pub const CLOSED_THRESHOLD: f32 = 0.8;

const TRACK_EVERY_RING: usize = 5;
const TRACK_EVERY_POINT: usize = 6;
const TRACK_EVERY_ROPE_POINT: usize = 6;

// ---------------------------------------------------------------------------
// LoopInstrument
// ---------------------------------------------------------------------------

/// Articulated ligating loop: tilt, pan, spin (degrees), depth (mm) and
/// closure (0 = open, 1 = fully closed).
#[derive(Resource, Clone, Debug, PartialEq)]
pub struct LoopInstrument {
    pub state: [f32; 5],
    pub loop_radius: f32,
    pub num_rope_points: usize,
}

impl LoopInstrument {
    /// Lower and upper joint limits.
    pub const LIMITS: [(f32, f32); 5] = [
        (-60.0, 60.0),
        (-60.0, 60.0),
        (-180.0, 180.0),
        (0.0, 100.0),
        (0.0, 1.0),
    ];
    /// Joint velocity at full action magnitude, per second.
    pub const RATES: [f32; 5] = [15.0, 15.0, 30.0, 20.0, 0.5];
    /// Joint state at the start of every episode.
    pub const INITIAL_STATE: [f32; 5] = [0.0, 0.0, 0.0, 10.0, 0.0];

    pub const fn new(loop_radius: f32, num_rope_points: usize) -> Self {
        Self {
            state: Self::INITIAL_STATE,
            loop_radius,
            num_rope_points,
        }
    }

    /// Integrate joint velocities `action * RATES` over `dt` seconds,
    /// clamped to the joint limits.
    pub fn integrate(&mut self, action: &[f32], dt: f32) {
        for (i, value) in self.state.iter_mut().enumerate() {
            let command = action.get(i).copied().unwrap_or(0.0).clamp(-1.0, 1.0);
            let (lo, hi) = Self::LIMITS[i];
            *value = (*value + command * Self::RATES[i] * dt).clamp(lo, hi);
        }
    }

    pub fn orientation(&self) -> Quat {
        let [tilt, pan, spin, _, _] = self.state;
        Quat::from_euler(
            EulerRot::YXZ,
            pan.to_radians(),
            tilt.to_radians(),
            spin.to_radians(),
        )
    }

    /// Unit vector along the shaft, pointing into the patient.
    pub fn shaft_direction(&self) -> Vec3 {
        self.orientation() * Vec3::NEG_Z
    }

    pub fn center(&self) -> Vec3 {
        RCM + self.shaft_direction() * (SHAFT_OFFSET + self.state[3])
    }

    pub const fn closure(&self) -> f32 {
        self.state[4]
    }

    /// Current loop radius; closing shrinks the loop to 15% of its open size.
    pub fn radius(&self) -> f32 {
        self.loop_radius * 0.15f32.mul_add(self.closure(), 1.0 - self.closure())
    }

    /// Rope point positions, evenly spaced around the loop.
    pub fn positions(&self) -> Vec<Vec3> {
        let q = self.orientation();
        let (u, v) = (q * Vec3::X, q * Vec3::Y);
        let center = self.center();
        let radius = self.radius();
        #[allow(clippy::cast_precision_loss)]
        let n = self.num_rope_points as f32;
        (0..self.num_rope_points)
            .map(|i| {
                #[allow(clippy::cast_precision_loss)]
                let theta = TAU * i as f32 / n;
                center + radius * (theta.cos() * u + theta.sin() * v)
            })
            .collect()
    }

    /// Position followed by quaternion (x, y, z, w).
    pub fn pose(&self) -> [f32; 7] {
        let c = self.center();
        let q = self.orientation();
        [c.x, c.y, c.z, q.x, q.y, q.z, q.w]
    }

    /// Rope point indices that are tracked.
    pub fn tracking_indices(&self) -> Vec<usize> {
        (0..self.num_rope_points)
            .step_by(TRACK_EVERY_ROPE_POINT)
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Cavity
// ---------------------------------------------------------------------------

/// Cylindrical tissue cavity with a coloured marking band.
#[derive(Resource, Clone, Debug)]
pub struct Cavity {
    /// Undeformed point positions, ring by ring from the bottom.
    pub rest: Vec<Vec3>,
    /// Current (possibly constricted) positions.
    pub current: Vec<Vec3>,
    pub marking_height: f32,
    pub band_width: f32,
    pub marking_indices: Vec<usize>,
    pub marking_tracking_indices: Vec<usize>,
    pub cavity_tracking_indices: Vec<usize>,
}

impl Cavity {
    pub fn new(marking_height: f32, band_width: f32) -> Self {
        let mut rest = Vec::with_capacity(CAVITY_RINGS * POINTS_PER_RING);
        for ring in 0..CAVITY_RINGS {
            #[allow(clippy::cast_precision_loss)]
            let z = CAVITY_HEIGHT * ring as f32 / (CAVITY_RINGS - 1) as f32;
            for k in 0..POINTS_PER_RING {
                #[allow(clippy::cast_precision_loss)]
                let theta = TAU * k as f32 / POINTS_PER_RING as f32;
                rest.push(Vec3::new(
                    CAVITY_RADIUS * theta.cos(),
                    CAVITY_RADIUS * theta.sin(),
                    z,
                ));
            }
        }

        let half = band_width / 2.0;
        let marking_indices: Vec<usize> = rest
            .iter()
            .enumerate()
            .filter(|(_, p)| (p.z - marking_height).abs() <= half)
            .map(|(i, _)| i)
            .collect();
        let marking_tracking_indices = marking_indices
            .iter()
            .copied()
            .filter(|i| (i % POINTS_PER_RING) % TRACK_EVERY_POINT == 0)
            .collect();
        let cavity_tracking_indices = (0..rest.len())
            .filter(|i| {
                (i / POINTS_PER_RING) % TRACK_EVERY_RING == 0
                    && (i % POINTS_PER_RING) % TRACK_EVERY_POINT == 0
            })
            .collect();

        Self {
            current: rest.clone(),
            rest,
            marking_height,
            band_width,
            marking_indices,
            marking_tracking_indices,
            cavity_tracking_indices,
        }
    }

    pub const fn marking_center(&self) -> Vec3 {
        Vec3::new(0.0, 0.0, self.marking_height)
    }

    /// Whether `p` lies inside the cavity volume.
    pub fn contains(&self, p: Vec3) -> bool {
        p.truncate().length() < CAVITY_RADIUS && (0.0..=CAVITY_HEIGHT).contains(&p.z)
    }

    /// Fraction of the loop band `[z - h, z + h]` overlapping the marking band.
    pub fn marking_overlap(&self, loop_z: f32) -> f32 {
        let half = self.band_width / 2.0;
        let lo = (loop_z - LOOP_HALF_HEIGHT).max(self.marking_height - half);
        let hi = (loop_z + LOOP_HALF_HEIGHT).min(self.marking_height + half);
        ((hi - lo) / (2.0 * LOOP_HALF_HEIGHT)).clamp(0.0, 1.0)
    }
}

// ---------------------------------------------------------------------------
// Per-tick bookkeeping
// ---------------------------------------------------------------------------

/// Action to apply during the current tick.
#[derive(Resource, Clone, Debug, Default)]
pub struct PendingAction(pub Vec<f32>);

/// Which physics substep of the current tick is running.
#[derive(Resource, Clone, Copy, Debug)]
pub struct Substep {
    pub index: u32,
    pub count: u32,
}

impl Default for Substep {
    fn default() -> Self {
        Self { index: 0, count: 1 }
    }
}

impl Substep {
    pub const fn is_last(&self) -> bool {
        self.index + 1 >= self.count
    }
}

/// Reward features computed at the end of each tick.
#[derive(Resource, Clone, Debug, Default)]
pub struct RewardTerms {
    /// Unweighted feature values by name.
    pub features: BTreeMap<String, f32>,
    /// Weighted sum of features for the last tick.
    pub reward: f32,
    pub success: bool,
    pub previous_distance: Option<f32>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
