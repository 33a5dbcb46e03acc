//! Scene systems, run in `Update` once per physics substep.
//!
//! Kinematics and tissue deformation run on every substep; reward features
//! and episode bookkeeping only on the last substep of a tick.

use bevy::prelude::*;
use ligature_core::config::SceneConfig;

use crate::episode::Episode;
use crate::resources::{
    CAVITY_RADIUS, CLOSED_THRESHOLD, Cavity, LoopInstrument, PendingAction, RewardTerms, Substep,
};

/// Vertical distance over which a closing loop squeezes the tissue.
const CONSTRICTION_FALLOFF: f32 = 4.0;
/// Rate (1/s) at which tissue points approach their target position.
const TISSUE_RELAX_RATE: f32 = 10.0;
/// Overlap with the marking band required for a successful ligation.
const SUCCESS_OVERLAP: f32 = 0.5;

/// Run condition: the current update is the last substep of the tick.
#[allow(clippy::needless_pass_by_value)]
pub fn on_last_substep(substep: Res<Substep>) -> bool {
    substep.is_last()
}

/// Integrate the pending action into the loop joint state.
#[allow(clippy::needless_pass_by_value)]
pub fn apply_action_system(
    config: Res<SceneConfig>,
    action: Res<PendingAction>,
    mut instrument: ResMut<LoopInstrument>,
) {
    #[allow(clippy::cast_possible_truncation)]
    let dt = config.time_step as f32;
    instrument.integrate(&action.0, dt);
}

/// Pull cavity points towards the loop when it closes around the tissue,
/// and let them relax back otherwise.
#[allow(clippy::needless_pass_by_value)]
pub fn deform_cavity_system(
    config: Res<SceneConfig>,
    instrument: Res<LoopInstrument>,
    mut cavity: ResMut<Cavity>,
) {
    #[allow(clippy::cast_possible_truncation)]
    let blend = (TISSUE_RELAX_RATE * config.time_step as f32).min(1.0);
    let center = instrument.center();
    let squeeze = if !config.stiff_loop && cavity.contains(center) {
        (CAVITY_RADIUS - instrument.radius()).max(0.0)
    } else {
        0.0
    };

    let Cavity { rest, current, .. } = &mut *cavity;
    for (rest, current) in rest.iter().zip(current.iter_mut()) {
        let weight = (1.0 - (rest.z - center.z).abs() / CONSTRICTION_FALLOFF).max(0.0);
        let radial = weight.mul_add(-squeeze, CAVITY_RADIUS);
        let target = (rest.truncate().normalize_or_zero() * radial).extend(rest.z);
        *current = current.lerp(target, blend);
    }
}

/// Compute reward features for the tick and their weighted sum.
#[allow(clippy::needless_pass_by_value)]
pub fn reward_system(
    config: Res<SceneConfig>,
    instrument: Res<LoopInstrument>,
    cavity: Res<Cavity>,
    episode: Res<Episode>,
    mut terms: ResMut<RewardTerms>,
) {
    if !episode.state.is_running() {
        return;
    }

    let center = instrument.center();
    let distance = center.distance(cavity.marking_center());
    let delta_distance = terms.previous_distance.map_or(0.0, |prev| distance - prev);
    let in_cavity = cavity.contains(center);
    let overlap = if in_cavity {
        cavity.marking_overlap(center.z)
    } else {
        0.0
    };
    let closed = instrument.closure() >= CLOSED_THRESHOLD;
    let closed_around_marking = closed && overlap > 0.0;
    let success = closed_around_marking && overlap >= SUCCESS_OVERLAP;
    let not_in_cavity = !config.disable_in_cavity_checks && !in_cavity;

    let features = [
        ("distance_loop_to_marking_center", distance),
        ("delta_distance_loop_to_marking_center", delta_distance),
        ("loop_center_in_cavity", flag(in_cavity)),
        ("instrument_not_in_cavity", flag(not_in_cavity)),
        ("loop_marking_overlap", overlap),
        ("loop_closed_around_marking", flag(closed_around_marking)),
        ("loop_closed_in_thin_air", flag(closed && !in_cavity)),
        ("successful_task", flag(success)),
    ];

    terms.features.clear();
    terms.reward = 0.0;
    for (name, value) in features {
        let weight = config.reward_amount_dict.get(name).copied().unwrap_or(0.0);
        terms.reward += weight * value;
        terms.features.insert(name.to_string(), value);
    }
    terms.success = success;
    terms.previous_distance = Some(distance);
}

/// Count the tick and settle the episode outcome.
#[allow(clippy::needless_pass_by_value)]
pub fn episode_step_system(
    config: Res<SceneConfig>,
    terms: Res<RewardTerms>,
    mut episode: ResMut<Episode>,
) {
    episode.record_tick(terms.reward, terms.success, config.max_episode_steps);
}

const fn flag(value: bool) -> f32 {
    if value { 1.0 } else { 0.0 }
}
