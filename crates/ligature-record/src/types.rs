//! Values stored in trajectory streams and the episode metadata written
//! alongside them.
//!
//! Stream names used by the console:
//! - `observation`, `info`, `terminal_observation` → written by the recorder itself
//! - `rgb`                                          → [`RgbFrameHandler`](crate::handlers::RgbFrameHandler)
//! - `loop_tpsdc_state`, `loop_pose`, `loop_tpsdc_velocity` → [`InstrumentStateHandler`](crate::handlers::InstrumentStateHandler)
//! - `*_tracking_positions`                         → [`DeformableTrackingHandler`](crate::handlers::DeformableTrackingHandler)
//! - `time`                                         → [`TimeHandler`](crate::handlers::TimeHandler)

use std::collections::BTreeMap;

use ligature_core::frame::Frame;
use ligature_core::types::Observation;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Stream names
// ---------------------------------------------------------------------------

pub mod streams {
    pub const OBSERVATION: &str = "observation";
    pub const TERMINAL_OBSERVATION: &str = "terminal_observation";
    pub const INFO: &str = "info";
    pub const RGB: &str = "rgb";
    pub const LOOP_TPSDC_STATE: &str = "loop_tpsdc_state";
    pub const LOOP_POSE: &str = "loop_pose";
    pub const LOOP_TPSDC_VELOCITY: &str = "loop_tpsdc_velocity";
    pub const CAVITY_TRACKING_POSITIONS: &str = "cavity_tracking_positions";
    pub const MARKING_TRACKING_POSITIONS: &str = "marking_tracking_positions";
    pub const LOOP_TRACKING_POSITIONS: &str = "loop_tracking_positions";
    pub const TIME: &str = "time";
}

// ---------------------------------------------------------------------------
// TickPhase
// ---------------------------------------------------------------------------

/// Which environment call produced the current tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TickPhase {
    Reset,
    Step,
}

// ---------------------------------------------------------------------------
// ImageValue
// ---------------------------------------------------------------------------

/// Packed RGB8 image stored in a stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageValue {
    pub width: u32,
    pub height: u32,
    /// Row-major RGB bytes, `width * height * 3` long.
    pub data: Vec<u8>,
}

impl From<Frame> for ImageValue {
    fn from(frame: Frame) -> Self {
        Self {
            width: frame.width(),
            height: frame.height(),
            data: frame.into_data(),
        }
    }
}

// ---------------------------------------------------------------------------
// StreamValue
// ---------------------------------------------------------------------------

/// One per-tick entry of a named stream.
///
/// Float payloads serialize bit-exactly, NaN and infinities included (see
/// [`floats`](crate::floats)).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
#[allow(clippy::derive_partial_eq_without_eq)] // float payloads prevent Eq
pub enum StreamValue {
    Scalar(#[serde(with = "crate::floats::f64_num")] f64),
    Vector(#[serde(with = "crate::floats::f32_seq")] Vec<f32>),
    Image(ImageValue),
    Json(serde_json::Value),
}

impl StreamValue {
    pub fn as_vector(&self) -> Option<&[f32]> {
        match self {
            Self::Vector(v) => Some(v),
            _ => None,
        }
    }

    pub const fn as_scalar(&self) -> Option<f64> {
        match self {
            Self::Scalar(v) => Some(*v),
            _ => None,
        }
    }

    pub const fn as_image(&self) -> Option<&ImageValue> {
        match self {
            Self::Image(img) => Some(img),
            _ => None,
        }
    }
}

impl From<f64> for StreamValue {
    fn from(v: f64) -> Self {
        Self::Scalar(v)
    }
}

impl From<Vec<f32>> for StreamValue {
    fn from(v: Vec<f32>) -> Self {
        Self::Vector(v)
    }
}

impl From<&Observation> for StreamValue {
    fn from(obs: &Observation) -> Self {
        Self::Vector(obs.as_slice().to_vec())
    }
}

impl From<Frame> for StreamValue {
    fn from(frame: Frame) -> Self {
        Self::Image(frame.into())
    }
}

impl From<serde_json::Value> for StreamValue {
    fn from(v: serde_json::Value) -> Self {
        Self::Json(v)
    }
}

// ---------------------------------------------------------------------------
// EpisodeMetadata
// ---------------------------------------------------------------------------

/// Static per-episode facts, fixed at recorder construction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EpisodeMetadata(BTreeMap<String, serde_json::Value>);

impl EpisodeMetadata {
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Builder-style insert. Values that fail to serialize are stored as `null`.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Serialize) {
        let value = serde_json::to_value(value).unwrap_or(serde_json::Value::Null);
        self.0.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.0.get(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &serde_json::Value)> {
        self.0.iter()
    }
}

impl FromIterator<(String, serde_json::Value)> for EpisodeMetadata {
    fn from_iter<I: IntoIterator<Item = (String, serde_json::Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_value_json_is_tagged() {
        let json = serde_json::to_string(&StreamValue::Scalar(0.5)).unwrap();
        assert_eq!(json, r#"{"kind":"scalar","value":0.5}"#);

        let json = serde_json::to_string(&StreamValue::Vector(vec![1.0, 2.5])).unwrap();
        assert_eq!(json, r#"{"kind":"vector","value":[1.0,2.5]}"#);
    }

    #[test]
    fn stream_value_preserves_awkward_floats() {
        let value = StreamValue::Vector(vec![0.1, 1.0 / 3.0, f32::MIN_POSITIVE, -7.25e-12]);
        let json = serde_json::to_vec(&value).unwrap();
        let back: StreamValue = serde_json::from_slice(&json).unwrap();
        assert_eq!(back, value);

        let value = StreamValue::Scalar(1.0 / 30.0);
        let back: StreamValue = serde_json::from_str(&serde_json::to_string(&value).unwrap()).unwrap();
        assert_eq!(back.as_scalar().map(f64::to_bits), Some((1.0_f64 / 30.0).to_bits()));
    }

    #[test]
    fn stream_value_keeps_non_finite_bits() {
        let value = StreamValue::Vector(vec![f32::NAN, f32::NEG_INFINITY, -0.0, 2.0]);
        let json = serde_json::to_string(&value).unwrap();
        assert_eq!(
            json,
            r#"{"kind":"vector","value":["0x7fc00000","0xff800000",-0.0,2.0]}"#
        );
        let back: StreamValue = serde_json::from_str(&json).unwrap();
        let bits: Vec<u32> = back.as_vector().unwrap().iter().map(|v| v.to_bits()).collect();
        assert_eq!(bits, vec![0x7fc0_0000, 0xff80_0000, 0x8000_0000, 2.0_f32.to_bits()]);

        let back: StreamValue =
            serde_json::from_str(&serde_json::to_string(&StreamValue::Scalar(f64::INFINITY)).unwrap())
                .unwrap();
        assert_eq!(back.as_scalar(), Some(f64::INFINITY));
    }

    #[test]
    fn frame_converts_to_image() {
        let mut frame = Frame::new(2, 1);
        frame.put_pixel(1, 0, [9, 8, 7]);
        let value = StreamValue::from(frame);
        let img = value.as_image().unwrap();
        assert_eq!((img.width, img.height), (2, 1));
        assert_eq!(img.data, vec![0, 0, 0, 9, 8, 7]);
    }

    #[test]
    fn accessors_reject_other_kinds() {
        let value = StreamValue::Scalar(1.0);
        assert!(value.as_vector().is_none());
        assert!(value.as_image().is_none());
        assert!(StreamValue::Vector(vec![]).as_scalar().is_none());
    }

    #[test]
    fn metadata_builder() {
        let meta = EpisodeMetadata::new()
            .with("frame_skip", 1)
            .with("user_info", Option::<String>::None)
            .with("observation_type", "STATE");
        assert_eq!(meta.len(), 3);
        assert_eq!(meta.get("frame_skip"), Some(&serde_json::json!(1)));
        assert_eq!(meta.get("user_info"), Some(&serde_json::Value::Null));
        assert_eq!(meta.get("observation_type"), Some(&serde_json::json!("STATE")));
    }
}
