//! Bit-exact float encoding for JSON payloads.
//!
//! JSON has no NaN or infinity, and `serde_json` writes them as `null`.
//! Finite values stay plain JSON numbers (exact with `float_roundtrip`);
//! non-finite values are written as their IEEE bit pattern in hex, e.g.
//! `"0x7fc00000"` for the canonical `f32` NaN and `"0xff800000"` for
//! negative infinity. Readers accept both forms.

use std::collections::BTreeMap;
use std::fmt;

use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Element wrappers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
struct F32(f32);

#[derive(Debug, Clone, Copy)]
struct F64(f64);

impl Serialize for F32 {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.0.is_finite() {
            serializer.serialize_f32(self.0)
        } else {
            serializer.serialize_str(&format!("{:#010x}", self.0.to_bits()))
        }
    }
}

impl Serialize for F64 {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.0.is_finite() {
            serializer.serialize_f64(self.0)
        } else {
            serializer.serialize_str(&format!("{:#018x}", self.0.to_bits()))
        }
    }
}

fn hex_bits(s: &str) -> Option<u64> {
    let digits = s.strip_prefix("0x")?;
    u64::from_str_radix(digits, 16).ok()
}

struct F32Visitor;

impl Visitor<'_> for F32Visitor {
    type Value = F32;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an f32 number or a hex bit pattern")
    }

    #[allow(clippy::cast_possible_truncation)]
    fn visit_f64<E: de::Error>(self, v: f64) -> Result<F32, E> {
        Ok(F32(v as f32))
    }

    #[allow(clippy::cast_precision_loss)]
    fn visit_u64<E: de::Error>(self, v: u64) -> Result<F32, E> {
        Ok(F32(v as f32))
    }

    #[allow(clippy::cast_precision_loss)]
    fn visit_i64<E: de::Error>(self, v: i64) -> Result<F32, E> {
        Ok(F32(v as f32))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<F32, E> {
        hex_bits(v)
            .and_then(|bits| u32::try_from(bits).ok())
            .map(|bits| F32(f32::from_bits(bits)))
            .ok_or_else(|| E::invalid_value(de::Unexpected::Str(v), &self))
    }
}

struct F64Visitor;

impl Visitor<'_> for F64Visitor {
    type Value = F64;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an f64 number or a hex bit pattern")
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<F64, E> {
        Ok(F64(v))
    }

    #[allow(clippy::cast_precision_loss)]
    fn visit_u64<E: de::Error>(self, v: u64) -> Result<F64, E> {
        Ok(F64(v as f64))
    }

    #[allow(clippy::cast_precision_loss)]
    fn visit_i64<E: de::Error>(self, v: i64) -> Result<F64, E> {
        Ok(F64(v as f64))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<F64, E> {
        hex_bits(v)
            .map(|bits| F64(f64::from_bits(bits)))
            .ok_or_else(|| E::invalid_value(de::Unexpected::Str(v), &self))
    }
}

impl<'de> Deserialize<'de> for F32 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(F32Visitor)
    }
}

impl<'de> Deserialize<'de> for F64 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(F64Visitor)
    }
}

// ---------------------------------------------------------------------------
// serde `with` modules
// ---------------------------------------------------------------------------

/// `#[serde(with = "floats::f32_seq")]` for `Vec<f32>`.
pub mod f32_seq {
    use super::{Deserialize, Deserializer, F32, Serializer};

    #[allow(clippy::ptr_arg)]
    pub fn serialize<S: Serializer>(values: &Vec<f32>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(values.iter().map(|&v| F32(v)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<f32>, D::Error> {
        let values = Vec::<F32>::deserialize(deserializer)?;
        Ok(values.into_iter().map(|F32(v)| v).collect())
    }
}

/// `#[serde(with = "floats::f64_num")]` for `f64`.
pub mod f64_num {
    use super::{Deserialize, Deserializer, F64, Serialize, Serializer};

    #[allow(clippy::trivially_copy_pass_by_ref)]
    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        F64(*value).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        F64::deserialize(deserializer).map(|F64(v)| v)
    }
}

// ---------------------------------------------------------------------------
// serde_json::Value helpers
// ---------------------------------------------------------------------------

/// Encode one `f32` as a JSON value without losing non-finite values.
pub fn f32_to_json(value: f32) -> Value {
    if value.is_finite() {
        Value::from(f64::from(value))
    } else {
        Value::String(format!("{:#010x}", value.to_bits()))
    }
}

/// Inverse of [`f32_to_json`]. `None` if `value` is neither form.
pub fn f32_from_json(value: &Value) -> Option<f32> {
    F32::deserialize(value).ok().map(|F32(v)| v)
}

/// Encode a name → `f32` map with [`f32_to_json`] per entry.
pub fn f32_map_to_json(map: &BTreeMap<String, f32>) -> Value {
    Value::Object(
        map.iter()
            .map(|(key, &value)| (key.clone(), f32_to_json(value)))
            .collect(),
    )
}
