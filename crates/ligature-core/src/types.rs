use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

// ---------------------------------------------------------------------------
// Observation
// ---------------------------------------------------------------------------

/// Flat f32 vector representing environment state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    data: Vec<f32>,
}

impl Observation {
    pub const fn new(data: Vec<f32>) -> Self {
        Self { data }
    }

    pub fn zeros(len: usize) -> Self {
        Self {
            data: vec![0.0; len],
        }
    }

    pub const fn len(&self) -> usize {
        self.data.len()
    }

    pub const fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }
}

impl From<Vec<f32>> for Observation {
    fn from(data: Vec<f32>) -> Self {
        Self::new(data)
    }
}

// ---------------------------------------------------------------------------
// Action
// ---------------------------------------------------------------------------

/// Control command sent to the environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Action {
    /// Continuous control values (normalized to [-1, 1]).
    Continuous(Vec<f32>),
}

impl Action {
    pub const fn new(data: Vec<f32>) -> Self {
        Self::Continuous(data)
    }

    /// Continuous action filled with zeros.
    pub fn zeros(len: usize) -> Self {
        Self::Continuous(vec![0.0; len])
    }

    /// Number of scalar elements.
    pub const fn len(&self) -> usize {
        match self {
            Self::Continuous(v) => v.len(),
        }
    }

    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_slice(&self) -> &[f32] {
        match self {
            Self::Continuous(v) => v.as_slice(),
        }
    }

    /// Validate action data (no NaN, no Inf).
    pub fn validate(&self) -> Result<(), ValidationError> {
        for val in self.as_slice() {
            if val.is_nan() {
                return Err(ValidationError::ActionContainsNan);
            }
            if val.is_infinite() {
                return Err(ValidationError::ActionContainsInf);
            }
        }
        Ok(())
    }

    /// Validate data and check the dimension against `expected`.
    pub fn validate_dim(&self, expected: usize) -> Result<(), ValidationError> {
        if self.len() != expected {
            return Err(ValidationError::ActionDimMismatch {
                expected,
                got: self.len(),
            });
        }
        self.validate()
    }
}

impl From<Vec<f32>> for Action {
    fn from(data: Vec<f32>) -> Self {
        Self::Continuous(data)
    }
}

// ---------------------------------------------------------------------------
// StepResult / ResetResult
// ---------------------------------------------------------------------------

/// Result of `env.step(action)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    pub observation: Observation,
    pub reward: f32,
    /// Episode ended due to task success/failure.
    pub terminated: bool,
    /// Episode ended due to time limit.
    pub truncated: bool,
    pub info: StepInfo,
}

impl StepResult {
    /// Whether this step ended the episode.
    pub const fn is_done(&self) -> bool {
        self.terminated || self.truncated
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepInfo {
    pub episode_length: u32,
    pub episode_reward: f32,
    /// Per-term reward features and task diagnostics.
    pub custom: BTreeMap<String, f32>,
}

/// Result of `env.reset()`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResetResult {
    pub observation: Observation,
    pub info: ResetInfo,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResetInfo {
    pub seed: Option<u64>,
    pub custom: BTreeMap<String, f32>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
