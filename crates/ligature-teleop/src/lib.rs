//! Operator input for the ligating-loop console.
//!
//! - [`Controller`]: polled input device (axes and buttons)
//! - [`ActionMapping`]: deterministic map from a controller snapshot to the
//!   five-element instrument action
//! - `GilrsController`: physical gamepad backend (feature `gamepad`)

pub mod controller;
pub mod error;
#[cfg(feature = "gamepad")]
pub mod gamepad;
pub mod mapping;

pub use controller::{Controller, ControllerState, SETTLE_DELAY, acquire};
pub use error::TeleopError;
#[cfg(feature = "gamepad")]
pub use gamepad::GilrsController;
pub use mapping::{ACTION_DIM, ActionMapping, AxisMapping};

/// Open the platform gamepad and wait for it to report.
#[cfg(feature = "gamepad")]
pub fn open_gamepad() -> Result<Box<dyn Controller>, TeleopError> {
    let pad = acquire(GilrsController::new()?, SETTLE_DELAY)?;
    Ok(Box::new(pad))
}

/// Open the platform gamepad and wait for it to report.
#[cfg(not(feature = "gamepad"))]
pub fn open_gamepad() -> Result<Box<dyn Controller>, TeleopError> {
    Err(TeleopError::Unsupported("gamepad"))
}

pub mod prelude {
    pub use crate::{
        ActionMapping, AxisMapping, Controller, ControllerState, TeleopError, open_gamepad,
    };
}
