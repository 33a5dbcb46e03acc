//! Controller abstraction polled once per control tick.

use std::thread;
use std::time::Duration;

use tracing::{debug, info};

use crate::error::TeleopError;

/// Delay between opening a controller and the first liveness check.
pub const SETTLE_DELAY: Duration = Duration::from_millis(100);

// ---------------------------------------------------------------------------
// ControllerState
// ---------------------------------------------------------------------------

/// One snapshot of the controller.
///
/// Stick axes are in `[-1, 1]`, trigger axes in `[0, 1]`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[allow(clippy::struct_excessive_bools)]
pub struct ControllerState {
    pub lx: f32,
    pub ly: f32,
    pub rx: f32,
    pub ry: f32,
    pub lt: f32,
    pub rt: f32,
    pub a: bool,
    pub b: bool,
    pub x: bool,
    pub y: bool,
}

impl ControllerState {
    /// The six axes in `lx, ly, rx, ry, lt, rt` order.
    pub const fn axes(&self) -> [f32; 6] {
        [self.lx, self.ly, self.rx, self.ry, self.lt, self.rt]
    }
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

/// A polled input device.
pub trait Controller {
    /// Whether the device is connected and reporting.
    fn is_alive(&self) -> bool;

    /// Read the current axes and buttons without blocking.
    fn read(&mut self) -> Result<ControllerState, TeleopError>;
}

impl<C: Controller + ?Sized> Controller for Box<C> {
    fn is_alive(&self) -> bool {
        (**self).is_alive()
    }

    fn read(&mut self) -> Result<ControllerState, TeleopError> {
        (**self).read()
    }
}

/// Wait `settle` for the device to come up, then require it to be alive.
pub fn acquire<C: Controller>(mut controller: C, settle: Duration) -> Result<C, TeleopError> {
    thread::sleep(settle);
    // One read pumps pending connection events on backends that need it.
    let first_read = controller.read();
    if let Err(err) = &first_read {
        debug!(error = %err, "start-up controller read failed");
    }
    if controller.is_alive() {
        info!("controller connected");
        return Ok(controller);
    }
    let message = match first_read {
        Err(err) => format!("controller did not report after start-up ({err})"),
        Ok(_) => "controller did not report after start-up".to_string(),
    };
    Err(TeleopError::NotFound(message))
}
