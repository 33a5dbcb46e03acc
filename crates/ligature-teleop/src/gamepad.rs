//! Physical gamepad backend on top of `gilrs`.

use gilrs::{Axis, Button, GamepadId, Gilrs};
use tracing::{debug, warn};

use crate::controller::{Controller, ControllerState};
use crate::error::TeleopError;

/// The first connected gamepad, read through `gilrs`.
pub struct GilrsController {
    gilrs: Gilrs,
    active: Option<GamepadId>,
}

impl GilrsController {
    pub fn new() -> Result<Self, TeleopError> {
        let gilrs = Gilrs::new().map_err(|e| TeleopError::Backend(e.to_string()))?;
        let active = gilrs.gamepads().find(|(_, pad)| pad.is_connected()).map(|(id, pad)| {
            debug!(name = pad.name(), "using gamepad");
            id
        });
        Ok(Self { gilrs, active })
    }

    fn pump(&mut self) {
        while let Some(event) = self.gilrs.next_event() {
            if self.active.is_none() {
                self.active = Some(event.id);
            }
        }
        if let Some(id) = self.active {
            if !self.gilrs.gamepad(id).is_connected() {
                warn!("active gamepad disconnected");
                self.active = None;
            }
        }
    }
}

impl Controller for GilrsController {
    fn is_alive(&self) -> bool {
        self.active
            .is_some_and(|id| self.gilrs.gamepad(id).is_connected())
    }

    fn read(&mut self) -> Result<ControllerState, TeleopError> {
        self.pump();
        let id = self.active.ok_or(TeleopError::Disconnected)?;
        let pad = self.gilrs.gamepad(id);
        let trigger = |button| pad.button_data(button).map_or(0.0, |d| d.value());
        Ok(ControllerState {
            lx: pad.value(Axis::LeftStickX),
            ly: pad.value(Axis::LeftStickY),
            rx: pad.value(Axis::RightStickX),
            ry: pad.value(Axis::RightStickY),
            lt: trigger(Button::LeftTrigger2),
            rt: trigger(Button::RightTrigger2),
            a: pad.is_pressed(Button::South),
            b: pad.is_pressed(Button::East),
            x: pad.is_pressed(Button::West),
            y: pad.is_pressed(Button::North),
        })
    }
}
