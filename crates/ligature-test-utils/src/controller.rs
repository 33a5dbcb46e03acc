//! Controller that replays a fixed script of snapshots.

use ligature_teleop::{Controller, ControllerState, TeleopError};

/// Replays `script` one snapshot per `read`; idle afterwards.
#[derive(Debug, Clone, Default)]
pub struct ScriptedController {
    script: Vec<ControllerState>,
    reads: usize,
    alive: bool,
    fail_at: Option<usize>,
}

impl ScriptedController {
    pub const fn new(script: Vec<ControllerState>) -> Self {
        Self {
            script,
            reads: 0,
            alive: true,
            fail_at: None,
        }
    }

    /// Idle input with the abort button pressed on read number `tick` (1-based).
    pub fn abort_at(tick: usize) -> Self {
        let mut script = vec![ControllerState::default(); tick];
        if let Some(last) = script.last_mut() {
            last.x = true;
        }
        Self::new(script)
    }

    /// Hold `state` for `ticks` reads.
    pub fn holding(state: ControllerState, ticks: usize) -> Self {
        Self::new(vec![state; ticks])
    }

    #[must_use]
    pub const fn disconnected(mut self) -> Self {
        self.alive = false;
        self
    }

    /// Report [`TeleopError::Disconnected`] on read number `read` (1-based).
    #[must_use]
    pub const fn failing_at(mut self, read: usize) -> Self {
        self.fail_at = Some(read);
        self
    }

    pub const fn reads(&self) -> usize {
        self.reads
    }
}

impl Controller for ScriptedController {
    fn is_alive(&self) -> bool {
        self.alive
    }

    fn read(&mut self) -> Result<ControllerState, TeleopError> {
        self.reads += 1;
        if self.fail_at == Some(self.reads) {
            return Err(TeleopError::Disconnected);
        }
        Ok(self
            .script
            .get(self.reads - 1)
            .copied()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn abort_lands_on_requested_read() {
        let mut c = ScriptedController::abort_at(3);
        assert!(!c.read().unwrap().x);
        assert!(!c.read().unwrap().x);
        assert!(c.read().unwrap().x);
        assert!(!c.read().unwrap().x);
        assert_eq!(c.reads(), 4);
    }

    #[test]
    fn failing_read() {
        let mut c = ScriptedController::new(vec![]).failing_at(2);
        assert!(c.read().is_ok());
        assert!(matches!(c.read(), Err(TeleopError::Disconnected)));
    }
}
