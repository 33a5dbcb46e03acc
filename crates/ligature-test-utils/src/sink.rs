//! In-memory [`FrameSink`] with shared state for inspection.

use std::cell::RefCell;
use std::rc::Rc;

use ligature_core::error::SinkError;
use ligature_core::frame::Frame;
use ligature_core::traits::FrameSink;

#[derive(Debug, Default)]
struct SinkState {
    frames: Vec<Frame>,
    releases: u32,
    released: bool,
}

/// Stores written frames in memory.
///
/// Clones share storage: hand one clone to the code under test and inspect
/// the other.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    state: Rc<RefCell<SinkState>>,
    fail_at: Option<u64>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the write of frame number `frame` (1-based).
    #[must_use]
    pub const fn failing_at(mut self, frame: u64) -> Self {
        self.fail_at = Some(frame);
        self
    }

    pub fn frames(&self) -> Vec<Frame> {
        self.state.borrow().frames.clone()
    }

    pub fn frame_count(&self) -> usize {
        self.state.borrow().frames.len()
    }

    /// How many times `release` was called, including repeats.
    pub fn release_calls(&self) -> u32 {
        self.state.borrow().releases
    }

    pub fn is_released(&self) -> bool {
        self.state.borrow().released
    }
}

impl FrameSink for MemorySink {
    fn write_frame(&mut self, frame: &Frame) -> Result<(), SinkError> {
        let mut state = self.state.borrow_mut();
        if state.released {
            return Err(SinkError::Released);
        }
        if self.fail_at == Some(state.frames.len() as u64 + 1) {
            return Err(SinkError::Encoder("scripted write failure".into()));
        }
        state.frames.push(frame.clone());
        Ok(())
    }

    fn release(&mut self) -> Result<(), SinkError> {
        let mut state = self.state.borrow_mut();
        state.releases += 1;
        state.released = true;
        Ok(())
    }

    fn frames_written(&self) -> u64 {
        self.state.borrow().frames.len() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_frames() {
        let observer = MemorySink::new();
        let mut sink = observer.clone();
        sink.write_frame(&Frame::new(2, 2)).unwrap();
        assert_eq!(observer.frame_count(), 1);
        sink.release().unwrap();
        assert!(observer.is_released());
        assert!(matches!(
            sink.write_frame(&Frame::new(2, 2)),
            Err(SinkError::Released)
        ));
    }
}
