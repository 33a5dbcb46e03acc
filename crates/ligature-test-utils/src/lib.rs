//! Shared test fixtures for the ligature crates.
//!
//! Provides a scriptable environment, a scripted controller and an
//! in-memory frame sink so wrappers and the control loop can be tested
//! without a simulation or hardware.

pub mod controller;
pub mod env;
pub mod sink;

// ---------------------------------------------------------------------------
// Re-exports for convenience
// ---------------------------------------------------------------------------

pub use controller::ScriptedController;
pub use env::MockEnv;
pub use sink::MemorySink;

/// Busy-wait for `duration`; more precise than `sleep` for short spans.
pub fn spin_for(duration: std::time::Duration) {
    let start = std::time::Instant::now();
    while start.elapsed() < duration {
        std::hint::spin_loop();
    }
}
