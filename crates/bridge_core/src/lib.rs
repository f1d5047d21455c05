//! Hostbridge Core
//!
//! Host-thread scheduling primitives shared by every bridge subsystem:
//! - Clocks (wall and manual)
//! - The injected `Scheduler` capability and its `HostLoop` implementation
//! - Timer registry (setTimeout / setInterval semantics)
//! - Animation-frame batching (requestAnimationFrame semantics)
//!
//! Nothing in this crate knows about the script engine. Callbacks are opaque
//! handles `C` invoked through an injected invoker closure, so the same
//! registries are exercised in tests with plain Rust values.

pub mod callback;
pub mod clock;
pub mod frames;
pub mod scheduler;
pub mod timers;

pub use callback::CallbackError;
pub use clock::{Clock, ClockHandle, ManualClock, SystemClock};
pub use frames::FrameScheduler;
pub use scheduler::{HostLoop, Rearm, Scheduler, SchedulerHandle, TaskId};
pub use timers::Timers;

/// Bridge version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
