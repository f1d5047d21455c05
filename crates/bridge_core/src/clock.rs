//! Host clocks
//!
//! `now()` is monotonic and drives scheduling deadlines; `epoch_ms()` is the
//! wall-clock timestamp handed to scripts (`getTime`, frame callbacks).

use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Animation frame rate (60 Hz = 16.666ms per frame)
pub const FRAME_RATE_HZ: u32 = 60;
pub const FRAME_INTERVAL: Duration = Duration::from_micros(16_666); // ~16.666ms

pub trait Clock {
    /// Monotonic time since the clock's origin.
    fn now(&self) -> Duration;

    /// Milliseconds since the Unix epoch, never decreasing.
    fn epoch_ms(&self) -> f64;

    /// Block the host thread for `duration` (or advance virtual time).
    fn sleep(&self, duration: Duration);
}

pub type ClockHandle = Rc<dyn Clock>;

/// Real time: an `Instant` anchored to the wall clock at construction, so
/// epoch timestamps cannot jump backwards with system clock adjustments.
pub struct SystemClock {
    origin: Instant,
    origin_epoch: Duration,
}

impl SystemClock {
    pub fn new() -> Self {
        let origin_epoch = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO);
        Self {
            origin: Instant::now(),
            origin_epoch,
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    fn epoch_ms(&self) -> f64 {
        (self.origin_epoch + self.now()).as_secs_f64() * 1000.0
    }

    fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            std::thread::sleep(duration);
        }
    }
}

/// Virtual time for deterministic tests. `sleep` advances instead of blocking.
#[derive(Default)]
pub struct ManualClock {
    now: Cell<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, delta: Duration) {
        self.now.set(self.now.get() + delta);
    }

    pub fn advance_ms(&self, delta_ms: u64) {
        self.advance(Duration::from_millis(delta_ms));
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        self.now.get()
    }

    fn epoch_ms(&self) -> f64 {
        self.now.get().as_secs_f64() * 1000.0
    }

    fn sleep(&self, duration: Duration) {
        self.advance(duration);
    }
}
