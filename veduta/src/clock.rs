//! Time source abstraction for animations.

use web_time::SystemTime;

/// Source of the current time for animation sampling.
///
/// Animators never read the system clock directly so that tests can drive
/// time manually.
pub trait Clock {
    /// The current time.
    fn now(&self) -> SystemTime;
}

/// [`Clock`] backed by the system clock.
#[derive(Debug, Default, Copy, Clone)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}
