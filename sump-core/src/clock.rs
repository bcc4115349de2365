//! Monotonic time for timeout enforcement

use embassy_time::Instant;

/// Monotonic microsecond clock
///
/// The firmware reads the embassy time driver; tests step a fake clock so that
/// timeouts are deterministic.
pub trait Clock {
    /// Current instant, never decreasing
    fn now(&self) -> Instant;
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> Instant {
        (**self).now()
    }
}
