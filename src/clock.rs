//! Monotonic time source for the control loop.
//!
//! The helm samples its clock once at the start of every cycle and threads that
//! instant through navigation, correction debounce and telemetry duplicate
//! suppression, so blocking calls later in the cycle never skew the checks.

use core::cell::Cell;

/// Platform-agnostic monotonic millisecond clock.
pub trait Clock {
    /// Milliseconds since an arbitrary, fixed origin. Must never go backwards.
    fn now_ms(&self) -> u64;

    /// Milliseconds elapsed since `reference`, saturating at zero.
    fn elapsed_since(&self, reference: u64) -> u64 {
        self.now_ms().saturating_sub(reference)
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now_ms(&self) -> u64 {
        (**self).now_ms()
    }
}

/// Clock with manually controlled time, for host tests and simulation.
///
/// ```
/// use helm::clock::{Clock, MockClock};
///
/// let clock = MockClock::new();
/// clock.advance(1_500);
/// assert_eq!(clock.now_ms(), 1_500);
/// ```
#[derive(Debug, Default, Clone)]
pub struct MockClock {
    now: Cell<u64>,
}

impl MockClock {
    /// Creates a clock reading zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves time forward by `ms`.
    pub fn advance(&self, ms: u64) {
        self.now.set(self.now.get().saturating_add(ms));
    }

    /// Sets the absolute time. Tests are responsible for keeping it monotonic.
    pub fn set(&self, ms: u64) {
        self.now.set(ms);
    }
}

impl Clock for MockClock {
    fn now_ms(&self) -> u64 {
        self.now.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_clock_advances() {
        let clock = MockClock::new();
        assert_eq!(clock.now_ms(), 0);
        clock.advance(250);
        clock.advance(250);
        assert_eq!(clock.now_ms(), 500);
        assert_eq!(clock.elapsed_since(100), 400);
    }

    #[test]
    fn test_elapsed_since_saturates() {
        let clock = MockClock::new();
        clock.set(10);
        assert_eq!(clock.elapsed_since(50), 0);
    }
}
