//! Clocks

use jiff::{Zoned, civil::Date};

/// Source of the current date for expiration checks.
///
/// Injected into validation so tests can pin the calendar.
pub trait Clock {
    /// The current calendar date.
    fn today(&self) -> Date;
}

/// Clock that reads the system time in the system time zone.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> Date {
        Zoned::now().date()
    }
}

/// Clock pinned to a fixed date.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub Date);

impl Clock for FixedClock {
    fn today(&self) -> Date {
        self.0
    }
}
