//! [`Clock`] abstraction.

use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use crate::DateTime;

/// Source of the current [`DateTime`].
///
/// Keeping time behind this trait makes deadline logic deterministically
/// testable.
pub trait Clock {
    /// Returns the current [`DateTime`].
    fn now(&self) -> DateTime;
}

/// [`Clock`] reading the system time.
#[derive(Clone, Copy, Debug, Default)]
pub struct System;

impl Clock for System {
    fn now(&self) -> DateTime {
        DateTime::now()
    }
}

/// [`Clock`] returning a manually driven instant.
///
/// Intended for tests and simulations: the instant only changes through
/// [`Manual::set()`] and [`Manual::advance()`].
#[derive(Clone, Debug)]
pub struct Manual(Arc<Mutex<DateTime>>);

impl Manual {
    /// Creates a new [`Manual`] clock frozen at the provided instant.
    #[must_use]
    pub fn new(at: DateTime) -> Self {
        Self(Arc::new(Mutex::new(at)))
    }

    /// Rewinds this [`Manual`] clock to the provided instant.
    pub fn set(&self, to: DateTime) {
        *self.lock() = to;
    }

    /// Advances this [`Manual`] clock by the provided [`Duration`].
    pub fn advance(&self, by: Duration) {
        let mut at = self.lock();
        *at = *at + by;
    }

    /// Acquires the inner instant.
    fn lock(&self) -> MutexGuard<'_, DateTime> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Clock for Manual {
    fn now(&self) -> DateTime {
        *self.lock()
    }
}
