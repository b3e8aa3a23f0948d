//! Exclusive access to peripherals shared by the foreground loop and bus context.
//!
//! The foreground blocks in `acquire`. Bus handlers must answer within the
//! master's clock-stretch tolerance, so they poll `try_acquire` for at most a
//! fixed budget and give up with `EggError::Busy`.

use std::sync::{Mutex, MutexGuard, TryLockError};
use std::time::Duration;

use egg_traits::Clock;

use crate::error::{EggError, Resource};

const POLL_INTERVAL: Duration = Duration::from_micros(250);

/// Which execution context is asking for a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Periodic control loop; may wait indefinitely.
    Foreground,
    /// Bus-event handler; bounded by the clock-stretch budget.
    Bus,
}

#[derive(Debug)]
pub struct Exclusive<T> {
    resource: Resource,
    inner: Mutex<T>,
}

impl<T> Exclusive<T> {
    pub fn new(resource: Resource, value: T) -> Self {
        Self {
            resource,
            inner: Mutex::new(value),
        }
    }

    pub fn resource(&self) -> Resource {
        self.resource
    }

    /// Block until the resource is free.
    pub fn acquire(&self) -> Result<MutexGuard<'_, T>, EggError> {
        self.inner.lock().map_err(|_| self.poisoned())
    }

    /// Take the resource only if nobody holds it right now.
    pub fn try_acquire(&self) -> Result<Option<MutexGuard<'_, T>>, EggError> {
        match self.inner.try_lock() {
            Ok(guard) => Ok(Some(guard)),
            Err(TryLockError::WouldBlock) => Ok(None),
            Err(TryLockError::Poisoned(_)) => Err(self.poisoned()),
        }
    }

    /// Poll `try_acquire` until `budget` has elapsed on `clock`.
    ///
    /// Always makes at least one attempt, so a zero budget means "only if free".
    pub fn acquire_within(
        &self,
        budget: Duration,
        clock: &dyn Clock,
    ) -> Result<MutexGuard<'_, T>, EggError> {
        let start = clock.now();
        loop {
            if let Some(guard) = self.try_acquire()? {
                return Ok(guard);
            }
            let left = clock.remaining(start, budget);
            if left.is_zero() {
                tracing::warn!(resource = %self.resource, ?budget, "resource busy");
                return Err(EggError::Busy(self.resource));
            }
            clock.sleep(POLL_INTERVAL.min(left));
        }
    }

    fn poisoned(&self) -> EggError {
        EggError::HardwareFault(format!("{} lock poisoned", self.resource))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use egg_traits::clock::test_clock::TestClock;

    #[test]
    fn try_acquire_reports_contention() {
        let res = Exclusive::new(Resource::Adc, 7u16);
        let held = res.acquire().unwrap();
        assert!(res.try_acquire().unwrap().is_none());
        drop(held);
        assert_eq!(*res.try_acquire().unwrap().unwrap(), 7);
    }

    #[test]
    fn acquire_within_gives_up_after_budget() {
        let res = Exclusive::new(Resource::Digipot, ());
        let clock = TestClock::new();
        let _held = res.acquire().unwrap();
        let err = res
            .acquire_within(Duration::from_millis(25), &clock)
            .unwrap_err();
        assert_eq!(err, EggError::Busy(Resource::Digipot));
        assert!(clock.elapsed() >= Duration::from_millis(25));
        assert!(clock.elapsed() < Duration::from_millis(26));
    }

    #[test]
    fn zero_budget_still_takes_a_free_resource() {
        let res = Exclusive::new(Resource::Divider, 1u8);
        let clock = TestClock::new();
        assert!(res.acquire_within(Duration::ZERO, &clock).is_ok());
        assert_eq!(clock.elapsed(), Duration::ZERO);
    }
}
