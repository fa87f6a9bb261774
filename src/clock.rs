//! Sources of the current wall-clock time.

use std::sync::Arc;

use chrono::{Duration, NaiveDateTime};
use parking_lot::Mutex;

use crate::error::{Error, Result};

/// Reads the current local date and time.
pub trait Clock: Send + Sync {
    /// # Errors
    /// [`Error::Clock`] if the time couldn't be read; the scheduler skips that tick.
    fn now(&self) -> Result<NaiveDateTime>;
}

/// The machine's local clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Result<NaiveDateTime> {
        Ok(chrono::Local::now().naive_local())
    }
}

/// A clock that only moves when told to.
///
/// Clones share the same time, so a test can keep one handle and give another
/// to the scheduler.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<Mutex<Option<NaiveDateTime>>>,
}

impl ManualClock {
    #[must_use]
    pub fn new(at: NaiveDateTime) -> Self {
        Self {
            now: Arc::new(Mutex::new(Some(at))),
        }
    }

    pub fn set(&self, at: NaiveDateTime) {
        *self.now.lock() = Some(at);
    }

    /// moves the clock forward, does nothing while the clock is failing
    pub fn advance(&self, by: Duration) {
        if let Some(now) = self.now.lock().as_mut() {
            *now += by;
        }
    }

    /// makes every read fail until the next `set`
    pub fn fail(&self) {
        *self.now.lock() = None;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Result<NaiveDateTime> {
        (*self.now.lock()).ok_or_else(|| Error::Clock("manual clock has no time set".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    #[test]
    fn manual_clock_is_shared_between_clones() {
        let start = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(23, 59, 59)
            .unwrap();
        let clock = ManualClock::new(start);
        let handle = clock.clone();
        handle.advance(Duration::seconds(1));
        assert_eq!(
            clock.now().unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 2)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap()
        );
    }

    #[test]
    fn failing_clock_reports_an_error_until_set() {
        let clock = ManualClock::default();
        assert!(matches!(clock.now(), Err(Error::Clock(_))));
        clock.advance(Duration::seconds(5));
        assert!(clock.now().is_err());
        let at = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        clock.set(at);
        assert_eq!(clock.now().unwrap(), at);
    }
}
