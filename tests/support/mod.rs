//! Shared helpers for integration tests

use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Duration, Local, NaiveDate, TimeZone, Utc};
use mockable::Clock;

/// Clock frozen at a chosen instant, moved forward by the test
pub struct MutableClock(Mutex<DateTime<Utc>>);

impl MutableClock {
    /// Mid-morning UTC on `date`
    pub fn on(date: NaiveDate) -> Self {
        let now = Utc.from_utc_datetime(&date.and_hms_opt(9, 30, 0).expect("valid time"));
        Self(Mutex::new(now))
    }

    #[allow(dead_code)]
    pub fn set_date(&self, date: NaiveDate) {
        *self.lock_clock() = Utc.from_utc_datetime(&date.and_hms_opt(9, 30, 0).expect("valid time"));
    }

    pub fn advance_days(&self, days: i64) {
        *self.lock_clock() += Duration::days(days);
    }

    fn lock_clock(&self) -> MutexGuard<'_, DateTime<Utc>> {
        match self.0.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Clock for MutableClock {
    fn local(&self) -> DateTime<Local> {
        self.utc().with_timezone(&Local)
    }

    fn utc(&self) -> DateTime<Utc> {
        *self.lock_clock()
    }
}
