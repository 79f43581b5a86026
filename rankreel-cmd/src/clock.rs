use chrono::{DateTime, TimeZone, Utc};
use std::sync::Mutex;

/// Source of "now" for deciding when the polling loop has caught up.
pub trait Clock<Tz: TimeZone>: Send + Sync {
    fn now(&self) -> DateTime<Tz>;
}

/// Wall clock in a given time zone.
#[derive(Debug, Clone)]
pub struct SystemClock<Tz> {
    tz: Tz,
}

impl<Tz> SystemClock<Tz> {
    pub fn new(tz: Tz) -> Self {
        SystemClock { tz }
    }
}

impl<Tz> Clock<Tz> for SystemClock<Tz>
where
    Tz: TimeZone + Send + Sync,
{
    fn now(&self) -> DateTime<Tz> {
        Utc::now().with_timezone(&self.tz)
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct FixedClock<Tz: TimeZone> {
    now: Mutex<DateTime<Tz>>,
}

impl<Tz: TimeZone> FixedClock<Tz> {
    pub fn new(now: DateTime<Tz>) -> Self {
        FixedClock {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Tz>) {
        match self.now.lock() {
            Ok(mut guard) => *guard = now,
            Err(poisoned) => *poisoned.into_inner() = now,
        }
    }
}

impl<Tz> Clock<Tz> for FixedClock<Tz>
where
    Tz: TimeZone + Send + Sync,
    Tz::Offset: Send,
{
    fn now(&self) -> DateTime<Tz> {
        match self.now.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}
