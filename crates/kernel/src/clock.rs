use time::{macros::time, Date, OffsetDateTime};

/// Source of the current time. Date rules read "today" from here so they can be pinned in tests.
pub trait Clock: Send + Sync {
    fn now(&self) -> OffsetDateTime;

    fn today(&self) -> Date {
        self.now().date()
    }
}

/// Wall clock in UTC.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

/// Clock frozen at a single instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub OffsetDateTime);

impl FixedClock {
    /// Noon UTC on `date`.
    pub fn on(date: Date) -> Self {
        Self(date.with_time(time!(12:00)).assume_utc())
    }
}

impl Clock for FixedClock {
    fn now(&self) -> OffsetDateTime {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    #[test]
    fn fixed_clock_reports_its_date() {
        let clock = FixedClock::on(date!(2024 - 03 - 01));
        assert_eq!(clock.today(), date!(2024 - 03 - 01));
        assert_eq!(clock.now().hour(), 12);
        assert_eq!(clock.now().offset(), time::UtcOffset::UTC);
    }
}
