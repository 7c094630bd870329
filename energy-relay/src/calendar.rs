use energy_client::domain::DateKey;
use time::{OffsetDateTime, UtcOffset};

use crate::pipeline::Clock;

/// Any wall clock earlier than this has not been set by time sync yet
/// (2020-01-01T00:00:00Z).
const MIN_SYNCED_UNIX: i64 = 1_577_836_800;

/// System wall clock viewed from the site's fixed UTC offset.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    offset: UtcOffset,
}

impl SystemClock {
    pub fn new(offset: UtcOffset) -> Self {
        Self { offset }
    }

    pub fn from_offset_hours(hours: i8) -> Result<Self, time::error::ComponentRange> {
        UtcOffset::from_hms(hours, 0, 0).map(Self::new)
    }

    /// Whether the wall clock looks like it has been set from a time source.
    pub fn is_synchronized(&self) -> bool {
        OffsetDateTime::now_utc().unix_timestamp() >= MIN_SYNCED_UNIX
    }
}

impl Clock for SystemClock {
    fn today(&self) -> DateKey {
        DateKey::from_instant(OffsetDateTime::now_utc(), self.offset)
    }
}

/// Detects calendar-day changes against the day the accumulator is on.
pub struct CalendarTracker<C> {
    clock: C,
}

impl<C: Clock> CalendarTracker<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }

    pub fn today(&self) -> DateKey {
        self.clock.today()
    }

    /// The clock's current day if it differs from `last_known`.
    pub fn has_rolled_over(&self, last_known: DateKey) -> Option<DateKey> {
        let today = self.clock.today();
        if today == last_known {
            return None;
        }
        if today < last_known {
            tracing::warn!(
                last_known = %last_known,
                today = %today,
                "calendar day moved backwards; treating as a rollover"
            );
        }
        Some(today)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FixedClock;

    #[test]
    fn same_day_is_not_a_rollover() {
        let clock = FixedClock::new("2026-01-05");
        let tracker = CalendarTracker::new(clock.clone());
        assert_eq!(tracker.has_rolled_over("2026-01-05".parse().unwrap()), None);
    }

    #[test]
    fn next_day_is_reported() {
        let clock = FixedClock::new("2026-01-05");
        let tracker = CalendarTracker::new(clock.clone());
        clock.set("2026-01-06");
        assert_eq!(
            tracker.has_rolled_over("2026-01-05".parse().unwrap()),
            Some("2026-01-06".parse().unwrap())
        );
    }

    #[test]
    fn skipped_days_report_the_current_day() {
        let clock = FixedClock::new("2026-01-09");
        let tracker = CalendarTracker::new(clock);
        assert_eq!(
            tracker.has_rolled_over("2026-01-05".parse().unwrap()),
            Some("2026-01-09".parse().unwrap())
        );
    }

    #[test]
    fn backwards_jump_is_still_a_change() {
        let clock = FixedClock::new("2026-01-04");
        let tracker = CalendarTracker::new(clock);
        assert_eq!(
            tracker.has_rolled_over("2026-01-05".parse().unwrap()),
            Some("2026-01-04".parse().unwrap())
        );
    }

    #[test]
    fn offset_hours_out_of_range_is_rejected() {
        assert!(SystemClock::from_offset_hours(7).is_ok());
        assert!(SystemClock::from_offset_hours(30).is_err());
    }
}
