use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

/// A date plus a half-open [start, end) time slot, in the facility's
/// timezone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub date: NaiveDate,
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl TimeRange {
    pub fn new(date: NaiveDate, start: NaiveTime, end: NaiveTime) -> Self {
        TimeRange { date, start, end }
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    pub fn start_at(&self) -> NaiveDateTime {
        self.date.and_time(self.start)
    }

    pub fn end_at(&self) -> NaiveDateTime {
        self.date.and_time(self.end)
    }

    /// Half-open overlap: [s1, e1) and [s2, e2) conflict iff
    /// s1 < e2 && s2 < e1. Equal boundaries do not conflict, so
    /// back-to-back slots are fine.
    pub fn overlaps(&self, other: &TimeRange) -> bool {
        self.date == other.date && self.start < other.end && other.start < self.end
    }

    /// Whether `at` falls inside the slot, boundaries included.
    pub fn contains(&self, at: NaiveDateTime) -> bool {
        at.date() == self.date && self.start <= at.time() && at.time() <= self.end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, day).unwrap()
    }

    #[test]
    fn overlap_covers_all_four_relationships() {
        let existing = TimeRange::new(d(1), t(10, 0), t(12, 0));

        // candidate strictly inside existing
        assert!(TimeRange::new(d(1), t(10, 30), t(11, 30)).overlaps(&existing));
        // existing strictly inside candidate
        assert!(TimeRange::new(d(1), t(9, 0), t(13, 0)).overlaps(&existing));
        // partial overlap at the front edge
        assert!(TimeRange::new(d(1), t(9, 0), t(10, 30)).overlaps(&existing));
        // partial overlap at the back edge
        assert!(TimeRange::new(d(1), t(11, 30), t(13, 0)).overlaps(&existing));
    }

    #[test]
    fn back_to_back_is_not_a_conflict() {
        let existing = TimeRange::new(d(1), t(9, 0), t(10, 0));
        assert!(!TimeRange::new(d(1), t(10, 0), t(11, 0)).overlaps(&existing));
        assert!(!TimeRange::new(d(1), t(8, 0), t(9, 0)).overlaps(&existing));
    }

    #[test]
    fn different_dates_never_overlap() {
        let a = TimeRange::new(d(1), t(10, 0), t(12, 0));
        let b = TimeRange::new(d(2), t(10, 0), t(12, 0));
        assert!(!a.overlaps(&b));
    }

    #[test]
    fn contains_includes_both_boundaries() {
        let slot = TimeRange::new(d(1), t(14, 0), t(15, 0));
        assert!(slot.contains(d(1).and_time(t(14, 0))));
        assert!(slot.contains(d(1).and_time(t(14, 30))));
        assert!(slot.contains(d(1).and_time(t(15, 0))));
        assert!(!slot.contains(d(1).and_time(t(15, 1))));
        assert!(!slot.contains(d(2).and_time(t(14, 30))));
    }

    #[test]
    fn duration_is_end_minus_start() {
        let slot = TimeRange::new(d(1), t(9, 0), t(17, 0));
        assert_eq!(slot.duration(), Duration::hours(8));
    }
}
