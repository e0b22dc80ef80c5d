use crate::Result;
use chrono::{DateTime, TimeDelta, Utc};
use core::fmt::{Display, Formatter};
use core::time::Duration;
use ohno::IntoAppError;
use serde::Serialize;

/// A closed time interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    #[must_use]
    pub const fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// The window of the given length that ends at `end`.
    pub fn ending_at(end: DateTime<Utc>, length: Duration) -> Result<Self> {
        let length = TimeDelta::from_std(length).into_app_err_with(|| format!("time window of {length:?} is too long"))?;
        let start = end
            .checked_sub_signed(length)
            .into_app_err_with(|| format!("time window of {length} reaches before the earliest representable date"))?;
        Ok(Self { start, end })
    }

    #[must_use]
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant <= self.end
    }
}

impl Display for TimeWindow {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        write!(f, "{} to {}", self.start.format("%Y-%m-%d %H:%M UTC"), self.end.format("%Y-%m-%d %H:%M UTC"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_ending_at() {
        let end = Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap();
        let window = TimeWindow::ending_at(end, Duration::from_secs(14 * 24 * 3600)).unwrap();
        assert_eq!(window.start, Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap());
        assert_eq!(window.end, end);
    }

    #[test]
    fn test_contains_is_inclusive() {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 3, 2, 0, 0, 0).unwrap();
        let window = TimeWindow::new(start, end);

        assert!(window.contains(start));
        assert!(window.contains(end));
        assert!(!window.contains(start - TimeDelta::seconds(1)));
        assert!(!window.contains(end + TimeDelta::seconds(1)));
    }

    #[test]
    fn test_display() {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 3, 2, 6, 30, 0).unwrap();
        assert_eq!(TimeWindow::new(start, end).to_string(), "2024-03-01 00:00 UTC to 2024-03-02 06:30 UTC");
    }
}
