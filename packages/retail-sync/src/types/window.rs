use chrono::{DateTime, Datelike, Duration, FixedOffset, TimeZone, Utc};
use serde_json::{json, Value};

/// One calendar-month search window, inclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub from: DateTime<FixedOffset>,
    pub to: DateTime<FixedOffset>,
}

impl TimeWindow {
    pub fn from_epoch(&self) -> i64 {
        self.from.timestamp()
    }

    pub fn to_epoch(&self) -> i64 {
        self.to.timestamp()
    }

    /// `YYYY-MM` of the window start, for logs and progress events.
    pub fn label(&self) -> String {
        self.from.format("%Y-%m").to_string()
    }

    /// Search body restricting results to this window.
    pub fn filter_body(&self) -> Value {
        json!({
            "from_date": self.from_epoch(),
            "to_date": self.to_epoch(),
        })
    }
}

/// Contiguous month windows from the month containing `start` through the
/// month containing `now`, aligned to `start`'s UTC offset.
///
/// Each window runs from the first instant of its month to one second before
/// the first instant of the next, so consecutive windows never overlap in time.
pub fn month_windows(start: DateTime<FixedOffset>, now: DateTime<Utc>) -> Vec<TimeWindow> {
    let offset = *start.offset();
    let now = now.with_timezone(&offset);
    let (mut year, mut month) = (start.year(), start.month());
    let mut windows = Vec::new();

    loop {
        let Some(from) = offset.with_ymd_and_hms(year, month, 1, 0, 0, 0).single() else {
            break;
        };
        if from > now {
            break;
        }
        (year, month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
        let Some(next) = offset.with_ymd_and_hms(year, month, 1, 0, 0, 0).single() else {
            break;
        };
        windows.push(TimeWindow {
            from,
            to: next - Duration::seconds(1),
        });
    }

    windows
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kyiv() -> FixedOffset {
        FixedOffset::east_opt(7200).unwrap()
    }

    #[test]
    fn test_windows_cover_through_current_month() {
        let start = kyiv().with_ymd_and_hms(2017, 11, 15, 0, 0, 0).unwrap();
        let now = Utc.with_ymd_and_hms(2018, 2, 10, 12, 0, 0).unwrap();

        let windows = month_windows(start, now);
        let labels: Vec<_> = windows.iter().map(TimeWindow::label).collect();
        assert_eq!(labels, vec!["2017-11", "2017-12", "2018-01", "2018-02"]);
    }

    #[test]
    fn test_windows_are_contiguous_and_disjoint() {
        let start = kyiv().with_ymd_and_hms(2017, 1, 1, 0, 0, 0).unwrap();
        let now = Utc.with_ymd_and_hms(2019, 6, 1, 0, 0, 0).unwrap();

        let windows = month_windows(start, now);
        for pair in windows.windows(2) {
            assert_eq!(pair[0].to_epoch() + 1, pair[1].from_epoch());
        }
        assert!(windows.iter().all(|w| w.from < w.to));
    }

    #[test]
    fn test_window_bounds_use_tenant_offset() {
        let start = kyiv().with_ymd_and_hms(2017, 1, 1, 0, 0, 0).unwrap();
        let now = Utc.with_ymd_and_hms(2017, 1, 20, 0, 0, 0).unwrap();

        let windows = month_windows(start, now);
        assert_eq!(windows.len(), 1);
        // 2017-01-01T00:00:00+02:00
        assert_eq!(windows[0].from_epoch(), 1_483_221_600);
        // 2017-01-31T23:59:59+02:00
        assert_eq!(windows[0].to_epoch(), 1_485_899_999);
        assert_eq!(
            windows[0].filter_body(),
            json!({"from_date": 1_483_221_600i64, "to_date": 1_485_899_999i64})
        );
    }

    #[test]
    fn test_future_start_yields_nothing() {
        let start = kyiv().with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap();
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert!(month_windows(start, now).is_empty());
    }
}
