use chrono::{DateTime, Datelike, TimeZone};
use std::fmt;

use crate::{aggregation::fixed, scale::ScaleUnit};

/// A `[start, end)` interval the aggregation service can be queried for.
///
/// For every calendar scale `end` is exactly one unit after `start`, and
/// `start` sits on a unit boundary, so successive windows tile. A window of
/// scale `None` spans an arbitrary selected range instead.
#[derive(Debug, Clone)]
pub struct TimeWindow<Tz: TimeZone> {
    pub start: DateTime<Tz>,
    pub end: DateTime<Tz>,
    pub scale: ScaleUnit,
}

/// Canonical window containing `anchor` at `scale`.
///
/// The anchor is aligned down to the start of its unit first, which is what
/// keeps later windows free of gaps and overlaps. `None` for the `none` scale.
pub fn compute_window<Tz: TimeZone>(
    anchor: &DateTime<Tz>,
    scale: ScaleUnit,
) -> Option<TimeWindow<Tz>> {
    let (start, end) = scale.bounds(anchor)?;
    Some(TimeWindow { start, end, scale })
}

impl<Tz: TimeZone> TimeWindow<Tz> {
    /// Window over a whole selected range, not grouped by time.
    pub fn ungrouped(from: DateTime<Tz>, to: DateTime<Tz>) -> Self {
        TimeWindow {
            start: from,
            end: to,
            scale: ScaleUnit::None,
        }
    }

    /// The window directly after this one.
    pub fn successor(&self) -> Option<Self> {
        compute_window(&self.end, self.scale)
    }

    pub fn contains(&self, instant: &DateTime<Tz>) -> bool {
        self.start <= *instant && *instant < self.end
    }

    /// Period code understood by the aggregation service: `2020`, `2020Q1`,
    /// `2020M3`, `2020W12` (ISO week-year) or `2020D45` (day of year).
    ///
    /// Hours, minutes and ungrouped windows have no code; those are sent as
    /// explicit bounds only.
    pub fn period_code(&self) -> Option<String> {
        let date = self.start.naive_local().date();
        match self.scale {
            ScaleUnit::Year => Some(format!("{}", date.year())),
            ScaleUnit::Quarter => Some(format!("{}Q{}", date.year(), date.month0() / 3 + 1)),
            ScaleUnit::Month => Some(format!("{}M{}", date.year(), date.month())),
            ScaleUnit::Week => {
                let week = date.iso_week();
                Some(format!("{}W{}", week.year(), week.week()))
            }
            ScaleUnit::Day => Some(format!("{}D{}", date.year(), date.ordinal())),
            ScaleUnit::Hour | ScaleUnit::Minute | ScaleUnit::None => None,
        }
    }

    /// Period code, or the RFC 3339 start for windows without one.
    pub fn label(&self) -> String {
        self.period_code().unwrap_or_else(|| fixed(&self.start).to_rfc3339())
    }
}

impl<Tz: TimeZone> PartialEq for TimeWindow<Tz> {
    fn eq(&self, other: &Self) -> bool {
        self.start == other.start && self.end == other.end && self.scale == other.scale
    }
}

impl<Tz: TimeZone> Eq for TimeWindow<Tz> {}

impl<Tz: TimeZone> fmt::Display for TimeWindow<Tz>
where
    Tz::Offset: fmt::Display,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.period_code() {
            Some(code) => write!(f, "{} [{} .. {})", code, self.start, self.end),
            None => write!(f, "{} [{} .. {})", self.scale, self.start, self.end),
        }
    }
}

/// Iterator over successive windows starting with the one containing the anchor.
#[derive(Debug, Clone)]
pub struct Windows<Tz: TimeZone> {
    next: Option<TimeWindow<Tz>>,
}

impl<Tz: TimeZone> Windows<Tz> {
    pub fn new(anchor: &DateTime<Tz>, scale: ScaleUnit) -> Self {
        Windows {
            next: compute_window(anchor, scale),
        }
    }
}

impl<Tz: TimeZone> Iterator for Windows<Tz> {
    type Item = TimeWindow<Tz>;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next.take()?;
        self.next = current.successor();
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scale::{AGGREGATED_SCALES, DEFAULT_SCALES};
    use chrono::{FixedOffset, Utc};
    use chrono_tz::{America::Sao_Paulo, Europe::Amsterdam};

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[test]
    fn test_year_window_aligns_anchor() {
        let window = compute_window(&utc(2020, 6, 15, 10, 30), ScaleUnit::Year).unwrap();
        assert_eq!(window.start, utc(2020, 1, 1, 0, 0));
        assert_eq!(window.end, utc(2021, 1, 1, 0, 0));
        assert_eq!(window.scale, ScaleUnit::Year);
        assert!(window.contains(&utc(2020, 12, 31, 23, 59)));
        assert!(!window.contains(&utc(2021, 1, 1, 0, 0)));
    }

    #[test]
    fn test_windows_tile_for_every_scale() {
        let anchor = utc(2019, 12, 30, 22, 59);
        for scale in DEFAULT_SCALES {
            let windows: Vec<_> = Windows::new(&anchor, scale).take(40).collect();
            assert_eq!(windows.len(), 40, "{scale}");
            for pair in windows.windows(2) {
                assert_eq!(pair[0].end, pair[1].start, "{scale} windows must tile");
                assert!(pair[0].start < pair[0].end);
            }
        }
    }

    #[test]
    fn test_advancing_anchor_lands_on_successor() {
        let anchor = utc(2021, 3, 17, 8, 5);
        for scale in DEFAULT_SCALES {
            let window = compute_window(&anchor, scale).unwrap();
            let advanced = scale.advance(&window.start).unwrap();
            let next = compute_window(&advanced, scale).unwrap();
            assert_eq!(window.end, next.start, "{scale}");
        }
    }

    #[test]
    fn test_windows_tile_in_fixed_offset_zone() {
        let offset = FixedOffset::west_opt(3 * 3600).unwrap();
        let anchor = offset.with_ymd_and_hms(2022, 2, 27, 23, 0, 0).unwrap();
        let windows: Vec<_> = Windows::new(&anchor, ScaleUnit::Day).take(5).collect();
        assert_eq!(windows[0].start.naive_local().to_string(), "2022-02-27 00:00:00");
        assert_eq!(windows[2].start.naive_local().to_string(), "2022-03-01 00:00:00");
        for pair in windows.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }
    }

    fn assert_calendar_windows_tile<Tz: TimeZone + fmt::Debug>(anchor: &DateTime<Tz>) {
        for scale in AGGREGATED_SCALES {
            let windows: Vec<_> = Windows::new(anchor, scale).take(6).collect();
            assert_eq!(windows.len(), 6, "{scale}");
            for pair in windows.windows(2) {
                assert_eq!(pair[0].end, pair[1].start, "{scale} windows must tile");
                assert!(pair[0].start < pair[0].end);
            }
            for window in &windows {
                let advanced = scale.advance(&window.start).unwrap();
                assert_eq!(compute_window(&advanced, scale), window.successor(), "{scale}");
            }
        }
    }

    #[test]
    fn test_windows_tile_across_midnight_dst_gap() {
        // clocks jumped from 00:00 to 01:00 on 2018-11-04
        let anchor = Sao_Paulo.with_ymd_and_hms(2018, 11, 3, 12, 0, 0).unwrap();
        assert_calendar_windows_tile(&anchor);

        let days: Vec<_> = Windows::new(&anchor, ScaleUnit::Day).take(3).collect();
        assert_eq!(days[0].end.to_rfc3339(), "2018-11-04T01:00:00-02:00");
        assert_eq!(days[1].start.to_rfc3339(), "2018-11-04T01:00:00-02:00");
        assert_eq!(days[1].end.to_rfc3339(), "2018-11-05T00:00:00-02:00");
        assert_eq!((days[1].end - days[1].start).num_hours(), 23);
        assert_eq!(days[1].period_code().as_deref(), Some("2018D308"));
        assert_eq!(days[2].start.to_rfc3339(), "2018-11-05T00:00:00-02:00");

        let week = compute_window(&anchor, ScaleUnit::Week).unwrap();
        assert_eq!(week.start.to_rfc3339(), "2018-10-29T00:00:00-03:00");
        assert_eq!(week.end.to_rfc3339(), "2018-11-05T00:00:00-02:00");
        let month = compute_window(&anchor, ScaleUnit::Month).unwrap();
        assert_eq!(month.start.to_rfc3339(), "2018-11-01T00:00:00-03:00");
        assert_eq!(month.end.to_rfc3339(), "2018-12-01T00:00:00-02:00");
        let year = compute_window(&anchor, ScaleUnit::Year).unwrap();
        assert_eq!(year.start.to_rfc3339(), "2018-01-01T00:00:00-02:00");
        assert_eq!(year.end.to_rfc3339(), "2019-01-01T00:00:00-02:00");
    }

    #[test]
    fn test_windows_tile_across_fall_back() {
        // clocks went from 03:00 back to 02:00 on 2021-10-31
        let anchor = Amsterdam.with_ymd_and_hms(2021, 10, 30, 12, 0, 0).unwrap();
        assert_calendar_windows_tile(&anchor);

        let days: Vec<_> = Windows::new(&anchor, ScaleUnit::Day).take(3).collect();
        assert_eq!(days[1].start.to_rfc3339(), "2021-10-31T00:00:00+02:00");
        assert_eq!(days[1].end.to_rfc3339(), "2021-11-01T00:00:00+01:00");
        assert_eq!((days[1].end - days[1].start).num_hours(), 25);

        let week = compute_window(&anchor, ScaleUnit::Week).unwrap();
        assert_eq!(week.start.to_rfc3339(), "2021-10-25T00:00:00+02:00");
        assert_eq!(week.end.to_rfc3339(), "2021-11-01T00:00:00+01:00");
        let month = compute_window(&anchor, ScaleUnit::Month).unwrap();
        assert_eq!((month.end - month.start).num_hours(), 31 * 24 + 1);
        let year = compute_window(&anchor, ScaleUnit::Year).unwrap();
        assert_eq!(year.start.to_rfc3339(), "2021-01-01T00:00:00+01:00");
        assert_eq!(year.end.to_rfc3339(), "2022-01-01T00:00:00+01:00");
    }

    #[test]
    fn test_period_codes() {
        let anchor = utc(2020, 2, 14, 9, 0);
        let code = |scale| compute_window(&anchor, scale).unwrap().period_code();
        assert_eq!(code(ScaleUnit::Year).as_deref(), Some("2020"));
        assert_eq!(code(ScaleUnit::Quarter).as_deref(), Some("2020Q1"));
        assert_eq!(code(ScaleUnit::Month).as_deref(), Some("2020M2"));
        assert_eq!(code(ScaleUnit::Week).as_deref(), Some("2020W7"));
        assert_eq!(code(ScaleUnit::Day).as_deref(), Some("2020D45"));
        assert_eq!(code(ScaleUnit::Hour), None);
        let month = compute_window(&anchor, ScaleUnit::Month).unwrap();
        assert_eq!(month.label(), "2020M2");
    }

    #[test]
    fn test_week_code_uses_iso_week_year() {
        // Monday 2019-12-30 starts ISO week 1 of 2020
        let window = compute_window(&utc(2020, 1, 1, 0, 0), ScaleUnit::Week).unwrap();
        assert_eq!(window.start, utc(2019, 12, 30, 0, 0));
        assert_eq!(window.period_code().as_deref(), Some("2020W1"));
    }

    #[test]
    fn test_none_scale_has_no_calendar_window() {
        let anchor = utc(2020, 1, 1, 0, 0);
        assert!(compute_window(&anchor, ScaleUnit::None).is_none());
        let window = TimeWindow::ungrouped(anchor, utc(2020, 3, 1, 0, 0));
        assert_eq!(window.scale, ScaleUnit::None);
        assert_eq!(window.period_code(), None);
        assert_eq!(window.label(), "2020-01-01T00:00:00+00:00");
        assert!(window.successor().is_none());
    }
}
