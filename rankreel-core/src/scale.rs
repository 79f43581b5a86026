use chrono::{
    DateTime, Datelike, Days, Months, NaiveDateTime, NaiveTime, TimeDelta, TimeZone, Timelike,
};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use crate::error::ParseError;

/// Every calendar scale, coarse to fine.
pub const DEFAULT_SCALES: [ScaleUnit; 7] = [
    ScaleUnit::Year,
    ScaleUnit::Quarter,
    ScaleUnit::Month,
    ScaleUnit::Week,
    ScaleUnit::Day,
    ScaleUnit::Hour,
    ScaleUnit::Minute,
];

/// Scales the aggregation service pre-computes; `none` is offered on top of these.
pub const AGGREGATED_SCALES: [ScaleUnit; 5] = [
    ScaleUnit::Year,
    ScaleUnit::Quarter,
    ScaleUnit::Month,
    ScaleUnit::Week,
    ScaleUnit::Day,
];

// Longest run of non-existent wall-clock hours we step over (DST gaps are one hour).
const MAX_GAP_HOURS: usize = 24;

/// Temporal granularity of an aggregation.
///
/// Variants are declared coarse to fine so the derived ordering can be used
/// directly; `None` sorts last and means "no grouping by time".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScaleUnit {
    Year,
    Quarter,
    Month,
    Week,
    Day,
    Hour,
    Minute,
    None,
}

impl ScaleUnit {
    pub fn as_str(self) -> &'static str {
        match self {
            ScaleUnit::Year => "year",
            ScaleUnit::Quarter => "quarter",
            ScaleUnit::Month => "month",
            ScaleUnit::Week => "week",
            ScaleUnit::Day => "day",
            ScaleUnit::Hour => "hour",
            ScaleUnit::Minute => "minute",
            ScaleUnit::None => "none",
        }
    }

    /// True for every scale that maps onto a calendar unit.
    pub fn is_calendar(self) -> bool {
        self != ScaleUnit::None
    }

    /// Start of the unit that contains `instant`, in the instant's own zone.
    ///
    /// Day and coarser units are aligned on the wall clock and resolved back
    /// into the zone; hours and minutes are aligned by stepping back the wall
    /// clock's minutes/seconds so the UTC offset in force is preserved.
    /// Returns `None` for `ScaleUnit::None`.
    pub fn truncate<Tz: TimeZone>(self, instant: &DateTime<Tz>) -> Option<DateTime<Tz>> {
        match self {
            ScaleUnit::Hour => {
                let past_hour = i64::from(instant.minute()) * 60 + i64::from(instant.second());
                Some(strip_subsec(instant) - TimeDelta::seconds(past_hour))
            }
            ScaleUnit::Minute => {
                Some(strip_subsec(instant) - TimeDelta::seconds(i64::from(instant.second())))
            }
            _ => {
                let wall = self.align_wall(instant)?;
                Some(resolve_local(&instant.timezone(), wall))
            }
        }
    }

    /// Add exactly one unit of this scale to `instant`.
    ///
    /// Calendar units (day and up) move the wall clock, so a day is 23 or 25
    /// hours across a DST change and a month follows the month length.
    /// Returns `None` for `ScaleUnit::None` or when the result is out of range.
    pub fn advance<Tz: TimeZone>(self, instant: &DateTime<Tz>) -> Option<DateTime<Tz>> {
        match self {
            ScaleUnit::Hour => instant.clone().checked_add_signed(TimeDelta::hours(1)),
            ScaleUnit::Minute => instant.clone().checked_add_signed(TimeDelta::minutes(1)),
            _ => {
                let next_wall = self.step_wall(instant.naive_local())?;
                Some(resolve_local(&instant.timezone(), next_wall))
            }
        }
    }

    /// Start and end of the unit containing `instant`.
    ///
    /// For day and coarser units both ends come from the aligned wall clock,
    /// so a start pushed forward by a DST gap at midnight does not push the
    /// end forward with it.
    pub fn bounds<Tz: TimeZone>(
        self,
        instant: &DateTime<Tz>,
    ) -> Option<(DateTime<Tz>, DateTime<Tz>)> {
        match self {
            ScaleUnit::Hour | ScaleUnit::Minute => {
                let start = self.truncate(instant)?;
                let end = self.advance(&start)?;
                Some((start, end))
            }
            _ => {
                let wall = self.align_wall(instant)?;
                let end_wall = self.step_wall(wall)?;
                let tz = instant.timezone();
                Some((resolve_local(&tz, wall), resolve_local(&tz, end_wall)))
            }
        }
    }

    /// Wall-clock midnight starting the calendar unit around `instant`.
    fn align_wall<Tz: TimeZone>(self, instant: &DateTime<Tz>) -> Option<NaiveDateTime> {
        let date = instant.naive_local().date();
        let first_of_month = date - TimeDelta::days(i64::from(date.day0()));
        let aligned = match self {
            ScaleUnit::Year => date - TimeDelta::days(i64::from(date.ordinal0())),
            ScaleUnit::Quarter => {
                let into_quarter = date.month0() % 3;
                first_of_month
                    .checked_sub_months(Months::new(into_quarter))
                    .unwrap_or(first_of_month)
            }
            ScaleUnit::Month => first_of_month,
            ScaleUnit::Week => {
                date - TimeDelta::days(i64::from(date.weekday().num_days_from_monday()))
            }
            ScaleUnit::Day => date,
            ScaleUnit::Hour | ScaleUnit::Minute | ScaleUnit::None => return None,
        };
        Some(aligned.and_time(NaiveTime::default()))
    }

    fn step_wall(self, wall: NaiveDateTime) -> Option<NaiveDateTime> {
        match self {
            ScaleUnit::Year => wall.checked_add_months(Months::new(12)),
            ScaleUnit::Quarter => wall.checked_add_months(Months::new(3)),
            ScaleUnit::Month => wall.checked_add_months(Months::new(1)),
            ScaleUnit::Week => wall.checked_add_days(Days::new(7)),
            ScaleUnit::Day => wall.checked_add_days(Days::new(1)),
            ScaleUnit::Hour | ScaleUnit::Minute | ScaleUnit::None => None,
        }
    }
}

fn strip_subsec<Tz: TimeZone>(instant: &DateTime<Tz>) -> DateTime<Tz> {
    instant.clone() - TimeDelta::nanoseconds(i64::from(instant.timestamp_subsec_nanos()))
}

/// Map a wall-clock time back into `tz`.
///
/// Ambiguous times (DST fall back) resolve to the earliest instant; times
/// inside a DST gap move forward an hour at a time until they exist.
pub fn resolve_local<Tz: TimeZone>(tz: &Tz, wall: NaiveDateTime) -> DateTime<Tz> {
    let mut candidate = wall;
    for _ in 0..MAX_GAP_HOURS {
        if let Some(instant) = tz.from_local_datetime(&candidate).earliest() {
            return instant;
        }
        candidate += TimeDelta::hours(1);
    }
    tz.from_utc_datetime(&wall)
}

impl fmt::Display for ScaleUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScaleUnit {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "year" => Ok(ScaleUnit::Year),
            "quarter" => Ok(ScaleUnit::Quarter),
            "month" => Ok(ScaleUnit::Month),
            "week" => Ok(ScaleUnit::Week),
            "day" => Ok(ScaleUnit::Day),
            "hour" => Ok(ScaleUnit::Hour),
            "minute" => Ok(ScaleUnit::Minute),
            "none" => Ok(ScaleUnit::None),
            other => Err(ParseError::UnknownScale(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, Utc};

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, s).unwrap()
    }

    #[test]
    fn test_truncate_each_scale() {
        let instant = utc(2021, 8, 19, 13, 47, 21);
        assert_eq!(ScaleUnit::Year.truncate(&instant), Some(utc(2021, 1, 1, 0, 0, 0)));
        assert_eq!(ScaleUnit::Quarter.truncate(&instant), Some(utc(2021, 7, 1, 0, 0, 0)));
        assert_eq!(ScaleUnit::Month.truncate(&instant), Some(utc(2021, 8, 1, 0, 0, 0)));
        // 2021-08-19 is a Thursday
        assert_eq!(ScaleUnit::Week.truncate(&instant), Some(utc(2021, 8, 16, 0, 0, 0)));
        assert_eq!(ScaleUnit::Day.truncate(&instant), Some(utc(2021, 8, 19, 0, 0, 0)));
        assert_eq!(ScaleUnit::Hour.truncate(&instant), Some(utc(2021, 8, 19, 13, 0, 0)));
        assert_eq!(ScaleUnit::Minute.truncate(&instant), Some(utc(2021, 8, 19, 13, 47, 0)));
        assert_eq!(ScaleUnit::None.truncate(&instant), None);
    }

    #[test]
    fn test_truncate_drops_subsecond_part() {
        let instant = utc(2021, 8, 19, 13, 47, 21) + TimeDelta::milliseconds(750);
        assert_eq!(ScaleUnit::Minute.truncate(&instant), Some(utc(2021, 8, 19, 13, 47, 0)));
    }

    #[test]
    fn test_truncate_keeps_zone() {
        let offset = FixedOffset::east_opt(5 * 3600 + 1800).unwrap();
        let instant = offset.with_ymd_and_hms(2022, 3, 10, 0, 15, 0).unwrap();
        let start = ScaleUnit::Year.truncate(&instant).unwrap();
        assert_eq!(start.naive_local().to_string(), "2022-01-01 00:00:00");
        assert_eq!(start.offset(), &offset);
        let hour = ScaleUnit::Hour.truncate(&instant).unwrap();
        assert_eq!(hour.naive_local().to_string(), "2022-03-10 00:00:00");
    }

    #[test]
    fn test_advance_follows_month_length() {
        let jan31 = utc(2024, 1, 31, 0, 0, 0);
        assert_eq!(ScaleUnit::Month.advance(&jan31), Some(utc(2024, 2, 29, 0, 0, 0)));
        let nov1 = utc(2023, 11, 1, 0, 0, 0);
        assert_eq!(ScaleUnit::Quarter.advance(&nov1), Some(utc(2024, 2, 1, 0, 0, 0)));
        assert_eq!(ScaleUnit::Year.advance(&nov1), Some(utc(2024, 11, 1, 0, 0, 0)));
        assert_eq!(ScaleUnit::Week.advance(&nov1), Some(utc(2023, 11, 8, 0, 0, 0)));
        assert_eq!(ScaleUnit::Minute.advance(&nov1), Some(utc(2023, 11, 1, 0, 1, 0)));
        assert_eq!(ScaleUnit::None.advance(&nov1), None);
    }

    #[test]
    fn test_resolve_local_single() {
        let wall = utc(2020, 5, 1, 12, 0, 0).naive_utc();
        assert_eq!(resolve_local(&Utc, wall), utc(2020, 5, 1, 12, 0, 0));
    }

    #[test]
    fn test_truncate_into_midnight_gap() {
        use chrono_tz::America::Sao_Paulo;
        // 2018-11-04 00:00 does not exist in Sao Paulo
        let instant = Sao_Paulo.with_ymd_and_hms(2018, 11, 4, 15, 30, 0).unwrap();
        let day = ScaleUnit::Day.truncate(&instant).unwrap();
        assert_eq!(day.to_rfc3339(), "2018-11-04T01:00:00-02:00");
        let hour = ScaleUnit::Hour.truncate(&instant).unwrap();
        assert_eq!(hour.to_rfc3339(), "2018-11-04T15:00:00-02:00");

        let (start, end) = ScaleUnit::Day.bounds(&instant).unwrap();
        assert_eq!(start, day);
        assert_eq!(end.to_rfc3339(), "2018-11-05T00:00:00-02:00");
        let before = Sao_Paulo.with_ymd_and_hms(2018, 11, 3, 9, 0, 0).unwrap();
        let (_, end) = ScaleUnit::Day.bounds(&before).unwrap();
        assert_eq!(end, start);
    }

    #[test]
    fn test_scale_order_is_coarse_to_fine() {
        let mut sorted = DEFAULT_SCALES;
        sorted.sort();
        assert_eq!(sorted, DEFAULT_SCALES);
        assert!(ScaleUnit::Minute < ScaleUnit::None);
    }

    #[test]
    fn test_parse_and_display() {
        for scale in DEFAULT_SCALES {
            assert_eq!(scale.as_str().parse::<ScaleUnit>(), Ok(scale));
        }
        assert_eq!(" Hour ".parse::<ScaleUnit>(), Ok(ScaleUnit::Hour));
        assert_eq!(
            "fortnight".parse::<ScaleUnit>(),
            Err(ParseError::UnknownScale("fortnight".to_string()))
        );
        assert_eq!(ScaleUnit::Quarter.to_string(), "quarter");
    }
}
