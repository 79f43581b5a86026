//! Shared utility functions for rankreel crates.

/// Date utility functions
pub mod dates {
    use anyhow::anyhow;
    use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};

    /// Parse a date string in "YYYY-MM-DD" format
    pub fn parse_date(s: &str) -> anyhow::Result<NaiveDate> {
        Ok(NaiveDate::parse_from_str(s, "%Y-%m-%d")?)
    }

    /// Parse a wall-clock time: RFC 3339 offsets are dropped, a bare
    /// "YYYY-MM-DD" means midnight, "YYYY-MM-DD HH:MM" is also accepted.
    pub fn parse_wall(s: &str) -> anyhow::Result<NaiveDateTime> {
        let s = s.trim();
        if let Ok(instant) = DateTime::parse_from_rfc3339(s) {
            return Ok(instant.naive_local());
        }
        for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"] {
            if let Ok(wall) = NaiveDateTime::parse_from_str(s, format) {
                return Ok(wall);
            }
        }
        Ok(parse_date(s)
            .map_err(|e| anyhow!("invalid date {:?}: {}", s, e))?
            .and_time(NaiveTime::default()))
    }

    /// Parse a date or date-time in `tz`. Times that do not exist on the
    /// local clock are rejected, ambiguous ones resolve to the earliest.
    pub fn parse_in<Tz: TimeZone>(tz: &Tz, s: &str) -> anyhow::Result<DateTime<Tz>> {
        let wall = parse_wall(s)?;
        tz.from_local_datetime(&wall)
            .earliest()
            .ok_or_else(|| anyhow!("{} does not exist in the local time zone", wall))
    }

    /// Parse a date or date-time in the local time zone.
    pub fn parse_local(s: &str) -> anyhow::Result<DateTime<Local>> {
        parse_in(&Local, s)
    }

    /// Format an instant as "YYYY-MM-DD HH:MM" in its own time zone
    pub fn format_minute<Tz: TimeZone>(instant: &DateTime<Tz>) -> String {
        instant.naive_local().format("%Y-%m-%d %H:%M").to_string()
    }

}
