//! Scale constraints for a selected period.
//!
//! A period selector offers the finer scales only for short spans: `minute`
//! disappears once the span exceeds a week and `hour` once it exceeds a year.
//! `PeriodSelection` enforces that at the selector boundary so the refresh
//! controller never receives a scale that is not on offer.

use chrono::{DateTime, NaiveTime, TimeZone};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use crate::{
    error::{ParseError, PeriodError},
    scale::{resolve_local, ScaleUnit, AGGREGATED_SCALES, DEFAULT_SCALES},
};

/// Spans longer than this many days do not offer `minute`.
pub const MINUTE_MAX_DAYS: f64 = 7.0;
/// Spans longer than this many days do not offer `hour`.
pub const HOUR_MAX_DAYS: f64 = 365.0;

const MILLIS_PER_DAY: f64 = 24.0 * 3600.0 * 1000.0;

/// Whether the selector feeds raw per-login views or pre-aggregated ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Raw,
    #[default]
    Aggregate,
}

/// The scales on offer and the (possibly demoted) selected scale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScaleOffer {
    pub offered: Vec<ScaleUnit>,
    pub scale: ScaleUnit,
}

/// Absolute distance between two instants in (fractional) days.
pub fn days_between<Tz: TimeZone>(a: &DateTime<Tz>, b: &DateTime<Tz>) -> f64 {
    (a.clone() - b.clone()).num_milliseconds().abs() as f64 / MILLIS_PER_DAY
}

/// Scales offered for a span of `days_diff` days.
///
/// Always recomputed from the canonical list, never narrowed from a previous
/// offer, so widening and then shrinking the span brings the fine scales back.
pub fn offered_scales(days_diff: f64, mode: Mode) -> Vec<ScaleUnit> {
    let mut scales: Vec<ScaleUnit> = DEFAULT_SCALES
        .iter()
        .copied()
        .filter(|scale| match scale {
            ScaleUnit::Minute => days_diff <= MINUTE_MAX_DAYS,
            ScaleUnit::Hour => days_diff <= HOUR_MAX_DAYS,
            _ => true,
        })
        .collect();
    if mode == Mode::Aggregate {
        scales.retain(|scale| AGGREGATED_SCALES.contains(scale));
        scales.push(ScaleUnit::None);
    }
    scales
}

/// Offer for `days_diff` with `scale` demoted when it is no longer allowed.
///
/// `minute` demotes to `hour` and `hour` to `day`; in aggregate mode a scale
/// still outside the allow-list falls back to the finest offered scale that
/// is coarser than it.
pub fn constrain(days_diff: f64, scale: ScaleUnit, mode: Mode) -> ScaleOffer {
    let mut scale = scale;
    if days_diff > MINUTE_MAX_DAYS && scale == ScaleUnit::Minute {
        scale = ScaleUnit::Hour;
    }
    if days_diff > HOUR_MAX_DAYS && scale == ScaleUnit::Hour {
        scale = ScaleUnit::Day;
    }
    let offered = offered_scales(days_diff, mode);
    if !offered.contains(&scale) {
        scale = offered
            .iter()
            .copied()
            .filter(|candidate| candidate.is_calendar() && *candidate < scale)
            .max()
            .unwrap_or(ScaleUnit::Day);
    }
    ScaleOffer { offered, scale }
}

/// Value produced by a committed date.
#[derive(Debug, Clone, PartialEq)]
pub struct Committed<Tz: TimeZone> {
    pub value: DateTime<Tz>,
    /// Set when the commit demoted the selected scale.
    pub demoted_to: Option<ScaleUnit>,
}

/// Controlled state of a period selector: `from`, `to` and `scale`.
#[derive(Debug, Clone)]
pub struct PeriodSelection<Tz: TimeZone> {
    from: Option<DateTime<Tz>>,
    to: Option<DateTime<Tz>>,
    scale: ScaleUnit,
    mode: Mode,
    offered: Vec<ScaleUnit>,
}

impl<Tz: TimeZone> PeriodSelection<Tz> {
    /// Empty selection; `day` is selected until the user picks something.
    pub fn new(mode: Mode) -> Self {
        PeriodSelection {
            from: None,
            to: None,
            scale: ScaleUnit::Day,
            mode,
            offered: offered_scales(0.0, mode),
        }
    }

    /// Selection with both endpoints set, constraining `scale` to the span.
    pub fn with_range(
        from: DateTime<Tz>,
        to: DateTime<Tz>,
        scale: ScaleUnit,
        mode: Mode,
    ) -> Result<Self, PeriodError> {
        check_order(&from, &to)?;
        let offer = constrain(days_between(&from, &to), scale, mode);
        Ok(PeriodSelection {
            from: Some(from),
            to: Some(to),
            scale: offer.scale,
            mode,
            offered: offer.offered,
        })
    }

    pub fn from(&self) -> Option<&DateTime<Tz>> {
        self.from.as_ref()
    }

    pub fn to(&self) -> Option<&DateTime<Tz>> {
        self.to.as_ref()
    }

    pub fn scale(&self) -> ScaleUnit {
        self.scale
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn offered(&self) -> &[ScaleUnit] {
        &self.offered
    }

    /// Commit a new `from`. The first commit is snapped to the start of its day.
    pub fn commit_from(&mut self, value: DateTime<Tz>) -> Result<Committed<Tz>, PeriodError> {
        let value = match self.from {
            None => start_of_day(&value),
            Some(_) => value,
        };
        if let Some(to) = &self.to {
            check_order(&value, to)?;
        }
        self.from = Some(value.clone());
        let demoted_to = self.recompute();
        Ok(Committed { value, demoted_to })
    }

    /// Commit a new `to`. The first commit is snapped to the start of its day.
    pub fn commit_to(&mut self, value: DateTime<Tz>) -> Result<Committed<Tz>, PeriodError> {
        let value = match self.to {
            None => start_of_day(&value),
            Some(_) => value,
        };
        if let Some(from) = &self.from {
            check_order(from, &value)?;
        }
        self.to = Some(value.clone());
        let demoted_to = self.recompute();
        Ok(Committed { value, demoted_to })
    }

    /// Select a scale; anything not currently offered is rejected.
    pub fn select_scale(&mut self, scale: ScaleUnit) -> Result<(), PeriodError> {
        if !self.offered.contains(&scale) {
            return Err(PeriodError::InvalidScale { scale });
        }
        self.scale = scale;
        Ok(())
    }

    fn recompute(&mut self) -> Option<ScaleUnit> {
        let days_diff = match (&self.from, &self.to) {
            (Some(from), Some(to)) => days_between(from, to),
            _ => return None,
        };
        let offer = constrain(days_diff, self.scale, self.mode);
        self.offered = offer.offered;
        if offer.scale != self.scale {
            self.scale = offer.scale;
            Some(offer.scale)
        } else {
            None
        }
    }
}

fn check_order<Tz: TimeZone>(from: &DateTime<Tz>, to: &DateTime<Tz>) -> Result<(), PeriodError> {
    if from > to {
        return Err(PeriodError::InvertedRange {
            from: from.naive_local().to_string(),
            to: to.naive_local().to_string(),
        });
    }
    Ok(())
}

fn start_of_day<Tz: TimeZone>(value: &DateTime<Tz>) -> DateTime<Tz> {
    let wall = value.naive_local().date().and_time(NaiveTime::default());
    resolve_local(&value.timezone(), wall)
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Raw => f.write_str("raw"),
            Mode::Aggregate => f.write_str("aggregate"),
        }
    }
}

impl FromStr for Mode {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "raw" => Ok(Mode::Raw),
            "aggregate" => Ok(Mode::Aggregate),
            other => Err(ParseError::UnknownMode(other.to_string())),
        }
    }
}
