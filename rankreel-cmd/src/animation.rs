//! What the controller hands to whoever draws the bars.

use chrono::TimeZone;
use rankreel_core::{
    color::Color,
    ranking::{Entry, Ranking},
    window::TimeWindow,
};
use std::time::Duration;

/// One animated step from the displayed ranking to a freshly fetched one.
///
/// `from` and `to` line up index by index: `from[i]` is the value `to`'s
/// i-th key had on screen before (zero for keys that were not shown), and
/// `colors[i]` is that key's color.
#[derive(Debug, Clone)]
pub struct Transition<Tz: TimeZone> {
    pub window: TimeWindow<Tz>,
    pub from: Vec<Entry>,
    pub to: Ranking,
    pub colors: Vec<Color>,
    /// Largest value in the whole result set, for normalizing bar widths.
    pub largest_value: u64,
    pub duration: Duration,
}

impl<Tz: TimeZone> Transition<Tz> {
    /// Bar width for `value` as a fraction of the largest value.
    pub fn fraction(&self, value: u64) -> f64 {
        if self.largest_value == 0 {
            0.0
        } else {
            value as f64 / self.largest_value as f64
        }
    }

    pub fn len(&self) -> usize {
        self.to.len()
    }

    pub fn is_empty(&self) -> bool {
        self.to.is_empty()
    }
}

/// Receives the controller's display updates.
pub trait AnimationDriver<Tz: TimeZone>: Send {
    /// Start animating towards `transition.to`.
    fn begin(&mut self, transition: &Transition<Tz>);

    /// The pending ranking for `window` is now the displayed one.
    fn settle(&mut self, window: &TimeWindow<Tz>, ranking: &Ranking);

    /// The service had nothing for `window`; the display is now empty.
    fn no_results(&mut self, window: &TimeWindow<Tz>);
}

impl<Tz, A, B> AnimationDriver<Tz> for (A, B)
where
    Tz: TimeZone,
    A: AnimationDriver<Tz>,
    B: AnimationDriver<Tz>,
{
    fn begin(&mut self, transition: &Transition<Tz>) {
        self.0.begin(transition);
        self.1.begin(transition);
    }

    fn settle(&mut self, window: &TimeWindow<Tz>, ranking: &Ranking) {
        self.0.settle(window, ranking);
        self.1.settle(window, ranking);
    }

    fn no_results(&mut self, window: &TimeWindow<Tz>) {
        self.0.no_results(window);
        self.1.no_results(window);
    }
}

impl<Tz, D> AnimationDriver<Tz> for Option<D>
where
    Tz: TimeZone,
    D: AnimationDriver<Tz>,
{
    fn begin(&mut self, transition: &Transition<Tz>) {
        if let Some(driver) = self {
            driver.begin(transition);
        }
    }

    fn settle(&mut self, window: &TimeWindow<Tz>, ranking: &Ranking) {
        if let Some(driver) = self {
            driver.settle(window, ranking);
        }
    }

    fn no_results(&mut self, window: &TimeWindow<Tz>) {
        if let Some(driver) = self {
            driver.no_results(window);
        }
    }
}

/// The displayed ranking plus the one being animated towards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DisplaySnapshot {
    current: Ranking,
    pending: Option<Ranking>,
}

impl DisplaySnapshot {
    pub fn current(&self) -> &Ranking {
        &self.current
    }

    pub fn pending(&self) -> Option<&Ranking> {
        self.pending.as_ref()
    }

    pub fn is_animating(&self) -> bool {
        self.pending.is_some()
    }

    pub fn stage(&mut self, ranking: Ranking) {
        self.pending = Some(ranking);
    }

    /// Make the pending ranking the current one.
    pub fn promote(&mut self) -> Option<&Ranking> {
        let pending = self.pending.take()?;
        self.current = pending;
        Some(&self.current)
    }

    pub fn clear(&mut self) {
        self.current = Ranking::empty();
        self.pending = None;
    }
}
