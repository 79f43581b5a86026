//! Recording animation driver for unit testing.

use chrono::TimeZone;
use rankreel_core::{
    ranking::{Entry, Ranking},
    window::TimeWindow,
};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::animation::{AnimationDriver, Transition};

/// A driver call, with windows reduced to their labels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverEvent {
    Begin {
        window: String,
        from: Vec<Entry>,
        to: Vec<Entry>,
        largest_value: u64,
    },
    Settle {
        window: String,
        ranking: Vec<Entry>,
    },
    NoResults {
        window: String,
    },
}

impl DriverEvent {
    pub fn window(&self) -> &str {
        match self {
            DriverEvent::Begin { window, .. }
            | DriverEvent::Settle { window, .. }
            | DriverEvent::NoResults { window } => window,
        }
    }
}

/// Records every call; clones share the same record.
#[derive(Debug, Clone, Default)]
pub struct RecordingDriver {
    events: Arc<Mutex<Vec<DriverEvent>>>,
}

impl RecordingDriver {
    pub fn events(&self) -> Vec<DriverEvent> {
        self.lock().clone()
    }

    /// Labels of the windows that began a transition.
    pub fn begun(&self) -> Vec<String> {
        self.lock()
            .iter()
            .filter(|event| matches!(event, DriverEvent::Begin { .. }))
            .map(|event| event.window().to_string())
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<DriverEvent>> {
        match self.events.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl<Tz: TimeZone> AnimationDriver<Tz> for RecordingDriver {
    fn begin(&mut self, transition: &Transition<Tz>) {
        self.lock().push(DriverEvent::Begin {
            window: transition.window.label(),
            from: transition.from.clone(),
            to: transition.to.entries().to_vec(),
            largest_value: transition.largest_value,
        });
    }

    fn settle(&mut self, window: &TimeWindow<Tz>, ranking: &Ranking) {
        self.lock().push(DriverEvent::Settle {
            window: window.label(),
            ranking: ranking.entries().to_vec(),
        });
    }

    fn no_results(&mut self, window: &TimeWindow<Tz>) {
        self.lock().push(DriverEvent::NoResults {
            window: window.label(),
        });
    }
}
