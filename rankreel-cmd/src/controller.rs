//! The polling loop behind the animation.
//!
//! A `RefreshController` runs as one task. It fetches the window containing
//! its anchor right away, then advances one scale unit per refresh tick
//! until the next window would start after "now". Every response is merged
//! with what is on display and handed to an `AnimationDriver`.
//!
//! Changing any parameter through the `ControllerHandle` cancels the timer
//! and any fetch in flight and starts over with the new parameters, keeping
//! the colors and the ranking on display.

use chrono::{DateTime, TimeZone};
use log::{debug, info, warn};
use rankreel_core::{
    aggregation::{Aggregation, AggregationClient, AggregationRequest, Provider},
    color::ColorTable,
    error::AggregationError,
    ranking::{merge, Ranking, Tally},
    scale::ScaleUnit,
    window::{compute_window, TimeWindow},
};
use std::{future, sync::Arc, time::Duration};
use thiserror::Error;
use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
    time::{self, Instant, Interval, MissedTickBehavior},
};

use crate::{
    animation::{AnimationDriver, DisplaySnapshot, Transition},
    clock::Clock,
    config::ControllerConfig,
};

// `interval_at` rejects a zero period.
const MIN_REFRESH_PERIOD: Duration = Duration::from_millis(1);

/// Where the polling loop is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Not started yet.
    Idle,
    /// Waiting for the next tick.
    Scheduled,
    /// A request is outstanding; the timer keeps running.
    Fetching,
    /// No timer armed. The last data stays on display.
    Stopped,
}

/// What to show.
#[derive(Debug, Clone, PartialEq)]
pub struct Params<Tz: TimeZone> {
    pub from: DateTime<Tz>,
    pub to: DateTime<Tz>,
    pub scale: ScaleUnit,
    pub provider: Provider,
    pub state: String,
}

/// A committed change to one of the parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum Change<Tz: TimeZone> {
    /// Also moves the anchor.
    From(DateTime<Tz>),
    To(DateTime<Tz>),
    Scale(ScaleUnit),
    Provider(Provider),
    State(String),
}

#[derive(Debug)]
enum Command<Tz: TimeZone> {
    Change(Change<Tz>),
    Stop,
    TransitionComplete,
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerError {
    #[error("the refresh controller has shut down")]
    Closed,
}

/// Talks to a running controller. The controller shuts down once every
/// handle is dropped.
#[derive(Debug, Clone)]
pub struct ControllerHandle<Tz: TimeZone> {
    commands: mpsc::UnboundedSender<Command<Tz>>,
    phase: watch::Receiver<Phase>,
}

impl<Tz: TimeZone> ControllerHandle<Tz> {
    /// Apply a change and restart polling.
    pub fn change(&self, change: Change<Tz>) -> Result<(), ControllerError> {
        self.send(Command::Change(change))
    }

    /// Cancel the timer. Safe to call any number of times.
    pub fn stop(&self) -> Result<(), ControllerError> {
        self.send(Command::Stop)
    }

    /// The driver finished animating; promote the pending ranking now.
    pub fn transition_complete(&self) -> Result<(), ControllerError> {
        self.send(Command::TransitionComplete)
    }

    pub fn phase(&self) -> Phase {
        *self.phase.borrow()
    }

    /// Wait until the loop stops, either by reaching "now" or by `stop`.
    pub async fn stopped(&mut self) -> Result<(), ControllerError> {
        self.phase
            .wait_for(|phase| *phase == Phase::Stopped)
            .await
            .map(|_| ())
            .map_err(|_| ControllerError::Closed)
    }

    fn send(&self, command: Command<Tz>) -> Result<(), ControllerError> {
        self.commands
            .send(command)
            .map_err(|_| ControllerError::Closed)
    }
}

struct InFlight<Tz: TimeZone> {
    token: u64,
    window: TimeWindow<Tz>,
    task: JoinHandle<()>,
}

struct Outcome {
    token: u64,
    result: Result<Aggregation, AggregationError>,
}

pub struct RefreshController<Tz, C, D>
where
    Tz: TimeZone,
{
    client: Arc<C>,
    driver: D,
    clock: Box<dyn Clock<Tz>>,
    config: ControllerConfig,
    params: Params<Tz>,
    anchor: DateTime<Tz>,
    // Whether `anchor` was taken from a response since the last start.
    anchored: bool,
    colors: ColorTable,
    display: DisplaySnapshot,
    largest_value: u64,
    timer: Option<Interval>,
    token: u64,
    in_flight: Option<InFlight<Tz>>,
    animating: Option<TimeWindow<Tz>>,
    queued: Option<(TimeWindow<Tz>, Tally)>,
    settle_at: Option<Instant>,
    commands: mpsc::UnboundedReceiver<Command<Tz>>,
    outcomes_tx: mpsc::UnboundedSender<Outcome>,
    outcomes: mpsc::UnboundedReceiver<Outcome>,
    phase: watch::Sender<Phase>,
}

impl<Tz, C, D> RefreshController<Tz, C, D>
where
    Tz: TimeZone,
    C: AggregationClient + 'static,
    D: AnimationDriver<Tz>,
{
    pub fn new(
        client: Arc<C>,
        driver: D,
        clock: impl Clock<Tz> + 'static,
        config: ControllerConfig,
        params: Params<Tz>,
    ) -> (Self, ControllerHandle<Tz>) {
        let (commands_tx, commands) = mpsc::unbounded_channel();
        let (outcomes_tx, outcomes) = mpsc::unbounded_channel();
        let (phase, phase_rx) = watch::channel(Phase::Idle);
        let controller = RefreshController {
            client,
            driver,
            clock: Box::new(clock),
            config,
            anchor: params.from.clone(),
            params,
            anchored: false,
            colors: ColorTable::new(),
            display: DisplaySnapshot::default(),
            largest_value: 0,
            timer: None,
            token: 0,
            in_flight: None,
            animating: None,
            queued: None,
            settle_at: None,
            commands,
            outcomes_tx,
            outcomes,
            phase,
        };
        let handle = ControllerHandle {
            commands: commands_tx,
            phase: phase_rx,
        };
        (controller, handle)
    }

    /// Replace the color table, e.g. with one on a seeded generator.
    pub fn with_colors(mut self, colors: ColorTable) -> Self {
        self.colors = colors;
        self
    }

    /// Poll until every handle is dropped.
    pub async fn run(mut self) {
        self.start();
        loop {
            tokio::select! {
                biased;
                command = self.commands.recv() => match command {
                    Some(command) => self.on_command(command),
                    None => break,
                },
                Some(outcome) = self.outcomes.recv() => self.on_outcome(outcome),
                _ = sleep_until(self.settle_at) => self.settle(),
                _ = next_tick(&mut self.timer) => self.on_tick(),
            }
        }
        self.stop();
        debug!("Refresh controller shut down");
    }

    fn on_command(&mut self, command: Command<Tz>) {
        match command {
            Command::Change(change) => self.reset(change),
            Command::Stop => {
                self.drop_queued();
                self.stop();
            }
            Command::TransitionComplete => {
                if self.display.is_animating() {
                    self.settle();
                }
            }
        }
    }

    /// Arm the timer (if not armed yet) and fetch the window for the anchor as is.
    fn start(&mut self) {
        if self.timer.is_none() {
            let period = self.config.refresh_period().max(MIN_REFRESH_PERIOD);
            let mut timer = time::interval_at(Instant::now() + period, period);
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
            self.timer = Some(timer);
        }
        self.anchored = false;
        match self.anchor_window() {
            Some(window) => self.request(window),
            None => self.halt(),
        }
    }

    fn reset(&mut self, change: Change<Tz>) {
        match change {
            Change::From(from) => {
                self.anchor = from.clone();
                self.params.from = from;
            }
            Change::To(to) => self.params.to = to,
            Change::Scale(scale) => self.params.scale = scale,
            Change::Provider(provider) => self.params.provider = provider,
            Change::State(state) => self.params.state = state,
        }
        info!(
            "Restarting at {} ({}, {}, {})",
            self.anchor.naive_local(),
            self.params.scale,
            self.params.provider,
            self.params.state
        );
        self.drop_queued();
        self.cancel();
        self.start();
    }

    fn anchor_window(&self) -> Option<TimeWindow<Tz>> {
        match self.params.scale {
            ScaleUnit::None => Some(TimeWindow::ungrouped(
                self.params.from.clone(),
                self.params.to.clone(),
            )),
            scale => compute_window(&self.anchor, scale),
        }
    }

    fn on_tick(&mut self) {
        if let Some(in_flight) = &self.in_flight {
            debug!("Tick skipped, {} still in flight", in_flight.window.label());
            return;
        }
        if !self.anchored {
            // the last attempt at the starting window failed; try it again
            match self.anchor_window() {
                Some(window) => self.request(window),
                None => self.halt(),
            }
            return;
        }
        let next = match self.params.scale {
            ScaleUnit::None => None,
            scale => scale
                .advance(&self.anchor)
                .and_then(|advanced| compute_window(&advanced, scale)),
        };
        match next {
            Some(window) if window.start <= self.clock.now() => self.request(window),
            _ => self.halt(),
        }
    }

    fn request(&mut self, window: TimeWindow<Tz>) {
        self.token += 1;
        let token = self.token;
        let request = AggregationRequest::for_window(
            &window,
            self.params.provider.group_by(),
            &self.params.state,
            self.config.include_unique,
        );
        info!("Fetching {} grouped by {}", request.label(), self.params.provider);
        let client = Arc::clone(&self.client);
        let outcomes = self.outcomes_tx.clone();
        let task = tokio::spawn(async move {
            let result = client.fetch(&request).await;
            // the controller may be gone already
            let _ = outcomes.send(Outcome { token, result });
        });
        self.in_flight = Some(InFlight {
            token,
            window,
            task,
        });
        self.set_phase(Phase::Fetching);
    }

    fn on_outcome(&mut self, outcome: Outcome) {
        let window = match self.in_flight.take() {
            Some(in_flight) if in_flight.token == outcome.token => in_flight.window,
            other => {
                debug!("Discarding stale response #{}", outcome.token);
                self.in_flight = other;
                return;
            }
        };
        self.set_phase(Phase::Scheduled);
        let aggregation = match outcome.result {
            Ok(aggregation) => aggregation,
            Err(e) => {
                warn!("Fetching {} failed, keeping the current ranking: {}", window.label(), e);
                return;
            }
        };
        self.anchor = window.start.clone();
        self.anchored = true;
        if aggregation.is_empty() {
            info!("{}: no results", window.label());
            self.display.clear();
            self.largest_value = 0;
            self.animating = None;
            self.queued = None;
            self.settle_at = None;
            self.driver.no_results(&window);
            return;
        }
        let counts = aggregation.counts(self.params.provider.key_field());
        let tally = Ranking::top(counts, self.config.max_display);
        if self.display.is_animating() {
            debug!("{} queued behind the running transition", window.label());
            self.queued = Some((window, tally));
        } else {
            self.begin_transition(window, tally);
        }
    }

    fn begin_transition(&mut self, window: TimeWindow<Tz>, tally: Tally) {
        let merged = merge(self.display.current(), tally);
        let colors = merged
            .new
            .iter()
            .map(|entry| self.colors.color_for(&entry.key))
            .collect();
        self.largest_value = merged.largest_value;
        let transition = Transition {
            window: window.clone(),
            from: merged.old,
            to: merged.new,
            colors,
            largest_value: merged.largest_value,
            duration: self.config.animation_duration(),
        };
        self.driver.begin(&transition);
        self.display.stage(transition.to);
        self.animating = Some(window);
        self.settle_at = Some(Instant::now() + self.config.settle_delay());
    }

    /// Promote the pending ranking, then start whatever arrived meanwhile.
    fn settle(&mut self) {
        self.settle_at = None;
        if let Some(window) = self.animating.take() {
            if let Some(current) = self.display.promote() {
                self.driver.settle(&window, current);
            }
        }
        if let Some((window, tally)) = self.queued.take() {
            self.begin_transition(window, tally);
        }
    }

    /// The loop caught up with "now".
    fn halt(&mut self) {
        info!(
            "Caught up at {} with {} entries on display (largest {})",
            self.anchor.naive_local(),
            self.display.current().len(),
            self.largest_value
        );
        self.stop();
    }

    fn stop(&mut self) {
        self.cancel();
        self.set_phase(Phase::Stopped);
    }

    fn cancel(&mut self) {
        self.timer = None;
        if let Some(in_flight) = self.in_flight.take() {
            debug!("Cancelling request for {}", in_flight.window.label());
            in_flight.task.abort();
        }
    }

    /// Forget a ranking waiting behind the running transition.
    fn drop_queued(&mut self) {
        if let Some((window, _)) = self.queued.take() {
            debug!("Dropping queued ranking for {}", window.label());
        }
    }

    fn set_phase(&self, phase: Phase) {
        self.phase.send_if_modified(|current| {
            if *current == phase {
                false
            } else {
                *current = phase;
                true
            }
        });
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => time::sleep_until(deadline).await,
        None => future::pending().await,
    }
}

async fn next_tick(timer: &mut Option<Interval>) {
    match timer {
        Some(timer) => {
            timer.tick().await;
        }
        None => future::pending().await,
    }
}
