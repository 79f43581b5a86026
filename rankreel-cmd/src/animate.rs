//! Run the refresh controller against a live aggregation endpoint.

use anyhow::anyhow;
use chrono::{DateTime, Datelike, Local, NaiveDate, NaiveTime};
use log::{info, warn};
use rankreel_core::{
    aggregation::Provider,
    http::HttpAggregationClient,
    names::Directory,
    period::{Mode, PeriodSelection},
    scale::{resolve_local, ScaleUnit},
};
use rankreel_utils::dates;
use std::sync::Arc;

use crate::{
    clock::SystemClock,
    config::Settings,
    controller::{Params, RefreshController},
    drivers::{CsvFrameDriver, LogDriver},
};

/// Years shown when no start date is given.
const DEFAULT_YEARS_BACK: i32 = 5;

/// Command line options of `animate`; anything left unset comes from the
/// settings file or the built-in defaults.
#[derive(Debug, Clone)]
pub struct AnimateOptions {
    pub config: Option<String>,
    pub endpoint: Option<String>,
    pub path: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub scale: ScaleUnit,
    pub provider: Option<Provider>,
    pub state: Option<String>,
    pub mode: Option<Mode>,
    pub include_unique: bool,
    pub refresh_ms: Option<u64>,
    pub frames_csv: Option<String>,
    pub names: Option<String>,
}

pub async fn run_animate(options: AnimateOptions) -> anyhow::Result<()> {
    let mut settings = match &options.config {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };
    if let Some(endpoint) = options.endpoint {
        settings.http.base_url = endpoint;
    }
    if let Some(path) = options.path {
        settings.http.path = path;
    }
    if let Some(provider) = options.provider {
        settings.controller.provider = provider;
    }
    if let Some(state) = options.state {
        settings.controller.state = state;
    }
    if let Some(mode) = options.mode {
        settings.controller.mode = mode;
    }
    if let Some(refresh_ms) = options.refresh_ms {
        settings.controller.refresh_ms = refresh_ms;
    }
    settings.controller.include_unique |= options.include_unique;
    settings.controller.validate()?;

    let today = Local::now();
    let from = match &options.from {
        Some(from) => dates::parse_local(from)?,
        None => default_from(&today)?,
    };
    let to = match &options.to {
        Some(to) => dates::parse_local(to)?,
        None => default_to(&today)?,
    };
    let selection = PeriodSelection::with_range(
        from.clone(),
        to.clone(),
        options.scale,
        settings.controller.mode,
    )?;
    if selection.scale() != options.scale {
        warn!(
            "Scale {} is not offered for this period, using {}",
            options.scale,
            selection.scale()
        );
    }

    let names = match &options.names {
        Some(path) => Directory::parse_csv(&std::fs::read_to_string(path)?)?,
        None => Directory::default(),
    };
    let frames = match &options.frames_csv {
        Some(path) => Some(CsvFrameDriver::create(path, names.clone())?),
        None => None,
    };
    let driver = (LogDriver::new(names), frames);

    let client = HttpAggregationClient::new(settings.http.clone())?;
    info!(
        "Animating {} to {} by {} ({}, {}) from {}",
        dates::format_minute(&from),
        dates::format_minute(&to),
        selection.scale(),
        settings.controller.provider,
        settings.controller.state,
        client.url()
    );

    let settle_delay = settings.controller.settle_delay();
    let params = Params {
        from,
        to,
        scale: selection.scale(),
        provider: settings.controller.provider,
        state: settings.controller.state.clone(),
    };
    let (controller, mut handle) = RefreshController::new(
        Arc::new(client),
        driver,
        SystemClock::new(Local),
        settings.controller,
        params,
    );
    let task = tokio::spawn(controller.run());

    tokio::select! {
        stopped = handle.stopped() => {
            stopped?;
            // let the last transition settle so its frame is written
            tokio::time::sleep(settle_delay).await;
        }
        interrupted = tokio::signal::ctrl_c() => {
            interrupted?;
            info!("Interrupted, stopping");
            handle.stop()?;
        }
    }
    drop(handle);
    task.await?;
    Ok(())
}

/// January 1st, some years back.
fn default_from(today: &DateTime<Local>) -> anyhow::Result<DateTime<Local>> {
    let year = today.year() - DEFAULT_YEARS_BACK;
    let date = NaiveDate::from_ymd_opt(year, 1, 1)
        .ok_or_else(|| anyhow!("no January 1st in year {}", year))?;
    Ok(resolve_local(&Local, date.and_time(NaiveTime::default())))
}

/// The end of today.
fn default_to(today: &DateTime<Local>) -> anyhow::Result<DateTime<Local>> {
    let tomorrow = today
        .date_naive()
        .succ_opt()
        .ok_or_else(|| anyhow!("no day after {}", today.date_naive()))?;
    Ok(resolve_local(&Local, tomorrow.and_time(NaiveTime::default())))
}
