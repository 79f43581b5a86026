//! Command implementations for the rankreel CLI.
//!
//! Hosts the refresh controller that drives the animation, its drivers and
//! settings, and the subcommands built on them.

use clap::Subcommand;
use rankreel_core::{aggregation::Provider, period::Mode, scale::ScaleUnit};

pub mod animate;
pub mod animation;
pub mod clock;
pub mod config;
pub mod controller;
pub mod drivers;
pub mod inspect;
pub mod mock;

#[derive(Subcommand)]
pub enum Command {
    /// Poll the aggregation endpoint window by window and log each transition
    Animate {
        /// Settings file (JSON) with `controller` and `http` sections
        #[arg(short = 'c', long)]
        config: Option<String>,

        /// Base URL of the aggregation service
        #[arg(short = 'e', long)]
        endpoint: Option<String>,

        /// Endpoint path, e.g. api/public/login_top
        #[arg(long)]
        path: Option<String>,

        /// First window anchor (YYYY-MM-DD or RFC 3339); defaults to January 1st five years ago
        #[arg(short = 'f', long)]
        from: Option<String>,

        /// End of the period; defaults to the end of today
        #[arg(short = 't', long)]
        to: Option<String>,

        /// year, quarter, month, week, day, hour, minute or none
        #[arg(short = 's', long, default_value = "year")]
        scale: ScaleUnit,

        /// Rank service providers (sp) or identity providers (idp)
        #[arg(short = 'p', long)]
        provider: Option<Provider>,

        /// State filter, e.g. prodaccepted or testaccepted
        #[arg(long)]
        state: Option<String>,

        /// raw or aggregate; aggregate only offers year to day
        #[arg(long)]
        mode: Option<Mode>,

        /// Count unique users instead of logins
        #[arg(long)]
        include_unique: bool,

        /// Milliseconds between two polls
        #[arg(long)]
        refresh_ms: Option<u64>,

        /// Write every settled ranking to this CSV file
        #[arg(long)]
        frames_csv: Option<String>,

        /// CSV with `entity_id,name` rows used to label entities
        #[arg(short = 'n', long)]
        names: Option<String>,
    },

    /// List successive windows and their period codes
    Windows {
        #[arg(short = 'f', long)]
        from: String,

        #[arg(short = 's', long, default_value = "year")]
        scale: ScaleUnit,

        #[arg(long, default_value_t = 10)]
        count: usize,
    },

    /// Show which scales a period allows
    Scales {
        #[arg(short = 'f', long)]
        from: String,

        #[arg(short = 't', long)]
        to: String,

        /// Restrict to the pre-aggregated scales
        #[arg(long)]
        aggregate: bool,

        #[arg(short = 's', long, default_value = "day")]
        scale: ScaleUnit,
    },
}

pub async fn run(command: Command) -> anyhow::Result<()> {
    match command {
        Command::Animate {
            config,
            endpoint,
            path,
            from,
            to,
            scale,
            provider,
            state,
            mode,
            include_unique,
            refresh_ms,
            frames_csv,
            names,
        } => {
            animate::run_animate(animate::AnimateOptions {
                config,
                endpoint,
                path,
                from,
                to,
                scale,
                provider,
                state,
                mode,
                include_unique,
                refresh_ms,
                frames_csv,
                names,
            })
            .await
        }
        Command::Windows { from, scale, count } => inspect::run_windows(&from, scale, count),
        Command::Scales {
            from,
            to,
            aggregate,
            scale,
        } => {
            let mode = if aggregate { Mode::Aggregate } else { Mode::Raw };
            inspect::run_scales(&from, &to, mode, scale)
        }
    }
}
