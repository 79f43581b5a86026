//! rankreel CLI - replay login rankings as an animated, window-by-window feed.

use clap::Parser;

#[derive(Parser)]
#[command(
    name = "rankreel-cli",
    version,
    about = "Animated login rankings from an aggregation service"
)]
struct Cli {
    #[command(subcommand)]
    command: rankreel_cmd::Command,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    log::debug!("rankreel-cli {}", env!("CARGO_PKG_VERSION"));
    rankreel_cmd::run(cli.command).await
}
