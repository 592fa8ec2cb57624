//! Harvest - collect business contact emails from a map directory.
//!
//! Thin front end over the harvester engine: it loads configuration, wires
//! up logging and the browser, and exposes start/stop/status/clear as
//! subcommands.

mod commands;

use harvest_core::RecentLogs;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_FILTER: &str = "info,harvest=debug,chromiumoxide=warn";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let logs = RecentLogs::default();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_FILTER.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .with(logs.layer())
        .init();

    commands::run(logs).await
}
