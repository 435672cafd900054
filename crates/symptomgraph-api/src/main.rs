use anyhow::Context;
use symptomgraph_api::{telemetry, Server};
use symptomgraph_core::Settings;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // settings loading logs, so the subscriber goes first
    let log_filter = telemetry::init_tracing();
    let settings = Settings::load().context("loading settings")?;
    log_filter.apply_settings(&settings)?;

    Server::from_settings(&settings)?.run().await
}
