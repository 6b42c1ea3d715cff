mod args;
mod engine;
#[cfg(feature = "metrics")]
mod metrics;
mod reconcile;

use anyhow::Result;
use clap::Parser;

#[tokio::main]
async fn main() -> Result<()> {
    hcprp_common::init();
    tracing_subscriber::fmt::init();
    hcprp_common::metrics::maybe_spawn_metrics_server();

    let args = args::BackendArgs::parse();
    engine::run(args).await
}
