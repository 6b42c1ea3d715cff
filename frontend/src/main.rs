mod args;
mod errors;
mod handlers;
mod middleware;
mod server;
mod state;
mod validation;

use anyhow::Result;
use clap::Parser;

#[tokio::main]
async fn main() -> Result<()> {
    hcprp_common::init();
    tracing_subscriber::fmt::init();
    hcprp_common::metrics::maybe_spawn_metrics_server();

    let args = args::ServerArgs::parse();
    server::run_server(args).await
}
