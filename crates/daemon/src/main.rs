// atelierd: workspace registry and content server daemon.

use anyhow::Context;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    info!("starting atelier daemon");
    atelier_daemon::runtime::run_standalone().await.context("daemon terminated unexpectedly")
}
