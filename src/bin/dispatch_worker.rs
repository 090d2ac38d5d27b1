//! Queue worker entrypoint: load configuration, connect, migrate, poll.

use anyhow::Context;

use dispatch_core::config::EngineConfig;
use dispatch_core::database::{establish_pool, run_migrations};
use dispatch_core::logging::init_structured_logging;
use dispatch_core::worker::QueueWorker;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_structured_logging();

    let config = EngineConfig::load().context("failed to load engine configuration")?;
    let pool = establish_pool(&config.database)
        .await
        .context("failed to establish database pool")?;
    run_migrations(&pool)
        .await
        .context("failed to run schema migrations")?;

    let worker = QueueWorker::new(pool, config.worker, config.retry);
    worker.run().await.context("worker loop terminated")?;
    Ok(())
}
