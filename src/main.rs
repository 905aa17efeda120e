use catalog_ops::app::{build_router, AppState};
use catalog_ops::config::AppConfig;
use catalog_ops::executor::executor::TaskExecutor;
use catalog_ops::observability::init_tracing;
use std::time::Duration;

const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::from_env()?;
    tracing::info!(
        bind = %config.bind_addr,
        upload_dir = %config.upload_dir.display(),
        workers = config.workers,
        "Starting catalog service"
    );

    // 1. Stores and shared services:
    let state = AppState::in_memory(&config);

    // 2. Task executor:
    let registry = state.task_handlers();
    tracing::info!("Task handlers: {:?}", registry.list_handlers());
    let executor = TaskExecutor::new(state.queue.clone(), registry, config.workers);
    executor.start().await;

    // 3. Spawn sweeper for expired progress snapshots, finished tasks and idle stream topics:
    let sweep_state = state.clone();
    let task_retention = config.progress_ttl;
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SWEEP_INTERVAL);

        loop {
            interval.tick().await;
            match sweep_state.progress.sweep_expired().await {
                Ok(0) => {}
                Ok(evicted) => tracing::debug!("Evicted {} expired progress snapshots", evicted),
                Err(e) => tracing::warn!("Progress sweep failed: {}", e),
            }
            let evicted = sweep_state.queue.evict_finished(task_retention);
            if evicted > 0 {
                tracing::debug!("Evicted {} finished tasks", evicted);
            }
            let pruned = sweep_state.broker.prune_idle();
            if pruned > 0 {
                tracing::debug!("Pruned {} idle stream topics", pruned);
            }
            let (pending, running, completed, failed) = sweep_state.queue.status_counts();
            tracing::info!(
                "Task stats: {} pending, {} running, {} completed, {} failed",
                pending,
                running,
                completed,
                failed
            );
        }
    });

    // 4. Start HTTP server:
    let app = build_router(state);
    tracing::info!("HTTP server listening on {}", config.bind_addr);
    tracing::info!("Press Ctrl+C to shutdown");

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
