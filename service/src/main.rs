use std::sync::Arc;

use log::{error, info, warn};
use tokio::sync::watch;

use icon_worker::config::{load_config, DeliveryMode, LogFormat, LoggingSettings, WorkerConfig};
use icon_worker::db::{self, SeaOrmFileStore};
use icon_worker::logging::init_tracing;
use icon_worker::queue::{self, JobQueue, RedisJobQueue, RedisNotifier};
use icon_worker::storage::S3BlobStore;
use icon_worker::worker::{spawn_sweeper, sweep_interval};
use icon_worker::{Controller, ControllerOptions, IconWorkerError, Pipeline, PipelineConfig};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            let fallback = LoggingSettings {
                format: LogFormat::Text,
                filter: "info".to_string(),
            };
            if init_tracing(&fallback).is_err() {
                eprintln!("icon-worker: {}", e);
            }
            error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = init_tracing(&config.logging) {
        eprintln!("icon-worker: {}", e);
        std::process::exit(1);
    }

    if let Err(e) = run(config).await {
        error!("Startup failed: {}", e);
        std::process::exit(1);
    }
}

async fn run(config: WorkerConfig) -> Result<(), IconWorkerError> {
    info!("Starting icon worker v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration: {:?}", config);

    let files = Arc::new(SeaOrmFileStore::new(db::connect(&config.database).await?));

    let blobs = Arc::new(S3BlobStore::new(&config.storage));
    if let Err(e) = blobs.check_bucket().await {
        warn!("Bucket '{}' is not reachable yet: {}", blobs.bucket(), e);
    }

    // One connection per concern: a blocking pop holds its connection.
    let jobs: Arc<dyn JobQueue> = Arc::new(RedisJobQueue::new(
        queue::connect(&config.redis).await?,
        &config.queue,
    ));
    let notifier = Arc::new(RedisNotifier::new(
        queue::connect(&config.redis).await?,
        config.queue.channel.clone(),
    ));
    info!(
        "Consuming '{}' ({} delivery), publishing to '{}'",
        config.queue.name, config.queue.delivery, config.queue.channel
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let sweeper = match config.queue.delivery {
        DeliveryMode::Claim => {
            let sweeper_queue: Arc<dyn JobQueue> = Arc::new(RedisJobQueue::new(
                queue::connect(&config.redis).await?,
                &config.queue,
            ));
            Some(spawn_sweeper(
                sweeper_queue,
                sweep_interval(config.queue.visibility_timeout),
                shutdown_rx.clone(),
            ))
        }
        DeliveryMode::Destructive => None,
    };

    let pipeline = Pipeline::new(
        files,
        blobs,
        Arc::clone(&jobs),
        notifier,
        PipelineConfig::from_config(&config),
    );
    let controller = Controller::new(
        Arc::new(pipeline),
        jobs,
        ControllerOptions::from_config(&config),
    );
    let worker = tokio::spawn(async move { controller.run(shutdown_rx).await });

    shutdown_signal().await;
    let _ = shutdown_tx.send(true);

    match worker.await {
        Ok(stats) => info!(
            "Processed {} job(s) in {} polls",
            stats.completed + stats.dropped + stats.failed,
            stats.polls
        ),
        Err(e) => error!("Worker task ended abnormally: {}", e),
    }
    if let Some(sweeper) = sweeper {
        if let Err(e) = sweeper.await {
            error!("Lease sweeper ended abnormally: {}", e);
        }
    }

    info!("Shutdown complete");
    Ok(())
}

/// Resolves on SIGINT or SIGTERM. A handler that cannot be installed never fires.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received SIGINT, finishing the current job"),
        () = terminate => info!("Received SIGTERM, finishing the current job"),
    }
}
