//! Process entry point. Wires every component named in `SPEC_FULL.md` §4
//! into one running server: the operational store, the job executor with
//! the orchestrator's handlers, the scheduler and stuck-job reclaimer, the
//! event harvester, the catalog writer and compaction job, the SIEM export
//! engine, and the ambient health/ready/metrics HTTP surface. Generic
//! request routing and authentication are an external collaborator's job
//! (§1); this binary only serves what the core itself owns.

mod cleanup;
mod cors;
mod harvesting;
mod health;
mod state;

use axum::{routing::get, Router};
use openlabels_core::config::{Config, SiemExportMode};
use openlabels_core::database::DatabasePool;
use openlabels_core::jobs::{ExecutorConfig, JobExecutor};
use openlabels_core::metrics::{MetricsRegistry, MetricsService};
use openlabels_core::security::EncryptionService;
use openlabels_catalog::{build_object_store, CatalogWriter, CompactionJob};
use openlabels_detection::DetectionPipeline;
use openlabels_export::{build_sinks, ExportEngine, PeriodicExportLoop};
use openlabels_orchestrator::{self as orchestrator, OrchestratorContext, ScanRepository};
use openlabels_queue::{PostgresJobQueue, Reclaimer, Scheduler};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tower::ServiceBuilder;
use tower_http::compression::CompressionLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::{info, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    info!("starting openlabels-server");

    let config = Config::load()?;
    info!("configuration loaded");

    let db = DatabasePool::new(config.database.clone()).await?;
    db.apply_schema().await?;
    info!("operational store schema applied");

    let encryption = Arc::new(EncryptionService::new(&config.security)?);

    let metrics_registry = MetricsRegistry::new(config.metrics.clone());
    let metrics = Arc::new(MetricsService::new(metrics_registry));

    let queue: Arc<dyn openlabels_core::jobs::JobQueue> =
        Arc::new(PostgresJobQueue::new(db.pool().clone()));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // SIEM export: one set of sinks, fed into two independent ExportEngine
    // instances since the periodic loop consumes its engine by value while
    // the orchestrator context needs to share one across job completions.
    let export_sinks = if config.siem_export.enabled {
        Some(build_sinks(&config.siem_export.sinks, &encryption)?)
    } else {
        None
    };

    let context_export_engine = export_sinks.as_ref().and_then(|sinks| {
        matches!(config.siem_export.mode, SiemExportMode::PostScan | SiemExportMode::Both)
            .then(|| Arc::new(ExportEngine::new(db.pool().clone(), sinks.clone())))
    });

    let mut background: tokio::task::JoinSet<()> = tokio::task::JoinSet::new();

    if let Some(sinks) = &export_sinks {
        if matches!(config.siem_export.mode, SiemExportMode::Periodic | SiemExportMode::Both) {
            let periodic_engine = ExportEngine::new(db.pool().clone(), sinks.clone());
            let periodic_loop = PeriodicExportLoop::new(
                db.pool().clone(),
                periodic_engine,
                config.siem_export.export_record_types.clone(),
                Duration::from_secs(config.siem_export.periodic_interval_seconds),
            );
            let shutdown_rx = shutdown_rx.clone();
            background.spawn(async move {
                info!("periodic SIEM export loop starting");
                periodic_loop.run_forever(shutdown_rx).await;
            });
        }
    }

    let detection = Arc::new(DetectionPipeline::new(Vec::new()));

    let orchestrator_ctx = Arc::new(OrchestratorContext {
        repo: Arc::new(ScanRepository::new(db.pool().clone())),
        encryption: Arc::clone(&encryption),
        config: Arc::new(config.clone()),
        queue: Arc::clone(&queue),
        detection,
        worker_id: format!("openlabels-server-{}", uuid::Uuid::new_v4()),
        export: context_export_engine,
    });

    let executor_config = ExecutorConfig {
        worker_id: orchestrator_ctx.worker_id.clone(),
        ..Default::default()
    };
    let mut executor = JobExecutor::new(Arc::clone(&queue), executor_config);
    orchestrator::handlers::register_handlers(&executor, Arc::clone(&orchestrator_ctx)).await;
    executor.start().await?;
    info!("job executor started");

    if config.scheduler.enabled {
        let scheduler = Scheduler::new(db.pool().clone())
            .with_poll_interval(Duration::from_secs(config.scheduler.poll_interval_seconds))
            .with_min_trigger_interval(Duration::from_secs(config.scheduler.min_trigger_interval_seconds));
        let scheduler_shutdown = shutdown_rx.clone();
        background.spawn(async move {
            info!("schedule-trigger loop starting");
            scheduler.run_forever(scheduler_shutdown).await;
        });
    }

    let reclaimer = Reclaimer::new(db.pool().clone());
    let reclaimer_shutdown = shutdown_rx.clone();
    background.spawn(async move {
        info!("stuck-job reclaimer starting");
        reclaimer.run_forever(Duration::from_secs(60), reclaimer_shutdown).await;
    });

    background.spawn(cleanup::run_forever(db.pool().clone(), Arc::clone(&queue), shutdown_rx.clone()));

    harvesting::spawn(db.pool().clone(), &config.harvester, Arc::clone(&queue), shutdown_rx.clone(), &mut background);

    if config.catalog.enabled {
        let object_store = build_object_store(&config.catalog)?;
        let writer = CatalogWriter::new(db.pool().clone(), Arc::clone(&object_store), config.catalog.clone());
        let writer_shutdown = shutdown_rx.clone();
        background.spawn(async move {
            info!("catalog writer starting");
            writer.run_forever(writer_shutdown).await;
        });

        let compaction = CompactionJob::new(db.pool().clone(), object_store, config.catalog.compaction_small_file_threshold);
        let compaction_shutdown = shutdown_rx.clone();
        background.spawn(async move {
            info!("catalog compaction loop starting");
            compaction.run_forever(compaction_shutdown).await;
        });
    }

    let app_state = AppState { db: db.clone(), metrics };
    let app = create_app(app_state, &config)?;

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "server listening");

    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

    let _ = shutdown_tx.send(true);
    executor.stop().await?;

    // Every loop above selects on `shutdown.changed()` and exits its own
    // `run_forever`, finishing its in-flight cycle first (flushing buffers,
    // releasing advisory locks) rather than being cut off mid-cycle. Give
    // them a bounded window to do that before falling back to `abort_all`.
    const BACKGROUND_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);
    let drain = async {
        while background.join_next().await.is_some() {}
    };
    if tokio::time::timeout(BACKGROUND_SHUTDOWN_TIMEOUT, drain).await.is_err() {
        tracing::warn!("background tasks did not finish within the shutdown timeout, aborting remainder");
        background.abort_all();
    }

    info!("server shutdown complete");
    Ok(())
}

fn create_app(state: AppState, config: &Config) -> Result<Router, Box<dyn std::error::Error>> {
    let router = Router::new()
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        .route("/metrics", get(health::metrics))
        .layer(
            ServiceBuilder::new()
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                        .on_request(DefaultOnRequest::new().level(Level::INFO))
                        .on_response(DefaultOnResponse::new().level(Level::INFO)),
                )
                .layer(CompressionLayer::new())
                .layer(cors::build_cors_layer(&config.cors)?),
        )
        .with_state(state);

    Ok(router)
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "openlabels_server=info,openlabels_orchestrator=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received ctrl+c"),
        _ = terminate => info!("received terminate signal"),
    }
}
