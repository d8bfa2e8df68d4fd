use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, State};
use axum::{
    Json, Router,
    routing::{get, post},
};
use sea_orm_migration::MigratorTrait;
use serde::Serialize;

use taxaformer_server::analyze;
use taxaformer_server::compute::{ComputeWorker, FixtureWorker, RemoteWorker};
use taxaformer_server::config::Config;
use taxaformer_server::coordinator::AnalysisCoordinator;
use taxaformer_server::db_store::DbJobStore;
use taxaformer_server::jobs;
use taxaformer_server::state::AppState;
use taxaformer_server::store::JobStore;
use taxaformer_server::visualizations;

const MAX_UPLOAD_BYTES: usize = 100 * 1024 * 1024;

#[derive(Debug, Serialize)]
struct RootResponse {
    status: &'static str,
    service: &'static str,
    version: &'static str,
    database: &'static str,
    caching: bool,
    timestamp: String,
}

async fn root(State(state): State<AppState>) -> Json<RootResponse> {
    Json(RootResponse {
        status: "online",
        service: "taxaformer",
        version: env!("CARGO_PKG_VERSION"),
        database: if state.store.is_some() {
            "connected"
        } else {
            "disabled"
        },
        caching: state.store.is_some(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    database: String,
    worker: String,
    worker_url: Option<String>,
    worker_info: serde_json::Value,
    timestamp: String,
}

// Liveness endpoint: reports store and worker reachability, never fails.
async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let database = match &state.store {
        None => "disabled".to_string(),
        Some(store) => match store.ping().await {
            Ok(()) => "connected".to_string(),
            Err(e) => format!("error: {e}"),
        },
    };

    let worker = match state.worker.endpoint() {
        None => "not configured".to_string(),
        Some(_) => {
            if state.worker.health_check().await {
                "online".to_string()
            } else {
                "offline".to_string()
            }
        }
    };

    Json(HealthResponse {
        status: "healthy",
        database,
        worker,
        worker_url: state.worker.endpoint().map(str::to_string),
        worker_info: state.worker.server_info().await,
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

/// The job cache is optional: any boot-time storage problem downgrades the
/// service to uncached operation instead of refusing to start.
async fn init_store(cfg: &Config) -> Option<Arc<dyn JobStore>> {
    if !cfg.use_database {
        tracing::info!("persistence disabled by configuration, running without job cache");
        return None;
    }
    let Some(url) = &cfg.database_url else {
        tracing::warn!("DATABASE_URL not set, running without job cache");
        return None;
    };

    let db = match taxaformer_db::connect(url).await {
        Ok(db) => db,
        Err(e) => {
            tracing::warn!(error = %e, "database unreachable, running without job cache");
            return None;
        }
    };

    // Apply migrations on boot (idempotent).
    if let Err(e) = taxaformer_migration::Migrator::up(&db, None).await {
        tracing::warn!(error = %e, "migrations failed, running without job cache");
        return None;
    }

    Some(Arc::new(DbJobStore::new(Arc::new(db))))
}

/// Resolves on SIGINT or SIGTERM so in-flight analyses drain before exit.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to install SIGINT handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    tracing::info!("shutdown signal received, draining connections");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cfg = Config::from_env();
    let store = init_store(&cfg).await;

    let worker: Arc<dyn ComputeWorker> = match &cfg.worker_url {
        Some(url) => {
            tracing::info!(%url, timeout_secs = cfg.worker_timeout.as_secs(), "using remote compute worker");
            Arc::new(RemoteWorker::new(url.clone(), cfg.worker_timeout))
        }
        None => {
            tracing::warn!("no compute worker configured, serving fixture results");
            Arc::new(FixtureWorker)
        }
    };

    let state = AppState {
        coordinator: Arc::new(AnalysisCoordinator::new(store.clone(), worker.clone())),
        store,
        worker,
    };

    let app = Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/analyze", post(analyze::analyze))
        .route("/jobs", get(jobs::list_jobs))
        .route("/jobs/:job_id", get(jobs::get_job))
        .route(
            "/visualizations/composition/:job_id",
            get(visualizations::get_composition),
        )
        .route(
            "/visualizations/hierarchy/:job_id",
            get(visualizations::get_hierarchy),
        )
        .route(
            "/visualizations/sankey/:job_id",
            get(visualizations::get_sankey),
        )
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(state);

    let addr: SocketAddr = ([0, 0, 0, 0], cfg.port).into();
    tracing::info!(%addr, "taxaformer-server HTTP listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}
