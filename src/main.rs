use std::error::Error;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::oneshot;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use warp::Filter;
use wardline::api::RestApi;
use wardline::config::{load_config, BackendKind, Config, LoggingConfig, CONFIG_PATH_ENV, DEFAULT_CONFIG_PATH};
use wardline::storage::{MemoryStore, PostgrestStore, SnapshotFile, StorageError, WardStore};
use wardline::ward::{SystemClock, WardService};

fn init_logging(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn open_store(config: &Config) -> Result<Arc<dyn WardStore>, StorageError> {
    let backend = &config.backend;
    match backend.kind {
        BackendKind::Memory => {
            let store = match &backend.snapshot_path {
                Some(path) => MemoryStore::open(
                    &backend.patients_table,
                    &backend.reports_table,
                    SnapshotFile::new(path),
                )?,
                None => MemoryStore::new(&backend.patients_table, &backend.reports_table),
            };
            Ok(Arc::new(store))
        }
        BackendKind::Postgrest => {
            let url = backend.url.as_deref().unwrap_or_default();
            Ok(Arc::new(PostgrestStore::new(url, &backend.api_key, backend.timeout())?))
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let config_path = std::env::var(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));
    let config = load_config(&config_path)?;
    init_logging(&config.logging);

    info!(path = %config_path.display(), backend = ?config.backend.kind, "Starting wardline");

    let store = open_store(&config)?;
    let service = Arc::new(WardService::new(store, Arc::new(SystemClock), config.ward_settings()));
    let api = RestApi::new(Arc::clone(&service), &config.ward.date_display_format);

    let addr: SocketAddr = format!("{}:{}", config.api.host, config.api.port).parse()?;

    let (shutdown_tx, shutdown_rx) = oneshot::channel();

    let routes = api.routes().with(warp::trace::request());
    let (bound, server) = warp::serve(routes).try_bind_with_graceful_shutdown(addr, async move {
        shutdown_rx.await.ok();
        info!("Shutting down server");
    })?;
    info!(address = %bound, "Server listening");

    let server_handle = tokio::spawn(server);

    signal::ctrl_c().await?;
    info!("Ctrl+C received, starting graceful shutdown");

    shutdown_tx.send(()).ok();
    server_handle.await?;

    match service.flush().await {
        Ok(()) => info!("Ward data flushed"),
        Err(e) => error!(error = %e, "Error flushing ward data"),
    }

    info!("Server shutdown complete");
    Ok(())
}
