use tracing::info;
use tracing_subscriber::EnvFilter;

use streamflow_server::cache::{FileStore, StationCache};
use streamflow_server::config::ServerConfig;
use streamflow_server::directory::StationDirectory;
use streamflow_server::mirror::{MirrorRace, ReqwestTransport};
use streamflow_server::web::{AppState, create_router};

#[tokio::main]
async fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = ServerConfig::from_env().expect("Invalid configuration");

    // Mirrors are raced with per-request timeouts; the client itself has none.
    let transport = ReqwestTransport::new().expect("Failed to create HTTP client");
    let mirrors = MirrorRace::new(transport, config.mirrors.clone());

    let cache = StationCache::new(FileStore::new(&config.cache_dir), config.cache.clone());
    let directory = StationDirectory::new(mirrors, cache);

    let static_dir = config.static_dir.to_string_lossy();
    let app = create_router(AppState::new(directory), &static_dir);

    info!(
        mirrors = config.mirrors.mirrors.len(),
        timeout_ms = config.mirrors.timeout.as_millis() as u64,
        cache_dir = %config.cache_dir.display(),
        "Station directory ready"
    );
    info!(addr = %config.addr, "StreamFlow station server listening");
    info!("  GET  /health                       - Health check");
    info!("  GET  /api/stations/tag/:tag?limit= - Top stations for a tag");
    info!("  GET  /api/stations/uuids?ids=      - Stations by id");

    let listener = tokio::net::TcpListener::bind(config.addr)
        .await
        .expect("Failed to bind listen address");
    axum::serve(listener, app).await.expect("Server error");
}
