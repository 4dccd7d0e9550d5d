//! ShelfTag Server
//!
//! Main entry point.

use shelftag::{
    dispatcher::spawn_dispatcher,
    realtime_hub::RealtimeHub,
    registry_store::RegistryStore,
    scan_source::{create_scan_channel, spawn_scan_source, LineScanSource},
    state::{AppConfig, AppState, RegistryContext},
    web_api,
};
use std::future::IntoFuture;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "shelftag=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting ShelfTag v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = AppConfig::default();
    let timezone = config.tz()?;
    tracing::info!(
        books_path = %config.books_path().display(),
        static_dir = %config.static_dir.display(),
        reader_port = %config.reader_port.display(),
        reader_baudrate = config.reader_baudrate,
        timezone = %timezone,
        "Configuration loaded"
    );

    // Initialize components
    let store = Arc::new(RegistryStore::open(config.books_path(), timezone).await?);
    let hub = Arc::new(RealtimeHub::new());
    let registry = RegistryContext::new(store, hub);
    tracing::info!("RegistryStore and RealtimeHub initialized");

    // The reader is the primary input: failing to open it aborts startup
    let reader = match LineScanSource::open(&config.reader_port, config.reader_baudrate).await {
        Ok(reader) => reader,
        Err(e) => {
            tracing::error!(error = %e, "NFC reader unavailable");
            return Err(e.into());
        }
    };

    let (scan_tx, scan_rx) = create_scan_channel();
    let (dispatcher, dispatcher_task) = spawn_dispatcher(registry.clone(), scan_rx);
    let mut scan_task = spawn_scan_source(reader, scan_tx);

    // Create application state
    let state = AppState {
        config: config.clone(),
        registry,
        dispatcher,
    };

    // Create router with static file serving
    let serve_dir = ServeDir::new(&config.static_dir);
    let app = web_api::create_router(state)
        .fallback_service(serve_dir)
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http());

    tracing::info!(static_dir = %config.static_dir.display(), "Static file serving enabled");

    // Start server
    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {}", addr);

    // Reader loss is fatal; so is the server stopping
    tokio::select! {
        result = axum::serve(listener, app).into_future() => {
            result?;
        }
        result = &mut scan_task => {
            let err = match result {
                Ok(Ok(())) => anyhow::anyhow!("scan source stopped"),
                Ok(Err(e)) => e.into(),
                Err(e) => anyhow::anyhow!("scan source task panicked: {}", e),
            };
            tracing::error!(
                port = %config.reader_port.display(),
                error = %err,
                "NFC reader lost, shutting down"
            );
            return Err(err);
        }
    }

    dispatcher_task.abort();
    Ok(())
}
