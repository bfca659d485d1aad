//! Platzigram server

use platzigram::{AppState, build_router, config::AppConfig, spawn_session_cleanup_task};
use tokio::net::TcpListener;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global subscriber
///
/// `PLATZIGRAM__LOGGING__FORMAT=json` switches to one JSON object per
/// line; anything else gets the human readable format. `RUST_LOG`
/// overrides the default filter.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("platzigram=info,tower_http=debug"));
    let json = std::env::var("PLATZIGRAM__LOGGING__FORMAT").is_ok_and(|format| format == "json");

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().pretty()).init();
    }
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            tracing::error!(%error, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(error) => {
                tracing::error!(%error, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    platzigram::metrics::init_metrics();

    let config = AppConfig::load()?;
    tracing::info!(
        base_url = %config.server.base_url(),
        database = %config.database.path.display(),
        media_root = %config.media.root.display(),
        "Configuration loaded"
    );

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = AppState::new(config).await?;
    let app = build_router(state.clone());

    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "Platzigram listening");

    let cleanup = spawn_session_cleanup_task(state);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    cleanup.abort();
    tracing::info!("Server stopped");

    Ok(())
}
