use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use resume_desk::{
    api,
    backend::Backend,
    config::{BackendKind, Config},
    AppState,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    info!(version = env!("CARGO_PKG_VERSION"), "resume-desk starting");

    let config = Config::load()?;

    let backend = Backend::from_config(&config).await?;
    match config.backend.kind {
        BackendKind::Local => info!(
            data_dir = %config.backend.data_dir,
            storage = %config.backend.local_storage_path,
            "Using embedded backend"
        ),
        BackendKind::Supabase => info!(
            url = config.backend.supabase_url.as_deref().unwrap_or_default(),
            bucket = %config.backend.resume_bucket,
            "Using Supabase backend"
        ),
    }

    let state = Arc::new(AppState::new(config.clone(), backend));
    state.session.init().await;
    info!(
        signed_in = state.session.user().is_some(),
        "Session restored"
    );

    let app = api::create_router(Arc::clone(&state));
    let listener = tokio::net::TcpListener::bind(&config.server.bind_address).await?;
    info!("Listening on: {}", config.server.bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutting down background tasks");
    state.shutdown();

    info!("Shutdown complete");
    Ok(())
}

/// `LOG_FORMAT=gcp` emits Cloud Logging records, `json` plain JSON lines,
/// anything else human-readable output. `RUST_LOG` filters, default `info`.
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());
    let registry = tracing_subscriber::registry().with(filter);

    match std::env::var("LOG_FORMAT")
        .unwrap_or_default()
        .to_lowercase()
        .as_str()
    {
        "gcp" => registry.with(tracing_stackdriver::layer()).init(),
        "json" => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_current_span(false)
                    .with_span_list(false),
            )
            .init(),
        _ => registry
            .with(tracing_subscriber::fmt::layer().with_target(false))
            .init(),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, draining connections");
}
