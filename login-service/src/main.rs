use login_service::{
    build_router,
    config::LoginConfig,
    db,
    services::{AuthService, PgCredentialStore, RedisSessionStore},
    AppState,
};
use service_core::error::{AppError, RETRY_LATER_MESSAGE};
use service_core::observability::logging::init_tracing;
use std::sync::Arc;
use tokio::signal;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // Load configuration - fail fast if invalid
    let config = LoginConfig::from_env()?;

    init_tracing(
        &config.service_name,
        &config.log_level,
        config.otlp_endpoint.as_deref(),
    );

    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
        "Starting login service"
    );

    let pool = match db::create_pool(&config.database).await {
        Ok(pool) => pool,
        Err(e) => exit_unavailable("Database connection failed", &e),
    };
    if let Err(e) = db::run_migrations(&pool).await {
        exit_unavailable("Database migrations failed", &e);
    }

    let sessions = match RedisSessionStore::new(&config.redis).await {
        Ok(store) => store,
        Err(e) => exit_unavailable("Session store connection failed", &e),
    };

    let credentials = PgCredentialStore::new(pool, config.credentials.username_policy());
    tracing::info!(
        username_policy = ?config.credentials.username_policy(),
        session_ttl_seconds = config.session.ttl_seconds,
        "Stores initialized"
    );

    let auth_service = AuthService::new(
        Arc::new(credentials),
        Arc::new(sessions),
        config.session.ttl()?,
    );

    let state = AppState {
        config: config.clone(),
        auth_service,
    };
    let app = build_router(state);

    let addr = config.common.bind_addr();
    tracing::info!(address = %addr, "Listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    service_core::axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Service shutdown complete");
    Ok(())
}

/// Log the diagnostic server-side, tell the operator only that the backend is
/// unreachable, and stop.
fn exit_unavailable(context: &str, err: &dyn std::fmt::Display) -> ! {
    tracing::error!(error = %err, "{}", context);
    eprintln!("{}", RETRY_LATER_MESSAGE);
    std::process::exit(1);
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}
