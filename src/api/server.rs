use axum::{
    Router,
    extract::{Request, State},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
};
use tokio::net::TcpListener;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use super::{
    error::ApiError,
    services::{
        delete_variant, generate_variants, health, list_slots, select_variant, update_prompt,
    },
    state::AppState,
};
use crate::config::Config;

type AnyError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Staging router; `/api` routes answer 403 outside development
pub fn router(state: AppState) -> Router {
    let slots = Router::new()
        .route("/api/slots/{kind}", get(list_slots))
        .route("/api/slots/{kind}/select", post(select_variant))
        .route("/api/slots/{kind}/delete", post(delete_variant))
        .route("/api/slots/{kind}/prompt", post(update_prompt))
        // One batch at a time; a second request waits for the first
        .route(
            "/api/slots/{kind}/generate",
            post(generate_variants).layer(ConcurrencyLimitLayer::new(1)),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_development,
        ));

    Router::new()
        .merge(slots)
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn require_development(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if !state.config.is_development() {
        return Err(ApiError::DevOnly);
    }
    Ok(next.run(request).await)
}

pub async fn run(config: Config) -> Result<(), AnyError> {
    let address = config.staging.bind_addr;
    if !config.is_development() {
        info!("Environment is not development, slot endpoints will answer 403");
    }

    let state = AppState::from_config(config)?;
    let app = router(state);

    let listener = TcpListener::bind(address).await?;
    info!(%address, "Staging server listening");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
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
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
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

    info!("Shutdown signal received");
}
