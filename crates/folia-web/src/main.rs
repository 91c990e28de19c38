mod api;
mod auth;
mod config;
mod dto;
mod error;
mod middleware;
mod state;

use std::sync::Arc;
use std::time::Duration;

use axum::http::{header, Method};
use axum::middleware::from_fn;
use folia_core::Library;
use tower_governor::{governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer};
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::ServerConfig;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "folia_web=debug,folia_core=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::load()?;
    let library_config = config.library_config()?;
    let bind_addr = config.bind_addr;
    let rate_limit_rpm = config.rate_limit.login_requests_per_minute;
    let max_body_bytes = config.max_body_mb * 1024 * 1024;
    let token_ttl = Duration::from_secs(config.auth.jwt_ttl_hours * 3600);

    tracing::info!("Serving library at {}", library_config.root.display());
    let state = AppState::new(config, Library::new(library_config));

    // Revoked tokens only matter until they would have expired anyway
    let revoked = Arc::clone(&state.revoked_tokens);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60));
        loop {
            interval.tick().await;
            revoked.retain(|_, revoked_at| revoked_at.elapsed() < token_ttl);
        }
    });

    // CORS: same-origin only by default (no cross-origin requests allowed)
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    // Rate limit config (per-IP)
    let period_per_request = 60 / rate_limit_rpm.max(1);
    let governor_config = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(period_per_request.into())
            .burst_size(rate_limit_rpm.max(1))
            .key_extractor(SmartIpKeyExtractor)
            .finish()
            .ok_or_else(|| anyhow::anyhow!("Invalid rate limit configuration"))?,
    );

    // Rate limit only the login routes
    let auth_routes = api::auth_router()
        .layer(GovernorLayer::<_, _, axum::body::Body>::new(governor_config));

    let app = axum::Router::new()
        .nest("/api", auth_routes.merge(api::protected_router()))
        .layer(from_fn(middleware::security_headers::security_headers))
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    tracing::info!("folia-web listening on http://{}", bind_addr);
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    state.library.cache().teardown();
    tracing::info!("folia-web stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
}
