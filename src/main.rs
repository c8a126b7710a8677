use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub mod api;
pub mod auth;
pub mod config;
pub mod engine;
pub mod errors;
pub mod probe;
pub mod service;

use api::AppState;
use auth::AuthGate;
use config::load_config;
use engine::EnginePool;
use errors::report;
use service::CheckService;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Already installed means another component chose a provider first; either works.
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            error!("{}", report(&e));
            std::process::exit(1);
        }
    };

    let pool = Arc::new(EnginePool::new(&config));
    let state = AppState {
        service: Arc::new(CheckService::new(pool, &config.service)),
        gate: Arc::new(AuthGate::new(
            config.secret.clone(),
            config.service.auth_schemes.clone(),
        )),
    };
    let app = api::router(state);

    let listener = match tokio::net::TcpListener::bind(config.listen).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind {}: {}", config.listen, report(&e));
            std::process::exit(1);
        }
    };
    info!("listening on {}", config.listen);

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("server error: {}", report(&e));
        std::process::exit(1);
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutting down");
}
