/*
 * Responsibility
 * - Config loading -> tracing -> dependency wiring -> Router assembly
 * - Middleware (HTTP / CORS) applied around the Router
 * - axum::serve() with connect info and graceful shutdown
 */
use std::fs::OpenOptions;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::{panic, process};

use axum::Router;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::api;
use crate::config::{Config, ConfigError};
use crate::error::AppError;
use crate::middleware;
use crate::services::auth::Authenticator;
use crate::services::proxy::HttpForwarder;
use crate::services::{Dispatcher, RouteTable, TracingObserver};
use crate::state::AppState;

const DEFAULT_FILTER: &str = "info,tower_http=info";

fn init_tracing(config: &Config) -> Result<(), AppError> {
    // RUST_LOG wins; otherwise the configured level; otherwise a sensible default.
    // Ex:
    // RUST_LOG=info,role_gateway=debug,tower_http=debug cargo run
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.as_deref().unwrap_or(DEFAULT_FILTER)))
        .map_err(|_| ConfigError::Invalid("log_conf.log_level"))?;

    let registry = tracing_subscriber::registry().with(filter);

    match &config.log_file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(Mutex::new(file)),
                )
                .init();
            tracing::info!(file = %path.display(), "logging to file");
        }
        None => registry.with(tracing_subscriber::fmt::layer()).init(),
    }

    Ok(())
}

fn init_panic_hook(abort_on_panic: bool) {
    // Keep the default hook as a fallback (prints to stderr with location/payload).
    let default_hook = panic::take_hook();

    panic::set_hook(Box::new(move |info| {
        // Always surface panics via tracing so they don't get "lost".
        tracing::error!(?info, "panic");

        // Development: crash the whole process so we notice immediately.
        // Production: default behavior, the server keeps running.
        if abort_on_panic {
            process::abort();
        } else {
            default_hook(info);
        }
    }))
}

pub async fn run() -> Result<(), AppError> {
    let config = Config::from_env()?;
    init_tracing(&config)?;
    init_panic_hook(!config.app_env.is_production());

    let state = build_state(&config)?;
    tracing::info!(
        routes = state.dispatcher.routes().len(),
        "starting gateway in {:?} mode on {}",
        config.app_env,
        config.listen_addr
    );
    for route in state.dispatcher.routes().iter() {
        tracing::info!(
            route = route.name(),
            backend = %route.backend(),
            credential = route.service_authorization().is_some(),
            "route registered"
        );
    }

    let app = build_router(state, &config);
    let listener = tokio::net::TcpListener::bind(config.listen_addr.as_str()).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("gateway stopped");
    Ok(())
}

/// Build process-level services and inject them into the shared state.
pub fn build_state(config: &Config) -> Result<AppState, AppError> {
    let routes = Arc::new(RouteTable::from_settings(&config.apis)?);
    let authenticator = Authenticator::new(&config.jwt_secret);
    let forwarder = Arc::new(HttpForwarder::new(
        config.upstream_connect_timeout,
        config.upstream_read_timeout,
    )?);

    let dispatcher = Dispatcher::new(
        routes,
        authenticator,
        forwarder,
        Arc::new(TracingObserver),
    );

    Ok(AppState::new(Arc::new(dispatcher)))
}

pub fn build_router(state: AppState, config: &Config) -> Router {
    let router = api::routes().with_state(state);
    let router = middleware::cors::apply(router, config);
    middleware::http::apply(router, config.request_timeout)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
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

    tracing::info!("shutdown signal received");
}
