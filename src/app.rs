use std::net::SocketAddr;

use axum::{error_handling::HandleErrorLayer, middleware, routing::get, BoxError, Router};
use tokio::signal;
use tower::{timeout::error::Elapsed, ServiceBuilder};
use tower_http::cors::CorsLayer;

use crate::error::{RpcError, ServiceError};
use crate::interceptors::{enforce, log_calls};
use crate::state::AppState;
use crate::{auth, tasks};

pub fn build_app(state: AppState) -> Router {
    let rpc = Router::new()
        .merge(auth::router())
        .merge(tasks::router())
        .route_layer(middleware::from_fn_with_state(state.access.clone(), enforce));

    Router::new()
        .merge(rpc)
        .route("/health", get(|| async { "ok" }))
        .with_state(state.clone())
        .layer(
            ServiceBuilder::new()
                .layer(HandleErrorLayer::new(handle_timeout))
                .timeout(state.config.request_timeout()),
        )
        .layer(middleware::from_fn(log_calls))
        .layer(CorsLayer::permissive())
}

async fn handle_timeout(err: BoxError) -> RpcError {
    if err.is::<Elapsed>() {
        RpcError::deadline_exceeded()
    } else {
        ServiceError::internal(err).into()
    }
}

pub async fn serve(app: Router, host: &str, port: u16) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{host}:{port}").parse()?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
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
