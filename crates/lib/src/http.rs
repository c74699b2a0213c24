//! Shared HTTP plumbing for the three services: health route, request log and deadline,
//! bind + serve, shutdown signal.

use anyhow::{Context, Result};
use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    Router,
};
use std::time::{Duration, Instant};

/// GET /health: liveness check.
pub async fn health() -> &'static str {
    "OK"
}

/// Log every request (method, path, status, latency) and answer 504 when the handler
/// has not produced a response within `deadline`.
pub fn with_request_log(app: Router, deadline: Duration) -> Router {
    app.layer(middleware::from_fn_with_state(deadline, request_log))
}

async fn request_log(State(deadline): State<Duration>, req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let started = Instant::now();
    let response = match tokio::time::timeout(deadline, next.run(req)).await {
        Ok(response) => response,
        Err(_) => {
            log::warn!("{} {} exceeded {:?}", method, path, deadline);
            StatusCode::GATEWAY_TIMEOUT.into_response()
        }
    };
    log::info!(
        "{} {} {} {:?}",
        method,
        path,
        response.status().as_u16(),
        started.elapsed()
    );
    response
}

/// Bind `bind_addr` and serve `app` until SIGINT/SIGTERM, with [`with_request_log`] applied.
pub async fn serve(name: &str, app: Router, bind_addr: &str, deadline: Duration) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("binding to {}", bind_addr))?;
    log::info!("{} listening on {}", name, bind_addr);
    axum::serve(listener, with_request_log(app, deadline))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .with_context(|| format!("{} server exited", name))?;
    log::info!("{} stopped", name);
    Ok(())
}

/// Future that completes when the process should shut down (SIGINT or SIGTERM).
pub async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    log::info!("shutdown signal received, draining connections");
}
