//! Metrics HTTP server: `GET /metrics` and `GET /healthz`.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::metrics::PrometheusEmitter;

pub fn build_router(emitter: Arc<PrometheusEmitter>) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/healthz", get(health_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(emitter)
}

/// Bind `addr` and serve until `shutdown` flips to `true`.
///
/// Binding happens before the task is spawned so an unusable address is
/// reported to the caller.
pub async fn spawn_metrics_server(
    addr: &str,
    emitter: Arc<PrometheusEmitter>,
    shutdown: watch::Receiver<bool>,
) -> std::io::Result<(SocketAddr, JoinHandle<()>)> {
    let listener = TcpListener::bind(addr).await?;
    let local = listener.local_addr()?;
    info!(address = %local, "metrics HTTP server listening");

    let app = build_router(emitter);
    let handle = tokio::spawn(async move {
        let result = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let mut rx = shutdown;
                while !*rx.borrow() {
                    if rx.changed().await.is_err() {
                        break;
                    }
                }
            })
            .await;
        if let Err(e) = result {
            error!(error = %e, "metrics HTTP server failed");
        }
        info!("metrics HTTP server stopped");
    });

    Ok((local, handle))
}

async fn metrics_handler(State(emitter): State<Arc<PrometheusEmitter>>) -> Response {
    match emitter.encode() {
        Ok(body) => ([(header::CONTENT_TYPE, emitter.content_type())], body).into_response(),
        Err(e) => {
            error!(error = %e, "failed to render metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

async fn health_handler() -> &'static str {
    "ok"
}
