use crate::service::ControlService;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::header;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;

const INDEX_HTML: &str = include_str!("../assets/index.html");

type AppState = State<Arc<ControlService>>;

pub fn router(service: Arc<ControlService>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/status", get(status))
        .route(
            "/api/config",
            get(get_config).put(save_config).post(create_default_config),
        )
        .route("/api/validate", post(validate))
        .route("/api/start", post(start))
        .route("/api/stop", post(stop))
        .route("/api/restart", post(restart))
        .route("/api/logs", get(logs))
        .with_state(service)
}

pub async fn serve(
    listener: TcpListener,
    service: Arc<ControlService>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    axum::serve(listener, router(service))
        .with_graceful_shutdown(shutdown)
        .await
}

/// Resolves on Ctrl+C, or SIGTERM on unix.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
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
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn status(State(svc): AppState) -> impl IntoResponse {
    Json(svc.status().await)
}

async fn get_config(State(svc): AppState) -> Response {
    match svc.get_config().await {
        Ok(raw) => ([(header::CONTENT_TYPE, "application/json")], raw).into_response(),
        Err(resp) => Json(resp).into_response(),
    }
}

async fn save_config(State(svc): AppState, body: Bytes) -> impl IntoResponse {
    Json(svc.save_config(&body).await)
}

async fn create_default_config(State(svc): AppState) -> impl IntoResponse {
    Json(svc.create_default_config().await)
}

async fn validate(State(svc): AppState, body: Bytes) -> impl IntoResponse {
    Json(svc.validate_config(&body))
}

async fn start(State(svc): AppState) -> impl IntoResponse {
    Json(svc.start().await)
}

async fn stop(State(svc): AppState) -> impl IntoResponse {
    Json(svc.stop().await)
}

async fn restart(State(svc): AppState) -> impl IntoResponse {
    Json(svc.restart().await)
}

async fn logs(State(svc): AppState) -> impl IntoResponse {
    Json(svc.logs())
}
