//! HTTP and WebSocket layer.

mod ws;

use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::State;
use axum::response::Html;
use axum::routing::{any, get};
use axum::{Json, Router};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::service::SessionService;

pub use ws::ClientRegistry;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<SessionService>,
    pub registry: Arc<ClientRegistry>,
}

/// The terminal UI plus the WebSocket endpoint. `static_dir` overrides the
/// embedded page when set.
pub fn build_router(state: AppState, static_dir: Option<PathBuf>) -> Router {
    let mut router = Router::new()
        .route("/ws", any(ws::ws_handler))
        .route("/healthz", get(healthz));

    router = match static_dir {
        Some(dir) => router.fallback_service(ServeDir::new(dir)),
        None => router
            .route("/", get(console))
            .route("/console", get(console)),
    };

    router.layer(TraceLayer::new_for_http()).with_state(state)
}

/// Embedded xterm.js terminal page.
async fn console() -> Html<&'static str> {
    Html(include_str!("../../static/index.html"))
}

#[derive(serde::Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    sessions: usize,
}

async fn healthz(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        sessions: state.service.session_count(),
    })
}
