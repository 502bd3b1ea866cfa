use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Request},
    http::{HeaderValue, StatusCode},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::vault::SecretStore;

pub mod handlers;

/// Shared application state passed to handlers.
pub struct AppState {
    pub store: SecretStore,
    pub config: Config,
}

/// Build the public router: create, show and fetch endpoints plus health.
pub fn router(state: Arc<AppState>) -> Router {
    let payload_limit = state.config.payload_limit;

    Router::new()
        .route("/", get(handlers::index).post(handlers::create_secret))
        .route("/show", get(handlers::show_secret))
        .route("/secret", post(handlers::fetch_secret))
        .route("/healthz", get(|| async { "ok" }))
        .fallback(fallback_404)
        .with_state(state)
        .layer(DefaultBodyLimit::max(payload_limit))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(request_id_middleware))
        .layer(middleware::from_fn(security_headers_middleware))
}

async fn fallback_404() -> StatusCode {
    StatusCode::NOT_FOUND
}

/// Middleware: tags every response with a unique X-Request-Id.
async fn request_id_middleware(req: Request, next: Next) -> Response {
    let req_id = uuid::Uuid::new_v4().to_string();
    let mut resp = next.run(req).await;
    if let Ok(val) = HeaderValue::from_str(&req_id) {
        resp.headers_mut().insert("x-request-id", val);
    }
    resp
}

/// Middleware: security headers on every response. Secrets must never be
/// cached, framed or leaked through the Referer.
async fn security_headers_middleware(req: Request, next: Next) -> Response {
    let mut resp = next.run(req).await;
    let headers = resp.headers_mut();

    headers.insert("X-Content-Type-Options", HeaderValue::from_static("nosniff"));
    headers.insert("X-Frame-Options", HeaderValue::from_static("DENY"));
    headers.insert("Cache-Control", HeaderValue::from_static("no-store"));
    headers.insert("Referrer-Policy", HeaderValue::from_static("no-referrer"));
    headers.remove("Server");

    resp
}
