use std::sync::Arc;

use axum::{
    extract::{rejection::FormRejection, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{Html, IntoResponse, Response},
    Form, Json,
};
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::errors::AppError;

const INDEX_PAGE: &str = include_str!("../../assets/index.html");
const SHOW_PAGE: &str = include_str!("../../assets/show.html");
const NOT_FOUND_PAGE: &str = include_str!("../../assets/not_found.html");
const CREATED_PAGE: &str = include_str!("../../assets/created.html");

// ── Request / Response DTOs ──────────────────────────────────

#[derive(Deserialize)]
pub struct CreateSecretForm {
    #[serde(default)]
    pub secret: String,
    /// Honeypot field, hidden from humans.
    #[serde(default)]
    pub signature: String,
}

#[derive(Serialize)]
pub struct CreateSecretResponse {
    pub key: String,
    pub share_url: String,
}

#[derive(Deserialize)]
pub struct KeyParams {
    #[serde(default)]
    pub key: String,
}

#[derive(Serialize)]
pub struct SecretResponse {
    pub secret: String,
}

// ── Handlers ─────────────────────────────────────────────────

/// GET / — page for creating a new secret
pub async fn index() -> Html<&'static str> {
    Html(INDEX_PAGE)
}

/// POST / — store the posted secret and return its share link
pub async fn create_secret(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    form: Result<Form<CreateSecretForm>, FormRejection>,
) -> Result<Response, AppError> {
    let Form(form) = form.map_err(form_rejection)?;

    if !form.signature.is_empty() {
        // Bots that fill the honeypot get a plain success so they move on.
        tracing::debug!("honeypot field filled, discarding submission");
        return Ok("ok".into_response());
    }

    if form.secret.is_empty() {
        return Err(AppError::BadRequest("failed to read posted content"));
    }

    let key = state.store.save(&form.secret).await?;
    let share_url = format!("{}/show?key={}", base_url(&state, &headers), key);

    // Plain form posts (no script) get a page; the script asks for JSON.
    if wants_html(&headers) {
        let page = CREATED_PAGE.replace("{{share_url}}", &escape_html(&share_url));
        return Ok(Html(page).into_response());
    }
    Ok(Json(CreateSecretResponse { key, share_url }).into_response())
}

/// GET /show?key= — reveal page if the secret still exists
pub async fn show_secret(
    State(state): State<Arc<AppState>>,
    Query(params): Query<KeyParams>,
) -> Result<Response, AppError> {
    if params.key.is_empty() {
        return Err(AppError::BadRequest("key not specified"));
    }

    if !state.store.validate_exists(&params.key).await? {
        return Ok((StatusCode::NOT_FOUND, Html(NOT_FOUND_PAGE)).into_response());
    }
    Ok(Html(SHOW_PAGE).into_response())
}

/// POST /secret — return the secret and delete it
pub async fn fetch_secret(
    State(state): State<Arc<AppState>>,
    form: Result<Form<KeyParams>, FormRejection>,
) -> Result<Json<SecretResponse>, AppError> {
    let Form(params) = form.map_err(form_rejection)?;
    if params.key.is_empty() {
        return Err(AppError::BadRequest("key not specified"));
    }

    let secret = state.store.read(&params.key).await?;
    Ok(Json(SecretResponse { secret }))
}

fn form_rejection(rejection: FormRejection) -> AppError {
    if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge
    } else {
        tracing::debug!("form rejected: {}", rejection);
        AppError::BadRequest("failed to read posted content")
    }
}

fn wants_html(headers: &HeaderMap) -> bool {
    headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .map(|accept| accept.contains("text/html"))
        .unwrap_or(false)
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

fn base_url(state: &AppState, headers: &HeaderMap) -> String {
    if let Some(url) = &state.config.public_url {
        return url.clone();
    }
    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost");
    format!("http://{}", host)
}
