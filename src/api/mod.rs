//! HTTP API consumed by the dashboard.
//!
//! All routes live under `/api`. When `api.api_key` is set every request must
//! carry it as a bearer token. Spawned as a background task by the gateway.

mod contacts;
mod messages;
mod session;
mod settings;

#[cfg(test)]
mod tests;

use crate::dispatcher::Dispatcher;
use axum::{
    extract::{DefaultBodyLimit, State},
    http::{HeaderMap, StatusCode},
    response::Json,
    routing::{delete, get, post},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};
use wablast_channels::WhatsAppBridge;
use wablast_core::{config::ApiConfig, error::BlastError, traits::MessagingClient};
use wablast_store::{SettingsFile, Store};

/// Error half of every handler result: status plus `{success:false, error}`.
pub(crate) type ApiError = (StatusCode, Json<Value>);

pub(crate) type ApiResult<T = Json<Value>> = Result<T, ApiError>;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub(crate) dispatcher: Arc<Dispatcher>,
    pub(crate) client: Arc<dyn MessagingClient>,
    /// Receives bridge events and holds the pairing QR. `None` when the
    /// client is not bridge-backed.
    pub(crate) bridge: Option<Arc<WhatsAppBridge>>,
    pub(crate) store: Store,
    pub(crate) settings: Arc<SettingsFile>,
    pub(crate) api_key: Option<String>,
    pub(crate) uptime: Instant,
}

impl ApiState {
    pub fn new(
        dispatcher: Arc<Dispatcher>,
        client: Arc<dyn MessagingClient>,
        bridge: Option<Arc<WhatsAppBridge>>,
        store: Store,
        settings: Arc<SettingsFile>,
        config: &ApiConfig,
    ) -> Self {
        let api_key = Some(config.api_key.trim())
            .filter(|k| !k.is_empty())
            .map(String::from);
        Self {
            dispatcher,
            client,
            bridge,
            store,
            settings,
            api_key,
            uptime: Instant::now(),
        }
    }
}

/// Build an error response.
pub(crate) fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(json!({"success": false, "error": message.into()})),
    )
}

/// Map a library error onto an HTTP status.
pub(crate) fn blast_error(e: BlastError) -> ApiError {
    let status = match &e {
        BlastError::SessionNotReady => StatusCode::SERVICE_UNAVAILABLE,
        BlastError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        BlastError::Client(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        error!("api: {e}");
    }
    api_error(status, e.to_string())
}

/// Constant-time string comparison for API token validation.
fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes()
        .zip(b.bytes())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}

/// Check bearer token auth. Returns `None` if authorized, `Some(response)` if rejected.
pub(crate) fn check_auth(headers: &HeaderMap, api_key: &Option<String>) -> Option<ApiError> {
    let key = api_key.as_ref()?;

    let Some(header) = headers.get("authorization") else {
        return Some(api_error(
            StatusCode::UNAUTHORIZED,
            "missing Authorization header",
        ));
    };

    let Ok(value) = header.to_str() else {
        return Some(api_error(
            StatusCode::UNAUTHORIZED,
            "invalid Authorization header",
        ));
    };

    match value.strip_prefix("Bearer ") {
        Some(token) if constant_time_eq(token, key) => None,
        _ => Some(api_error(StatusCode::UNAUTHORIZED, "invalid token")),
    }
}

/// `GET /api/health`: uptime and WhatsApp session status.
async fn health(
    headers: HeaderMap,
    State(state): State<ApiState>,
) -> ApiResult {
    if let Some(err) = check_auth(&headers, &state.api_key) {
        return Err(err);
    }

    let whatsapp = if state.client.is_ready().await {
        "connected"
    } else {
        "disconnected"
    };

    Ok(Json(json!({
        "status": "ok",
        "uptime_secs": state.uptime.elapsed().as_secs(),
        "whatsapp": whatsapp,
    })))
}

/// Build the axum router with shared state.
pub fn build_router(state: ApiState, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/send", post(messages::send))
        .route(
            "/api/messages",
            get(messages::list_messages).delete(messages::purge_messages),
        )
        .route("/api/messages/success-count", get(messages::success_count))
        .route("/api/check-whatsapp", post(messages::check_whatsapp))
        .route("/api/status", get(session::status))
        .route("/api/status/qr.png", get(session::qr_png))
        .route("/api/logout", post(session::logout))
        .route("/api/whatsapp/events", post(session::bridge_event))
        .route(
            "/api/contacts",
            get(contacts::list_contacts)
                .post(contacts::add_contacts)
                .delete(contacts::delete_all_contacts),
        )
        .route("/api/contacts/count", get(contacts::count_contacts))
        .route("/api/contacts/{id}", delete(contacts::delete_contact))
        .route(
            "/api/settings",
            get(settings::get_settings).post(settings::update_settings),
        )
        .route(
            "/api/settings/password",
            get(settings::password_status).post(settings::change_password),
        )
        .route("/api/login", post(settings::login))
        .route("/api/numbers/random", get(contacts::random_numbers))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .with_state(state)
}

/// Start the API server. Called from `Gateway::run()`.
pub async fn serve(config: ApiConfig, state: ApiState) {
    let app = build_router(state, config.max_upload_mb.saturating_mul(1024 * 1024));
    let addr = format!("{}:{}", config.host, config.port);

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            error!("API server failed to bind to {addr}: {e}");
            return;
        }
    };

    info!("API server listening on {addr}");

    if let Err(e) = axum::serve(listener, app).await {
        error!("API server error: {e}");
    }
}
