//! Dashboard settings, password, and login.

use super::{api_error, blast_error, check_auth, ApiResult, ApiState};
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::Json,
};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{info, warn};
use wablast_store::Settings;

/// `GET /api/settings`
pub(super) async fn get_settings(
    headers: HeaderMap,
    State(state): State<ApiState>,
) -> ApiResult {
    if let Some(err) = check_auth(&headers, &state.api_key) {
        return Err(err);
    }

    Ok(Json(json!({"success": true, "settings": state.settings.get().await})))
}

/// `POST /api/settings`: replace and persist the settings.
pub(super) async fn update_settings(
    headers: HeaderMap,
    State(state): State<ApiState>,
    body: Result<Json<Settings>, axum::extract::rejection::JsonRejection>,
) -> ApiResult {
    if let Some(err) = check_auth(&headers, &state.api_key) {
        return Err(err);
    }

    let Json(settings) = body
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, format!("invalid settings: {e}")))?;
    if settings.max_blast_size == 0 {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "maxBlastSize must be at least 1",
        ));
    }

    let saved = state.settings.update(settings).await.map_err(blast_error)?;
    state
        .dispatcher
        .set_message_delay(Duration::from_secs(saved.message_delay));
    info!(
        "api: settings saved (delay {}s, max blast {})",
        saved.message_delay, saved.max_blast_size
    );

    Ok(Json(json!({"success": true, "settings": saved})))
}

/// `GET /api/settings/password`: whether a dashboard password is set.
pub(super) async fn password_status(
    headers: HeaderMap,
    State(state): State<ApiState>,
) -> ApiResult {
    if let Some(err) = check_auth(&headers, &state.api_key) {
        return Err(err);
    }

    Ok(Json(json!({"hasPassword": state.settings.has_password().await})))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct PasswordChange {
    #[serde(default)]
    current_password: Option<String>,
    new_password: String,
}

/// `POST /api/settings/password`: set or change the dashboard password.
pub(super) async fn change_password(
    headers: HeaderMap,
    State(state): State<ApiState>,
    body: Result<Json<PasswordChange>, axum::extract::rejection::JsonRejection>,
) -> ApiResult {
    if let Some(err) = check_auth(&headers, &state.api_key) {
        return Err(err);
    }

    let Json(change) = body
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, format!("invalid request: {e}")))?;

    state
        .settings
        .set_password(change.current_password.as_deref(), &change.new_password)
        .await
        .map_err(blast_error)?;

    Ok(Json(json!({"success": true})))
}

#[derive(Debug, Deserialize)]
pub(super) struct LoginRequest {
    #[serde(default)]
    password: String,
}

/// `POST /api/login`: check the dashboard password.
pub(super) async fn login(
    headers: HeaderMap,
    State(state): State<ApiState>,
    body: Result<Json<LoginRequest>, axum::extract::rejection::JsonRejection>,
) -> ApiResult {
    if let Some(err) = check_auth(&headers, &state.api_key) {
        return Err(err);
    }

    let Json(login) = body
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, format!("invalid request: {e}")))?;

    if state.settings.verify_password(&login.password).await {
        Ok(Json(json!({"success": true})))
    } else {
        warn!("api: dashboard login rejected");
        Err(api_error(StatusCode::UNAUTHORIZED, "invalid password"))
    }
}
