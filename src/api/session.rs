//! WhatsApp session status, pairing QR, logout, and the bridge event webhook.

use super::{api_error, check_auth, ApiResult, ApiState};
use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use tracing::{debug, error, info};
use wablast_channels::whatsapp::{generate_qr_image, BridgeEvent};

/// `GET /api/status`: `{connected, qrCode}`. `qrCode` is null once connected.
pub(super) async fn status(headers: HeaderMap, State(state): State<ApiState>) -> ApiResult {
    if let Some(err) = check_auth(&headers, &state.api_key) {
        return Err(err);
    }

    let connected = state.client.is_ready().await;
    let qr_code = match &state.bridge {
        Some(bridge) if !connected => bridge.session().await.pending_qr().map(String::from),
        _ => None,
    };
    debug!(
        "status check: connected={connected}, qr={}",
        if qr_code.is_some() { "yes" } else { "no" }
    );

    Ok(Json(json!({"connected": connected, "qrCode": qr_code})))
}

/// `GET /api/status/qr.png`: the pending pairing QR as an image.
pub(super) async fn qr_png(
    headers: HeaderMap,
    State(state): State<ApiState>,
) -> ApiResult<Response> {
    if let Some(err) = check_auth(&headers, &state.api_key) {
        return Err(err);
    }

    let session = match &state.bridge {
        Some(bridge) => bridge.session().await,
        None => return Err(api_error(StatusCode::NOT_FOUND, "no QR code available")),
    };
    let Some(qr) = session.pending_qr() else {
        return Err(api_error(StatusCode::NOT_FOUND, "no QR code available"));
    };

    let png = generate_qr_image(qr).map_err(|e| {
        error!("QR image generation failed: {e}");
        api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("QR generation failed: {e}"),
        )
    })?;

    Ok(([(header::CONTENT_TYPE, "image/png")], png).into_response())
}

/// `POST /api/logout`: terminate the WhatsApp session.
pub(super) async fn logout(headers: HeaderMap, State(state): State<ApiState>) -> ApiResult {
    if let Some(err) = check_auth(&headers, &state.api_key) {
        return Err(err);
    }

    state.client.logout().await.map_err(|e| {
        error!("logout failed: {e}");
        api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    })?;
    info!("api: whatsapp session logged out");
    Ok(Json(json!({"success": true})))
}

/// `POST /api/whatsapp/events`: lifecycle events pushed by the bridge.
pub(super) async fn bridge_event(
    headers: HeaderMap,
    State(state): State<ApiState>,
    body: Result<Json<BridgeEvent>, axum::extract::rejection::JsonRejection>,
) -> ApiResult {
    if let Some(err) = check_auth(&headers, &state.api_key) {
        return Err(err);
    }

    let Json(event) =
        body.map_err(|e| api_error(StatusCode::BAD_REQUEST, format!("invalid event: {e}")))?;

    let Some(bridge) = &state.bridge else {
        return Err(api_error(
            StatusCode::NOT_FOUND,
            "whatsapp bridge not configured",
        ));
    };

    bridge.handle_event(event).await;
    Ok(Json(json!({"success": true})))
}
