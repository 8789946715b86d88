//! Blast sending, delivery history, and number checks.

use super::{api_error, blast_error, check_auth, ApiResult, ApiState};
use axum::{
    extract::{FromRequest, Multipart, Query, Request, State},
    http::{header, HeaderMap, StatusCode},
    response::Json,
};
use futures_util::future::join_all;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};
use wablast_core::{handle::normalize, message::MediaPayload};

/// JSON body of `POST /api/send`.
#[derive(Debug, Deserialize)]
pub(super) struct SendRequest {
    #[serde(default)]
    numbers: Vec<String>,
    #[serde(default)]
    message: String,
}

/// A send request after decoding, from either JSON or multipart.
#[derive(Debug, Default)]
struct SendForm {
    numbers: Vec<String>,
    message: String,
    media: Option<MediaPayload>,
}

/// `POST /api/send`: dispatch one batch.
///
/// Accepts JSON `{numbers, message}` or multipart with `numbers` (JSON array
/// or comma/newline separated), `message`, and a `media` file.
pub(super) async fn send(State(state): State<ApiState>, request: Request) -> ApiResult {
    if let Some(err) = check_auth(request.headers(), &state.api_key) {
        return Err(err);
    }

    let is_multipart = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("multipart/form-data"));

    let form = if is_multipart {
        read_multipart(request, &state).await?
    } else {
        let Json(body) = Json::<SendRequest>::from_request(request, &state)
            .await
            .map_err(|e| api_error(StatusCode::BAD_REQUEST, format!("invalid request: {e}")))?;
        SendForm {
            numbers: body.numbers,
            message: body.message,
            media: None,
        }
    };

    // Trimmed values are what a failed outcome echoes.
    let recipients: Vec<String> = form
        .numbers
        .iter()
        .map(|n| n.trim())
        .filter(|n| !n.is_empty())
        .map(String::from)
        .collect();

    if recipients.is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "no recipients given"));
    }
    if form.message.trim().is_empty() && form.media.is_none() {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "message or media is required",
        ));
    }
    let max = state.settings.get().await.max_blast_size;
    if recipients.len() as u64 > max {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            format!(
                "too many recipients: {} exceeds the limit of {max}",
                recipients.len()
            ),
        ));
    }

    let result = state
        .dispatcher
        .dispatch_batch(&recipients, &form.message, form.media.as_ref())
        .await
        .map_err(blast_error)?;

    info!(
        "api: blast to {} recipient(s) finished, {} success",
        result.total(),
        result.success_count()
    );

    let mut body = json!({
        "success": result.unrecorded.is_empty(),
        "results": result.outcomes,
        "summary": {
            "total": result.total(),
            "success": result.success_count(),
            "failed": result.failed_count(),
        },
    });
    if !result.unrecorded.is_empty() {
        body["unrecorded"] = json!(result.unrecorded);
    }
    Ok(Json(body))
}

async fn read_multipart(request: Request, state: &ApiState) -> ApiResult<SendForm> {
    let mut multipart = Multipart::from_request(request, state)
        .await
        .map_err(bad_multipart)?;

    let mut form = SendForm::default();
    while let Some(field) = multipart.next_field().await.map_err(bad_multipart)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "numbers" => {
                let raw = field.text().await.map_err(bad_multipart)?;
                form.numbers = parse_numbers(&raw);
            }
            "message" => {
                form.message = field.text().await.map_err(bad_multipart)?;
            }
            "media" => {
                let filename = field.file_name().map(String::from);
                let mime_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let data = field.bytes().await.map_err(bad_multipart)?;
                if !data.is_empty() {
                    form.media = Some(MediaPayload {
                        data: data.to_vec(),
                        mime_type,
                        filename,
                    });
                }
            }
            other => warn!("api: ignoring unknown multipart field '{other}'"),
        }
    }
    Ok(form)
}

fn bad_multipart(e: impl std::fmt::Display) -> super::ApiError {
    api_error(StatusCode::BAD_REQUEST, format!("invalid multipart body: {e}"))
}

/// Recipients from a multipart field: a JSON array, or a comma/newline list.
pub(super) fn parse_numbers(raw: &str) -> Vec<String> {
    if let Ok(list) = serde_json::from_str::<Vec<String>>(raw) {
        return list;
    }
    raw.split([',', '\n', ';'])
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .collect()
}

#[derive(Debug, Deserialize)]
pub(super) struct MessagesQuery {
    phone: Option<String>,
}

/// `GET /api/messages`: one conversation oldest first, or everything newest first.
pub(super) async fn list_messages(
    headers: HeaderMap,
    State(state): State<ApiState>,
    Query(query): Query<MessagesQuery>,
) -> ApiResult {
    if let Some(err) = check_auth(&headers, &state.api_key) {
        return Err(err);
    }

    let messages = match query.phone.as_deref().map(str::trim) {
        Some(phone) if !phone.is_empty() => state.store.outcomes_for_phone(phone).await,
        _ => state.store.list_outcomes().await,
    }
    .map_err(blast_error)?;

    Ok(Json(json!({"success": true, "messages": messages})))
}

/// `DELETE /api/messages`: purge the whole history.
pub(super) async fn purge_messages(
    headers: HeaderMap,
    State(state): State<ApiState>,
) -> ApiResult {
    if let Some(err) = check_auth(&headers, &state.api_key) {
        return Err(err);
    }

    let deleted = state.store.purge_outcomes().await.map_err(blast_error)?;
    info!("api: purged {deleted} message(s)");
    Ok(Json(json!({"success": true, "deleted": deleted})))
}

/// `GET /api/messages/success-count`
pub(super) async fn success_count(
    headers: HeaderMap,
    State(state): State<ApiState>,
) -> ApiResult {
    if let Some(err) = check_auth(&headers, &state.api_key) {
        return Err(err);
    }

    let count = state.store.success_count().await.map_err(blast_error)?;
    Ok(Json(json!({"count": count})))
}

#[derive(Debug, Deserialize)]
pub(super) struct CheckRequest {
    #[serde(default)]
    numbers: Vec<String>,
}

/// `POST /api/check-whatsapp`: which numbers have a WhatsApp account.
pub(super) async fn check_whatsapp(
    headers: HeaderMap,
    State(state): State<ApiState>,
    body: Result<Json<CheckRequest>, axum::extract::rejection::JsonRejection>,
) -> ApiResult {
    if let Some(err) = check_auth(&headers, &state.api_key) {
        return Err(err);
    }

    let Json(request) = body
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, format!("invalid request: {e}")))?;

    let numbers: Vec<&str> = request
        .numbers
        .iter()
        .map(|n| n.trim())
        .filter(|n| !n.is_empty())
        .collect();
    if numbers.is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "no numbers given"));
    }
    if !state.client.is_ready().await {
        return Err(api_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "whatsapp session not ready",
        ));
    }

    let checks = numbers.iter().map(|number| {
        let client = state.client.clone();
        async move {
            match client.is_registered_user(&normalize(number)).await {
                Ok(exists) => json!({"number": number, "exists": exists}),
                Err(e) => json!({"number": number, "exists": false, "error": e.to_string()}),
            }
        }
    });
    let results: Vec<Value> = join_all(checks).await;

    Ok(Json(json!({"success": true, "results": results})))
}
