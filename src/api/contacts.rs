//! Contact list endpoints and the random number generator.

use super::{api_error, blast_error, check_auth, ApiResult, ApiState};
use crate::numbers::{generate_numbers, MAX_GENERATED};
use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::Json,
};
use serde::Deserialize;
use serde_json::json;
use tracing::info;
use wablast_store::NewContact;

/// `POST /api/contacts` accepts one contact or a list.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(super) enum ContactsBody {
    Many(Vec<NewContact>),
    One(NewContact),
}

/// `GET /api/contacts`: all contacts, newest first.
pub(super) async fn list_contacts(
    headers: HeaderMap,
    State(state): State<ApiState>,
) -> ApiResult {
    if let Some(err) = check_auth(&headers, &state.api_key) {
        return Err(err);
    }

    let contacts = state.store.list_contacts().await.map_err(blast_error)?;
    Ok(Json(json!({"success": true, "contacts": contacts})))
}

/// `GET /api/contacts/count`
pub(super) async fn count_contacts(
    headers: HeaderMap,
    State(state): State<ApiState>,
) -> ApiResult {
    if let Some(err) = check_auth(&headers, &state.api_key) {
        return Err(err);
    }

    let count = state.store.count_contacts().await.map_err(blast_error)?;
    Ok(Json(json!({"count": count})))
}

/// `POST /api/contacts`: add contacts, one result per input.
pub(super) async fn add_contacts(
    headers: HeaderMap,
    State(state): State<ApiState>,
    body: Result<Json<ContactsBody>, axum::extract::rejection::JsonRejection>,
) -> ApiResult {
    if let Some(err) = check_auth(&headers, &state.api_key) {
        return Err(err);
    }

    let Json(body) = body
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, format!("invalid request: {e}")))?;
    let contacts = match body {
        ContactsBody::Many(list) => list,
        ContactsBody::One(contact) => vec![contact],
    };
    if contacts.is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "no contacts given"));
    }

    let results = state.store.add_contacts(&contacts).await;
    let added = results.iter().filter(|r| r.status == "success").count();
    info!("api: added {added}/{} contact(s)", results.len());
    Ok(Json(json!({"success": true, "results": results})))
}

/// `DELETE /api/contacts/{id}`
pub(super) async fn delete_contact(
    headers: HeaderMap,
    State(state): State<ApiState>,
    Path(id): Path<i64>,
) -> ApiResult {
    if let Some(err) = check_auth(&headers, &state.api_key) {
        return Err(err);
    }

    if !state.store.delete_contact(id).await.map_err(blast_error)? {
        return Err(api_error(
            StatusCode::NOT_FOUND,
            format!("contact {id} not found"),
        ));
    }
    Ok(Json(json!({"success": true})))
}

/// `DELETE /api/contacts`: remove every contact.
pub(super) async fn delete_all_contacts(
    headers: HeaderMap,
    State(state): State<ApiState>,
) -> ApiResult {
    if let Some(err) = check_auth(&headers, &state.api_key) {
        return Err(err);
    }

    let deleted = state.store.delete_all_contacts().await.map_err(blast_error)?;
    info!("api: deleted {deleted} contact(s)");
    Ok(Json(json!({"success": true, "deleted": deleted})))
}

#[derive(Debug, Deserialize)]
pub(super) struct RandomQuery {
    count: Option<usize>,
}

/// `GET /api/numbers/random?count=N`: random Indonesian mobile numbers.
pub(super) async fn random_numbers(
    headers: HeaderMap,
    State(state): State<ApiState>,
    query: Result<Query<RandomQuery>, axum::extract::rejection::QueryRejection>,
) -> ApiResult {
    if let Some(err) = check_auth(&headers, &state.api_key) {
        return Err(err);
    }

    let Query(query) = query
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, format!("invalid query: {e}")))?;
    let count = query.count.unwrap_or(10);
    if !(1..=MAX_GENERATED).contains(&count) {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            format!("count must be between 1 and {MAX_GENERATED}"),
        ));
    }

    Ok(Json(json!({"success": true, "numbers": generate_numbers(count)})))
}
