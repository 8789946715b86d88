//! Bridge HTTP request and response bodies.

use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct SendTextRequest<'a> {
    pub chat_id: &'a str,
    pub content: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct SendMediaRequest<'a> {
    pub chat_id: &'a str,
    pub caption: &'a str,
    pub media: MediaBody<'a>,
}

/// Media as the bridge expects it: base64 data plus metadata.
#[derive(Debug, Serialize)]
pub(super) struct MediaBody<'a> {
    pub mimetype: &'a str,
    pub filename: &'a str,
    pub data: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct ChatRequest<'a> {
    pub chat_id: &'a str,
}

#[derive(Debug, Deserialize)]
pub(super) struct RegisteredResponse {
    pub registered: bool,
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct ErrorBody {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}
