//! MessagingClient implementation over the bridge HTTP API.

use super::types::{
    ChatRequest, ErrorBody, MediaBody, RegisteredResponse, SendMediaRequest, SendTextRequest,
};
use super::WhatsAppBridge;
use async_trait::async_trait;
use base64::Engine;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};
use wablast_core::{error::BlastError, message::StagedMedia, traits::MessagingClient};

impl WhatsAppBridge {
    /// POST a JSON body to the bridge. Non-2xx responses become `BlastError::Client`
    /// carrying the bridge's `error` text when it sends one.
    async fn post<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<reqwest::Response, BlastError> {
        let mut req = self.client.post(self.url(path)).json(body);
        if let Some(ref token) = self.token {
            req = req.bearer_auth(token);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| BlastError::Client(format!("bridge request {path} failed: {e}")))?;

        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }

        let body: ErrorBody = resp.json().await.unwrap_or_default();
        let detail = body
            .error
            .or(body.message)
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| format!("bridge returned {status}"));
        Err(BlastError::Client(detail))
    }

    /// Base64 of a staged file, read and encoded once per staged path.
    async fn encoded_media(&self, media: &StagedMedia) -> Result<Arc<str>, BlastError> {
        let mut cache = self.media_cache.lock().await;
        if let Some((path, data)) = cache.as_ref() {
            if *path == media.path {
                return Ok(Arc::clone(data));
            }
        }

        let bytes = media.read().await?;
        let data: Arc<str> = base64::engine::general_purpose::STANDARD
            .encode(bytes)
            .into();
        debug!("whatsapp: encoded {} for sending", media.file_name);
        *cache = Some((media.path.clone(), Arc::clone(&data)));
        Ok(data)
    }
}

#[async_trait]
impl MessagingClient for WhatsAppBridge {
    fn name(&self) -> &str {
        "whatsapp"
    }

    async fn is_ready(&self) -> bool {
        self.session.read().await.connected
    }

    async fn initialize(&self) -> Result<(), BlastError> {
        self.post("/initialize", &serde_json::json!({})).await?;
        info!("whatsapp bridge initializing");
        Ok(())
    }

    async fn send_text(&self, handle: &str, text: &str) -> Result<(), BlastError> {
        self.post(
            "/messages",
            &SendTextRequest {
                chat_id: handle,
                content: text,
            },
        )
        .await?;
        debug!("whatsapp: sent text to {handle}");
        Ok(())
    }

    async fn send_media(
        &self,
        handle: &str,
        media: &StagedMedia,
        caption: &str,
    ) -> Result<(), BlastError> {
        let data = self.encoded_media(media).await?;
        self.post(
            "/messages",
            &SendMediaRequest {
                chat_id: handle,
                caption,
                media: MediaBody {
                    mimetype: &media.mime_type,
                    filename: media.display_name(),
                    data: &data,
                },
            },
        )
        .await?;
        debug!("whatsapp: sent {} to {handle}", media.file_name);
        Ok(())
    }

    async fn is_registered_user(&self, handle: &str) -> Result<bool, BlastError> {
        let resp = self
            .post("/contacts/registered", &ChatRequest { chat_id: handle })
            .await?;
        let body: RegisteredResponse = resp
            .json()
            .await
            .map_err(|e| BlastError::Client(format!("bad registered response: {e}")))?;
        Ok(body.registered)
    }

    async fn logout(&self) -> Result<(), BlastError> {
        self.post("/logout", &serde_json::json!({})).await?;
        let mut session = self.session.write().await;
        session.connected = false;
        session.authenticated = false;
        session.qr_code = None;
        info!("whatsapp session logged out");
        Ok(())
    }
}
