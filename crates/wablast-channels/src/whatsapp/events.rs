//! Bridge lifecycle events and their effect on the session.

use super::qr::generate_qr_terminal;
use super::WhatsAppBridge;
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use wablast_core::message::InboundMessage;

/// Event pushed by the bridge to `POST /api/whatsapp/events`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BridgeEvent {
    /// A new pairing QR payload.
    Qr { qr: String },
    Authenticated,
    /// Session is ready to send.
    Ready,
    AuthFailure {
        #[serde(default)]
        message: String,
    },
    Disconnected {
        #[serde(default)]
        reason: String,
    },
    /// Inbound message from a contact.
    Message {
        from: String,
        #[serde(default)]
        body: String,
    },
}

impl WhatsAppBridge {
    /// Apply a bridge event to the session state.
    ///
    /// Inbound messages are forwarded to the receiver returned by `start()`.
    /// An auth failure triggers re-initialization in the background.
    pub async fn handle_event(self: &Arc<Self>, event: BridgeEvent) {
        match event {
            BridgeEvent::Qr { qr } => {
                info!("whatsapp: QR code received, scan to pair");
                match generate_qr_terminal(&qr) {
                    Ok(rendered) => info!("\n{rendered}"),
                    Err(e) => warn!("whatsapp: could not render QR: {e}"),
                }
                let mut session = self.session.write().await;
                session.qr_code = Some(qr);
                session.connected = false;
            }
            BridgeEvent::Authenticated => {
                info!("whatsapp: authenticated");
                let mut session = self.session.write().await;
                session.authenticated = true;
                session.last_error = None;
            }
            BridgeEvent::Ready => {
                info!("whatsapp: client is ready");
                let mut session = self.session.write().await;
                session.connected = true;
                session.authenticated = true;
                session.qr_code = None;
                session.last_error = None;
            }
            BridgeEvent::AuthFailure { message } => {
                error!("whatsapp: authentication failed: {message}");
                {
                    let mut session = self.session.write().await;
                    session.connected = false;
                    session.authenticated = false;
                    session.last_error = Some(format!("authentication failed: {message}"));
                }
                self.spawn_initialize();
            }
            BridgeEvent::Disconnected { reason } => {
                warn!("whatsapp: disconnected: {reason}");
                let mut session = self.session.write().await;
                session.connected = false;
                if !reason.is_empty() {
                    session.last_error = Some(format!("disconnected: {reason}"));
                }
            }
            BridgeEvent::Message { from, body } => {
                if from.is_empty() {
                    debug!("whatsapp: dropping message without sender");
                    return;
                }
                let tx = self.msg_tx.lock().await.clone();
                match tx {
                    Some(tx) => {
                        let inbound = InboundMessage {
                            from,
                            body,
                            timestamp: Utc::now(),
                        };
                        if tx.send(inbound).await.is_err() {
                            warn!("whatsapp: inbound receiver dropped");
                        }
                    }
                    None => warn!("whatsapp: message received before start(), dropped"),
                }
            }
        }
    }
}
