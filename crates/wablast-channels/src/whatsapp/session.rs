use serde::Serialize;

/// Connection state of the WhatsApp session, as last reported by the bridge.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    /// Session is ready to send.
    pub connected: bool,
    pub authenticated: bool,
    /// Latest pairing QR payload. Cleared once connected.
    pub qr_code: Option<String>,
    pub last_error: Option<String>,
}

impl SessionState {
    /// QR payload to show the operator. `None` while connected.
    pub fn pending_qr(&self) -> Option<&str> {
        if self.connected {
            None
        } else {
            self.qr_code.as_deref()
        }
    }
}
