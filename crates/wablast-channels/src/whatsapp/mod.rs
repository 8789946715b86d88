//! WhatsApp session via an external bridge process.
//!
//! The bridge drives WhatsApp Web and exposes a small HTTP API for sending.
//! It reports lifecycle events (QR rotation, auth, inbound messages) by
//! POSTing them back to the dashboard, which feeds them to
//! [`WhatsAppBridge::handle_event`].

mod client;
mod events;
mod qr;
mod session;
mod types;


pub use events::BridgeEvent;
pub use qr::{generate_qr_image, generate_qr_terminal};
pub use session::SessionState;

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex, RwLock};
use tracing::{debug, info, warn};
use wablast_core::{
    config::WhatsAppConfig, error::BlastError, message::InboundMessage, traits::MessagingClient,
};

/// Delay between failed `initialize` attempts at startup.
pub const INIT_RETRY_DELAY: Duration = Duration::from_secs(5);

/// HTTP client for the WhatsApp bridge, plus the session state it reports.
pub struct WhatsAppBridge {
    pub(super) client: reqwest::Client,
    pub(super) base_url: String,
    pub(super) token: Option<String>,
    pub(super) session: Arc<RwLock<SessionState>>,
    /// Inbound message sender, set by `start()`.
    pub(super) msg_tx: Arc<Mutex<Option<mpsc::Sender<InboundMessage>>>>,
    pub(super) init_retry_delay: Duration,
    /// Set while an `initialize` retry loop is running.
    pub(super) initializing: Arc<AtomicBool>,
    /// Base64 of the last staged file sent, keyed by its path. Staged paths
    /// are unique, so one batch reads and encodes its media once.
    pub(super) media_cache: Mutex<Option<(PathBuf, Arc<str>)>>,
}

impl WhatsAppBridge {
    /// Create a bridge client from config.
    pub fn new(config: &WhatsAppConfig) -> Result<Self, BlastError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| BlastError::Client(format!("failed to build http client: {e}")))?;
        let token = Some(config.bridge_token.trim())
            .filter(|t| !t.is_empty())
            .map(String::from);

        Ok(Self {
            client,
            base_url: config.bridge_url.trim_end_matches('/').to_string(),
            token,
            session: Arc::new(RwLock::new(SessionState::default())),
            msg_tx: Arc::new(Mutex::new(None)),
            init_retry_delay: INIT_RETRY_DELAY,
            initializing: Arc::new(AtomicBool::new(false)),
            media_cache: Mutex::new(None),
        })
    }

    /// Override the startup retry delay.
    pub fn with_init_retry_delay(mut self, delay: Duration) -> Self {
        self.init_retry_delay = delay;
        self
    }

    /// Snapshot of the current session state.
    pub async fn session(&self) -> SessionState {
        self.session.read().await.clone()
    }

    /// Open the inbound channel and initialize the session in the background,
    /// retrying until the bridge accepts.
    pub async fn start(self: &Arc<Self>) -> mpsc::Receiver<InboundMessage> {
        let (tx, rx) = mpsc::channel(64);
        *self.msg_tx.lock().await = Some(tx);

        self.spawn_initialize();

        info!("WhatsApp bridge client started ({})", self.base_url);
        rx
    }

    /// Start the `initialize` retry loop unless one is already running.
    /// Returns whether a new loop was started.
    pub(super) fn spawn_initialize(self: &Arc<Self>) -> bool {
        if self
            .initializing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("whatsapp initialize already in progress");
            return false;
        }

        let bridge = Arc::clone(self);
        tokio::spawn(async move {
            bridge.initialize_until_ready().await;
            bridge.initializing.store(false, Ordering::Release);
        });
        true
    }

    /// Call `initialize` until it succeeds.
    pub(super) async fn initialize_until_ready(&self) {
        loop {
            match self.initialize().await {
                Ok(()) => return,
                Err(e) => {
                    warn!(
                        "whatsapp initialize failed (retry in {}s): {e}",
                        self.init_retry_delay.as_secs_f32()
                    );
                    self.session.write().await.last_error = Some(e.to_string());
                    tokio::time::sleep(self.init_retry_delay).await;
                }
            }
        }
    }

    pub(super) fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}
