//! Gateway: the inbound message loop, auto-reply, the API server task, and
//! graceful shutdown.


use crate::api::{self, ApiState};
use crate::dispatcher::describe;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use wablast_core::{
    config::ApiConfig,
    handle::normalize,
    message::{InboundMessage, SendOutcome},
};

/// Ties the inbound stream from the WhatsApp client to the store and the API.
pub struct Gateway {
    state: ApiState,
    api_config: ApiConfig,
}

impl Gateway {
    pub fn new(state: ApiState, api_config: ApiConfig) -> Self {
        Self { state, api_config }
    }

    /// Run until ctrl-c.
    pub async fn run(
        self: Arc<Self>,
        mut inbound: mpsc::Receiver<InboundMessage>,
    ) -> anyhow::Result<()> {
        info!(
            "wablast gateway running | client: {} | mode: {:?} | api: {}:{} | auth: {}",
            self.state.client.name(),
            self.state.dispatcher.mode(),
            self.api_config.host,
            self.api_config.port,
            if self.state.api_key.is_some() {
                "enforced"
            } else {
                "disabled"
            },
        );

        let api_cfg = self.api_config.clone();
        let api_state = self.state.clone();
        let api_handle = tokio::spawn(async move {
            api::serve(api_cfg, api_state).await;
        });

        loop {
            tokio::select! {
                Some(msg) = inbound.recv() => {
                    let gw = self.clone();
                    tokio::spawn(async move {
                        gw.handle_inbound(msg).await;
                    });
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("Received shutdown signal");
                    break;
                }
            }
        }

        self.shutdown(&api_handle).await;
        Ok(())
    }

    /// Record an inbound message, then answer it when auto-reply is on.
    pub(crate) async fn handle_inbound(&self, msg: InboundMessage) {
        debug!("inbound from {}: {} byte(s)", msg.from, msg.body.len());
        self.state
            .dispatcher
            .record_inbound(&msg.from, &msg.body)
            .await;

        let settings = self.state.settings.get().await;
        let Some(reply) = settings.auto_reply_text() else {
            return;
        };

        let handle = normalize(&msg.from);
        let outcome = match self.state.client.send_text(&handle, reply).await {
            Ok(()) => {
                info!("auto-reply sent to {handle}");
                SendOutcome::success(&handle, reply, None)
            }
            Err(e) => {
                warn!("auto-reply to {handle} failed: {e}");
                SendOutcome::failed(&msg.from, reply, &describe(&e), None)
            }
        };

        if let Err(e) = self.state.store.insert_outcome(&outcome).await {
            warn!("failed to record auto-reply to {handle}: {e}");
        }
    }

    async fn shutdown(&self, api_handle: &tokio::task::JoinHandle<()>) {
        info!("Shutting down...");
        api_handle.abort();
        self.state.store.close().await;
        info!("Shutdown complete.");
    }
}
