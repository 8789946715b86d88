use crate::{
    error::BlastError,
    message::{SendOutcome, StagedMedia},
};
use async_trait::async_trait;

/// The WhatsApp session the dashboard drives.
///
/// The session itself (pairing, auth persistence, transport) lives outside
/// this workspace. One instance is shared by every batch; implementations
/// are not required to handle overlapping batches.
#[async_trait]
pub trait MessagingClient: Send + Sync {
    /// Human-readable client name.
    fn name(&self) -> &str;

    /// Whether the session is authenticated and able to send.
    async fn is_ready(&self) -> bool;

    /// Start (or restart) the session. Emits a QR code when unpaired.
    async fn initialize(&self) -> Result<(), BlastError>;

    /// Send a text message to a canonical chat handle.
    async fn send_text(&self, handle: &str, text: &str) -> Result<(), BlastError>;

    /// Send staged media with a caption to a canonical chat handle.
    async fn send_media(
        &self,
        handle: &str,
        media: &StagedMedia,
        caption: &str,
    ) -> Result<(), BlastError>;

    /// Check whether a handle belongs to a registered WhatsApp account.
    async fn is_registered_user(&self, handle: &str) -> Result<bool, BlastError>;

    /// Terminate the session.
    async fn logout(&self) -> Result<(), BlastError>;
}

/// Append-only sink for outcome records.
///
/// Implementations serialize concurrent inserts themselves.
#[async_trait]
pub trait OutcomeStore: Send + Sync {
    /// Persist one outcome, returning it with its assigned id.
    async fn insert_outcome(&self, outcome: &SendOutcome) -> Result<SendOutcome, BlastError>;
}
