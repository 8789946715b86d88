use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Result classification of one outcome record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
    Success,
    Failed,
    /// Only used for inbound messages.
    Received,
}

impl OutcomeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Received => "received",
        }
    }
}

impl FromStr for OutcomeStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(Self::Success),
            "failed" => Ok(Self::Failed),
            "received" => Ok(Self::Received),
            other => Err(format!("unknown outcome status '{other}'")),
        }
    }
}

/// Which way a message travelled.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Outgoing,
    Incoming,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Outgoing => "outgoing",
            Self::Incoming => "incoming",
        }
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "outgoing" => Ok(Self::Outgoing),
            "incoming" => Ok(Self::Incoming),
            other => Err(format!("unknown direction '{other}'")),
        }
    }
}

/// The recorded result of one delivery attempt or one inbound message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendOutcome {
    /// Store row id. `None` until persisted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    /// Canonical handle on success, raw input on failure, sender for inbound.
    pub phone: String,
    pub message: String,
    pub status: OutcomeStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub direction: Direction,
    /// Stored media reference (staged file name).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl SendOutcome {
    /// A delivered outgoing message, addressed by canonical handle.
    pub fn success(handle: &str, message: &str, media: Option<String>) -> Self {
        Self {
            id: None,
            phone: handle.to_string(),
            message: message.to_string(),
            status: OutcomeStatus::Success,
            error: None,
            direction: Direction::Outgoing,
            media,
            created_at: Utc::now(),
        }
    }

    /// A failed outgoing message, addressed by the caller's raw input.
    pub fn failed(raw: &str, message: &str, error: &str, media: Option<String>) -> Self {
        Self {
            id: None,
            phone: raw.to_string(),
            message: message.to_string(),
            status: OutcomeStatus::Failed,
            error: Some(error.to_string()),
            direction: Direction::Outgoing,
            media,
            created_at: Utc::now(),
        }
    }

    /// An inbound message reported by the client.
    pub fn received(from: &str, body: &str) -> Self {
        Self {
            id: None,
            phone: from.to_string(),
            message: body.to_string(),
            status: OutcomeStatus::Received,
            error: None,
            direction: Direction::Incoming,
            media: None,
            created_at: Utc::now(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == OutcomeStatus::Success
    }
}

/// Binary content attached to a batch, as uploaded by the operator.
#[derive(Clone)]
pub struct MediaPayload {
    pub data: Vec<u8>,
    pub mime_type: String,
    pub filename: Option<String>,
}

impl fmt::Debug for MediaPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaPayload")
            .field("bytes", &self.data.len())
            .field("mime_type", &self.mime_type)
            .field("filename", &self.filename)
            .finish()
    }
}

/// Media written to durable storage before fan-out.
///
/// Every attempt in a batch references the same staged object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedMedia {
    pub path: PathBuf,
    /// Name of the stored file, recorded on outcomes as the media reference.
    pub file_name: String,
    pub mime_type: String,
    /// Filename as uploaded, if any.
    pub original_name: Option<String>,
}

impl StagedMedia {
    /// Load the staged bytes back from disk.
    pub async fn read(&self) -> std::io::Result<Vec<u8>> {
        tokio::fs::read(&self.path).await
    }

    /// Filename to present to the recipient.
    pub fn display_name(&self) -> &str {
        self.original_name.as_deref().unwrap_or(&self.file_name)
    }
}

/// One operator-initiated send to many recipients.
#[derive(Debug, Clone)]
pub struct BatchRequest {
    pub recipients: Vec<String>,
    pub message: String,
    pub media: Option<MediaPayload>,
}

/// An outcome whose persistence failed.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnrecordedOutcome {
    pub outcome: SendOutcome,
    pub error: String,
}

/// Per-recipient results of one batch.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResult {
    /// Persisted outcomes.
    pub outcomes: Vec<SendOutcome>,
    /// Outcomes that were produced but could not be written to the store.
    pub unrecorded: Vec<UnrecordedOutcome>,
}

impl BatchResult {
    pub fn total(&self) -> usize {
        self.outcomes.len() + self.unrecorded.len()
    }

    pub fn success_count(&self) -> usize {
        self.all().filter(|o| o.is_success()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.all()
            .filter(|o| o.status == OutcomeStatus::Failed)
            .count()
    }

    /// Every outcome produced, recorded or not.
    pub fn all(&self) -> impl Iterator<Item = &SendOutcome> {
        self.outcomes
            .iter()
            .chain(self.unrecorded.iter().map(|u| &u.outcome))
    }
}

/// A message received from a WhatsApp contact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Sender handle, already canonical as delivered by the client.
    pub from: String,
    pub body: String,
    pub timestamp: DateTime<Utc>,
}
