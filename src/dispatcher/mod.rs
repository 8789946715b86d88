//! Fans one batch out into independent delivery attempts.
//!
//! Each recipient is normalized, attempted, and recorded on its own. A failed
//! or crashed attempt turns into a `failed` outcome for that recipient only.


use futures_util::future::join_all;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use wablast_core::{
    config::{DispatchConfig, DispatchMode},
    error::BlastError,
    handle::normalize,
    message::{BatchResult, MediaPayload, SendOutcome, StagedMedia, UnrecordedOutcome},
    traits::{MessagingClient, OutcomeStore},
};
use wablast_store::MediaStager;

/// Error text recorded when an attempt task panics.
pub const CRASHED_ATTEMPT: &str = "dispatch task crashed";

/// In-flight bound for media batches when `max_concurrency` is unbounded.
/// Each media request carries its own encoded copy of the file.
pub const MEDIA_CONCURRENCY: usize = 4;

/// Result of one recipient's attempt: persisted, or produced but not persisted.
type AttemptRecord = Result<SendOutcome, UnrecordedOutcome>;

/// Sends batches through the shared messaging client and records every outcome.
pub struct Dispatcher {
    client: Arc<dyn MessagingClient>,
    store: Arc<dyn OutcomeStore>,
    stager: MediaStager,
    mode: DispatchMode,
    send_timeout: Duration,
    /// Bounds in-flight attempts in parallel mode.
    limiter: Option<Arc<Semaphore>>,
    /// Held for the whole batch when batches are serialized.
    batch_gate: Option<Mutex<()>>,
    /// Pause between sequential attempts, in milliseconds. Follows `messageDelay`.
    message_delay_ms: AtomicU64,
}

impl Dispatcher {
    pub fn new(
        client: Arc<dyn MessagingClient>,
        store: Arc<dyn OutcomeStore>,
        stager: MediaStager,
        config: &DispatchConfig,
    ) -> Self {
        Self {
            client,
            store,
            stager,
            mode: config.mode,
            send_timeout: Duration::from_secs(config.send_timeout_secs),
            limiter: (config.max_concurrency > 0)
                .then(|| Arc::new(Semaphore::new(config.max_concurrency))),
            batch_gate: config.serialize_batches.then(|| Mutex::new(())),
            message_delay_ms: AtomicU64::new(0),
        }
    }

    /// Set the pause between attempts in sequential mode.
    pub fn set_message_delay(&self, delay: Duration) {
        let ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self.message_delay_ms.store(ms, Ordering::Relaxed);
    }

    pub fn message_delay(&self) -> Duration {
        Duration::from_millis(self.message_delay_ms.load(Ordering::Relaxed))
    }

    pub fn mode(&self) -> DispatchMode {
        self.mode
    }

    /// Send `message` (and optional media) to every recipient.
    ///
    /// Refuses with `SessionNotReady` before staging or persisting anything
    /// when the client is not ready. Otherwise every recipient yields exactly
    /// one outcome, in input order.
    pub async fn dispatch_batch(
        &self,
        recipients: &[String],
        message: &str,
        media: Option<&MediaPayload>,
    ) -> Result<BatchResult, BlastError> {
        let _gate = match &self.batch_gate {
            Some(gate) => Some(gate.lock().await),
            None => None,
        };

        if !self.client.is_ready().await {
            warn!("dispatch refused: whatsapp session not ready");
            return Err(BlastError::SessionNotReady);
        }

        let staged = match media {
            Some(payload) => Some(Arc::new(self.stager.stage(payload).await?)),
            None => None,
        };

        let started = Instant::now();
        info!(
            "dispatch: {} recipient(s), mode={:?}, media={}",
            recipients.len(),
            self.mode,
            staged.as_ref().map_or("none", |s| s.file_name.as_str()),
        );

        let records = match self.mode {
            DispatchMode::Parallel => self.run_parallel(recipients, message, &staged).await,
            DispatchMode::Sequential => self.run_sequential(recipients, message, &staged).await,
        };

        let mut result = BatchResult::default();
        for record in records {
            match record {
                Ok(outcome) => result.outcomes.push(outcome),
                Err(unrecorded) => result.unrecorded.push(unrecorded),
            }
        }

        info!(
            "dispatch done in {}ms: {} success, {} failed, {} unrecorded",
            started.elapsed().as_millis(),
            result.success_count(),
            result.failed_count(),
            result.unrecorded.len(),
        );
        Ok(result)
    }

    /// Persist an inbound message. Failures are logged and swallowed.
    pub async fn record_inbound(&self, from: &str, body: &str) {
        let outcome = SendOutcome::received(from, body);
        match self.store.insert_outcome(&outcome).await {
            Ok(_) => debug!("inbound from {from} recorded"),
            Err(e) => warn!("failed to record inbound message from {from}: {e}"),
        }
    }

    /// Start every attempt at once and join them all.
    async fn run_parallel(
        &self,
        recipients: &[String],
        message: &str,
        staged: &Option<Arc<StagedMedia>>,
    ) -> Vec<AttemptRecord> {
        let limiter = self.limiter.clone().or_else(|| {
            staged
                .is_some()
                .then(|| Arc::new(Semaphore::new(MEDIA_CONCURRENCY)))
        });
        let handles: Vec<JoinHandle<AttemptRecord>> = recipients
            .iter()
            .map(|raw| self.spawn_attempt(raw, message, staged, limiter.clone()))
            .collect();

        let joined = join_all(handles).await;

        let mut records = Vec::with_capacity(recipients.len());
        for (raw, joined) in recipients.iter().zip(joined) {
            records.push(self.settle(raw, message, staged, joined).await);
        }
        records
    }

    /// One attempt at a time, pausing `message_delay` in between.
    async fn run_sequential(
        &self,
        recipients: &[String],
        message: &str,
        staged: &Option<Arc<StagedMedia>>,
    ) -> Vec<AttemptRecord> {
        let delay = self.message_delay();
        let mut records = Vec::with_capacity(recipients.len());
        for (i, raw) in recipients.iter().enumerate() {
            if i > 0 && !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            let joined = self.spawn_attempt(raw, message, staged, None).await;
            records.push(self.settle(raw, message, staged, joined).await);
        }
        records
    }

    /// Spawn normalize, attempt, and persist for one recipient.
    fn spawn_attempt(
        &self,
        raw: &str,
        message: &str,
        staged: &Option<Arc<StagedMedia>>,
        limiter: Option<Arc<Semaphore>>,
    ) -> JoinHandle<AttemptRecord> {
        let client = Arc::clone(&self.client);
        let store = Arc::clone(&self.store);
        let staged = staged.clone();
        let raw = raw.to_string();
        let message = message.to_string();
        let send_timeout = self.send_timeout;

        tokio::spawn(async move {
            let _permit = match limiter {
                Some(sem) => sem.acquire_owned().await.ok(),
                None => None,
            };
            let outcome = attempt(
                client.as_ref(),
                &raw,
                &message,
                staged.as_deref(),
                send_timeout,
            )
            .await;
            persist(store.as_ref(), outcome).await
        })
    }

    /// Turn a joined attempt into a record. A panicked task becomes a failed outcome.
    async fn settle(
        &self,
        raw: &str,
        message: &str,
        staged: &Option<Arc<StagedMedia>>,
        joined: Result<AttemptRecord, tokio::task::JoinError>,
    ) -> AttemptRecord {
        match joined {
            Ok(record) => record,
            Err(e) => {
                error!("dispatch task for {raw} crashed: {e}");
                let media = staged.as_ref().map(|s| s.file_name.clone());
                let outcome = SendOutcome::failed(raw, message, CRASHED_ATTEMPT, media);
                persist(self.store.as_ref(), outcome).await
            }
        }
    }
}

/// Normalize and send to one recipient, bounded by `send_timeout`. Never fails.
async fn attempt(
    client: &dyn MessagingClient,
    raw: &str,
    message: &str,
    staged: Option<&StagedMedia>,
    send_timeout: Duration,
) -> SendOutcome {
    let handle = normalize(raw);
    let media_ref = staged.map(|s| s.file_name.clone());

    let send = async {
        match staged {
            Some(media) => client.send_media(&handle, media, message).await,
            None => client.send_text(&handle, message).await,
        }
    };

    match tokio::time::timeout(send_timeout, send).await {
        Ok(Ok(())) => {
            debug!("sent to {handle}");
            SendOutcome::success(&handle, message, media_ref)
        }
        Ok(Err(e)) => {
            warn!("send to {raw} failed: {e}");
            SendOutcome::failed(raw, message, &describe(&e), media_ref)
        }
        Err(_) => {
            warn!("send to {raw} timed out");
            let reason = format!("send timed out after {}s", send_timeout.as_secs());
            SendOutcome::failed(raw, message, &reason, media_ref)
        }
    }
}

async fn persist(store: &dyn OutcomeStore, outcome: SendOutcome) -> AttemptRecord {
    match store.insert_outcome(&outcome).await {
        Ok(stored) => Ok(stored),
        Err(e) => {
            error!("failed to record outcome for {}: {e}", outcome.phone);
            Err(UnrecordedOutcome {
                outcome,
                error: e.to_string(),
            })
        }
    }
}

/// Human-readable failure text. Client errors are reported without the prefix.
pub(crate) fn describe(e: &BlastError) -> String {
    match e {
        BlastError::Client(msg) => msg.clone(),
        other => other.to_string(),
    }
}
