//! The message log: one row per delivery attempt or inbound message.

use super::{from_db_time, to_db_time, Store};
use async_trait::async_trait;
use wablast_core::{
    error::BlastError,
    message::{Direction, OutcomeStatus, SendOutcome},
    traits::OutcomeStore,
};

type OutcomeRow = (
    i64,
    String,
    String,
    String,
    Option<String>,
    String,
    Option<String>,
    String,
);

const OUTCOME_COLUMNS: &str =
    "id, phone, message, status, error, direction, media, created_at";

fn outcome_from_row(row: OutcomeRow) -> Result<SendOutcome, BlastError> {
    let (id, phone, message, status, error, direction, media, created_at) = row;
    Ok(SendOutcome {
        id: Some(id),
        phone,
        message,
        status: status.parse::<OutcomeStatus>().map_err(BlastError::Storage)?,
        error,
        direction: direction.parse::<Direction>().map_err(BlastError::Storage)?,
        media,
        created_at: from_db_time(&created_at)?,
    })
}

impl Store {
    /// Append an outcome to the log.
    pub async fn insert_outcome(&self, outcome: &SendOutcome) -> Result<SendOutcome, BlastError> {
        let result = sqlx::query(
            "INSERT INTO messages (phone, message, status, error, direction, media, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&outcome.phone)
        .bind(&outcome.message)
        .bind(outcome.status.as_str())
        .bind(&outcome.error)
        .bind(outcome.direction.as_str())
        .bind(&outcome.media)
        .bind(to_db_time(&outcome.created_at))
        .execute(&self.pool)
        .await
        .map_err(|e| BlastError::Storage(format!("insert outcome: {e}")))?;

        let mut stored = outcome.clone();
        stored.id = Some(result.last_insert_rowid());
        Ok(stored)
    }

    /// All outcomes, newest first.
    pub async fn list_outcomes(&self) -> Result<Vec<SendOutcome>, BlastError> {
        let rows: Vec<OutcomeRow> = sqlx::query_as(&format!(
            "SELECT {OUTCOME_COLUMNS} FROM messages ORDER BY created_at DESC, id DESC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| BlastError::Storage(format!("list outcomes: {e}")))?;

        rows.into_iter().map(outcome_from_row).collect()
    }

    /// Conversation with one phone, oldest first.
    pub async fn outcomes_for_phone(&self, phone: &str) -> Result<Vec<SendOutcome>, BlastError> {
        let rows: Vec<OutcomeRow> = sqlx::query_as(&format!(
            "SELECT {OUTCOME_COLUMNS} FROM messages WHERE phone = ? \
             ORDER BY created_at ASC, id ASC"
        ))
        .bind(phone)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| BlastError::Storage(format!("outcomes for phone: {e}")))?;

        rows.into_iter().map(outcome_from_row).collect()
    }

    /// Delete the whole log. Returns the number of rows removed.
    pub async fn purge_outcomes(&self) -> Result<u64, BlastError> {
        let result = sqlx::query("DELETE FROM messages")
            .execute(&self.pool)
            .await
            .map_err(|e| BlastError::Storage(format!("purge outcomes: {e}")))?;
        Ok(result.rows_affected())
    }

    /// Number of successfully delivered messages.
    pub async fn success_count(&self) -> Result<i64, BlastError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM messages WHERE status = ?")
            .bind(OutcomeStatus::Success.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| BlastError::Storage(format!("success count: {e}")))?;
        Ok(count)
    }

    /// Total rows in the log.
    pub async fn outcome_count(&self) -> Result<i64, BlastError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM messages")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| BlastError::Storage(format!("outcome count: {e}")))?;
        Ok(count)
    }
}

#[async_trait]
impl OutcomeStore for Store {
    async fn insert_outcome(&self, outcome: &SendOutcome) -> Result<SendOutcome, BlastError> {
        Store::insert_outcome(self, outcome).await
    }
}
