//! Contact list CRUD.

use super::{from_db_time, Store};
use chrono::{DateTime, Utc};
use serde::{de, Deserialize, Deserializer, Serialize};
use wablast_core::error::BlastError;

/// A saved contact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    pub id: i64,
    pub name: String,
    pub phone: String,
    pub created_at: DateTime<Utc>,
}

/// Contact as submitted by the dashboard.
///
/// Rows come straight from spreadsheet imports: `phone` may be a JSON number
/// and either field may be missing. Missing fields are rejected per row by
/// [`Store::add_contacts`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewContact {
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "phone_text")]
    pub phone: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PhoneValue {
    Unsigned(u64),
    Signed(i64),
    Float(f64),
    Text(String),
    Null(()),
}

fn phone_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    match PhoneValue::deserialize(deserializer)? {
        PhoneValue::Unsigned(n) => Ok(n.to_string()),
        PhoneValue::Signed(n) => Ok(n.to_string()),
        PhoneValue::Float(f) if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e18 => {
            Ok(format!("{f:.0}"))
        }
        PhoneValue::Float(f) => Err(de::Error::custom(format!("invalid phone number {f}"))),
        PhoneValue::Text(s) => Ok(s),
        PhoneValue::Null(()) => Ok(String::new()),
    }
}

/// Per-contact result of a bulk import.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub name: String,
    pub phone: String,
    /// `success` or `failed`.
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Store {
    /// Insert one contact. Fails on a duplicate phone.
    pub async fn add_contact(&self, contact: &NewContact) -> Result<Contact, BlastError> {
        let (id, created_at): (i64, String) = sqlx::query_as(
            "INSERT INTO contacts (name, phone) VALUES (?, ?) RETURNING id, created_at",
        )
        .bind(contact.name.trim())
        .bind(contact.phone.trim())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| BlastError::Storage(format!("add contact: {e}")))?;

        Ok(Contact {
            id,
            name: contact.name.trim().to_string(),
            phone: contact.phone.trim().to_string(),
            created_at: from_db_time(&created_at)?,
        })
    }

    /// Insert many contacts, one result per input. A bad row does not stop the rest.
    pub async fn add_contacts(&self, contacts: &[NewContact]) -> Vec<ContactResult> {
        let mut results = Vec::with_capacity(contacts.len());
        for contact in contacts {
            let result = if contact.name.trim().is_empty() || contact.phone.trim().is_empty() {
                ContactResult {
                    id: None,
                    name: contact.name.clone(),
                    phone: contact.phone.clone(),
                    status: "failed",
                    error: Some("name and phone are required".to_string()),
                }
            } else {
                match self.add_contact(contact).await {
                    Ok(saved) => ContactResult {
                        id: Some(saved.id),
                        name: saved.name,
                        phone: saved.phone,
                        status: "success",
                        error: None,
                    },
                    Err(e) => ContactResult {
                        id: None,
                        name: contact.name.clone(),
                        phone: contact.phone.clone(),
                        status: "failed",
                        error: Some(e.to_string()),
                    },
                }
            };
            results.push(result);
        }
        results
    }

    /// All contacts, newest first.
    pub async fn list_contacts(&self) -> Result<Vec<Contact>, BlastError> {
        let rows: Vec<(i64, String, String, String)> = sqlx::query_as(
            "SELECT id, name, phone, created_at FROM contacts ORDER BY created_at DESC, id DESC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| BlastError::Storage(format!("list contacts: {e}")))?;

        rows.into_iter()
            .map(|(id, name, phone, created_at)| {
                Ok(Contact {
                    id,
                    name,
                    phone,
                    created_at: from_db_time(&created_at)?,
                })
            })
            .collect()
    }

    pub async fn count_contacts(&self) -> Result<i64, BlastError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM contacts")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| BlastError::Storage(format!("count contacts: {e}")))?;
        Ok(count)
    }

    /// Delete one contact. Returns whether a row was removed.
    pub async fn delete_contact(&self, id: i64) -> Result<bool, BlastError> {
        let result = sqlx::query("DELETE FROM contacts WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| BlastError::Storage(format!("delete contact: {e}")))?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete every contact. Returns the number of rows removed.
    pub async fn delete_all_contacts(&self) -> Result<u64, BlastError> {
        let result = sqlx::query("DELETE FROM contacts")
            .execute(&self.pool)
            .await
            .map_err(|e| BlastError::Storage(format!("delete all contacts: {e}")))?;
        Ok(result.rows_affected())
    }
}
