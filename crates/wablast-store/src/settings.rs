//! Dashboard settings, persisted as a JSON document.

use serde::{de, Deserialize, Deserializer, Serialize};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{info, warn};
use wablast_core::error::BlastError;

/// Operator-editable settings, as exchanged with the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub default_message: String,
    #[serde(deserialize_with = "lenient_bool")]
    pub auto_reply: bool,
    pub auto_reply_message: String,
    #[serde(deserialize_with = "lenient_bool")]
    pub notification_sound: bool,
    /// Seconds between attempts in sequential dispatch.
    #[serde(deserialize_with = "lenient_u64")]
    pub message_delay: u64,
    /// Upper bound on recipients per batch.
    #[serde(deserialize_with = "lenient_u64")]
    pub max_blast_size: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            default_message: String::new(),
            auto_reply: false,
            auto_reply_message: String::new(),
            notification_sound: true,
            message_delay: 2,
            max_blast_size: 100,
        }
    }
}

impl Settings {
    /// Auto-reply text, if auto-reply is on and the text is non-empty.
    pub fn auto_reply_text(&self) -> Option<&str> {
        let text = self.auto_reply_message.trim();
        (self.auto_reply && !text.is_empty()).then_some(text)
    }
}

/// On-disk layout: the settings plus the password hash.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettingsDocument {
    #[serde(flatten)]
    settings: Settings,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    password_hash: Option<String>,
}

/// Settings file at `{data_dir}/settings.json`, cached in memory.
pub struct SettingsFile {
    path: PathBuf,
    doc: RwLock<SettingsDocument>,
}

impl SettingsFile {
    /// Load the settings file. A missing file yields defaults.
    pub async fn load(path: impl Into<PathBuf>) -> Result<Self, BlastError> {
        let path = path.into();
        let doc = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice::<SettingsDocument>(&bytes).map_err(|e| {
                BlastError::Config(format!("invalid settings file {}: {e}", path.display()))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("settings: {} not found, using defaults", path.display());
                SettingsDocument::default()
            }
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            path,
            doc: RwLock::new(doc),
        })
    }

    /// Settings file for a data directory.
    pub async fn for_data_dir(data_dir: &Path) -> Result<Self, BlastError> {
        Self::load(data_dir.join("settings.json")).await
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current settings.
    pub async fn get(&self) -> Settings {
        self.doc.read().await.settings.clone()
    }

    /// Replace the settings and persist them. The password hash is untouched.
    pub async fn update(&self, settings: Settings) -> Result<Settings, BlastError> {
        let mut doc = self.doc.write().await;
        let mut next = doc.clone();
        next.settings = settings;
        self.persist(&next).await?;
        *doc = next;
        Ok(doc.settings.clone())
    }

    pub async fn has_password(&self) -> bool {
        self.doc.read().await.password_hash.is_some()
    }

    /// Check a candidate password. With no password configured, anything passes.
    pub async fn verify_password(&self, candidate: &str) -> bool {
        match &self.doc.read().await.password_hash {
            Some(hash) => password_matches(candidate, hash),
            None => true,
        }
    }

    /// Set a new password. `current` must match when a password is configured.
    pub async fn set_password(&self, current: Option<&str>, new: &str) -> Result<(), BlastError> {
        if new.is_empty() {
            return Err(BlastError::InvalidInput("new password must not be empty".into()));
        }

        let mut doc = self.doc.write().await;
        if let Some(hash) = &doc.password_hash {
            let matches = current.is_some_and(|c| password_matches(c, hash));
            if !matches {
                warn!("settings: password change rejected, current password mismatch");
                return Err(BlastError::InvalidInput("current password is incorrect".into()));
            }
        }

        let mut next = doc.clone();
        next.password_hash = Some(hash_password(new)?);
        self.persist(&next).await?;
        *doc = next;
        info!("settings: password updated");
        Ok(())
    }

    /// Write via a temp file and rename.
    async fn persist(&self, doc: &SettingsDocument) -> Result<(), BlastError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_vec_pretty(doc)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

/// Argon2id PHC string with a fresh random salt.
fn hash_password(password: &str) -> Result<String, BlastError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| BlastError::Config(format!("password hashing failed: {e}")))
}

/// A stored hash that does not parse never matches.
fn password_matches(candidate: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(candidate.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            warn!("settings: stored password hash is unreadable: {e}");
            false
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(u64),
    Float(f64),
    Text(String),
}

fn lenient_u64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    match NumberOrString::deserialize(deserializer)? {
        NumberOrString::Number(n) => Ok(n),
        NumberOrString::Float(f) if f >= 0.0 && f.is_finite() => Ok(f as u64),
        NumberOrString::Float(f) => Err(de::Error::custom(format!("invalid number {f}"))),
        NumberOrString::Text(s) => s
            .trim()
            .parse()
            .map_err(|_| de::Error::custom(format!("expected a number, got '{s}'"))),
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum BoolOrString {
    Bool(bool),
    Text(String),
}

fn lenient_bool<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    match BoolOrString::deserialize(deserializer)? {
        BoolOrString::Bool(b) => Ok(b),
        BoolOrString::Text(s) => match s.trim() {
            "true" | "1" | "on" => Ok(true),
            "false" | "0" | "off" | "" => Ok(false),
            other => Err(de::Error::custom(format!("expected a boolean, got '{other}'"))),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_dashboard() {
        let s = Settings::default();
        assert_eq!(s.message_delay, 2);
        assert_eq!(s.max_blast_size, 100);
        assert!(!s.auto_reply);
        assert!(s.notification_sound);
    }

    #[test]
    fn test_numeric_strings_accepted() {
        let s: Settings = serde_json::from_str(
            r#"{"messageDelay":"5","maxBlastSize":" 250 ","autoReply":"true"}"#,
        )
        .unwrap();
        assert_eq!(s.message_delay, 5);
        assert_eq!(s.max_blast_size, 250);
        assert!(s.auto_reply);
        assert!(s.notification_sound);
    }

    #[test]
    fn test_garbage_number_rejected() {
        assert!(serde_json::from_str::<Settings>(r#"{"messageDelay":"soon"}"#).is_err());
        assert!(serde_json::from_str::<Settings>(r#"{"messageDelay":-1}"#).is_err());
    }

    #[test]
    fn test_auto_reply_text() {
        let mut s = Settings {
            auto_reply_message: "  thanks  ".into(),
            ..Settings::default()
        };
        assert_eq!(s.auto_reply_text(), None);
        s.auto_reply = true;
        assert_eq!(s.auto_reply_text(), Some("thanks"));
        s.auto_reply_message = "   ".into();
        assert_eq!(s.auto_reply_text(), None);
    }

    #[tokio::test]
    async fn test_missing_file_yields_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let file = SettingsFile::for_data_dir(tmp.path()).await.unwrap();
        assert_eq!(file.get().await, Settings::default());
        assert!(!file.has_password().await);
        assert!(file.verify_password("anything").await);
    }

    #[tokio::test]
    async fn test_update_persists_across_loads() {
        let tmp = tempfile::tempdir().unwrap();
        let file = SettingsFile::for_data_dir(tmp.path()).await.unwrap();
        let updated = Settings {
            default_message: "Promo hari ini".into(),
            message_delay: 7,
            ..Settings::default()
        };
        file.update(updated.clone()).await.unwrap();

        let reloaded = SettingsFile::for_data_dir(tmp.path()).await.unwrap();
        assert_eq!(reloaded.get().await, updated);
    }

    #[tokio::test]
    async fn test_password_lifecycle() {
        let tmp = tempfile::tempdir().unwrap();
        let file = SettingsFile::for_data_dir(tmp.path()).await.unwrap();

        file.set_password(None, "rahasia").await.unwrap();
        assert!(file.has_password().await);
        assert!(file.verify_password("rahasia").await);
        assert!(!file.verify_password("salah").await);

        let err = file.set_password(Some("salah"), "baru").await.unwrap_err();
        assert!(matches!(err, BlastError::InvalidInput(_)));
        assert!(file.set_password(None, "baru").await.is_err());

        file.set_password(Some("rahasia"), "baru").await.unwrap();
        let reloaded = SettingsFile::for_data_dir(tmp.path()).await.unwrap();
        assert!(reloaded.verify_password("baru").await);
    }

    #[tokio::test]
    async fn test_update_keeps_password_and_hides_hash() {
        let tmp = tempfile::tempdir().unwrap();
        let file = SettingsFile::for_data_dir(tmp.path()).await.unwrap();
        file.set_password(None, "rahasia").await.unwrap();
        file.update(Settings::default()).await.unwrap();
        assert!(file.verify_password("rahasia").await);

        let json = serde_json::to_value(file.get().await).unwrap();
        assert!(json.get("passwordHash").is_none());
        assert!(json.get("messageDelay").is_some());

        let on_disk = std::fs::read_to_string(file.path()).unwrap();
        assert!(on_disk.contains("passwordHash"));
        assert!(!on_disk.contains("rahasia"));
    }

    #[test]
    fn test_password_hash_is_salted_argon2() {
        let a = hash_password("rahasia").unwrap();
        let b = hash_password("rahasia").unwrap();
        assert!(a.starts_with("$argon2"));
        assert_ne!(a, b);
        assert!(password_matches("rahasia", &a));
        assert!(password_matches("rahasia", &b));
        assert!(!password_matches("salah", &a));
    }

    #[tokio::test]
    async fn test_unreadable_hash_rejects_login() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("settings.json");
        // Unsalted hex digest, not a PHC string.
        std::fs::write(
            &path,
            r#"{"passwordHash":"5e884898da28047151d0e56f8dc6292773603d0d6aabbdd62a11ef721d1542d8"}"#,
        )
        .unwrap();
        let file = SettingsFile::load(&path).await.unwrap();
        assert!(file.has_password().await);
        assert!(!file.verify_password("password").await);
    }

    #[tokio::test]
    async fn test_corrupt_file_is_config_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("settings.json");
        std::fs::write(&path, "{not json").unwrap();
        let err = SettingsFile::load(&path).await.err().unwrap();
        assert!(matches!(err, BlastError::Config(_)));
    }
}
