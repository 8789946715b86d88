//! Durable staging for batch media.
//!
//! A batch's attachment is written to disk once, before fan-out, and every
//! attempt reads the same file.

use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::debug;
use uuid::Uuid;
use wablast_core::{
    error::BlastError,
    message::{MediaPayload, StagedMedia},
};

const MAX_EXT_LEN: usize = 10;

/// Writes uploaded media into `{data_dir}/media/`.
#[derive(Debug, Clone)]
pub struct MediaStager {
    dir: PathBuf,
}

impl MediaStager {
    /// Create a stager rooted at `dir`. The directory is created on first stage.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Stager for `{data_dir}/media`.
    pub fn for_data_dir(data_dir: &Path) -> Self {
        Self::new(data_dir.join("media"))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write the payload under a fresh name and return the staged reference.
    ///
    /// Rejects zero-byte payloads. The file is synced before returning.
    pub async fn stage(&self, payload: &MediaPayload) -> Result<StagedMedia, BlastError> {
        if payload.data.is_empty() {
            return Err(BlastError::InvalidInput("media file is empty".into()));
        }

        tokio::fs::create_dir_all(&self.dir).await?;

        let ext = extension_for(payload.filename.as_deref(), &payload.mime_type);
        let file_name = match ext {
            Some(ext) => format!("{}.{ext}", Uuid::new_v4()),
            None => Uuid::new_v4().to_string(),
        };
        let path = self.dir.join(&file_name);

        let mut file = tokio::fs::File::create(&path).await?;
        file.write_all(&payload.data).await?;
        file.sync_all().await?;

        debug!("media: staged {} ({} bytes)", path.display(), payload.data.len());

        Ok(StagedMedia {
            path,
            file_name,
            mime_type: payload.mime_type.clone(),
            original_name: payload
                .filename
                .as_deref()
                .map(sanitize_file_name)
                .filter(|n| !n.is_empty()),
        })
    }
}

/// Extension from the uploaded filename, else from the MIME subtype.
fn extension_for(filename: Option<&str>, mime_type: &str) -> Option<String> {
    let from_name = filename
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .map(sanitize_extension)
        .filter(|ext| !ext.is_empty());

    from_name.or_else(|| {
        let subtype = mime_type.split('/').nth(1)?;
        // "svg+xml" -> "svg", "jpeg; charset=..." -> "jpeg"
        let subtype = subtype.split([';', '+']).next()?.trim();
        let ext = sanitize_extension(subtype);
        (!ext.is_empty()).then_some(ext)
    })
}

fn sanitize_extension(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(MAX_EXT_LEN)
        .collect::<String>()
        .to_ascii_lowercase()
}

/// Strip directory components and characters that are unsafe in file names.
fn sanitize_file_name(raw: &str) -> String {
    let base = raw.rsplit(['/', '\\']).next().unwrap_or(raw);
    base.chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, '.' | '-' | '_' | ' '))
        .collect::<String>()
        .trim()
        .trim_start_matches('.')
        .to_string()
}
