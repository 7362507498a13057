//! Durable storage for uploaded audio
//!
//! Files are named `<recording uuid>[.<ext>]` under a single directory. The
//! client-supplied filename contributes only a sanitized extension.

use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

const MAX_EXTENSION_LEN: usize = 8;

/// Upload directory writer
#[derive(Debug, Clone)]
pub struct AudioStore {
    root: PathBuf,
}

impl AudioStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the upload directory if missing
    pub async fn ensure_dir(&self) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.root).await
    }

    /// Write `bytes` for `recording_id`; returns the storage location
    ///
    /// Uses create-new semantics: an existing file is an error, never
    /// overwritten.
    pub async fn save(
        &self,
        recording_id: Uuid,
        original_filename: Option<&str>,
        bytes: &[u8],
    ) -> std::io::Result<String> {
        let file_name = match original_filename.and_then(sanitized_extension) {
            Some(ext) => format!("{}.{}", recording_id, ext),
            None => recording_id.to_string(),
        };
        let path = self.root.join(file_name);

        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await?;
        file.write_all(bytes).await?;
        file.sync_all().await?;

        tracing::debug!(
            recording_id = %recording_id,
            path = %path.display(),
            bytes = bytes.len(),
            "Stored recording audio"
        );

        Ok(path.to_string_lossy().into_owned())
    }

    /// Delete audio previously written by `save`
    pub async fn remove(&self, location: &str) -> std::io::Result<()> {
        tokio::fs::remove_file(location).await
    }
}

/// Lowercased alphanumeric extension of `filename`, if any
fn sanitized_extension(filename: &str) -> Option<String> {
    let ext = Path::new(filename).extension()?.to_str()?;
    let clean: String = ext
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(MAX_EXTENSION_LEN)
        .collect::<String>()
        .to_ascii_lowercase();
    if clean.is_empty() {
        None
    } else {
        Some(clean)
    }
}
