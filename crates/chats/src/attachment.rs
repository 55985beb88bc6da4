//! Durable storage for inline attachments.

use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use relaychat_config::UploadsConfig;
use thiserror::Error;
use tokio::fs;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::protocol::InlineFile;

const MAX_EXTENSION_LEN: usize = 16;

#[derive(Debug, Error)]
pub enum AttachmentError {
    #[error("attachment is not valid base64: {0}")]
    Decode(#[from] base64::DecodeError),
    #[error("attachment payload is malformed: {0}")]
    Malformed(&'static str),
    #[error("attachment of {size} bytes exceeds the {limit} byte limit")]
    TooLarge { size: u64, limit: u64 },
    #[error("attachment could not be written: {0}")]
    StorageWrite(#[from] std::io::Error),
}

impl AttachmentError {
    pub fn is_client_error(&self) -> bool {
        !matches!(self, AttachmentError::StorageWrite(_))
    }
}

/// Where a stored attachment ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentReference {
    pub stored_name: String,
    pub original_name: String,
}

#[derive(Debug, Clone)]
pub struct AttachmentSink {
    root: PathBuf,
    max_bytes: u64,
}

impl AttachmentSink {
    pub fn new(root: impl Into<PathBuf>, max_bytes: u64) -> Self {
        Self {
            root: root.into(),
            max_bytes,
        }
    }

    pub fn from_config(config: &UploadsConfig) -> Self {
        Self::new(&config.directory, config.max_attachment_bytes)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    pub async fn ensure_root(&self) -> Result<(), AttachmentError> {
        fs::create_dir_all(&self.root).await?;
        Ok(())
    }

    /// Decode and persist an inline file. The write is complete and visible
    /// under its final name before this returns.
    pub async fn store(&self, file: &InlineFile) -> Result<AttachmentReference, AttachmentError> {
        let payload = strip_data_url(&file.data)?;

        // Cheap bound before allocating for the decode. Line breaks in wrapped
        // base64 carry no data and do not count.
        let significant = payload
            .bytes()
            .filter(|byte| !byte.is_ascii_whitespace())
            .count() as u64;
        if significant == 0 {
            return Err(AttachmentError::Malformed("empty payload"));
        }
        let estimated = (significant / 4) * 3;
        if estimated > self.max_bytes.saturating_add(2) {
            return Err(AttachmentError::TooLarge {
                size: estimated,
                limit: self.max_bytes,
            });
        }

        let compact: String = payload.chars().filter(|c| !c.is_ascii_whitespace()).collect();
        let bytes = STANDARD.decode(compact.as_bytes())?;
        let size = bytes.len() as u64;
        if size > self.max_bytes {
            return Err(AttachmentError::TooLarge {
                size,
                limit: self.max_bytes,
            });
        }

        let stored_name = format!(
            "{}{}",
            Uuid::new_v4().simple(),
            extension_suffix(&file.name)
        );

        self.ensure_root().await?;
        let final_path = self.root.join(&stored_name);
        let partial_path = self.root.join(format!("{stored_name}.part"));

        if let Err(error) = fs::write(&partial_path, &bytes).await {
            let _ = fs::remove_file(&partial_path).await;
            return Err(error.into());
        }
        if let Err(error) = fs::rename(&partial_path, &final_path).await {
            let _ = fs::remove_file(&partial_path).await;
            return Err(error.into());
        }

        debug!(stored = %stored_name, original = %file.name, size, "attachment stored");

        Ok(AttachmentReference {
            stored_name,
            original_name: file.name.clone(),
        })
    }

    /// Best-effort removal of a stored attachment whose message never made it
    /// to the database.
    pub async fn discard(&self, reference: &AttachmentReference) {
        let Some(path) = self.path_for(&reference.stored_name) else {
            return;
        };
        if let Err(error) = fs::remove_file(&path).await {
            warn!(?error, stored = %reference.stored_name, "failed to discard attachment");
        }
    }

    /// Resolve a stored name to its path, rejecting anything that is not a
    /// plain file name inside the uploads root.
    pub fn path_for(&self, stored_name: &str) -> Option<PathBuf> {
        let valid = !stored_name.is_empty()
            && stored_name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '.')
            && !stored_name.starts_with('.');
        valid.then(|| self.root.join(stored_name))
    }
}

fn strip_data_url(data: &str) -> Result<&str, AttachmentError> {
    match data.strip_prefix("data:") {
        Some(rest) => rest
            .split_once(',')
            .map(|(_, payload)| payload)
            .ok_or(AttachmentError::Malformed("data URL without a payload")),
        None => Ok(data),
    }
}

fn extension_suffix(name: &str) -> String {
    let Some((stem, extension)) = name.rsplit_once('.') else {
        return String::new();
    };
    if stem.is_empty()
        || extension.is_empty()
        || extension.len() > MAX_EXTENSION_LEN
        || !extension.chars().all(|c| c.is_ascii_alphanumeric())
    {
        return String::new();
    }
    format!(".{}", extension.to_ascii_lowercase())
}
