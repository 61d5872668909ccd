use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

use super::attachment_validation::{AttachmentPolicy, detect_mime};
use crate::models::{Attachment, PreviewHandle};

#[derive(Debug, Error)]
pub enum AttachmentError {
    #[error("{}: file not found", path.display())]
    NotFound { path: PathBuf },

    #[error("{}: failed to read: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{}: {size} bytes exceeds the {max} byte limit", path.display())]
    TooLarge { path: PathBuf, size: u64, max: u64 },

    #[error("{}: unsupported file type {mime}", path.display())]
    Unsupported { path: PathBuf, mime: String },

    #[error("{}: failed to create preview: {source}", path.display())]
    Preview {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl AttachmentError {
    pub fn path(&self) -> &Path {
        match self {
            AttachmentError::NotFound { path }
            | AttachmentError::Read { path, .. }
            | AttachmentError::TooLarge { path, .. }
            | AttachmentError::Unsupported { path, .. }
            | AttachmentError::Preview { path, .. } => path,
        }
    }
}

/// Result of encoding a batch: every file either encoded or reported.
#[derive(Debug, Default)]
pub struct EncodedBatch {
    pub attachments: Vec<Attachment>,
    pub failures: Vec<AttachmentError>,
}

/// Reads files and turns them into base64 attachments with a local preview.
#[derive(Clone, Debug, Default)]
pub struct AttachmentEncoder {
    policy: AttachmentPolicy,
}

impl AttachmentEncoder {
    pub fn new(policy: AttachmentPolicy) -> Self {
        Self { policy }
    }

    /// Encode `paths` one after another, preserving order. Failed files are
    /// reported and skipped; the rest of the batch is still returned.
    pub async fn encode_batch(&self, paths: &[PathBuf]) -> EncodedBatch {
        let mut batch = EncodedBatch::default();

        for path in paths {
            match self.encode_file(path).await {
                Ok(attachment) => batch.attachments.push(attachment),
                Err(e) => {
                    warn!(?path, error = %e, "Failed to encode attachment");
                    batch.failures.push(e);
                }
            }
        }

        debug!(
            encoded = batch.attachments.len(),
            failed = batch.failures.len(),
            "Attachment batch encoded"
        );
        batch
    }

    pub async fn encode_file(&self, path: &Path) -> Result<Attachment, AttachmentError> {
        let metadata = tokio::fs::metadata(path).await.map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => AttachmentError::NotFound {
                path: path.to_path_buf(),
            },
            _ => AttachmentError::Read {
                path: path.to_path_buf(),
                source: e,
            },
        })?;

        if !metadata.is_file() {
            return Err(AttachmentError::Read {
                path: path.to_path_buf(),
                source: io::Error::new(io::ErrorKind::InvalidInput, "not a regular file"),
            });
        }

        let mime = detect_mime(path);
        if !self.policy.allows_mime(&mime) {
            return Err(AttachmentError::Unsupported {
                path: path.to_path_buf(),
                mime,
            });
        }

        let too_large = |size: u64| AttachmentError::TooLarge {
            path: path.to_path_buf(),
            size,
            max: self.policy.max_bytes,
        };
        if !self.policy.allows_size(metadata.len()) {
            return Err(too_large(metadata.len()));
        }

        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| AttachmentError::Read {
                path: path.to_path_buf(),
                source: e,
            })?;

        // The file may have grown between stat and read
        if !self.policy.allows_size(bytes.len() as u64) {
            return Err(too_large(bytes.len() as u64));
        }

        let data = STANDARD.encode(&bytes);
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase);

        let preview = tokio::task::spawn_blocking(move || {
            PreviewHandle::create(&bytes, extension.as_deref())
        })
        .await
        .map_err(io::Error::other)
        .and_then(|created| created)
        .map_err(|e| AttachmentError::Preview {
            path: path.to_path_buf(),
            source: e,
        })?;

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        Ok(Attachment {
            mime_type: mime,
            data,
            file_name,
            preview: Some(preview),
        })
    }
}
