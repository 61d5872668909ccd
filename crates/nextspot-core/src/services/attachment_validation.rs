//! Attachment validation logic
//!
//! Checks file size and MIME type against the configured policy before a
//! file is read and encoded.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Inline payloads above this size are rejected upstream
pub const DEFAULT_MAX_BYTES: u64 = 20 * 1024 * 1024;
pub const FALLBACK_MIME: &str = "application/octet-stream";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttachmentPolicy {
    pub max_bytes: u64,
    /// A MIME type is accepted if it starts with any of these
    pub allowed_mime_prefixes: Vec<String>,
}

impl Default for AttachmentPolicy {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_BYTES,
            allowed_mime_prefixes: vec![
                "image/".to_string(),
                "application/pdf".to_string(),
                "text/".to_string(),
                "audio/".to_string(),
                "video/".to_string(),
            ],
        }
    }
}

impl AttachmentPolicy {
    pub fn allows_mime(&self, mime: &str) -> bool {
        let mime = mime.to_ascii_lowercase();
        self.allowed_mime_prefixes
            .iter()
            .any(|prefix| mime.starts_with(&prefix.to_ascii_lowercase()))
    }

    pub fn allows_size(&self, size: u64) -> bool {
        size <= self.max_bytes
    }
}

/// Guess the MIME type from the file extension
pub fn detect_mime(path: &Path) -> String {
    mime_guess::from_path(path)
        .first_raw()
        .unwrap_or(FALLBACK_MIME)
        .to_string()
}
