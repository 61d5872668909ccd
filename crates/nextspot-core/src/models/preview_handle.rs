use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use tempfile::NamedTempFile;

/// Local preview copy of an attached file.
///
/// The backing temp file is shared between clones and removed when the last
/// clone is dropped, so discarding an attachment (removing it from the
/// pending buffer, clearing the conversation) releases its preview.
#[derive(Clone, Debug)]
pub struct PreviewHandle {
    file: Arc<NamedTempFile>,
}

impl PreviewHandle {
    /// Blocking: writes `bytes` to a fresh temp file.
    pub(crate) fn create(bytes: &[u8], extension: Option<&str>) -> std::io::Result<Self> {
        let suffix = extension.map(|ext| format!(".{ext}")).unwrap_or_default();
        let mut file = tempfile::Builder::new()
            .prefix("nextspot-preview-")
            .suffix(&suffix)
            .tempfile()?;
        file.write_all(bytes)?;
        file.flush()?;

        Ok(Self {
            file: Arc::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn url(&self) -> String {
        format!("file://{}", self.path().display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview_released_after_last_clone_dropped() {
        let handle = PreviewHandle::create(b"preview bytes", Some("png")).unwrap();
        let path = handle.path().to_path_buf();
        let clone = handle.clone();

        assert!(path.exists());
        assert!(handle.url().starts_with("file://"));
        assert!(handle.url().ends_with(".png"));

        drop(handle);
        assert!(path.exists(), "clone still holds the preview");

        drop(clone);
        assert!(!path.exists(), "preview should be removed with the last holder");
    }

    #[test]
    fn test_preview_contains_original_bytes() {
        let handle = PreviewHandle::create(b"abc", None).unwrap();
        assert_eq!(std::fs::read(handle.path()).unwrap(), b"abc");
    }
}
