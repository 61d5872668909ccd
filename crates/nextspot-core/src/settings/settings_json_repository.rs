use std::path::PathBuf;
use tracing::debug;

use super::app_settings::AppSettings;
use super::settings_repository::{BoxFuture, SettingsError, SettingsRepository, SettingsResult};

pub struct SettingsJsonRepository {
    file_path: PathBuf,
}

impl SettingsJsonRepository {
    /// Create repository with XDG-compliant path
    pub fn new() -> SettingsResult<Self> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| SettingsError::Path("Cannot determine config directory".into()))?;

        Ok(Self::with_path(config_dir.join("nextspot").join("settings.json")))
    }

    pub fn with_path(file_path: impl Into<PathBuf>) -> Self {
        Self {
            file_path: file_path.into(),
        }
    }
}

impl SettingsRepository for SettingsJsonRepository {
    fn load(&self) -> BoxFuture<'static, SettingsResult<AppSettings>> {
        let path = self.file_path.clone();

        Box::pin(async move {
            if !tokio::fs::try_exists(&path).await? {
                debug!(path = %path.display(), "No settings file, using defaults");
                return Ok(AppSettings::default());
            }

            let contents = tokio::fs::read_to_string(&path).await?;
            let settings: AppSettings = serde_json::from_str(&contents)?;
            debug!(path = %path.display(), "Settings loaded");
            Ok(settings)
        })
    }

    fn save(&self, settings: AppSettings) -> BoxFuture<'static, SettingsResult<()>> {
        let path = self.file_path.clone();

        Box::pin(async move {
            let json = serde_json::to_string_pretty(&settings)?;

            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }

            // Write atomically using temp file + rename
            let temp_path = path.with_extension("json.tmp");
            tokio::fs::write(&temp_path, &json).await?;
            tokio::fs::rename(&temp_path, &path).await?;

            debug!(path = %path.display(), "Settings saved");
            Ok(())
        })
    }

    fn storage_path(&self) -> String {
        self.file_path.display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Persona;
    use tempfile::TempDir;

    fn repo_in(dir: &TempDir) -> SettingsJsonRepository {
        SettingsJsonRepository::with_path(dir.path().join("nested").join("settings.json"))
    }

    #[tokio::test]
    async fn test_missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let settings = repo_in(&dir).load().await.unwrap();
        assert_eq!(settings, AppSettings::default());
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let repo = repo_in(&dir);

        let mut settings = AppSettings::default();
        settings.session.persona = Persona::BugBounty;
        settings.chunk_timeout_secs = Some(45);
        settings.presets.truncate(1);

        repo.save(settings.clone()).await.unwrap();
        assert!(!dir.path().join("nested").join("settings.json.tmp").exists());

        let loaded = repo.load().await.unwrap();
        assert_eq!(loaded, settings);
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let repo = repo_in(&dir);
        std::fs::create_dir_all(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("nested").join("settings.json"), "{ nope").unwrap();

        let err = repo.load().await.unwrap_err();
        assert!(matches!(err, SettingsError::Serialization(_)));
    }

    #[test]
    fn test_storage_path() {
        let repo = SettingsJsonRepository::with_path("/tmp/nextspot/settings.json");
        assert_eq!(repo.storage_path(), "/tmp/nextspot/settings.json");
    }
}
