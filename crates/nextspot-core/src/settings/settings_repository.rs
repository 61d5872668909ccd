use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

use super::app_settings::AppSettings;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Path error: {0}")]
    Path(String),
}

pub type SettingsResult<T> = Result<T, SettingsError>;
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait SettingsRepository: Send + Sync + 'static {
    /// Load settings, falling back to defaults when nothing is stored yet
    fn load(&self) -> BoxFuture<'static, SettingsResult<AppSettings>>;

    fn save(&self, settings: AppSettings) -> BoxFuture<'static, SettingsResult<()>>;

    /// Storage location, for diagnostics
    fn storage_path(&self) -> String;
}
