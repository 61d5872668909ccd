pub mod controllers;
pub mod models;
pub mod services;
pub mod settings;

pub use controllers::{
    ConfigOutcome, GatedAction, STREAM_FAULT_MESSAGE, SendOutcome, SendRejection,
    SessionController, SessionEvent, SessionSnapshot, StreamStatus, UploadReport,
};
pub use models::{
    Attachment, ConfigPatch, ConversationStore, GroundingSource, Message, MessageId, ModelTier,
    Persona, PresetPrompt, RequestPhase, Role, SessionConfig, TacticalPhase, default_presets,
};
pub use services::{
    AttachmentEncoder, AttachmentError, AttachmentPolicy, CompletionClient, CompletionError,
    GeminiClient, ModelCatalog, StreamChunk,
};
pub use settings::{AppSettings, SettingsError, SettingsJsonRepository, SettingsRepository};
