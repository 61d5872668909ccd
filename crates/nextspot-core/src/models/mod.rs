pub mod conversation_store;
pub mod message;
pub mod pending_attachments;
pub mod presets;
pub mod preview_handle;
pub mod request_phase;
pub mod session_config;
pub mod stream_accumulator;

pub use conversation_store::ConversationStore;
pub use message::{Attachment, GroundingSource, Message, MessageId, Role};
pub use pending_attachments::PendingAttachments;
pub use presets::{PresetPrompt, default_presets};
pub use preview_handle::PreviewHandle;
pub use request_phase::RequestPhase;
pub use session_config::{ConfigPatch, ModelTier, Persona, SessionConfig, TacticalPhase};
pub use stream_accumulator::StreamAccumulator;
