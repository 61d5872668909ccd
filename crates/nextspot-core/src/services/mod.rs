pub mod attachment_encoder;
pub mod attachment_validation;
pub mod completion_client;
pub mod gemini_client;

#[cfg(test)]
pub mod test_helpers;

pub use attachment_encoder::{AttachmentEncoder, AttachmentError, EncodedBatch};
pub use attachment_validation::AttachmentPolicy;
pub use completion_client::{
    CompletionClient, CompletionError, CompletionRequest, GenerationOptions, GroundingMetadata,
    InlineData, ResponseStream, StreamChunk,
};
pub use gemini_client::{GeminiClient, ModelCatalog};
