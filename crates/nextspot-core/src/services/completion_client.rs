use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::models::{
    Attachment, GroundingSource, Message, ModelTier, Persona, SessionConfig, TacticalPhase,
};

/// One unit of a streamed completion: a text delta plus optional citations.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamChunk {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub grounding_metadata: Option<GroundingMetadata>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroundingMetadata {
    #[serde(default)]
    pub grounding_chunks: Option<Vec<GroundingChunk>>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct GroundingChunk {
    #[serde(default)]
    pub web: Option<WebSource>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct WebSource {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub uri: Option<String>,
}

impl StreamChunk {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            grounding_metadata: None,
        }
    }

    /// Web citations carried by this chunk.
    ///
    /// `None` when the chunk has no grounding chunk list at all; `Some` (maybe
    /// empty) when it does, keeping only the entries that have a web source.
    pub fn web_sources(&self) -> Option<Vec<GroundingSource>> {
        let chunks = self.grounding_metadata.as_ref()?.grounding_chunks.as_ref()?;

        Some(
            chunks
                .iter()
                .filter_map(|c| c.web.as_ref())
                .map(|web| {
                    let uri = web.uri.clone().unwrap_or_default();
                    let title = web
                        .title
                        .clone()
                        .filter(|t| !t.is_empty())
                        .unwrap_or_else(|| uri.clone());
                    GroundingSource { title, uri }
                })
                .collect(),
        )
    }
}

#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("request failed: {0}")]
    Transport(String),

    #[error("upstream returned HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("response blocked by upstream policy: {reason}")]
    Blocked { reason: String },

    #[error("malformed stream payload: {0}")]
    Decode(String),

    #[error("no chunk received within {0:?}")]
    Timeout(Duration),
}

/// Attachment payload as it goes over the wire
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    pub mime_type: String,
    pub data: String,
}

impl From<&Attachment> for InlineData {
    fn from(attachment: &Attachment) -> Self {
        Self {
            mime_type: attachment.mime_type.clone(),
            data: attachment.data.clone(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GenerationOptions {
    pub model: ModelTier,
    pub persona: Persona,
    pub phase: TacticalPhase,
    pub use_search: bool,
}

impl From<&SessionConfig> for GenerationOptions {
    fn from(config: &SessionConfig) -> Self {
        Self {
            model: config.model,
            persona: config.persona,
            phase: config.phase,
            use_search: config.use_search,
        }
    }
}

#[derive(Clone, Debug)]
pub struct CompletionRequest {
    /// Conversation as it stood before this send
    pub history: Vec<Message>,
    pub content: String,
    pub attachments: Vec<InlineData>,
    pub options: GenerationOptions,
}

/// Finite, non-restartable chunk stream. May end with an error at any point.
pub type ResponseStream = BoxStream<'static, Result<StreamChunk, CompletionError>>;

/// Upstream completion service
pub trait CompletionClient: Send + Sync {
    fn stream_chat(&self, request: CompletionRequest) -> ResponseStream;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_deserializes_from_upstream_shape() {
        let chunk: StreamChunk = serde_json::from_str(
            r#"{
                "text": "hi",
                "groundingMetadata": {
                    "groundingChunks": [
                        {"web": {"title": "Docs", "uri": "https://docs.example"}},
                        {"retrievedContext": {"uri": "gs://bucket/file"}}
                    ]
                }
            }"#,
        )
        .unwrap();

        assert_eq!(chunk.text, "hi");
        assert_eq!(
            chunk.web_sources(),
            Some(vec![GroundingSource {
                title: "Docs".into(),
                uri: "https://docs.example".into(),
            }])
        );
    }

    #[test]
    fn test_web_sources_title_falls_back_to_uri() {
        let chunk = StreamChunk {
            text: String::new(),
            grounding_metadata: Some(GroundingMetadata {
                grounding_chunks: Some(vec![GroundingChunk {
                    web: Some(WebSource {
                        title: None,
                        uri: Some("https://a.example".into()),
                    }),
                }]),
            }),
        };

        let sources = chunk.web_sources().unwrap();
        assert_eq!(sources[0].title, "https://a.example");
    }

    #[test]
    fn test_plain_chunk_has_no_sources() {
        assert_eq!(StreamChunk::text("x").web_sources(), None);
    }

    #[test]
    fn test_inline_data_serializes_camel_case() {
        let inline = InlineData::from(&Attachment::new("image/png", "AAAA"));
        let json = serde_json::to_value(&inline).unwrap();
        assert_eq!(json, serde_json::json!({"mimeType": "image/png", "data": "AAAA"}));
    }
}
