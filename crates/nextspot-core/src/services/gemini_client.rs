//! Streaming client for the Gemini `streamGenerateContent` endpoint.
//!
//! Requests are sent with `alt=sse`; the response body is decoded event by
//! event and each event becomes one `StreamChunk`, carrying the candidate's
//! text and grounding metadata.

use eventsource_stream::Eventsource;
use futures::{Stream, StreamExt};
use std::pin::pin;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::completion_client::{
    CompletionClient, CompletionError, CompletionRequest, GenerationOptions, GroundingMetadata,
    InlineData, ResponseStream, StreamChunk,
};
use crate::models::{ModelTier, Role};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Finish reasons that mean the reply was withheld by upstream policy
const BLOCKING_FINISH_REASONS: &[&str] = &[
    "SAFETY",
    "RECITATION",
    "BLOCKLIST",
    "PROHIBITED_CONTENT",
    "SPII",
    "IMAGE_SAFETY",
];

/// Upstream model id per tier
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelCatalog {
    pub fast: String,
    pub advanced: String,
}

impl Default for ModelCatalog {
    fn default() -> Self {
        Self {
            fast: "gemini-3-flash-preview".to_string(),
            advanced: "gemini-3-pro-preview".to_string(),
        }
    }
}

impl ModelCatalog {
    pub fn model_id(&self, tier: ModelTier) -> &str {
        match tier {
            ModelTier::Fast => &self.fast,
            ModelTier::Advanced => &self.advanced,
        }
    }
}

#[derive(Clone)]
pub struct GeminiClient {
    http: Client,
    api_key: String,
    base_url: String,
    models: ModelCatalog,
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>, models: ModelCatalog) -> Self {
        Self {
            http: Client::new(),
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            models,
        }
    }

    /// Point the client at a different API root (proxies, test servers).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn endpoint(&self, tier: ModelTier) -> String {
        format!(
            "{}/models/{}:streamGenerateContent?alt=sse",
            self.base_url.trim_end_matches('/'),
            self.models.model_id(tier)
        )
    }

    fn build_request(&self, request: &CompletionRequest) -> GenerateContentRequest {
        // Earlier attachments are re-sent so attachment-only turns keep their place
        let mut contents: Vec<Content> = request
            .history
            .iter()
            .filter(|msg| !msg.is_streaming)
            .filter_map(|msg| {
                let role = match msg.role {
                    Role::User => "user",
                    Role::Model => "model",
                };
                let inline = msg.attachments.iter().map(InlineData::from).collect();
                Content::with_parts(role, &msg.content, inline)
            })
            .collect();

        contents.extend(Content::with_parts(
            "user",
            &request.content,
            request.attachments.clone(),
        ));

        let tools = if request.options.use_search {
            vec![Tool::default()]
        } else {
            Vec::new()
        };

        GenerateContentRequest {
            contents,
            system_instruction: Some(Content {
                role: None,
                parts: vec![Part::Text {
                    text: system_instruction(&request.options),
                }],
            }),
            tools,
        }
    }
}

impl CompletionClient for GeminiClient {
    fn stream_chat(&self, request: CompletionRequest) -> ResponseStream {
        let url = self.endpoint(request.options.model);
        let body = self.build_request(&request);
        let http = self.http.clone();
        let api_key = self.api_key.clone();

        debug!(
            model = %self.models.model_id(request.options.model),
            history_len = request.history.len(),
            attachment_count = request.attachments.len(),
            use_search = request.options.use_search,
            "Opening completion stream"
        );

        Box::pin(async_stream::stream! {
            let response = match http
                .post(&url)
                .header("x-goog-api-key", &api_key)
                .json(&body)
                .send()
                .await
            {
                Ok(response) => response,
                Err(e) => {
                    yield Err(CompletionError::Transport(e.to_string()));
                    return;
                }
            };

            if !response.status().is_success() {
                let status = response.status();
                let body_text = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Failed to read error body".to_string());
                yield Err(map_http_error(status, &body_text));
                return;
            }

            let mut chunks = pin!(decode_body(response.bytes_stream()));
            while let Some(item) = chunks.next().await {
                yield item;
            }
        })
    }
}

/// Frames an SSE body into chunks. Ends after the first error.
fn decode_body<S, B, E>(body: S) -> impl Stream<Item = Result<StreamChunk, CompletionError>>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
{
    async_stream::stream! {
        let mut events = pin!(body.eventsource());

        while let Some(event) = events.next().await {
            let event = match event {
                Ok(event) => event,
                Err(e) => {
                    yield Err(CompletionError::Transport(e.to_string()));
                    return;
                }
            };
            if event.data.trim().is_empty() {
                continue;
            }

            let item = parse_event(&event.data);
            let failed = item.is_err();
            yield item;
            if failed {
                return;
            }
        }
    }
}

/// Frames the reply around the selected persona and engagement stage.
pub fn system_instruction(options: &GenerationOptions) -> String {
    format!(
        "You are an experienced {persona} supporting an authorized security engagement. \
         The engagement is currently in the {phase} stage; frame your answers around that \
         stage. Be precise and well structured, and use Markdown for code, commands and tables.",
        persona = options.persona.label(),
        phase = options.phase.label(),
    )
}

fn parse_event(data: &str) -> Result<StreamChunk, CompletionError> {
    let response: GenerateContentResponse =
        serde_json::from_str(data).map_err(|e| CompletionError::Decode(e.to_string()))?;
    response_to_chunk(response)
}

fn response_to_chunk(response: GenerateContentResponse) -> Result<StreamChunk, CompletionError> {
    if let Some(error) = response.error {
        return Err(CompletionError::Http {
            status: error.code.unwrap_or_default(),
            message: error.describe(),
        });
    }

    if let Some(reason) = response.prompt_feedback.and_then(|f| f.block_reason) {
        warn!(reason = %reason, "Prompt blocked upstream");
        return Err(CompletionError::Blocked { reason });
    }

    let Some(candidate) = response.candidates.into_iter().next() else {
        return Ok(StreamChunk::default());
    };

    if let Some(reason) = candidate
        .finish_reason
        .as_deref()
        .filter(|r| BLOCKING_FINISH_REASONS.contains(r))
    {
        warn!(reason = %reason, "Candidate blocked upstream");
        return Err(CompletionError::Blocked {
            reason: reason.to_string(),
        });
    }

    let text = candidate
        .content
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter(|part| !part.thought)
                .filter_map(|part| part.text)
                .collect::<String>()
        })
        .unwrap_or_default();

    Ok(StreamChunk {
        text,
        grounding_metadata: candidate.grounding_metadata,
    })
}

fn map_http_error(status: StatusCode, body: &str) -> CompletionError {
    let message = serde_json::from_str::<ErrorWrapper>(body)
        .map(|wrapper| wrapper.error.describe())
        .unwrap_or_else(|_| body.to_string());

    CompletionError::Http {
        status: status.as_u16(),
        message,
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Tool>,
}

#[derive(Serialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    parts: Vec<Part>,
}

impl Content {
    /// Text part (when non-blank) followed by inline data. `None` when there is
    /// nothing to send.
    fn with_parts(role: &str, text: &str, inline: Vec<InlineData>) -> Option<Self> {
        let mut parts = Vec::with_capacity(inline.len() + 1);
        if !text.trim().is_empty() {
            parts.push(Part::Text {
                text: text.to_string(),
            });
        }
        parts.extend(
            inline
                .into_iter()
                .map(|inline_data| Part::InlineData { inline_data }),
        );

        (!parts.is_empty()).then(|| Content {
            role: Some(role.to_string()),
            parts,
        })
    }
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

#[derive(Serialize, Default)]
struct Tool {
    #[serde(rename = "googleSearch")]
    google_search: GoogleSearch,
}

#[derive(Serialize, Default)]
struct GoogleSearch {}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
    #[serde(default)]
    error: Option<ErrorBody>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    finish_reason: Option<String>,
    #[serde(default)]
    grounding_metadata: Option<GroundingMetadata>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<PartResponse>,
}

#[derive(Deserialize)]
struct PartResponse {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    thought: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Deserialize)]
struct ErrorWrapper {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    code: Option<u16>,
    message: Option<String>,
    status: Option<String>,
}

impl ErrorBody {
    fn describe(&self) -> String {
        let message = self.message.clone().unwrap_or_default();
        match self.status.as_deref() {
            Some(status) if !status.is_empty() => format!("{status}: {message}"),
            _ => message,
        }
    }
}
