use futures::StreamExt;
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::models::{
    Attachment, ConfigPatch, ConversationStore, Message, MessageId, ModelTier, PendingAttachments,
    PresetPrompt, RequestPhase, SessionConfig, StreamAccumulator, default_presets,
};
use crate::services::{
    AttachmentEncoder, AttachmentError, CompletionClient, CompletionError, CompletionRequest,
    GenerationOptions, InlineData,
};

/// Shown in place of a reply that could not be completed.
pub const STREAM_FAULT_MESSAGE: &str = "The response could not be completed. The request was \
     interrupted or blocked upstream; please try again.";

const EVENT_CAPACITY: usize = 256;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamStatus {
    Completed,
    Failed,
}

/// Why a send was turned away without touching the conversation
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum SendRejection {
    #[error("nothing to send")]
    Empty,
    #[error("a reply is already in progress")]
    Busy,
    #[error("no preset named '{0}'")]
    UnknownPreset(String),
}

/// Action that needs a subscription
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GatedAction {
    AdvancedModel,
    PremiumPreset(String),
}

/// Events emitted by the controller for decoupled presentation updates.
#[derive(Clone, Debug)]
pub enum SessionEvent {
    MessageAppended {
        id: MessageId,
    },
    /// Content, sources or streaming flag of a message changed
    MessageUpdated {
        id: MessageId,
    },
    StreamStarted {
        request_id: Uuid,
        reply_id: MessageId,
    },
    StreamEnded {
        request_id: Uuid,
        reply_id: MessageId,
        status: StreamStatus,
    },
    SendRejected {
        reason: SendRejection,
    },
    UpgradeRequired {
        action: GatedAction,
    },
    ConversationCleared {
        removed: usize,
    },
    AttachmentsChanged {
        pending: usize,
    },
    ConfigChanged(SessionConfig),
    Idle,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SendOutcome {
    Completed { reply_id: MessageId },
    Failed { reply_id: MessageId },
    Rejected(SendRejection),
    UpgradeRequired,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConfigOutcome {
    Applied,
    UpgradeRequired,
}

#[derive(Debug, Default)]
pub struct UploadReport {
    pub added: usize,
    pub failures: Vec<AttachmentError>,
}

/// Point-in-time copy of everything the presentation layer renders.
#[derive(Clone, Debug)]
pub struct SessionSnapshot {
    pub messages: Vec<Message>,
    pub busy: bool,
    pub phase: RequestPhase,
    pub config: SessionConfig,
    pub pending_attachments: Vec<Attachment>,
    pub draft: String,
}

struct SessionInner {
    store: ConversationStore,
    phase: RequestPhase,
    config: SessionConfig,
    pending: PendingAttachments,
    draft: String,
}

/// Everything captured under the lock when a send is accepted
struct AcceptedSend {
    request_id: Uuid,
    reply_id: MessageId,
    request: CompletionRequest,
}

/// Owns one chat session: conversation, pending attachments, draft, config
/// and the single in-flight request.
///
/// All state sits behind one mutex that is never held across an await.
/// Cloning yields another handle to the same session.
#[derive(Clone)]
pub struct SessionController {
    inner: Arc<Mutex<SessionInner>>,
    client: Arc<dyn CompletionClient>,
    encoder: AttachmentEncoder,
    presets: Arc<[PresetPrompt]>,
    chunk_timeout: Option<Duration>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionController {
    pub fn new(client: Arc<dyn CompletionClient>, config: SessionConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(Mutex::new(SessionInner {
                store: ConversationStore::new(),
                phase: RequestPhase::Idle,
                config,
                pending: PendingAttachments::new(),
                draft: String::new(),
            })),
            client,
            encoder: AttachmentEncoder::default(),
            presets: default_presets().into(),
            chunk_timeout: None,
            events,
        }
    }

    pub fn with_encoder(mut self, encoder: AttachmentEncoder) -> Self {
        self.encoder = encoder;
        self
    }

    pub fn with_presets(mut self, presets: Vec<PresetPrompt>) -> Self {
        self.presets = presets.into();
        self
    }

    /// Fail a reply when no chunk arrives within `timeout`. `None` waits forever.
    pub fn with_chunk_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.chunk_timeout = timeout;
        self
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn presets(&self) -> &[PresetPrompt] {
        &self.presets
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let inner = self.inner.lock();
        SessionSnapshot {
            messages: inner.store.messages().to_vec(),
            busy: inner.phase.is_busy(),
            phase: inner.phase.clone(),
            config: inner.config.clone(),
            pending_attachments: inner.pending.items().to_vec(),
            draft: inner.draft.clone(),
        }
    }

    pub fn message(&self, id: MessageId) -> Option<Message> {
        self.inner.lock().store.get(id).cloned()
    }

    pub fn config(&self) -> SessionConfig {
        self.inner.lock().config.clone()
    }

    pub fn set_draft(&self, text: impl Into<String>) {
        self.inner.lock().draft = text.into();
    }

    /// Send `text`, or the current draft when `text` is `None`.
    ///
    /// Explicit text never reads or clears the draft; blank explicit text is
    /// rejected like any other empty send.
    ///
    /// Resolves once the reply has finished streaming. Dropping the returned
    /// future abandons the reply; the session still returns to idle.
    pub async fn send_message(&self, text: Option<String>) -> SendOutcome {
        let accepted = match self.accept_send(text) {
            Ok(accepted) => accepted,
            Err(outcome) => return outcome,
        };
        self.stream_reply(accepted).await
    }

    /// Send a preset prompt. The draft is left untouched.
    pub async fn run_preset(&self, id: &str) -> SendOutcome {
        let Some(preset) = self.presets.iter().find(|p| p.id == id).cloned() else {
            return self.reject(SendRejection::UnknownPreset(id.to_string()));
        };

        if preset.premium && !self.inner.lock().config.is_subscribed {
            info!(preset = %preset.id, "Premium preset requested without subscription");
            self.emit(SessionEvent::UpgradeRequired {
                action: GatedAction::PremiumPreset(preset.id),
            });
            return SendOutcome::UpgradeRequired;
        }

        debug!(preset = %preset.id, "Running preset prompt");
        self.send_message(Some(preset.prompt)).await
    }

    /// Encode `paths` and append the successes to the pending buffer in one step.
    pub async fn upload_files(&self, paths: Vec<PathBuf>) -> UploadReport {
        let batch = self.encoder.encode_batch(&paths).await;
        let added = batch.attachments.len();

        if added > 0 {
            let pending = {
                let mut inner = self.inner.lock();
                inner.pending.extend(batch.attachments);
                inner.pending.len()
            };
            debug!(added, pending, "Attachments queued");
            self.emit(SessionEvent::AttachmentsChanged { pending });
        }

        UploadReport {
            added,
            failures: batch.failures,
        }
    }

    /// Drop the pending attachment at `index`, releasing its preview.
    pub fn remove_pending_attachment(&self, index: usize) -> bool {
        let (removed, pending) = {
            let mut inner = self.inner.lock();
            let removed = inner.pending.remove(index);
            (removed, inner.pending.len())
        };

        match removed {
            Some(attachment) => {
                debug!(index, file = %attachment.file_name, "Pending attachment removed");
                drop(attachment);
                self.emit(SessionEvent::AttachmentsChanged { pending });
                true
            }
            None => {
                debug!(index, "No pending attachment at index");
                false
            }
        }
    }

    /// Empty the conversation. A reply still streaming keeps running but its
    /// updates no longer land anywhere.
    pub fn clear_conversation(&self) -> usize {
        let removed = self.inner.lock().store.clear();
        info!(removed, "Conversation cleared");
        self.emit(SessionEvent::ConversationCleared { removed });
        removed
    }

    /// Apply `patch` atomically. Selecting a gated tier without a subscription
    /// rejects the whole patch.
    pub fn set_config(&self, patch: ConfigPatch) -> ConfigOutcome {
        let updated = {
            let mut inner = self.inner.lock();
            if patch.needs_subscription() && !inner.config.is_subscribed {
                None
            } else if patch.is_empty() {
                return ConfigOutcome::Applied;
            } else {
                patch.apply_to(&mut inner.config);
                Some(inner.config.clone())
            }
        };

        match updated {
            Some(config) => {
                debug!(
                    model = %config.model,
                    persona = %config.persona,
                    phase = %config.phase,
                    use_search = config.use_search,
                    "Session config updated"
                );
                self.emit(SessionEvent::ConfigChanged(config));
                ConfigOutcome::Applied
            }
            None => {
                info!("Advanced model requested without subscription");
                self.emit(SessionEvent::UpgradeRequired {
                    action: GatedAction::AdvancedModel,
                });
                ConfigOutcome::UpgradeRequired
            }
        }
    }

    /// Grant the subscription and switch to the advanced tier.
    pub fn confirm_upgrade(&self) -> SessionConfig {
        let config = {
            let mut inner = self.inner.lock();
            inner.config.is_subscribed = true;
            inner.config.model = ModelTier::Advanced;
            inner.config.clone()
        };
        info!("Subscription activated");
        self.emit(SessionEvent::ConfigChanged(config.clone()));
        config
    }

    fn accept_send(&self, text: Option<String>) -> Result<AcceptedSend, SendOutcome> {
        let mut inner = self.inner.lock();

        let (content, from_draft) = match text {
            Some(text) => (text, false),
            None => (inner.draft.clone(), true),
        };

        if inner.phase.is_busy() || inner.store.streaming_message().is_some() {
            drop(inner);
            return Err(self.reject(SendRejection::Busy));
        }
        if content.trim().is_empty() && inner.pending.is_empty() {
            drop(inner);
            return Err(self.reject(SendRejection::Empty));
        }
        if !inner.config.is_entitled() {
            drop(inner);
            info!("Send blocked: advanced model requires a subscription");
            self.emit(SessionEvent::UpgradeRequired {
                action: GatedAction::AdvancedModel,
            });
            return Err(SendOutcome::UpgradeRequired);
        }

        let history = inner.store.messages().to_vec();
        let options = GenerationOptions::from(&inner.config);
        let attachments = inner.pending.take();
        let had_attachments = !attachments.is_empty();
        let inline: Vec<InlineData> = attachments.iter().map(InlineData::from).collect();

        let user_id = inner.store.push_user(content.clone(), attachments);
        if from_draft {
            inner.draft.clear();
        }
        let reply_id = match inner.store.push_placeholder() {
            Ok(id) => id,
            Err(e) => {
                drop(inner);
                error!(error = %e, "Placeholder rejected after busy check");
                return Err(self.reject(SendRejection::Busy));
            }
        };

        let request_id = Uuid::new_v4();
        inner.phase = RequestPhase::Sending {
            request_id,
            reply_id,
        };
        drop(inner);

        debug!(
            request_id = %request_id,
            user_id = %user_id,
            reply_id = %reply_id,
            attachment_count = inline.len(),
            history_len = history.len(),
            "Send accepted"
        );

        self.emit(SessionEvent::MessageAppended { id: user_id });
        if had_attachments {
            self.emit(SessionEvent::AttachmentsChanged { pending: 0 });
        }
        self.emit(SessionEvent::MessageAppended { id: reply_id });

        Ok(AcceptedSend {
            request_id,
            reply_id,
            request: CompletionRequest {
                history,
                content,
                attachments: inline,
                options,
            },
        })
    }

    async fn stream_reply(&self, accepted: AcceptedSend) -> SendOutcome {
        let AcceptedSend {
            request_id,
            reply_id,
            request,
        } = accepted;

        let mut guard = InFlightGuard {
            inner: self.inner.clone(),
            events: self.events.clone(),
            request_id,
            reply_id,
            settled: false,
        };

        let mut stream = self.client.stream_chat(request);
        self.inner.lock().phase = RequestPhase::Streaming {
            request_id,
            reply_id,
            chunks_received: 0,
        };
        self.emit(SessionEvent::StreamStarted {
            request_id,
            reply_id,
        });

        let mut accumulator = StreamAccumulator::new();
        let result = loop {
            let next = match self.chunk_timeout {
                Some(limit) => match tokio::time::timeout(limit, stream.next()).await {
                    Ok(next) => next,
                    Err(_) => Some(Err(CompletionError::Timeout(limit))),
                },
                None => stream.next().await,
            };

            match next {
                Some(Ok(chunk)) => {
                    accumulator.apply(&chunk);
                    let updated = {
                        let mut inner = self.inner.lock();
                        if let RequestPhase::Streaming {
                            chunks_received, ..
                        } = &mut inner.phase
                        {
                            *chunks_received = accumulator.chunks();
                        }
                        inner.store.update_streaming(
                            reply_id,
                            accumulator.text(),
                            accumulator.sources(),
                        )
                    };
                    if updated {
                        self.emit(SessionEvent::MessageUpdated { id: reply_id });
                    }
                }
                Some(Err(e)) => break Err(e),
                None => break Ok(()),
            }
        };

        guard.settle(match result {
            Ok(()) => StreamStatus::Completed,
            Err(_) => StreamStatus::Failed,
        });

        match result {
            Ok(()) => {
                info!(
                    request_id = %request_id,
                    reply_id = %reply_id,
                    chunks = accumulator.chunks(),
                    content_len = accumulator.text().len(),
                    sources = accumulator.sources().len(),
                    "Reply completed"
                );
                SendOutcome::Completed { reply_id }
            }
            Err(e) => {
                error!(
                    request_id = %request_id,
                    reply_id = %reply_id,
                    chunks = accumulator.chunks(),
                    error = %e,
                    "Reply failed"
                );
                SendOutcome::Failed { reply_id }
            }
        }
    }

    fn reject(&self, reason: SendRejection) -> SendOutcome {
        debug!(reason = %reason, "Send rejected");
        self.emit(SessionEvent::SendRejected {
            reason: reason.clone(),
        });
        SendOutcome::Rejected(reason)
    }

    fn emit(&self, event: SessionEvent) {
        // No receivers is fine
        let _ = self.events.send(event);
    }
}

/// Returns the session to idle when the send future finishes or is dropped.
struct InFlightGuard {
    inner: Arc<Mutex<SessionInner>>,
    events: broadcast::Sender<SessionEvent>,
    request_id: Uuid,
    reply_id: MessageId,
    settled: bool,
}

impl InFlightGuard {
    /// Record the terminal state of the reply. A failed reply gets the fault text.
    fn settle(&mut self, status: StreamStatus) {
        let changed = {
            let mut inner = self.inner.lock();
            let (request_id, reply_id) = (self.request_id, self.reply_id);
            match status {
                StreamStatus::Completed => {
                    inner.phase = RequestPhase::Finalized {
                        request_id,
                        reply_id,
                    };
                    inner.store.finalize(reply_id)
                }
                StreamStatus::Failed => {
                    inner.phase = RequestPhase::Failed {
                        request_id,
                        reply_id,
                    };
                    inner.store.fail(reply_id, STREAM_FAULT_MESSAGE)
                }
            }
        };
        self.settled = true;
        self.finish(changed, status);
    }

    fn finish(&self, changed: bool, status: StreamStatus) {
        if changed {
            let _ = self.events.send(SessionEvent::MessageUpdated { id: self.reply_id });
        }
        let _ = self.events.send(SessionEvent::StreamEnded {
            request_id: self.request_id,
            reply_id: self.reply_id,
            status,
        });
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if !self.settled {
            warn!(
                request_id = %self.request_id,
                reply_id = %self.reply_id,
                "Reply abandoned before the stream ended"
            );
            let changed = self
                .inner
                .lock()
                .store
                .fail(self.reply_id, STREAM_FAULT_MESSAGE);
            self.finish(changed, StreamStatus::Failed);
        }

        {
            let mut inner = self.inner.lock();
            if inner.phase.request_id() == Some(self.request_id) {
                inner.phase = RequestPhase::Idle;
            }
        }
        debug!(request_id = %self.request_id, "Session idle");
        let _ = self.events.send(SessionEvent::Idle);
    }
}
