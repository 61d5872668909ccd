//! Fake completion clients for controller tests.

use futures::StreamExt;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::mpsc;

use super::completion_client::{
    CompletionClient, CompletionError, CompletionRequest, ResponseStream, StreamChunk,
};

pub type ChunkResult = Result<StreamChunk, CompletionError>;

/// Replays one scripted reply per request, in order. Requests past the
/// last script get an empty stream.
#[derive(Clone, Default)]
pub struct ScriptedClient {
    turns: Arc<Mutex<VecDeque<Vec<ChunkResult>>>>,
    requests: Arc<Mutex<Vec<CompletionRequest>>>,
}

impl ScriptedClient {
    pub fn new(script: Vec<ChunkResult>) -> Self {
        Self::turns(vec![script])
    }

    pub fn texts(texts: &[&str]) -> Self {
        Self::new(texts.iter().map(|t| Ok(StreamChunk::text(*t))).collect())
    }

    pub fn turns(turns: Vec<Vec<ChunkResult>>) -> Self {
        Self {
            turns: Arc::new(Mutex::new(turns.into())),
            requests: Arc::default(),
        }
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().clone()
    }
}

impl CompletionClient for ScriptedClient {
    fn stream_chat(&self, request: CompletionRequest) -> ResponseStream {
        self.requests.lock().push(request);
        let items = self.turns.lock().pop_front().unwrap_or_default();
        futures::stream::iter(items).boxed()
    }
}

/// Yields whatever the test pushes through the returned sender, ending when
/// the sender is dropped. Lets tests act between chunks.
pub struct ChannelClient {
    receiver: Mutex<Option<mpsc::UnboundedReceiver<ChunkResult>>>,
    requests: Arc<Mutex<Vec<CompletionRequest>>>,
}

impl ChannelClient {
    pub fn new() -> (Self, mpsc::UnboundedSender<ChunkResult>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let client = Self {
            receiver: Mutex::new(Some(rx)),
            requests: Arc::default(),
        };
        (client, tx)
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }
}

impl CompletionClient for ChannelClient {
    fn stream_chat(&self, request: CompletionRequest) -> ResponseStream {
        self.requests.lock().push(request);
        match self.receiver.lock().take() {
            Some(rx) => futures::stream::unfold(rx, |mut rx| async move {
                rx.recv().await.map(|item| (item, rx))
            })
            .boxed(),
            None => futures::stream::empty().boxed(),
        }
    }
}
