use super::message::GroundingSource;
use crate::services::StreamChunk;

/// Folds streamed chunks into the reply text and its citation list.
///
/// Text deltas are appended in arrival order. Citations are last-chunk-wins:
/// any chunk carrying grounding metadata replaces the whole list with the web
/// entries of that chunk, even when that leaves it empty.
#[derive(Debug, Default)]
pub struct StreamAccumulator {
    text: String,
    sources: Vec<GroundingSource>,
    chunks: usize,
}

impl StreamAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, chunk: &StreamChunk) {
        self.chunks += 1;
        self.text.push_str(&chunk.text);

        if let Some(sources) = chunk.web_sources() {
            self.sources = sources;
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn sources(&self) -> &[GroundingSource] {
        &self.sources
    }

    pub fn chunks(&self) -> usize {
        self.chunks
    }
}
