use thiserror::Error;
use tracing::debug;

use super::message::{Attachment, GroundingSource, Message, MessageId};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("reply {0} is still streaming")]
    ReplyInFlight(MessageId),
}

/// Ordered message list for the active conversation.
///
/// Append-only, except that the single streaming model message may be
/// rewritten in place. Every mutation addressed by id is a no-op when the id
/// is no longer present, which covers streams that outlive a `clear`.
pub struct ConversationStore {
    messages: Vec<Message>,
    next_id: u64,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self {
            messages: Vec::new(),
            next_id: 1,
        }
    }

    fn allocate_id(&mut self) -> MessageId {
        let id = MessageId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Append a terminal user message
    pub fn push_user(&mut self, content: String, attachments: Vec<Attachment>) -> MessageId {
        let id = self.allocate_id();
        self.messages.push(Message::user(id, content, attachments));
        id
    }

    /// Append an empty streaming model message.
    ///
    /// Fails if another message is still streaming.
    pub fn push_placeholder(&mut self) -> Result<MessageId, StoreError> {
        if let Some(existing) = self.streaming_message() {
            return Err(StoreError::ReplyInFlight(existing.id));
        }
        let id = self.allocate_id();
        self.messages.push(Message::placeholder(id));
        Ok(id)
    }

    fn streaming_mut(&mut self, id: MessageId) -> Option<&mut Message> {
        self.messages
            .iter_mut()
            .find(|m| m.id == id && m.is_streaming)
    }

    /// Replace content and sources of the streaming message `id`.
    /// Returns false (and changes nothing) if it is absent or terminal.
    pub fn update_streaming(
        &mut self,
        id: MessageId,
        content: &str,
        sources: &[GroundingSource],
    ) -> bool {
        match self.streaming_mut(id) {
            Some(msg) => {
                msg.content.clear();
                msg.content.push_str(content);
                msg.sources = sources.to_vec();
                true
            }
            None => {
                debug!(reply_id = %id, "Ignoring update for message not in store");
                false
            }
        }
    }

    /// Mark the streaming message `id` as complete
    pub fn finalize(&mut self, id: MessageId) -> bool {
        match self.streaming_mut(id) {
            Some(msg) => {
                msg.is_streaming = false;
                true
            }
            None => false,
        }
    }

    /// Replace the streaming message's content with `fault` and end it.
    pub fn fail(&mut self, id: MessageId, fault: &str) -> bool {
        match self.streaming_mut(id) {
            Some(msg) => {
                msg.content = fault.to_string();
                msg.is_streaming = false;
                true
            }
            None => false,
        }
    }

    /// Drop every message. Id allocation continues from where it was, so ids
    /// held by in-flight requests never match a newer message.
    pub fn clear(&mut self) -> usize {
        let removed = self.messages.len();
        self.messages.clear();
        removed
    }

    pub fn get(&self, id: MessageId) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    pub fn streaming_message(&self) -> Option<&Message> {
        self.messages.iter().find(|m| m.is_streaming)
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

impl Default for ConversationStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;

    fn source(title: &str) -> GroundingSource {
        GroundingSource {
            title: title.to_string(),
            uri: format!("https://example.com/{title}"),
        }
    }

    #[test]
    fn test_ids_are_increasing() {
        let mut store = ConversationStore::new();
        let a = store.push_user("hello".into(), Vec::new());
        let b = store.push_placeholder().unwrap();

        assert!(b > a);
        assert_eq!(store.len(), 2);
        assert_eq!(store.messages()[0].role, Role::User);
        assert_eq!(store.messages()[1].role, Role::Model);
    }

    #[test]
    fn test_only_one_placeholder_may_stream() {
        let mut store = ConversationStore::new();
        let first = store.push_placeholder().unwrap();

        assert_eq!(
            store.push_placeholder(),
            Err(StoreError::ReplyInFlight(first))
        );

        store.finalize(first);
        assert!(store.push_placeholder().is_ok());
    }

    #[test]
    fn test_update_replaces_content_and_sources() {
        let mut store = ConversationStore::new();
        let id = store.push_placeholder().unwrap();

        assert!(store.update_streaming(id, "Sc", &[source("a")]));
        assert!(store.update_streaming(id, "Scan", &[source("b")]));

        let msg = store.get(id).unwrap();
        assert_eq!(msg.content, "Scan");
        assert_eq!(msg.sources, vec![source("b")]);
        assert!(msg.is_streaming);
    }

    #[test]
    fn test_terminal_messages_are_immutable() {
        let mut store = ConversationStore::new();
        let user = store.push_user("question".into(), Vec::new());
        let reply = store.push_placeholder().unwrap();
        store.update_streaming(reply, "answer", &[]);
        assert!(store.finalize(reply));

        assert!(!store.update_streaming(reply, "rewritten", &[]));
        assert!(!store.update_streaming(user, "rewritten", &[]));
        assert!(!store.fail(reply, "fault"));
        assert_eq!(store.get(reply).unwrap().content, "answer");
        assert_eq!(store.get(user).unwrap().content, "question");
    }

    #[test]
    fn test_fail_overwrites_partial_content() {
        let mut store = ConversationStore::new();
        let reply = store.push_placeholder().unwrap();
        store.update_streaming(reply, "Partial", &[]);

        assert!(store.fail(reply, "fault"));
        let msg = store.get(reply).unwrap();
        assert_eq!(msg.content, "fault");
        assert!(!msg.is_streaming);
    }

    #[test]
    fn test_updates_after_clear_are_noops() {
        let mut store = ConversationStore::new();
        store.push_user("hi".into(), Vec::new());
        let reply = store.push_placeholder().unwrap();

        assert_eq!(store.clear(), 2);
        assert!(!store.update_streaming(reply, "late", &[]));
        assert!(!store.finalize(reply));
        assert!(store.is_empty());

        // New messages never reuse the stale id
        let fresh = store.push_placeholder().unwrap();
        assert_ne!(fresh, reply);
        assert!(!store.update_streaming(reply, "late", &[]));
        assert_eq!(store.get(fresh).unwrap().content, "");
    }
}
