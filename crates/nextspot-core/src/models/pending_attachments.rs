use super::message::Attachment;

/// Attachments selected by the user but not yet sent.
#[derive(Debug, Default)]
pub struct PendingAttachments {
    items: Vec<Attachment>,
}

impl PendingAttachments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a fully encoded batch, preserving its order.
    pub fn extend(&mut self, batch: Vec<Attachment>) {
        self.items.extend(batch);
    }

    /// Remove one attachment; its preview is released once no message holds it.
    pub fn remove(&mut self, index: usize) -> Option<Attachment> {
        if index < self.items.len() {
            Some(self.items.remove(index))
        } else {
            None
        }
    }

    /// Move everything out, leaving the buffer empty.
    pub fn take(&mut self) -> Vec<Attachment> {
        std::mem::take(&mut self.items)
    }

    pub fn items(&self) -> &[Attachment] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
