use nextspot_core::{
    GroundingSource, Message, MessageId, PresetPrompt, SessionSnapshot, StreamStatus,
};
use std::fmt::Write as _;

/// Turns full-content reply updates into incremental terminal output.
#[derive(Debug, Default)]
pub struct ReplyPrinter {
    reply_id: Option<MessageId>,
    printed: String,
}

impl ReplyPrinter {
    pub fn start(&mut self, reply_id: MessageId) {
        self.reply_id = Some(reply_id);
        self.printed.clear();
    }

    pub fn is_tracking(&self, id: MessageId) -> bool {
        self.reply_id == Some(id)
    }

    /// Text to print for the latest state of the tracked reply.
    ///
    /// Normally the suffix not yet printed. If the content no longer extends
    /// what was printed (fault text replaced it), the whole content is
    /// printed on a new line.
    pub fn update(&mut self, message: &Message) -> String {
        if !self.is_tracking(message.id) {
            return String::new();
        }

        let out = match message.content.strip_prefix(self.printed.as_str()) {
            Some(delta) => delta.to_string(),
            None => format!("\n{}", message.content),
        };
        self.printed.clone_from(&message.content);
        out
    }

    /// Closing output once the reply ended: newline, then citations.
    pub fn finish(&mut self, message: Option<&Message>, status: StreamStatus) -> String {
        let mut out = String::from("\n");
        if let Some(message) = message {
            out.push_str(&format_sources(&message.sources));
        }
        if status == StreamStatus::Failed {
            out.push_str("[reply failed]\n");
        }
        self.reply_id = None;
        self.printed.clear();
        out
    }
}

pub fn format_sources(sources: &[GroundingSource]) -> String {
    if sources.is_empty() {
        return String::new();
    }

    let mut out = String::from("Sources:\n");
    for (i, source) in sources.iter().enumerate() {
        let _ = writeln!(out, "  [{}] {} <{}>", i + 1, source.title, source.uri);
    }
    out
}

pub fn format_presets(presets: &[PresetPrompt], subscribed: bool) -> String {
    let mut out = String::new();
    for preset in presets {
        let lock = if preset.premium && !subscribed {
            " (premium)"
        } else {
            ""
        };
        let _ = writeln!(out, "  {:<14} {}{}", preset.id, preset.label, lock);
    }
    out
}

pub fn format_status(snapshot: &SessionSnapshot) -> String {
    let config = &snapshot.config;
    let mut out = String::new();
    let _ = writeln!(
        out,
        "model: {}{}",
        config.model,
        if config.is_entitled() {
            ""
        } else {
            " (needs subscription)"
        }
    );
    let _ = writeln!(out, "persona: {}", config.persona);
    let _ = writeln!(out, "phase: {}", config.phase);
    let _ = writeln!(
        out,
        "search grounding: {}",
        if config.use_search { "on" } else { "off" }
    );
    let _ = writeln!(
        out,
        "subscription: {}",
        if config.is_subscribed { "active" } else { "none" }
    );
    let _ = writeln!(
        out,
        "messages: {} ({})",
        snapshot.messages.len(),
        snapshot.phase.name()
    );

    if snapshot.pending_attachments.is_empty() {
        out.push_str("pending attachments: none\n");
    } else {
        out.push_str("pending attachments:\n");
        for (i, attachment) in snapshot.pending_attachments.iter().enumerate() {
            let _ = writeln!(
                out,
                "  {}. {} ({})",
                i + 1,
                attachment.file_name,
                attachment.mime_type
            );
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use nextspot_core::{
        ConversationStore, RequestPhase, STREAM_FAULT_MESSAGE, SessionConfig, default_presets,
    };

    fn reply_with(store: &mut ConversationStore, content: &str) -> Message {
        let id = store
            .streaming_message()
            .map(|m| m.id)
            .unwrap_or_else(|| store.push_placeholder().unwrap());
        store.update_streaming(id, content, &[]);
        store.get(id).unwrap().clone()
    }

    #[test]
    fn test_update_prints_only_new_text() {
        let mut store = ConversationStore::new();
        let mut printer = ReplyPrinter::default();

        let first = reply_with(&mut store, "Sc");
        printer.start(first.id);
        assert_eq!(printer.update(&first), "Sc");
        assert_eq!(printer.update(&reply_with(&mut store, "Scan")), "an");
        assert_eq!(
            printer.update(&reply_with(&mut store, "Scan complete.")),
            " complete."
        );
    }

    #[test]
    fn test_replaced_content_is_reprinted() {
        let mut store = ConversationStore::new();
        let mut printer = ReplyPrinter::default();

        let partial = reply_with(&mut store, "Partial");
        printer.start(partial.id);
        printer.update(&partial);

        store.fail(partial.id, STREAM_FAULT_MESSAGE);
        let failed = store.get(partial.id).unwrap();
        assert_eq!(printer.update(failed), format!("\n{STREAM_FAULT_MESSAGE}"));

        let end = printer.finish(Some(failed), StreamStatus::Failed);
        assert!(end.ends_with("[reply failed]\n"));
        assert!(!printer.is_tracking(partial.id));
    }

    #[test]
    fn test_untracked_updates_are_ignored() {
        let mut store = ConversationStore::new();
        let mut printer = ReplyPrinter::default();
        assert_eq!(printer.update(&reply_with(&mut store, "stray")), "");
    }

    #[test]
    fn test_sources_listing() {
        let sources = vec![GroundingSource {
            title: "Advisory".into(),
            uri: "https://advisory.example".into(),
        }];
        assert_eq!(
            format_sources(&sources),
            "Sources:\n  [1] Advisory <https://advisory.example>\n"
        );
        assert_eq!(format_sources(&[]), "");
    }

    #[test]
    fn test_presets_mark_premium_until_subscribed() {
        let presets = default_presets();
        assert!(format_presets(&presets, false).contains("(premium)"));
        assert!(!format_presets(&presets, true).contains("(premium)"));
    }

    #[test]
    fn test_status_lists_pending_and_entitlement() {
        let snapshot = SessionSnapshot {
            messages: Vec::new(),
            busy: false,
            phase: RequestPhase::Idle,
            config: SessionConfig {
                model: nextspot_core::ModelTier::Advanced,
                ..SessionConfig::default()
            },
            pending_attachments: vec![nextspot_core::Attachment::new("image/png", "AAAA")],
            draft: String::new(),
        };

        let status = format_status(&snapshot);
        assert!(status.contains("model: Advanced (needs subscription)"));
        assert!(status.contains("  1.  (image/png)"));
        assert!(status.contains("messages: 0 (idle)"));
    }
}
