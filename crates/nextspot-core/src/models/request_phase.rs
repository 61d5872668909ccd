use serde::Serialize;
use uuid::Uuid;

use super::message::MessageId;

/// Lifecycle of the single in-flight request.
///
/// `Idle → Sending → Streaming → Finalized | Failed → Idle`. Anything other
/// than `Idle` counts as busy and rejects new sends.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RequestPhase {
    #[default]
    Idle,
    Sending {
        request_id: Uuid,
        reply_id: MessageId,
    },
    Streaming {
        request_id: Uuid,
        reply_id: MessageId,
        chunks_received: usize,
    },
    Finalized {
        request_id: Uuid,
        reply_id: MessageId,
    },
    Failed {
        request_id: Uuid,
        reply_id: MessageId,
    },
}

impl RequestPhase {
    pub fn is_busy(&self) -> bool {
        !matches!(self, RequestPhase::Idle)
    }

    pub fn request_id(&self) -> Option<Uuid> {
        match self {
            RequestPhase::Idle => None,
            RequestPhase::Sending { request_id, .. }
            | RequestPhase::Streaming { request_id, .. }
            | RequestPhase::Finalized { request_id, .. }
            | RequestPhase::Failed { request_id, .. } => Some(*request_id),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            RequestPhase::Idle => "idle",
            RequestPhase::Sending { .. } => "sending",
            RequestPhase::Streaming { .. } => "streaming",
            RequestPhase::Finalized { .. } => "finalized",
            RequestPhase::Failed { .. } => "failed",
        }
    }
}
