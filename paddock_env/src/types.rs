//! Common types for the Paddock environment abstraction.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Address of an agent on the message bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AgentAddr {
    /// The single race coordinator
    Coordinator,

    /// A racing participant, by participant id
    Participant(u32),

    /// A team, by team id
    Team(u32),
}

impl std::fmt::Display for AgentAddr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgentAddr::Coordinator => write!(f, "coordinator"),
            AgentAddr::Participant(id) => write!(f, "participant_{}", id),
            AgentAddr::Team(id) => write!(f, "team_{}", id),
        }
    }
}

/// Message-kind tag carried by every envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Strategy,
    ProgressReport,
    RankReply,
    Telemetry,
    ResultReport,
}

impl MessageKind {
    /// Returns the wire name of this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Strategy => "strategy",
            MessageKind::ProgressReport => "progress_report",
            MessageKind::RankReply => "rank_reply",
            MessageKind::Telemetry => "telemetry",
            MessageKind::ResultReport => "result_report",
        }
    }
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Envelope for messages transmitted between agents.
///
/// This is a transport-layer wrapper - the payload is opaque bytes that
/// the receiving agent decodes according to `kind`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    /// Unique id for log correlation
    pub id: Uuid,

    /// Sender address
    pub from: AgentAddr,

    /// Recipient address
    pub to: AgentAddr,

    /// What the payload claims to be
    pub kind: MessageKind,

    /// The raw encoded payload
    pub payload: Vec<u8>,

    /// Timestamp when the envelope was created (sender's clock)
    pub sent_at_ms: u64,
}

impl Envelope {
    /// Creates a new envelope with a fresh id.
    pub fn new(
        from: AgentAddr,
        to: AgentAddr,
        kind: MessageKind,
        payload: Vec<u8>,
        sent_at_ms: u64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            from,
            to,
            kind,
            payload,
            sent_at_ms,
        }
    }

    /// Returns the payload size in bytes.
    pub fn size(&self) -> usize {
        self.payload.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_addr_display() {
        assert_eq!(AgentAddr::Coordinator.to_string(), "coordinator");
        assert_eq!(AgentAddr::Participant(3).to_string(), "participant_3");
        assert_eq!(AgentAddr::Team(1).to_string(), "team_1");
    }

    #[test]
    fn test_message_kind_names() {
        assert_eq!(MessageKind::ProgressReport.to_string(), "progress_report");
        assert_eq!(MessageKind::RankReply.as_str(), "rank_reply");
    }

    #[test]
    fn test_envelopes_get_distinct_ids() {
        let a = Envelope::new(AgentAddr::Team(0), AgentAddr::Participant(0), MessageKind::Strategy, vec![1, 2], 0);
        let b = Envelope::new(AgentAddr::Team(0), AgentAddr::Participant(0), MessageKind::Strategy, vec![1, 2], 0);

        assert_ne!(a.id, b.id);
        assert_eq!(a.size(), 2);
    }
}
