//! Message contracts between participants, teams and the coordinator.
//!
//! Each payload type knows its [`MessageKind`] tag and encodes to JSON.
//! Decoding checks the envelope's tag first, then the body, so a receiver
//! can tell "wrong message" apart from "broken message".

use crate::equipment::EquipmentClass;
use crate::error::ProtocolError;
use crate::participant::LapRecord;
use paddock_env::{Envelope, MessageKind};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// A typed message body.
pub trait Payload: Serialize + DeserializeOwned {
    const KIND: MessageKind;

    /// Serializes the payload for an envelope.
    fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Decodes an envelope, checking its kind tag first.
    fn decode(envelope: &Envelope) -> Result<Self, ProtocolError> {
        if envelope.kind != Self::KIND {
            return Err(ProtocolError::UnexpectedKind {
                expected: Self::KIND,
                found: envelope.kind,
            });
        }
        serde_json::from_slice(&envelope.payload).map_err(|source| ProtocolError::Malformed {
            kind: Self::KIND,
            source,
        })
    }
}

/// Team → Participant: the team's equipment decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyAssignment {
    pub equipment_class: EquipmentClass,

    /// Advisory only
    #[serde(default)]
    pub target_pace: String,

    /// Advisory only
    #[serde(default)]
    pub overtake_aggression: f64,
}

impl StrategyAssignment {
    pub fn new(equipment_class: EquipmentClass) -> Self {
        Self {
            equipment_class,
            target_pace: "moderate".to_string(),
            overtake_aggression: 0.5,
        }
    }
}

impl Payload for StrategyAssignment {
    const KIND: MessageKind = MessageKind::Strategy;
}

/// Participant → Coordinator: state after a completed lap.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProgressReport {
    pub id: u32,
    pub lap: u32,
    pub elapsed_time: f64,
    pub wear: f64,
}

impl Payload for ProgressReport {
    const KIND: MessageKind = MessageKind::ProgressReport;
}

/// Coordinator → Participant: rank after recomputation.
///
/// `lap` echoes the report being answered so late replies can be told apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankReply {
    pub rank: u32,
    pub lap: u32,
}

impl Payload for RankReply {
    const KIND: MessageKind = MessageKind::RankReply;
}

/// Participant → Team: periodic observation sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySample {
    pub id: u32,
    pub lap: u32,
    pub wear: f64,
    pub rank: u32,
    pub recent_avg_lap_time: f64,
}

impl Payload for TelemetrySample {
    const KIND: MessageKind = MessageKind::Telemetry;
}

/// Participant → Coordinator: final self-reported summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultReport {
    pub id: u32,
    pub elapsed_time: f64,
    pub equipment_class: EquipmentClass,
    pub overtakes: u32,
    pub mean_lap_time: f64,
    pub lap_time_stddev: f64,
    pub skill: f64,
    pub aggression: f64,
    pub consistency: f64,
    pub final_wear: f64,

    /// Participant's locally cached rank; only used when the coordinator
    /// never saw this id in a progress report
    pub final_rank: u32,

    pub lap_history: Vec<LapRecord>,
}

impl Payload for ResultReport {
    const KIND: MessageKind = MessageKind::ResultReport;
}
