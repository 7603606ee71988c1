//! Equipment classes (tire compounds) and their performance table.

use serde::{Deserialize, Serialize};

/// Per-class performance parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EquipmentProfile {
    /// Divides the base lap time (> 1.0 is faster)
    pub speed_multiplier: f64,

    /// Wear added per lap before the aggression factor
    pub wear_rate: f64,

    /// Stint length the class is designed for
    pub optimal_laps: u32,

    pub description: &'static str,
}

/// A fixed category of equipment with an associated lookup table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EquipmentClass {
    Soft,
    #[default]
    Medium,
    Hard,
}

const PROFILES: [EquipmentProfile; 3] = [
    EquipmentProfile {
        speed_multiplier: 1.05,
        wear_rate: 0.003,
        optimal_laps: 8,
        description: "Fast but wears quickly",
    },
    EquipmentProfile {
        speed_multiplier: 1.00,
        wear_rate: 0.0015,
        optimal_laps: 15,
        description: "Balanced performance",
    },
    EquipmentProfile {
        speed_multiplier: 0.97,
        wear_rate: 0.0008,
        optimal_laps: 25,
        description: "Slow but durable",
    },
];

impl EquipmentClass {
    /// All classes in dispatch order.
    pub const ALL: [EquipmentClass; 3] = [
        EquipmentClass::Soft,
        EquipmentClass::Medium,
        EquipmentClass::Hard,
    ];

    /// Returns the performance parameters for this class.
    pub fn profile(&self) -> &'static EquipmentProfile {
        &PROFILES[*self as usize]
    }

    /// Strategy decision for a team: cycles through the classes by team id.
    pub fn for_team(team_id: u32) -> Self {
        Self::ALL[team_id as usize % Self::ALL.len()]
    }

    pub fn name(&self) -> &'static str {
        match self {
            EquipmentClass::Soft => "soft",
            EquipmentClass::Medium => "medium",
            EquipmentClass::Hard => "hard",
        }
    }
}

impl std::fmt::Display for EquipmentClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for EquipmentClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "soft" => Ok(EquipmentClass::Soft),
            "medium" => Ok(EquipmentClass::Medium),
            "hard" => Ok(EquipmentClass::Hard),
            _ => Err(format!("Unknown equipment class: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_lookup() {
        assert_eq!(EquipmentClass::Soft.profile().speed_multiplier, 1.05);
        assert_eq!(EquipmentClass::Medium.profile().wear_rate, 0.0015);
        assert_eq!(EquipmentClass::Hard.profile().optimal_laps, 25);
    }

    #[test]
    fn test_team_strategy_cycles() {
        assert_eq!(EquipmentClass::for_team(0), EquipmentClass::Soft);
        assert_eq!(EquipmentClass::for_team(1), EquipmentClass::Medium);
        assert_eq!(EquipmentClass::for_team(2), EquipmentClass::Hard);
        assert_eq!(EquipmentClass::for_team(3), EquipmentClass::Soft);
    }

    #[test]
    fn test_default_is_medium() {
        assert_eq!(EquipmentClass::default(), EquipmentClass::Medium);
    }

    #[test]
    fn test_serde_lowercase() {
        let json = serde_json::to_string(&EquipmentClass::Hard).unwrap();
        assert_eq!(json, "\"hard\"");
        let back: EquipmentClass = serde_json::from_str("\"soft\"").unwrap();
        assert_eq!(back, EquipmentClass::Soft);
        assert!("SUPERSOFT".parse::<EquipmentClass>().is_err());
    }
}
