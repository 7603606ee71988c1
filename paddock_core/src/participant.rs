//! Participant-owned race state.
//!
//! A `ParticipantRecord` is mutated only by the agent that owns it. The
//! coordinator only ever sees the snapshots produced by `progress_report()`
//! and `result_report()`.

use crate::equipment::EquipmentClass;
use crate::lap_model::PerformanceTraits;
use crate::messages::{ProgressReport, ResultReport, TelemetrySample};
use crate::stats;
use serde::{Deserialize, Serialize};

/// Laps averaged for the telemetry pace figure.
pub const TELEMETRY_WINDOW: usize = 3;

/// One completed lap.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LapRecord {
    pub lap: u32,
    pub duration: f64,
    pub wear: f64,

    /// Rank held once this lap's reply was handled (stale if it timed out)
    pub rank: u32,

    pub overtook: bool,
}

/// State of a single participant.
#[derive(Debug, Clone, PartialEq)]
pub struct ParticipantRecord {
    pub id: u32,
    pub traits: PerformanceTraits,
    pub equipment: EquipmentClass,
    pub wear: f64,
    pub elapsed_time: f64,
    pub current_lap: u32,

    /// Last rank received from the coordinator; grid slot before that
    pub rank: u32,

    pub overtake_count: u32,
    pub lap_history: Vec<LapRecord>,

    /// Whether any rank reply has been received yet
    ranked: bool,
}

impl ParticipantRecord {
    /// Creates a participant on its grid slot (`id + 1`) with default equipment.
    pub fn new(id: u32, traits: PerformanceTraits) -> Self {
        Self {
            id,
            traits,
            equipment: EquipmentClass::default(),
            wear: 0.0,
            elapsed_time: 0.0,
            current_lap: 0,
            rank: id.saturating_add(1),
            overtake_count: 0,
            lap_history: Vec::new(),
            ranked: false,
        }
    }

    pub fn adopt_equipment(&mut self, equipment: EquipmentClass) {
        self.equipment = equipment;
    }

    /// True once the lap target has been reached.
    pub fn has_finished(&self, num_laps: u32) -> bool {
        self.current_lap >= num_laps
    }

    /// Records a completed lap and returns the report for the coordinator.
    ///
    /// Wear never decreases and never exceeds 1.0.
    pub fn complete_lap(&mut self, duration: f64, new_wear: f64) -> ProgressReport {
        self.elapsed_time += duration;
        self.current_lap += 1;
        self.wear = new_wear.max(self.wear).min(1.0);

        self.lap_history.push(LapRecord {
            lap: self.current_lap,
            duration,
            wear: self.wear,
            rank: self.rank,
            overtook: false,
        });

        self.progress_report()
    }

    /// Applies a rank reply. Returns true when it counts as an overtake.
    ///
    /// Only a strict improvement over the previous reply counts; the first
    /// reply never does. Rank 0 is not a valid standing and is ignored.
    pub fn apply_rank(&mut self, rank: u32) -> bool {
        if rank == 0 {
            return false;
        }

        let overtook = self.ranked && rank < self.rank;
        self.rank = rank;
        self.ranked = true;

        if overtook {
            self.overtake_count += 1;
        }
        if let Some(last) = self.lap_history.last_mut() {
            last.rank = rank;
            last.overtook |= overtook;
        }
        overtook
    }

    pub fn progress_report(&self) -> ProgressReport {
        ProgressReport {
            id: self.id,
            lap: self.current_lap,
            elapsed_time: self.elapsed_time,
            wear: self.wear,
        }
    }

    pub fn lap_times(&self) -> Vec<f64> {
        self.lap_history.iter().map(|l| l.duration).collect()
    }

    /// Mean of the last `TELEMETRY_WINDOW` laps, 0 until that many exist.
    pub fn recent_avg_lap_time(&self) -> f64 {
        let n = self.lap_history.len();
        if n < TELEMETRY_WINDOW {
            return 0.0;
        }
        let recent: Vec<f64> = self.lap_history[n - TELEMETRY_WINDOW..]
            .iter()
            .map(|l| l.duration)
            .collect();
        stats::mean(&recent)
    }

    pub fn telemetry_sample(&self) -> TelemetrySample {
        TelemetrySample {
            id: self.id,
            lap: self.current_lap,
            wear: self.wear,
            rank: self.rank,
            recent_avg_lap_time: self.recent_avg_lap_time(),
        }
    }

    /// Final summary computed over this participant's own history.
    pub fn result_report(&self) -> ResultReport {
        let laps = self.lap_times();
        ResultReport {
            id: self.id,
            elapsed_time: self.elapsed_time,
            equipment_class: self.equipment,
            overtakes: self.overtake_count,
            mean_lap_time: stats::mean(&laps),
            lap_time_stddev: stats::std_dev(&laps),
            skill: self.traits.skill,
            aggression: self.traits.aggression,
            consistency: self.traits.consistency,
            final_wear: self.wear,
            final_rank: self.rank,
            lap_history: self.lap_history.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn record(id: u32) -> ParticipantRecord {
        ParticipantRecord::new(
            id,
            PerformanceTraits {
                skill: 0.9,
                aggression: 0.5,
                consistency: 0.8,
            },
        )
    }

    #[test]
    fn test_initial_state() {
        let p = record(3);
        assert_eq!(p.rank, 4);
        assert_eq!(p.current_lap, 0);
        assert_eq!(p.equipment, EquipmentClass::Medium);
        assert!(!p.has_finished(1));
        assert!(p.has_finished(0));
    }

    #[test]
    fn test_complete_lap_accumulates() {
        let mut p = record(0);
        p.complete_lap(91.0, 0.01);
        let report = p.complete_lap(92.0, 0.02);

        assert_eq!(report.id, 0);
        assert_eq!(report.lap, 2);
        assert_relative_eq!(report.elapsed_time, 183.0);
        assert_relative_eq!(report.wear, 0.02);
        assert_eq!(p.lap_history.len(), 2);
        assert_eq!(p.lap_history[1].lap, 2);
    }

    #[test]
    fn test_wear_never_decreases() {
        let mut p = record(0);
        p.complete_lap(90.0, 0.5);
        p.complete_lap(90.0, 0.2);
        assert_eq!(p.wear, 0.5);

        p.complete_lap(90.0, 3.0);
        assert_eq!(p.wear, 1.0);
    }

    #[test]
    fn test_first_reply_is_not_an_overtake() {
        // Grid slot is 6, but the first reply only establishes the baseline
        let mut p = record(5);
        p.complete_lap(90.0, 0.0);
        assert!(!p.apply_rank(1));
        assert_eq!(p.overtake_count, 0);
        assert_eq!(p.lap_history[0].rank, 1);
    }

    #[test]
    fn test_strict_improvement_counts() {
        let mut p = record(0);
        p.complete_lap(90.0, 0.0);
        p.apply_rank(4);

        p.complete_lap(90.0, 0.0);
        assert!(!p.apply_rank(4));

        p.complete_lap(90.0, 0.0);
        assert!(p.apply_rank(2));

        p.complete_lap(90.0, 0.0);
        assert!(!p.apply_rank(3));

        assert_eq!(p.overtake_count, 1);
        let flags: Vec<bool> = p.lap_history.iter().map(|l| l.overtook).collect();
        assert_eq!(flags, vec![false, false, true, false]);
    }

    #[test]
    fn test_rank_zero_ignored() {
        let mut p = record(0);
        p.complete_lap(90.0, 0.0);
        p.apply_rank(2);
        assert!(!p.apply_rank(0));
        assert_eq!(p.rank, 2);
    }

    #[test]
    fn test_recent_average_window() {
        let mut p = record(0);
        p.complete_lap(90.0, 0.0);
        p.complete_lap(92.0, 0.0);
        assert_eq!(p.recent_avg_lap_time(), 0.0);

        p.complete_lap(94.0, 0.0);
        p.complete_lap(96.0, 0.0);
        assert_relative_eq!(p.recent_avg_lap_time(), 94.0);
        assert_relative_eq!(p.telemetry_sample().recent_avg_lap_time, 94.0);
    }

    #[test]
    fn test_result_report_statistics() {
        let mut p = record(2);
        p.adopt_equipment(EquipmentClass::Hard);
        for d in [90.0, 92.0, 94.0] {
            p.complete_lap(d, 0.1);
        }
        p.apply_rank(1);

        let result = p.result_report();
        assert_eq!(result.id, 2);
        assert_eq!(result.equipment_class, EquipmentClass::Hard);
        assert_relative_eq!(result.mean_lap_time, 92.0);
        assert_relative_eq!(result.lap_time_stddev, (8.0f64 / 3.0).sqrt(), epsilon = 1e-12);
        assert_eq!(result.final_rank, 1);
        assert_eq!(result.lap_history.len(), 3);
        assert_relative_eq!(result.skill, 0.9);
    }
}
