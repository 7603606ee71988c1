//! Post-race analysis over the final leaderboard.
//!
//! Breaks results down by equipment class and measures how the drawn traits
//! relate to outcomes.

use crate::equipment::EquipmentClass;
use crate::results::FinalStanding;
use crate::stats;
use serde::{Deserialize, Serialize};

/// Aggregate for one equipment class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassSummary {
    pub equipment_class: EquipmentClass,
    pub participants: usize,
    pub mean_elapsed_time: f64,

    /// Sample std-dev; `None` with a single participant
    pub elapsed_time_stddev: Option<f64>,

    pub mean_overtakes: f64,

    /// Best final position achieved on this class
    pub best_position: u32,
}

/// Trait/outcome correlations. `None` where the correlation is undefined.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Correlations {
    pub aggression_vs_overtakes: Option<f64>,
    pub skill_vs_elapsed_time: Option<f64>,
    pub consistency_vs_lap_stddev: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaceAnalysis {
    /// Only classes that at least one participant raced on, in table order
    pub classes: Vec<ClassSummary>,
    pub correlations: Correlations,
}

impl RaceAnalysis {
    pub fn from_leaderboard(board: &[FinalStanding]) -> Self {
        let classes = EquipmentClass::ALL
            .iter()
            .filter_map(|class| summarize_class(board, *class))
            .collect();

        let correlations = Correlations {
            aggression_vs_overtakes: stats::pearson(
                &column(board, |s| s.record.report.aggression),
                &column(board, |s| s.record.report.overtakes as f64),
            ),
            skill_vs_elapsed_time: stats::pearson(
                &column(board, |s| s.record.report.skill),
                &column(board, |s| s.record.report.elapsed_time),
            ),
            consistency_vs_lap_stddev: stats::pearson(
                &column(board, |s| s.record.report.consistency),
                &column(board, |s| s.record.report.lap_time_stddev),
            ),
        };

        Self {
            classes,
            correlations,
        }
    }
}

fn column(board: &[FinalStanding], f: impl Fn(&FinalStanding) -> f64) -> Vec<f64> {
    board.iter().map(f).collect()
}

fn summarize_class(board: &[FinalStanding], class: EquipmentClass) -> Option<ClassSummary> {
    let rows: Vec<&FinalStanding> = board
        .iter()
        .filter(|s| s.record.report.equipment_class == class)
        .collect();

    let best_position = rows.iter().map(|s| s.position).min()?;
    let times: Vec<f64> = rows.iter().map(|s| s.record.report.elapsed_time).collect();
    let overtakes: Vec<f64> = rows.iter().map(|s| s.record.report.overtakes as f64).collect();

    Some(ClassSummary {
        equipment_class: class,
        participants: rows.len(),
        mean_elapsed_time: stats::mean(&times),
        elapsed_time_stddev: stats::sample_std_dev(&times),
        mean_overtakes: stats::mean(&overtakes),
        best_position,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::ResultReport;
    use crate::results::ResultBook;
    use approx::assert_relative_eq;

    fn result(id: u32, class: EquipmentClass, elapsed_time: f64, aggression: f64, overtakes: u32) -> ResultReport {
        ResultReport {
            id,
            elapsed_time,
            equipment_class: class,
            overtakes,
            mean_lap_time: elapsed_time / 10.0,
            lap_time_stddev: 1.0 - aggression,
            skill: 1.0 - elapsed_time / 10_000.0,
            aggression,
            consistency: aggression,
            final_wear: 0.1,
            final_rank: id + 1,
            lap_history: Vec::new(),
        }
    }

    fn board() -> Vec<FinalStanding> {
        let mut book = ResultBook::new(4);
        book.record(result(0, EquipmentClass::Soft, 900.0, 0.3, 0), Some(1));
        book.record(result(1, EquipmentClass::Soft, 910.0, 0.5, 1), Some(2));
        book.record(result(2, EquipmentClass::Hard, 905.0, 0.7, 2), Some(3));
        book.record(result(3, EquipmentClass::Hard, 930.0, 0.9, 3), Some(4));
        book.leaderboard()
    }

    #[test]
    fn test_class_breakdown() {
        let analysis = RaceAnalysis::from_leaderboard(&board());

        // Medium unused
        assert_eq!(analysis.classes.len(), 2);

        let soft = &analysis.classes[0];
        assert_eq!(soft.equipment_class, EquipmentClass::Soft);
        assert_eq!(soft.participants, 2);
        assert_relative_eq!(soft.mean_elapsed_time, 905.0);
        assert_relative_eq!(soft.mean_overtakes, 0.5);
        assert_eq!(soft.best_position, 1);

        let hard = &analysis.classes[1];
        assert_eq!(hard.best_position, 2);
        assert_relative_eq!(hard.elapsed_time_stddev.unwrap(), (2.0f64 * 12.5 * 12.5).sqrt(), epsilon = 1e-9);
    }

    #[test]
    fn test_correlations() {
        let analysis = RaceAnalysis::from_leaderboard(&board());
        let c = analysis.correlations;

        // Overtakes rise linearly with aggression
        assert_relative_eq!(c.aggression_vs_overtakes.unwrap(), 1.0, epsilon = 1e-9);
        // Skill is a decreasing linear function of time
        assert_relative_eq!(c.skill_vs_elapsed_time.unwrap(), -1.0, epsilon = 1e-9);
        assert_relative_eq!(c.consistency_vs_lap_stddev.unwrap(), -1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_empty_board() {
        let analysis = RaceAnalysis::from_leaderboard(&[]);
        assert!(analysis.classes.is_empty());
        assert_eq!(analysis.correlations, Correlations::default());
    }
}
