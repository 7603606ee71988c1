//! Final result aggregation and race-completion detection.

use crate::messages::ResultReport;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Where a result's stamped rank came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankSource {
    /// The coordinator's ranking table held an entry for the id
    Coordinator,

    /// The id was never seen in a progress report; the participant's own
    /// cached rank was kept
    SelfReported,
}

/// A participant's final result, write-once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub report: ResultReport,

    /// Rank at the moment the result was received. Reflects the table at
    /// that instant, not the final cross-participant order.
    pub stamped_rank: u32,

    pub rank_source: RankSource,
}

impl ResultRecord {
    pub fn id(&self) -> u32 {
        self.report.id
    }

    pub fn elapsed_time(&self) -> f64 {
        self.report.elapsed_time
    }
}

/// What happened when a result was offered to the book.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    /// Stored; the race is still running
    Recorded { finished: usize, expected: u32 },

    /// Stored, and this result completed the race
    Completed,

    /// The id already has a result; nothing changed
    Duplicate,
}

/// A row of the final leaderboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalStanding {
    /// Position derived from the final elapsed-time order
    pub position: u32,
    pub record: ResultRecord,
}

/// Result list plus the finished set.
#[derive(Debug, Clone)]
pub struct ResultBook {
    expected: u32,
    results: Vec<ResultRecord>,
    finished: HashSet<u32>,
}

impl ResultBook {
    /// Creates a book that completes after `expected` distinct results.
    pub fn new(expected: u32) -> Self {
        Self {
            expected,
            results: Vec::new(),
            finished: HashSet::new(),
        }
    }

    /// Records a result, stamping it with the table rank when one exists.
    pub fn record(&mut self, report: ResultReport, table_rank: Option<u32>) -> RecordOutcome {
        if self.finished.contains(&report.id) {
            return RecordOutcome::Duplicate;
        }

        let (stamped_rank, rank_source) = match table_rank {
            Some(rank) => (rank, RankSource::Coordinator),
            None => (report.final_rank, RankSource::SelfReported),
        };

        let was_complete = self.is_complete();
        self.finished.insert(report.id);
        self.results.push(ResultRecord {
            report,
            stamped_rank,
            rank_source,
        });

        if !was_complete && self.is_complete() {
            RecordOutcome::Completed
        } else {
            RecordOutcome::Recorded {
                finished: self.finished.len(),
                expected: self.expected,
            }
        }
    }

    /// Pure function of the finished-set size against the configured count.
    pub fn is_complete(&self) -> bool {
        self.finished.len() >= self.expected as usize
    }

    pub fn finished_count(&self) -> usize {
        self.finished.len()
    }

    pub fn expected(&self) -> u32 {
        self.expected
    }

    pub fn has_finished(&self, id: u32) -> bool {
        self.finished.contains(&id)
    }

    /// Results in arrival order.
    pub fn results(&self) -> &[ResultRecord] {
        &self.results
    }

    /// Final leaderboard: re-sorted by elapsed time, positions re-derived.
    ///
    /// Stamped ranks are ignored here; equal times keep arrival order.
    pub fn leaderboard(&self) -> Vec<FinalStanding> {
        let mut sorted: Vec<&ResultRecord> = self.results.iter().collect();
        sorted.sort_by(|a, b| a.elapsed_time().total_cmp(&b.elapsed_time()));

        sorted
            .into_iter()
            .enumerate()
            .map(|(i, record)| FinalStanding {
                position: i as u32 + 1,
                record: record.clone(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::equipment::EquipmentClass;

    fn result(id: u32, elapsed_time: f64, final_rank: u32) -> ResultReport {
        ResultReport {
            id,
            elapsed_time,
            equipment_class: EquipmentClass::Medium,
            overtakes: 0,
            mean_lap_time: elapsed_time,
            lap_time_stddev: 0.0,
            skill: 0.9,
            aggression: 0.5,
            consistency: 0.8,
            final_wear: 0.1,
            final_rank,
            lap_history: Vec::new(),
        }
    }

    #[test]
    fn test_completion_exactness() {
        let mut book = ResultBook::new(3);

        assert_eq!(
            book.record(result(0, 100.0, 1), Some(1)),
            RecordOutcome::Recorded { finished: 1, expected: 3 }
        );
        assert!(!book.is_complete());

        book.record(result(1, 101.0, 2), Some(2));
        assert!(!book.is_complete());

        assert_eq!(book.record(result(2, 102.0, 3), Some(3)), RecordOutcome::Completed);
        assert!(book.is_complete());

        // Duplicate id: flag and count unchanged, nothing appended
        assert_eq!(book.record(result(2, 50.0, 1), Some(1)), RecordOutcome::Duplicate);
        assert!(book.is_complete());
        assert_eq!(book.finished_count(), 3);
        assert_eq!(book.results().len(), 3);
    }

    #[test]
    fn test_unknown_id_keeps_self_reported_rank() {
        let mut book = ResultBook::new(2);
        book.record(result(5, 100.0, 4), None);

        let rec = &book.results()[0];
        assert_eq!(rec.stamped_rank, 4);
        assert_eq!(rec.rank_source, RankSource::SelfReported);
    }

    #[test]
    fn test_table_rank_preferred() {
        let mut book = ResultBook::new(2);
        book.record(result(5, 100.0, 4), Some(2));

        let rec = &book.results()[0];
        assert_eq!(rec.stamped_rank, 2);
        assert_eq!(rec.rank_source, RankSource::Coordinator);
    }

    #[test]
    fn test_leaderboard_ignores_stamped_rank() {
        let mut book = ResultBook::new(3);
        // Stamped ranks deliberately contradict the final times
        book.record(result(0, 300.0, 1), Some(1));
        book.record(result(1, 100.0, 3), Some(3));
        book.record(result(2, 200.0, 1), Some(1));

        let board = book.leaderboard();
        let order: Vec<(u32, u32)> = board.iter().map(|s| (s.position, s.record.id())).collect();
        assert_eq!(order, vec![(1, 1), (2, 2), (3, 0)]);
    }

    #[test]
    fn test_leaderboard_ties_keep_arrival_order() {
        let mut book = ResultBook::new(2);
        book.record(result(9, 100.0, 1), Some(1));
        book.record(result(4, 100.0, 2), Some(2));

        let ids: Vec<u32> = book.leaderboard().iter().map(|s| s.record.id()).collect();
        assert_eq!(ids, vec![9, 4]);
    }
}
