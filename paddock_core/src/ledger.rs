//! Coordinator state: ranking table plus result book.
//!
//! The ledger has no interior locking. Whoever owns it (the coordinator
//! task) is the single writer, and each `handle_*` call runs to completion
//! before the next one starts.

use crate::messages::{ProgressReport, ResultReport};
use crate::ranking::RankingTable;
use crate::results::{FinalStanding, RecordOutcome, ResultBook, ResultRecord};
use serde::{Deserialize, Serialize};

/// Snapshot of race completion published to the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RaceProgress {
    pub finished: usize,
    pub expected: u32,
    pub complete: bool,
}

/// The coordinator's cross-participant state.
#[derive(Debug, Clone)]
pub struct CoordinatorLedger {
    table: RankingTable,
    book: ResultBook,
}

impl CoordinatorLedger {
    pub fn new(expected_participants: u32) -> Self {
        Self {
            table: RankingTable::new(),
            book: ResultBook::new(expected_participants),
        }
    }

    /// `ReportProgress`: upsert, full recompute, return the reporter's rank.
    pub fn handle_progress(&mut self, report: &ProgressReport) -> u32 {
        self.table.report(report)
    }

    /// `ReportResult`: stamp with the synchronized rank when known, store,
    /// and update completion.
    pub fn handle_result(&mut self, report: ResultReport) -> RecordOutcome {
        let table_rank = self.table.rank_of(report.id);
        self.book.record(report, table_rank)
    }

    pub fn progress(&self) -> RaceProgress {
        RaceProgress {
            finished: self.book.finished_count(),
            expected: self.book.expected(),
            complete: self.book.is_complete(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.book.is_complete()
    }

    pub fn table(&self) -> &RankingTable {
        &self.table
    }

    pub fn results(&self) -> &[ResultRecord] {
        self.book.results()
    }

    pub fn leaderboard(&self) -> Vec<FinalStanding> {
        self.book.leaderboard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::equipment::EquipmentClass;
    use crate::results::RankSource;
    use proptest::prelude::*;

    fn progress(id: u32, lap: u32, elapsed_time: f64) -> ProgressReport {
        ProgressReport {
            id,
            lap,
            elapsed_time,
            wear: 0.0,
        }
    }

    fn result(id: u32, elapsed_time: f64, final_rank: u32) -> ResultReport {
        ResultReport {
            id,
            elapsed_time,
            equipment_class: EquipmentClass::Soft,
            overtakes: 1,
            mean_lap_time: elapsed_time / 2.0,
            lap_time_stddev: 0.5,
            skill: 0.9,
            aggression: 0.4,
            consistency: 0.8,
            final_wear: 0.01,
            final_rank,
            lap_history: Vec::new(),
        }
    }

    #[test]
    fn test_result_stamped_with_table_rank() {
        let mut ledger = CoordinatorLedger::new(2);
        ledger.handle_progress(&progress(0, 2, 180.0));
        ledger.handle_progress(&progress(1, 2, 170.0));

        // Participant 0 believes it leads; the table says otherwise
        ledger.handle_result(result(0, 180.0, 1));
        let rec = &ledger.results()[0];
        assert_eq!(rec.stamped_rank, 2);
        assert_eq!(rec.rank_source, RankSource::Coordinator);
    }

    #[test]
    fn test_result_without_progress_falls_back() {
        let mut ledger = CoordinatorLedger::new(1);
        let outcome = ledger.handle_result(result(3, 100.0, 4));

        assert_eq!(outcome, RecordOutcome::Completed);
        assert_eq!(ledger.results()[0].stamped_rank, 4);
        assert_eq!(ledger.results()[0].rank_source, RankSource::SelfReported);
    }

    #[test]
    fn test_progress_snapshot() {
        let mut ledger = CoordinatorLedger::new(3);
        assert_eq!(
            ledger.progress(),
            RaceProgress { finished: 0, expected: 3, complete: false }
        );

        ledger.handle_result(result(0, 1.0, 1));
        ledger.handle_result(result(1, 2.0, 2));
        assert!(!ledger.is_complete());

        ledger.handle_result(result(2, 3.0, 3));
        assert_eq!(
            ledger.progress(),
            RaceProgress { finished: 3, expected: 3, complete: true }
        );

        ledger.handle_result(result(1, 0.5, 1));
        assert_eq!(ledger.progress().finished, 3);
        assert_eq!(ledger.results().len(), 3);
    }

    #[test]
    fn test_stale_stamp_does_not_leak_into_leaderboard() {
        let mut ledger = CoordinatorLedger::new(2);
        ledger.handle_progress(&progress(0, 1, 90.0));
        ledger.handle_progress(&progress(1, 1, 95.0));

        // 0 finishes early while leading; 1 then posts a faster final time
        ledger.handle_result(result(0, 190.0, 1));
        ledger.handle_progress(&progress(1, 2, 185.0));
        ledger.handle_result(result(1, 185.0, 1));

        assert_eq!(ledger.results()[0].stamped_rank, 1);
        let board = ledger.leaderboard();
        assert_eq!(board[0].record.id(), 1);
        assert_eq!(board[1].record.id(), 0);
        assert_eq!(board[1].position, 2);
    }

    proptest! {
        #[test]
        fn prop_completion_iff_all_distinct_ids_reported(
            expected in 1u32..10,
            ids in prop::collection::vec(0u32..10, 0..40)
        ) {
            let mut ledger = CoordinatorLedger::new(expected);
            let mut seen = std::collections::HashSet::new();

            for id in ids.iter().filter(|id| **id < expected) {
                ledger.handle_result(result(*id, 100.0 + *id as f64, 1));
                seen.insert(*id);
                prop_assert_eq!(ledger.is_complete(), seen.len() == expected as usize);
                prop_assert_eq!(ledger.progress().finished, seen.len());
            }
        }

        #[test]
        fn prop_leaderboard_sorted_by_time(
            times in prop::collection::vec(0u32..500, 1..20)
        ) {
            let mut ledger = CoordinatorLedger::new(times.len() as u32);
            for (id, t) in times.iter().enumerate() {
                ledger.handle_result(result(id as u32, *t as f64, 1));
            }

            let board = ledger.leaderboard();
            for (i, row) in board.iter().enumerate() {
                prop_assert_eq!(row.position, i as u32 + 1);
            }
            for pair in board.windows(2) {
                prop_assert!(pair[0].record.elapsed_time() <= pair[1].record.elapsed_time());
            }
        }
    }
}
