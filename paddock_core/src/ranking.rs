//! The coordinator's ranking table.
//!
//! Every report triggers a full re-sort of all known entries. At tens of
//! participants an O(K log K) recomputation per report is cheap, and it keeps
//! the invariant trivially true: after `report()` returns, ranks across the
//! table are exactly the permutation `1..=K` ordered by ascending elapsed
//! time, with ties going to whoever registered first.

use crate::messages::ProgressReport;
use std::cmp::Ordering;
use std::collections::HashMap;

/// One row of the ranking table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TableEntry {
    pub elapsed_time: f64,
    pub current_lap: u32,
    pub wear: f64,
    pub rank: u32,

    /// Order of the first report from this id (tie-break key)
    pub registered_seq: u64,
}

/// Mapping from participant id to its latest reported progress and rank.
#[derive(Debug, Clone, Default)]
pub struct RankingTable {
    entries: HashMap<u32, TableEntry>,
    next_seq: u64,
}

impl RankingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upserts the reporter's entry, recomputes all ranks, and returns the
    /// reporter's new rank.
    pub fn report(&mut self, report: &ProgressReport) -> u32 {
        self.upsert(report);
        self.recompute();
        self.rank_of(report.id).unwrap_or(0)
    }

    fn upsert(&mut self, report: &ProgressReport) {
        match self.entries.get_mut(&report.id) {
            Some(entry) => {
                entry.elapsed_time = report.elapsed_time;
                entry.current_lap = report.lap;
                entry.wear = report.wear;
            }
            None => {
                let seq = self.next_seq;
                self.next_seq += 1;
                self.entries.insert(
                    report.id,
                    TableEntry {
                        elapsed_time: report.elapsed_time,
                        current_lap: report.lap,
                        wear: report.wear,
                        rank: 0,
                        registered_seq: seq,
                    },
                );
            }
        }
    }

    /// Re-sorts every entry and assigns ranks `1..=K` positionally.
    pub fn recompute(&mut self) {
        let mut order: Vec<(u32, f64, u64)> = self
            .entries
            .iter()
            .map(|(id, e)| (*id, e.elapsed_time, e.registered_seq))
            .collect();

        order.sort_by(|a, b| by_time_then_registration((a.1, a.2), (b.1, b.2)));

        for (position, (id, _, _)) in order.iter().enumerate() {
            if let Some(entry) = self.entries.get_mut(id) {
                entry.rank = position as u32 + 1;
            }
        }
    }

    pub fn rank_of(&self, id: u32) -> Option<u32> {
        self.entries.get(&id).map(|e| e.rank)
    }

    pub fn entry(&self, id: u32) -> Option<&TableEntry> {
        self.entries.get(&id)
    }

    pub fn contains(&self, id: u32) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All entries ordered by current rank.
    pub fn standings(&self) -> Vec<(u32, TableEntry)> {
        let mut rows: Vec<(u32, TableEntry)> = self.entries.iter().map(|(id, e)| (*id, *e)).collect();
        rows.sort_by_key(|(_, e)| e.rank);
        rows
    }
}

fn by_time_then_registration(a: (f64, u64), b: (f64, u64)) -> Ordering {
    a.0.total_cmp(&b.0).then(a.1.cmp(&b.1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn progress(id: u32, elapsed_time: f64) -> ProgressReport {
        ProgressReport {
            id,
            lap: 1,
            elapsed_time,
            wear: 0.0,
        }
    }

    #[test]
    fn test_three_reports_example() {
        let mut table = RankingTable::new();
        table.report(&progress(1, 100.0));
        table.report(&progress(2, 95.0));
        table.report(&progress(3, 110.0));

        assert_eq!(table.rank_of(1), Some(2));
        assert_eq!(table.rank_of(2), Some(1));
        assert_eq!(table.rank_of(3), Some(3));
    }

    #[test]
    fn test_tie_goes_to_first_registration() {
        let mut table = RankingTable::new();
        assert_eq!(table.report(&progress(7, 100.0)), 1);
        assert_eq!(table.report(&progress(3, 100.0)), 2);

        assert_eq!(table.rank_of(7), Some(1));
        assert_eq!(table.rank_of(3), Some(2));
    }

    #[test]
    fn test_registration_order_survives_updates() {
        let mut table = RankingTable::new();
        table.report(&progress(1, 50.0));
        table.report(&progress(2, 60.0));

        // Both move to the same time; 1 registered first
        table.report(&progress(2, 200.0));
        table.report(&progress(1, 200.0));

        assert_eq!(table.rank_of(1), Some(1));
        assert_eq!(table.rank_of(2), Some(2));
    }

    #[test]
    fn test_update_in_place_reorders_others() {
        let mut table = RankingTable::new();
        table.report(&progress(1, 90.0));
        table.report(&progress(2, 95.0));
        assert_eq!(table.rank_of(1), Some(1));

        table.report(&progress(1, 190.0));
        assert_eq!(table.len(), 2);
        assert_eq!(table.rank_of(1), Some(2));
        assert_eq!(table.rank_of(2), Some(1));
        assert_eq!(table.entry(1).map(|e| e.elapsed_time), Some(190.0));
    }

    #[test]
    fn test_unknown_id() {
        let table = RankingTable::new();
        assert!(table.is_empty());
        assert_eq!(table.rank_of(4), None);
        assert!(!table.contains(4));
    }

    #[test]
    fn test_standings_sorted_by_rank() {
        let mut table = RankingTable::new();
        table.report(&progress(1, 30.0));
        table.report(&progress(2, 10.0));
        table.report(&progress(3, 20.0));

        let ids: Vec<u32> = table.standings().iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![2, 3, 1]);
    }

    proptest! {
        #[test]
        fn prop_ranks_form_permutation_ordered_by_time(
            reports in prop::collection::vec((0u32..12, 0u32..40), 1..120)
        ) {
            let mut table = RankingTable::new();
            let mut first_seen: Vec<u32> = Vec::new();

            for (id, t) in &reports {
                // Coarse times force plenty of ties
                table.report(&progress(*id, *t as f64 * 2.5));
                if !first_seen.contains(id) {
                    first_seen.push(*id);
                }

                let rows = table.standings();
                let k = rows.len();
                prop_assert_eq!(k, first_seen.len());

                let mut ranks: Vec<u32> = rows.iter().map(|(_, e)| e.rank).collect();
                ranks.sort_unstable();
                prop_assert_eq!(ranks, (1..=k as u32).collect::<Vec<_>>());

                for pair in rows.windows(2) {
                    let (a_id, a) = pair[0];
                    let (b_id, b) = pair[1];
                    prop_assert!(a.elapsed_time <= b.elapsed_time);
                    if a.elapsed_time == b.elapsed_time {
                        let a_pos = first_seen.iter().position(|x| *x == a_id);
                        let b_pos = first_seen.iter().position(|x| *x == b_id);
                        prop_assert!(a_pos < b_pos);
                    }
                }
            }
        }
    }
}
