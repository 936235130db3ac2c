//! Bounded transposition table.
//!
//! Positions reached through different move orders share statistics via
//! this table. It is a lossy cache: entries are overwritten on collision
//! and the search stays correct with the table disabled.

use std::sync::Mutex;

use crate::node::UctNode;

#[derive(Debug, Default, Clone, Copy)]
struct TtEntry {
    hash: u64,
    komi_bits: u32,
    visits: u32,
    value_sum: f64,
}

pub struct TranspositionTable {
    buckets: Vec<Mutex<TtEntry>>,
}

impl TranspositionTable {
    /// A table with `entries` slots; 0 disables it.
    pub fn new(entries: usize) -> Self {
        let mut buckets = Vec::with_capacity(entries);
        buckets.resize_with(entries, Mutex::default);
        Self { buckets }
    }

    pub fn is_enabled(&self) -> bool {
        !self.buckets.is_empty()
    }

    fn bucket(&self, hash: u64) -> &Mutex<TtEntry> {
        &self.buckets[hash as usize % self.buckets.len()]
    }

    /// Adopt table statistics into `node` when the stored position has
    /// seen more visits than the node itself.
    pub fn sync(&self, hash: u64, komi: f32, node: &UctNode) {
        if !self.is_enabled() {
            return;
        }
        let entry = *lock(self.bucket(hash));
        if entry.hash == hash
            && entry.komi_bits == komi.to_bits()
            && entry.visits > node.get_visits()
        {
            node.set_stats(entry.visits, entry.value_sum);
        }
    }

    /// Store the node's current statistics for this position.
    pub fn update(&self, hash: u64, komi: f32, node: &UctNode) {
        if !self.is_enabled() {
            return;
        }
        let (visits, value_sum) = node.stats();
        *lock(self.bucket(hash)) = TtEntry {
            hash,
            komi_bits: komi.to_bits(),
            visits,
            value_sum,
        };
    }
}

fn lock(bucket: &Mutex<TtEntry>) -> std::sync::MutexGuard<'_, TtEntry> {
    bucket.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use goban_core::{Color, Move};

    fn test_node() -> UctNode {
        UctNode::new(Move::PASS, 0.0)
    }

    #[test]
    fn test_sync_adopts_larger_visits() {
        let tt = TranspositionTable::new(64);
        let seen = test_node();
        seen.update(1.0);
        seen.update(0.5);
        tt.update(42, 7.5, &seen);

        let fresh = test_node();
        fresh.update(0.0);
        tt.sync(42, 7.5, &fresh);

        assert_eq!(fresh.get_visits(), 2);
        assert_relative_eq!(fresh.get_eval(Color::Black), 0.75, epsilon = 1e-6);
    }

    #[test]
    fn test_sync_keeps_fresher_node() {
        let tt = TranspositionTable::new(64);
        let stale = test_node();
        stale.update(1.0);
        tt.update(42, 7.5, &stale);

        let node = test_node();
        node.update(0.0);
        node.update(0.0);
        node.update(0.0);
        tt.sync(42, 7.5, &node);

        // Three local visits beat one stored visit.
        assert_eq!(node.get_visits(), 3);
        assert_relative_eq!(node.get_eval(Color::Black), 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_komi_mismatch_is_a_miss() {
        let tt = TranspositionTable::new(64);
        let seen = test_node();
        seen.update(1.0);
        seen.update(1.0);
        tt.update(42, 7.5, &seen);

        let node = test_node();
        tt.sync(42, 5.5, &node);
        assert_eq!(node.get_visits(), 0);
    }

    #[test]
    fn test_collision_overwrites() {
        let tt = TranspositionTable::new(1);
        let a = test_node();
        a.update(1.0);
        tt.update(1, 7.5, &a);
        let b = test_node();
        b.update(0.0);
        tt.update(2, 7.5, &b);

        // The second position evicted the first.
        let probe = test_node();
        tt.sync(1, 7.5, &probe);
        assert_eq!(probe.get_visits(), 0);
    }

    #[test]
    fn test_disabled_table_is_inert() {
        let tt = TranspositionTable::new(0);
        assert!(!tt.is_enabled());
        let node = test_node();
        node.update(1.0);
        tt.update(42, 7.5, &node);
        tt.sync(42, 7.5, &node);
        assert_eq!(node.get_visits(), 1);
    }
}
