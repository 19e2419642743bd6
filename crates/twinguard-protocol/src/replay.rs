//! Per-access-point replay window.
//!
//! Remembers nonces for [`REPLAY_TTL_MS`] after they were first accepted.
//! Pruning is lazy: [`ReplayWindow::prune`] runs at the start of every
//! verification instead of on a background sweep. An entry past its TTL is
//! never matched even if it has not been pruned yet.

use std::collections::{HashMap, VecDeque};

use crate::limits::{MAX_REPLAY_ENTRIES, REPLAY_TTL_MS};
use crate::packet::Nonce;

/// Bounded, TTL-pruned set of recently seen nonces.
#[derive(Debug, Clone)]
pub struct ReplayWindow {
    seen: HashMap<Nonce, u64>,
    order: VecDeque<(u64, Nonce)>,
    ttl_ms: u64,
    capacity: usize,
}

impl Default for ReplayWindow {
    fn default() -> Self {
        Self::new()
    }
}

impl ReplayWindow {
    /// Window with the protocol TTL and capacity.
    pub fn new() -> Self {
        Self::with_limits(REPLAY_TTL_MS, MAX_REPLAY_ENTRIES)
    }

    /// Window with explicit limits. A zero capacity is raised to one.
    pub fn with_limits(ttl_ms: u64, capacity: usize) -> Self {
        Self {
            seen: HashMap::new(),
            order: VecDeque::new(),
            ttl_ms,
            capacity: capacity.max(1),
        }
    }

    fn expired(&self, inserted_ms: u64, now_ms: u64) -> bool {
        now_ms.saturating_sub(inserted_ms) > self.ttl_ms
    }

    /// Drop every entry older than the TTL.
    pub fn prune(&mut self, now_ms: u64) {
        while let Some((inserted, _)) = self.order.front() {
            if !self.expired(*inserted, now_ms) {
                break;
            }
            if let Some((inserted, nonce)) = self.order.pop_front() {
                if self.seen.get(&nonce) == Some(&inserted) {
                    self.seen.remove(&nonce);
                }
            }
        }
    }

    /// Record `nonce` if it is fresh.
    ///
    /// Returns `false` when the nonce is already present and unexpired. When
    /// the window is full the oldest entry is evicted.
    pub fn check_and_insert(&mut self, nonce: &Nonce, now_ms: u64) -> bool {
        if let Some(&inserted) = self.seen.get(nonce) {
            if !self.expired(inserted, now_ms) {
                return false;
            }
        }

        while self.seen.len() >= self.capacity {
            match self.order.pop_front() {
                Some((inserted, old)) => {
                    if self.seen.get(&old) == Some(&inserted) {
                        self.seen.remove(&old);
                    }
                }
                None => break,
            }
        }

        self.seen.insert(nonce.clone(), now_ms);
        self.order.push_back((now_ms, nonce.clone()));
        true
    }

    /// Whether `nonce` would currently be reported as a replay.
    pub fn contains(&self, nonce: &Nonce, now_ms: u64) -> bool {
        self.seen
            .get(nonce)
            .map(|&inserted| !self.expired(inserted, now_ms))
            .unwrap_or(false)
    }

    /// Number of remembered nonces, including unpruned expired ones.
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    /// Whether the window is empty.
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn nonce(ts: u64, seed: u64) -> Nonce {
        Nonce::generate(ts, &mut StdRng::seed_from_u64(seed))
    }

    #[test]
    fn test_duplicate_within_ttl_rejected() {
        let mut window = ReplayWindow::new();
        let n = nonce(1_000, 1);

        assert!(window.check_and_insert(&n, 1_000));
        assert!(!window.check_and_insert(&n, 1_000 + REPLAY_TTL_MS));
    }

    #[test]
    fn test_duplicate_after_ttl_accepted() {
        let mut window = ReplayWindow::new();
        let n = nonce(1_000, 1);

        assert!(window.check_and_insert(&n, 1_000));
        window.prune(1_000 + REPLAY_TTL_MS + 1);
        assert!(window.is_empty());
        assert!(window.check_and_insert(&n, 1_000 + REPLAY_TTL_MS + 1));
    }

    #[test]
    fn test_expired_entry_never_matched_without_prune() {
        let mut window = ReplayWindow::new();
        let n = nonce(0, 2);

        assert!(window.check_and_insert(&n, 0));
        assert!(!window.contains(&n, REPLAY_TTL_MS + 1));
        assert!(window.check_and_insert(&n, REPLAY_TTL_MS + 1));
    }

    #[test]
    fn test_reinserted_nonce_survives_prune_of_old_entry() {
        let mut window = ReplayWindow::new();
        let n = nonce(0, 3);

        assert!(window.check_and_insert(&n, 0));
        let later = REPLAY_TTL_MS + 5;
        assert!(window.check_and_insert(&n, later));

        // The stale queue entry for the first insert must not evict the second.
        window.prune(later);
        assert!(window.contains(&n, later));
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let mut window = ReplayWindow::with_limits(REPLAY_TTL_MS, 2);
        let a = nonce(0, 10);
        let b = nonce(0, 11);
        let c = nonce(0, 12);

        assert!(window.check_and_insert(&a, 0));
        assert!(window.check_and_insert(&b, 1));
        assert!(window.check_and_insert(&c, 2));

        assert_eq!(window.len(), 2);
        assert!(!window.contains(&a, 2));
        assert!(window.contains(&b, 2));
        assert!(window.contains(&c, 2));
    }

    #[test]
    fn test_distinct_nonces_coexist() {
        let mut window = ReplayWindow::new();
        for seed in 0..100 {
            assert!(window.check_and_insert(&nonce(5, seed), 5));
        }
        assert_eq!(window.len(), 100);
    }
}
