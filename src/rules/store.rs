//! Lock-free holder of the current rule snapshot.

use arc_swap::ArcSwap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::rules::model::RuleSet;

/// Current `RuleSet` behind an atomically swappable pointer.
///
/// Readers take a full `Arc` once per decision and keep it for the whole
/// computation, so an install that lands mid-decision is never observed.
/// The replaced snapshot is freed when its last reader drops it.
#[derive(Debug)]
pub struct RuleStore {
    current: ArcSwap<RuleSet>,
    generation: AtomicU64,
}

impl RuleStore {
    /// Create a store holding `initial`.
    pub fn new(initial: RuleSet) -> Self {
        Self {
            current: ArcSwap::from_pointee(initial),
            generation: AtomicU64::new(0),
        }
    }

    /// Latest fully installed snapshot. Never blocks.
    pub fn current(&self) -> Arc<RuleSet> {
        self.current.load_full()
    }

    /// Atomically replace the snapshot. Returns the new generation.
    pub fn install(&self, rule_set: RuleSet) -> u64 {
        self.current.store(Arc::new(rule_set));
        self.generation.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Number of installs since construction.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }
}

impl Default for RuleStore {
    fn default() -> Self {
        Self::new(RuleSet::empty())
    }
}

/// A thread-safe reference to the rule store.
pub type SharedRuleStore = Arc<RuleStore>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::parser::parse_str;

    const TWO_GRAY: &str = "gray.v1=auth:10.0.0.1 <= user:1\ngray.v2=auth:10.0.0.2 <= user:2";

    #[test]
    fn test_reader_keeps_its_snapshot() {
        let store = RuleStore::default();
        let before = store.current();
        assert!(before.is_empty());

        let generation = store.install(parse_str("gray.v1=auth:10.0.0.1 <= user:1").rule_set);
        assert_eq!(generation, 1);

        // The old reference is still the old, complete snapshot.
        assert!(before.is_empty());
        assert_eq!(store.current().len(), 1);
    }

    #[test]
    fn test_install_replaces_without_merge() {
        let store = RuleStore::default();
        store.install(parse_str(TWO_GRAY).rule_set);
        store.install(parse_str("gray.v2=auth:10.0.0.2 <= user:2").rule_set);

        let current = store.current();
        assert_eq!(current.len(), 1);
        assert!(current.get(crate::rules::model::RuleKind::Gray, "v1").is_none());
        assert_eq!(store.generation(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_readers_see_whole_snapshots() {
        let store: SharedRuleStore = Arc::new(RuleStore::default());
        let odd = parse_str(TWO_GRAY).rule_set;
        let even = parse_str("gray.v3=auth:10.0.0.3 <= user:3").rule_set;

        let mut readers = Vec::new();
        for _ in 0..4 {
            let store = store.clone();
            readers.push(tokio::spawn(async move {
                for _ in 0..2_000 {
                    let snapshot = store.current();
                    // Every observed snapshot is one of the three complete states.
                    assert!(matches!(snapshot.len(), 0 | 1 | 2));
                    if snapshot.len() == 2 {
                        assert!(snapshot.get(crate::rules::model::RuleKind::Gray, "v3").is_none());
                    }
                    tokio::task::yield_now().await;
                }
            }));
        }

        for i in 0..500 {
            store.install(if i % 2 == 0 { odd.clone() } else { even.clone() });
            tokio::task::yield_now().await;
        }

        for reader in readers {
            reader.await.unwrap();
        }
        assert_eq!(store.generation(), 500);
    }
}
