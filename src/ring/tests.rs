//! Hash Ring Tests
//!
//! ## Test Scopes
//! - **Lookup**: Deterministic ownership, wrap-around, empty ring failure.
//! - **Membership churn**: Removing a shard only moves the keys it owned.
//! - **Concurrency**: Many readers alongside a writer.

#[cfg(test)]
mod tests {
    use crate::error::Error;
    use crate::ring::hasher::{ring_hash, virtual_node_label};
    use crate::ring::{HashRing, ShardId};
    use proptest::prelude::*;
    use std::collections::{BTreeSet, HashMap};
    use std::sync::Arc;

    fn ring_with(shards: &[&str], replicas: usize) -> HashRing {
        let ring = HashRing::new(replicas);
        for s in shards {
            ring.add(ShardId::from(*s)).unwrap();
        }
        ring
    }

    // ============================================================
    // LOOKUP
    // ============================================================

    #[test]
    fn test_get_on_empty_ring_fails() {
        let ring: HashRing = HashRing::new(50);

        // ACT
        let result = ring.get("anything");

        // ASSERT
        assert!(matches!(result, Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_single_shard_owns_everything() {
        let ring = ring_with(&["only"], 50);

        for i in 0..100 {
            assert_eq!(ring.get(format!("k{i}")).unwrap(), ShardId::from("only"));
        }
    }

    #[test]
    fn test_each_shard_contributes_replicas_points() {
        let ring = ring_with(&["A", "B", "C"], 50);

        assert_eq!(ring.len(), 3);
        assert_eq!(ring.point_count(), 150);
    }

    #[test]
    fn test_add_is_idempotent_and_rejects_empty_id() {
        let ring = ring_with(&["A"], 10);

        assert!(!ring.add(ShardId::from("A")).unwrap());
        assert_eq!(ring.point_count(), 10);
        assert!(matches!(ring.add(ShardId::from("")), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_remove_unknown_is_noop() {
        let ring = ring_with(&["A", "B"], 10);

        assert!(!ring.remove(&ShardId::from("Z")));
        assert_eq!(ring.len(), 2);
        assert_eq!(ring.point_count(), 20);
    }

    #[test]
    fn test_shards_are_sorted() {
        let ring = ring_with(&["c", "a", "b"], 5);

        let shards: Vec<String> = ring.shards().into_iter().map(|s| s.0).collect();
        assert_eq!(shards, vec!["a", "b", "c"]);
        assert!(ring.contains(&ShardId::from("b")));
    }

    #[test]
    fn test_distribution_is_reasonably_even() {
        let ring = ring_with(&["A", "B", "C"], 50);
        let mut counts: HashMap<ShardId, usize> = HashMap::new();

        for i in 0..10_000 {
            *counts.entry(ring.get(format!("k{i}")).unwrap()).or_insert(0) += 1;
        }

        // Every shard gets a meaningful share
        assert_eq!(counts.len(), 3);
        for (shard, count) in counts {
            assert!(count > 1_000, "shard {} only owns {} keys", shard, count);
        }
    }

    // ============================================================
    // MEMBERSHIP CHURN
    // ============================================================

    #[test]
    fn test_remove_only_moves_keys_of_removed_shard() {
        // ARRANGE: record owners of 10k keys
        let ring = ring_with(&["A", "B", "C"], 50);
        let before: Vec<ShardId> = (0..10_000)
            .map(|i| ring.get(format!("k{i}")).unwrap())
            .collect();

        // ACT
        ring.remove(&ShardId::from("C"));

        // ASSERT: only C's keys moved
        let mut moved = 0;
        for (i, old_owner) in before.iter().enumerate() {
            let new_owner = ring.get(format!("k{i}")).unwrap();
            if old_owner.as_str() == "C" {
                assert_ne!(new_owner.as_str(), "C");
                moved += 1;
            } else {
                assert_eq!(&new_owner, old_owner, "key k{} moved off a surviving shard", i);
            }
        }

        // Roughly a third of the keys lived on C
        assert!(moved > 1_500 && moved < 5_500, "moved {} keys", moved);
    }

    #[test]
    fn test_add_then_remove_restores_assignments() {
        let ring = ring_with(&["A", "B", "C"], 50);
        let before: Vec<ShardId> = (0..2_000)
            .map(|i| ring.get(format!("k{i}")).unwrap())
            .collect();

        // ACT
        ring.add(ShardId::from("D")).unwrap();
        ring.remove(&ShardId::from("D"));

        // ASSERT
        for (i, owner) in before.iter().enumerate() {
            assert_eq!(&ring.get(format!("k{i}")).unwrap(), owner);
        }
    }

    #[test]
    fn test_remove_returns_contested_points_to_survivors() {
        // ARRANGE: a hash with only 8 slots, so A and B collide
        fn narrow(bytes: &[u8]) -> u64 {
            ring_hash(bytes) % 8
        }
        let ring: HashRing = HashRing::with_hash_fn(8, narrow);
        ring.add(ShardId::from("A")).unwrap();
        ring.add(ShardId::from("B")).unwrap();
        let b_slots: BTreeSet<u64> = (0..8)
            .map(|i| narrow(virtual_node_label("B", i).as_bytes()))
            .collect();

        // ACT
        ring.remove(&ShardId::from("A"));

        // ASSERT: B holds every slot it hashes to, and owns every key
        assert_eq!(ring.point_count(), b_slots.len());
        for i in 0..200 {
            assert_eq!(ring.get(format!("k{i}")).unwrap().as_str(), "B");
        }
    }

    // ============================================================
    // CONCURRENCY
    // ============================================================

    #[test]
    fn test_concurrent_readers_with_writer() {
        let ring = Arc::new(ring_with(&["A", "B", "C"], 50));

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let ring = ring.clone();
                std::thread::spawn(move || {
                    for i in 0..2_000 {
                        // Membership never drops below two shards, so lookups always succeed
                        ring.get(format!("k{i}")).unwrap();
                    }
                })
            })
            .collect();

        let writer = {
            let ring = ring.clone();
            std::thread::spawn(move || {
                for i in 0..50 {
                    let id = ShardId::from(format!("extra-{i}"));
                    ring.add(id.clone()).unwrap();
                    ring.remove(&id);
                }
            })
        };

        for r in readers {
            r.join().unwrap();
        }
        writer.join().unwrap();

        assert_eq!(ring.len(), 3);
    }

    // ============================================================
    // PROPERTIES
    // ============================================================

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn lookup_is_deterministic(keys in proptest::collection::vec("[a-z0-9]{1,12}", 1..50)) {
            let first = ring_with(&["s1", "s2", "s3", "s4"], 20);
            let second = ring_with(&["s4", "s3", "s2", "s1"], 20);

            for key in keys {
                prop_assert_eq!(first.get(&key).unwrap(), second.get(&key).unwrap());
            }
        }

        #[test]
        fn add_remove_is_reversible(extra in "[a-z]{3,8}", keys in proptest::collection::vec("[a-z0-9]{1,12}", 1..50)) {
            let ring = ring_with(&["s1", "s2"], 20);
            let before: Vec<ShardId> = keys.iter().map(|k| ring.get(k).unwrap()).collect();

            let extra = ShardId::from(format!("x-{extra}"));
            ring.add(extra.clone()).unwrap();
            ring.remove(&extra);

            for (key, owner) in keys.iter().zip(before) {
                prop_assert_eq!(ring.get(key).unwrap(), owner);
            }
        }
    }
}
