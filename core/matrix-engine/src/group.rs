//! FILENAME: core/matrix-engine/src/group.rs
//! Keyed grouping primitives shared by the aggregation, windowing and query
//! operations.
//!
//! `combine_by_key` is a map-reduce with map-side combining: every map chunk
//! folds its records into one partial value per key, partials are routed to
//! reduce partitions by key hash, and each partition merges its partials.
//! `for_each_group` gathers all values of a key into one reduce partition and
//! hands the whole group to a callback.

use log::debug;
use rayon::prelude::*;
use rustc_hash::FxHashMap;

use crate::config::EngineConfig;
use crate::join::JoinKey;
use crate::tuner::{hash_partition, Tuner};

/// Folds the values of every key with `combine`, which must be associative
/// and commutative. Records mapped to `None` are skipped.
pub(crate) fn combine_by_key<T, K, V, M, C>(
    records: &[T],
    tuner: Tuner,
    config: &EngineConfig,
    map: M,
    combine: C,
) -> Vec<(K, V)>
where
    T: Sync,
    K: JoinKey,
    V: Send,
    M: Fn(&T) -> Option<(K, V)> + Sync,
    C: Fn(V, V) -> V + Sync,
{
    let fold_into = |partial: &mut FxHashMap<K, V>, key: K, value: V| {
        match partial.remove(&key) {
            Some(existing) => partial.insert(key, combine(existing, value)),
            None => partial.insert(key, value),
        };
    };

    let partials: Vec<FxHashMap<K, V>> = records
        .par_chunks(config.map_chunk_size.get())
        .map(|chunk| {
            let mut partial = FxHashMap::default();
            for (key, value) in chunk.iter().filter_map(&map) {
                fold_into(&mut partial, key, value);
            }
            partial
        })
        .collect();

    let partitions = tuner.parallelism();
    debug!(
        "combine by key: {} map partitions into {} reduce partitions",
        partials.len(),
        partitions
    );

    let buckets = hash_partition(partials.into_iter().flatten(), partitions, |(key, _)| key);
    buckets
        .into_par_iter()
        .flat_map_iter(|bucket| {
            let mut merged = FxHashMap::default();
            for (key, value) in bucket {
                fold_into(&mut merged, key, value);
            }
            merged
        })
        .collect()
}

/// Gathers the values of each key into one group and calls `apply` once per
/// group. Groups are processed independently and in no particular order.
pub(crate) fn for_each_group<K, V, O, F>(
    records: Vec<(K, V)>,
    tuner: Tuner,
    apply: F,
) -> Vec<O>
where
    K: JoinKey,
    V: Send,
    O: Send,
    F: Fn(K, Vec<V>) -> Vec<O> + Sync,
{
    let partitions = tuner.parallelism();
    let buckets = hash_partition(records, partitions, |(key, _)| key);
    debug!("grouping into {} reduce partitions", partitions);

    buckets
        .into_par_iter()
        .flat_map_iter(|bucket| {
            let mut groups: FxHashMap<K, Vec<V>> = FxHashMap::default();
            for (key, value) in bucket {
                groups.entry(key).or_default().push(value);
            }
            groups
                .into_iter()
                .flat_map(|(key, values)| apply(key, values))
                .collect::<Vec<O>>()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::num::NonZeroUsize;

    fn small_chunks() -> EngineConfig {
        EngineConfig {
            map_chunk_size: NonZeroUsize::new(3).unwrap(),
            ..EngineConfig::default()
        }
    }

    #[test]
    fn test_combine_by_key() {
        let records: Vec<(char, u32)> = "abacabad".chars().zip(1..).collect();
        for tuner in [Tuner::in_memory(), Tuner::reducers(4).unwrap()] {
            let mut sums = combine_by_key(
                &records,
                tuner,
                &small_chunks(),
                |(k, v)| if *k == 'd' { None } else { Some((*k, *v)) },
                |a, b| a + b,
            );
            sums.sort();
            assert_eq!(sums, vec![('a', 1 + 3 + 5 + 7), ('b', 2 + 6), ('c', 4)]);
        }
    }

    #[test]
    fn test_for_each_group() {
        let records = vec![("x", 1), ("y", 2), ("x", 3)];
        let mut sizes = for_each_group(records, Tuner::reducers(2).unwrap(), |key, values| {
            vec![(key, values.len())]
        });
        sizes.sort();
        assert_eq!(sizes, vec![("x", 2), ("y", 1)]);
    }
}
