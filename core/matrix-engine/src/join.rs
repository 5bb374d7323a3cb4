//! FILENAME: core/matrix-engine/src/join.rs
//! Tuner-driven joins.
//!
//! Three physical layouts for one logical equi-join:
//! 1. InMemory: the right side is collected into a read-only hash table (the
//!    broadcast set) and looked up from parallel left partitions.
//! 2. Reducers(n): both sides are hash-partitioned by key into `n` buckets and
//!    each bucket is hash-joined independently.
//! 3. Unbalanced(n): left key frequencies are estimated with a count-min
//!    sketch. A key estimated above the skew threshold has its left records
//!    dealt round-robin over several replicas, and its right records copied
//!    to every replica. Buckets are keyed by `(key, replica)`, so every left
//!    record still meets every matching right record exactly once.

use std::hash::Hash;

use log::{debug, trace};
use rayon::prelude::*;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::config::EngineConfig;
use crate::sketch::CountMinSketch;
use crate::tuner::{partition_of, Tuner};

/// Bounds shared by every join key.
pub(crate) trait JoinKey: Hash + Eq + Clone + Send + Sync {}

impl<T: Hash + Eq + Clone + Send + Sync> JoinKey for T {}

/// One reduce partition: both sides keyed by `(key, replica)`.
struct Bucket<K, L, R> {
    left: Vec<((K, u32), L)>,
    right: Vec<((K, u32), R)>,
}

impl<K, L, R> Bucket<K, L, R> {
    fn new() -> Self {
        Bucket {
            left: Vec::new(),
            right: Vec::new(),
        }
    }
}

/// Replica count per distinct left key, from a sketch of the left key frequencies.
fn replica_counts<K, L>(
    left: &[(K, L)],
    partitions: usize,
    config: &EngineConfig,
) -> FxHashMap<K, u32>
where
    K: JoinKey,
    L: Sync,
{
    let (width, depth) = (config.sketch_width.get(), config.sketch_depth.get());
    let sketch = left
        .par_iter()
        .fold(
            || CountMinSketch::new(width, depth),
            |mut sketch, (key, _)| {
                sketch.add(key);
                sketch
            },
        )
        .reduce(
            || CountMinSketch::new(width, depth),
            |mut a, b| {
                a.merge(&b);
                a
            },
        );

    let threshold = config.skew_threshold.get();
    let mut counts: FxHashMap<K, u32> = FxHashMap::default();
    for (key, _) in left {
        if !counts.contains_key(key) {
            let replicas = sketch.estimate(key).div_ceil(threshold).clamp(1, partitions as u64);
            counts.insert(key.clone(), replicas as u32);
        }
    }
    counts
}

/// Routes both sides into `tuner.parallelism()` buckets.
fn co_partition<K, L, R>(
    left: Vec<(K, L)>,
    right: Vec<(K, R)>,
    tuner: Tuner,
    config: &EngineConfig,
) -> Vec<Bucket<K, L, R>>
where
    K: JoinKey,
    L: Sync,
    R: Clone,
{
    let partitions = tuner.parallelism();
    let mut buckets: Vec<Bucket<K, L, R>> = (0..partitions).map(|_| Bucket::new()).collect();

    match tuner {
        Tuner::Unbalanced(_) => {
            let counts = replica_counts(&left, partitions, config);
            let hot = counts.values().filter(|r| **r > 1).count();
            debug!("sketch join: {} keys, {} split across replicas", counts.len(), hot);

            let mut dealt: FxHashMap<K, u32> = FxHashMap::default();
            for (key, item) in left {
                let replicas = counts.get(&key).copied().unwrap_or(1);
                let next = dealt.entry(key.clone()).or_insert(0);
                let replica = *next % replicas;
                *next += 1;
                let salted = (key, replica);
                buckets[partition_of(&salted, partitions)].left.push((salted, item));
            }
            for (key, item) in right {
                // Right records without a left partner can never match.
                let Some(&replicas) = counts.get(&key) else {
                    continue;
                };
                for replica in 0..replicas {
                    let salted = (key.clone(), replica);
                    buckets[partition_of(&salted, partitions)]
                        .right
                        .push((salted, item.clone()));
                }
            }
        }
        _ => {
            for (key, item) in left {
                let salted = (key, 0);
                buckets[partition_of(&salted, partitions)].left.push((salted, item));
            }
            for (key, item) in right {
                let salted = (key, 0);
                buckets[partition_of(&salted, partitions)].right.push((salted, item));
            }
        }
    }

    buckets
}

fn broadcast<K: JoinKey, R>(right: Vec<(K, R)>) -> FxHashMap<K, Vec<R>> {
    let mut table: FxHashMap<K, Vec<R>> = FxHashMap::default();
    for (key, item) in right {
        table.entry(key).or_default().push(item);
    }
    table
}

/// Equi-join: calls `emit` for every (left, right) pair sharing a key and
/// concatenates the results.
pub(crate) fn inner_join<K, L, R, O, F>(
    left: Vec<(K, L)>,
    right: Vec<(K, R)>,
    tuner: Tuner,
    config: &EngineConfig,
    emit: F,
) -> Vec<O>
where
    K: JoinKey,
    L: Send + Sync,
    R: Clone + Send + Sync,
    O: Send,
    F: Fn(&K, &L, &R) -> Vec<O> + Sync,
{
    debug!(
        "inner join: {} left x {} right records via {:?}",
        left.len(),
        right.len(),
        tuner
    );
    match tuner {
        Tuner::InMemory => {
            let table = broadcast(right);
            left.par_iter()
                .flat_map_iter(|(key, l)| {
                    table
                        .get(key)
                        .into_iter()
                        .flatten()
                        .flat_map(|r| emit(key, l, r))
                        .collect::<Vec<O>>()
                })
                .collect()
        }
        Tuner::Reducers(_) | Tuner::Unbalanced(_) => {
            let buckets = co_partition(left, right, tuner, config);
            buckets
                .into_par_iter()
                .enumerate()
                .flat_map_iter(|(index, bucket)| {
                    trace!(
                        "join bucket {}: {} left, {} right",
                        index,
                        bucket.left.len(),
                        bucket.right.len()
                    );
                    let table = broadcast(bucket.right);
                    bucket
                        .left
                        .iter()
                        .flat_map(|(salted, l)| {
                            table
                                .get(salted)
                                .into_iter()
                                .flatten()
                                .flat_map(|r| emit(&salted.0, l, r))
                                .collect::<Vec<O>>()
                        })
                        .collect::<Vec<O>>()
                })
                .collect()
        }
    }
}

/// Semi-join (`keep_matches`) or anti-join (`!keep_matches`) of `left`
/// against a set of keys.
pub(crate) fn filter_join<K, L>(
    left: Vec<(K, L)>,
    keys: Vec<K>,
    keep_matches: bool,
    tuner: Tuner,
    config: &EngineConfig,
) -> Vec<L>
where
    K: JoinKey,
    L: Send + Sync,
{
    debug!(
        "{} join: {} records against {} keys via {:?}",
        if keep_matches { "semi" } else { "anti" },
        left.len(),
        keys.len(),
        tuner
    );
    match tuner {
        Tuner::InMemory => {
            let members: FxHashSet<K> = keys.into_iter().collect();
            left.into_par_iter()
                .filter(|(key, _)| members.contains(key) == keep_matches)
                .map(|(_, item)| item)
                .collect()
        }
        Tuner::Reducers(_) | Tuner::Unbalanced(_) => {
            let right: Vec<(K, ())> = keys.into_iter().map(|k| (k, ())).collect();
            let buckets = co_partition(left, right, tuner, config);
            buckets
                .into_par_iter()
                .flat_map_iter(|bucket| {
                    let members: FxHashSet<(K, u32)> =
                        bucket.right.into_iter().map(|(salted, _)| salted).collect();
                    bucket
                        .left
                        .into_iter()
                        .filter(|(salted, _)| members.contains(salted) == keep_matches)
                        .map(|(_, item)| item)
                        .collect::<Vec<L>>()
                })
                .collect()
        }
    }
}
