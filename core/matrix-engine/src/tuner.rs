//! FILENAME: core/matrix-engine/src/tuner.rs
//! Tuner - picks the physical execution strategy of a grouped operation.
//!
//! The tuner never changes the logical result of an operation, only how the
//! work is laid out:
//! - `InMemory`: the smaller side is collected once and broadcast read-only
//!   to every partition of the larger side.
//! - `Reducers(n)`: both sides are hash-partitioned by key into `n` reduce
//!   partitions.
//! - `Unbalanced(n)`: like `Reducers(n)`, but hot keys of the larger side are
//!   split across several partitions using a count-min sketch estimate.

use std::hash::{Hash, Hasher};
use std::num::NonZeroUsize;

use rustc_hash::FxHasher;
use serde::{Deserialize, Serialize};

use crate::config::DEFAULT_REDUCERS;
use crate::error::{EngineError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "strategy", content = "reducers", rename_all = "snake_case")]
pub enum Tuner {
    InMemory,
    Reducers(NonZeroUsize),
    Unbalanced(NonZeroUsize),
}

impl Tuner {
    pub fn in_memory() -> Self {
        Tuner::InMemory
    }

    /// Parallel hash join with `n` reduce partitions. `n` must be positive.
    pub fn reducers(n: usize) -> Result<Self> {
        NonZeroUsize::new(n)
            .map(Tuner::Reducers)
            .ok_or(EngineError::InvalidParallelism(n))
    }

    /// Skew-tolerant join with `n` reduce partitions. `n` must be positive.
    pub fn unbalanced(n: usize) -> Result<Self> {
        NonZeroUsize::new(n)
            .map(Tuner::Unbalanced)
            .ok_or(EngineError::InvalidParallelism(n))
    }

    /// Number of reduce partitions; 1 for `InMemory`.
    pub fn parallelism(&self) -> usize {
        match self {
            Tuner::InMemory => 1,
            Tuner::Reducers(n) | Tuner::Unbalanced(n) => n.get(),
        }
    }
}

impl Default for Tuner {
    fn default() -> Self {
        Tuner::Reducers(DEFAULT_REDUCERS)
    }
}

/// Deterministic hash used for routing keys to partitions.
pub(crate) fn fx_hash<K: Hash + ?Sized>(key: &K) -> u64 {
    let mut hasher = FxHasher::default();
    key.hash(&mut hasher);
    hasher.finish()
}

/// Reduce partition of `key` among `partitions`.
pub(crate) fn partition_of<K: Hash + ?Sized>(key: &K, partitions: usize) -> usize {
    (fx_hash(key) % partitions.max(1) as u64) as usize
}

/// Routes items into `partitions` buckets by key.
pub(crate) fn hash_partition<K, T, I>(items: I, partitions: usize, key: impl Fn(&T) -> &K) -> Vec<Vec<T>>
where
    K: Hash + ?Sized,
    I: IntoIterator<Item = T>,
{
    let mut buckets: Vec<Vec<T>> = (0..partitions.max(1)).map(|_| Vec::new()).collect();
    for item in items {
        let index = partition_of(key(&item), partitions);
        buckets[index].push(item);
    }
    buckets
}
