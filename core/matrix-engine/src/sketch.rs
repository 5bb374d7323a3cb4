//! FILENAME: core/matrix-engine/src/sketch.rs
//! Count-min sketch used by the skew-tolerant join to spot hot keys.
//!
//! Estimates never under-count, so a key is never given fewer replicas than
//! its true frequency warrants.

use std::hash::Hash;

use crate::tuner::fx_hash;

#[derive(Debug, Clone)]
pub struct CountMinSketch {
    width: usize,
    depth: usize,
    counters: Vec<u64>,
}

impl CountMinSketch {
    pub fn new(width: usize, depth: usize) -> Self {
        let width = width.max(1);
        let depth = depth.max(1);
        CountMinSketch {
            width,
            depth,
            counters: vec![0; width * depth],
        }
    }

    fn slot<K: Hash + ?Sized>(&self, row: usize, key: &K) -> usize {
        let seeded = fx_hash(key) ^ (row as u64 + 1).wrapping_mul(0x9E37_79B9_7F4A_7C15);
        let mixed = seeded.wrapping_mul(0xBF58_476D_1CE4_E5B9);
        let column = ((mixed >> 32) % self.width as u64) as usize;
        row * self.width + column
    }

    pub fn add<K: Hash + ?Sized>(&mut self, key: &K) {
        for row in 0..self.depth {
            let slot = self.slot(row, key);
            self.counters[slot] += 1;
        }
    }

    /// Upper bound on how often `key` was added.
    pub fn estimate<K: Hash + ?Sized>(&self, key: &K) -> u64 {
        (0..self.depth)
            .map(|row| self.counters[self.slot(row, key)])
            .min()
            .unwrap_or(0)
    }

    /// Adds every counter of `other`. Both sketches must share dimensions.
    pub fn merge(&mut self, other: &CountMinSketch) {
        if self.width == other.width && self.depth == other.depth {
            for (mine, theirs) in self.counters.iter_mut().zip(&other.counters) {
                *mine += theirs;
            }
        }
    }
}
