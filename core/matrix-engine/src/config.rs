//! FILENAME: core/matrix-engine/src/config.rs
//! Engine configuration - tunable knobs for physical execution.
//!
//! None of these settings change the logical result of an operation. They
//! only shape how work is split into partitions. Every knob is non-zero by
//! type, so a zero is rejected while the configuration is parsed.

use std::num::{NonZeroU64, NonZeroUsize};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::tuner::Tuner;

/// Reduce partitions used when the caller does not pick a tuner.
pub const DEFAULT_REDUCERS: NonZeroUsize = match NonZeroUsize::new(108) {
    Some(n) => n,
    None => panic!("default reducer count must be non-zero"),
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Parallelism of the default tuner.
    pub default_reducers: NonZeroUsize,

    /// Cells per map-side partition for map-side combining.
    pub map_chunk_size: NonZeroUsize,

    /// Estimated records per key above which the skew-tolerant join starts
    /// splitting a key across several reduce partitions.
    pub skew_threshold: NonZeroU64,

    /// Counters per row of the count-min sketch.
    pub sketch_width: NonZeroUsize,

    /// Rows (independent hash functions) of the count-min sketch.
    pub sketch_depth: NonZeroUsize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            default_reducers: DEFAULT_REDUCERS,
            map_chunk_size: nonzero(4096),
            skew_threshold: NonZeroU64::new(1024).unwrap_or(NonZeroU64::MIN),
            sketch_width: nonzero(2048),
            sketch_depth: nonzero(4),
        }
    }
}

fn nonzero(n: usize) -> NonZeroUsize {
    NonZeroUsize::new(n).unwrap_or(NonZeroUsize::MIN)
}

impl EngineConfig {
    /// Parses a (possibly partial) JSON configuration; missing keys take defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// The tuner used when none is supplied.
    pub fn default_tuner(&self) -> Tuner {
        Tuner::Reducers(self.default_reducers)
    }
}
