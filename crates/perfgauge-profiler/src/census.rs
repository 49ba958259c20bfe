//! Pluggable object census.
//!
//! A census reports how many instances of each tracked object type are
//! live and how many bytes they hold. The engine has no real heap walker;
//! [`SimulatedCensus`] stands in for one and documents the seam where
//! allocator instrumentation would plug in.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Live count and byte footprint of one object type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CensusEntry {
    pub count: u64,
    pub total_bytes: u64,
}

impl CensusEntry {
    pub fn average_bytes(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.total_bytes as f64 / self.count as f64
        }
    }
}

/// One census pass over the tracked object population.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CensusReport {
    /// Object-type name to live count and footprint, ordered by name.
    pub objects: BTreeMap<String, CensusEntry>,
    pub heap_used: u64,
    pub heap_total: u64,
}

impl CensusReport {
    /// Total bytes across all tracked types.
    pub fn total_bytes(&self) -> u64 {
        self.objects.values().map(|e| e.total_bytes).sum()
    }
}

/// Produces census reports. Implementations may be real instrumentation or
/// simulations; the profiler treats both identically.
pub trait ObjectCensus: Send + Sync {
    fn capture(&mut self) -> CensusReport;
}

/// Default simulated census.
///
/// Fabricates a small population of common object types whose counts take
/// a bounded random walk, with one type growing steadily so leak detection
/// has something to find in demos. Not a measurement of anything real.
pub struct SimulatedCensus {
    rng: StdRng,
    tick: u64,
    baseline: Vec<(&'static str, u64, u64)>,
}

/// (type name, base count, average object size in bytes)
const SIMULATED_TYPES: [(&str, u64, u64); 6] = [
    ("String", 12_000, 48),
    ("Array", 4_500, 160),
    ("Object", 8_000, 96),
    ("Buffer", 600, 4_096),
    ("Closure", 2_200, 64),
    ("Map", 900, 256),
];

/// The type whose footprint grows every capture.
const GROWING_TYPE: &str = "Buffer";
const GROWTH_PER_TICK_BYTES: u64 = 16_384;

impl SimulatedCensus {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_os_rng(),
            tick: 0,
            baseline: SIMULATED_TYPES.to_vec(),
        }
    }
}

impl Default for SimulatedCensus {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectCensus for SimulatedCensus {
    fn capture(&mut self) -> CensusReport {
        self.tick += 1;
        let mut objects = BTreeMap::new();

        for &(name, base_count, avg_size) in &self.baseline {
            let jitter = self.rng.random_range(0..=base_count / 10);
            let count = base_count + jitter;
            let mut total_bytes = count * avg_size;
            if name == GROWING_TYPE {
                total_bytes += self.tick * GROWTH_PER_TICK_BYTES;
            }
            objects.insert(name.to_string(), CensusEntry { count, total_bytes });
        }

        let heap_used: u64 = objects.values().map(|e| e.total_bytes).sum();
        CensusReport {
            objects,
            heap_used,
            heap_total: heap_used + self.rng.random_range(1_000_000..4_000_000),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simulated_census_tracks_all_types() {
        let mut census = SimulatedCensus::new();
        let report = census.capture();
        assert_eq!(report.objects.len(), SIMULATED_TYPES.len());
        assert!(report.heap_total > report.heap_used);
        assert_eq!(report.total_bytes(), report.heap_used);
    }

    #[test]
    fn growing_type_grows_between_captures() {
        let mut census = SimulatedCensus::new();
        let first = census.capture();
        let mut last = census.capture();
        for _ in 0..20 {
            last = census.capture();
        }
        // Jitter is bounded well below the accumulated growth.
        assert!(
            last.objects[GROWING_TYPE].total_bytes > first.objects[GROWING_TYPE].total_bytes
        );
    }

    #[test]
    fn average_bytes_handles_empty_entry() {
        assert_eq!(CensusEntry::default().average_bytes(), 0.0);
        let entry = CensusEntry {
            count: 4,
            total_bytes: 1024,
        };
        assert_eq!(entry.average_bytes(), 256.0);
    }
}
