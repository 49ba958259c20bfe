use crate::leak::MemoryLeak;
use serde::Serialize;
use uuid::Uuid;

/// Profiler lifecycle and discovery events.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProfilerEvent {
    ProfilingStarted {
        track_allocations: bool,
        sample_interval_ms: u64,
    },
    ProfilingStopped,
    SnapshotTaken {
        snapshot_id: Uuid,
        total_size: u64,
    },
    /// Emitted once per object type when it first crosses the promotion
    /// thresholds during a session.
    LeakDetected {
        leak: MemoryLeak,
    },
}
