//! Session-scoped memory leak and retention profiling.
//!
//! The profiler samples an [`ObjectCensus`] on an interval, tracks per-type
//! size trends through a [`LeakDetector`], captures diffable
//! [`MemorySnapshot`]s on demand, and finalizes a session into a
//! [`MemoryAnalysis`] with generated recommendations.
//!
//! Real heap introspection is out of scope: the default
//! [`SimulatedCensus`] fabricates plausible figures, and swapping in
//! genuine allocator instrumentation only requires another
//! [`ObjectCensus`] implementation.

pub mod census;
pub mod events;
pub mod leak;
pub mod profiler;
pub mod snapshot;

pub use census::{CensusEntry, CensusReport, ObjectCensus, SimulatedCensus};
pub use events::ProfilerEvent;
pub use leak::{LeakCandidate, LeakDetector, MemoryLeak};
pub use profiler::{
    AllocationSummary, MemoryAnalysis, MemoryProfiler, ProfilerError, ProfilerOptions,
    RetentionAnalysis,
};
pub use snapshot::{
    MemorySnapshot, RetentionEdge, RetentionGraph, RetentionNode, SnapshotDiff, TypeChange,
};
