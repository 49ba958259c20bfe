//! Profiling session lifecycle and final analysis.

use crate::census::{CensusReport, ObjectCensus, SimulatedCensus};
use crate::events::ProfilerEvent;
use crate::leak::{LeakDetector, MemoryLeak};
use crate::snapshot::{MemorySnapshot, SnapshotDiff};
use perfgauge_core::event::EventBus;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info};
use uuid::Uuid;

/// Allocation footprint above which pooling is recommended.
const POOLING_THRESHOLD_BYTES: u64 = 1024 * 1024;

/// Leak confidence above which a fix is called out as a priority.
const PRIORITY_LEAK_CONFIDENCE: f64 = 0.8;

/// Fragmentation index above which periodic collection is recommended.
const FRAGMENTATION_THRESHOLD: f64 = 0.5;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProfilerError {
    #[error("profiling session already active")]
    AlreadyProfiling,
    #[error("no profiling session active")]
    NotProfiling,
    #[error("unknown snapshot: {0}")]
    UnknownSnapshot(Uuid),
}

/// Session options passed to [`MemoryProfiler::start`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProfilerOptions {
    /// Also run the periodic allocation sampler.
    pub track_allocations: bool,
    /// Interval of the leak-detector and allocation-sampler ticks.
    pub sample_interval: Duration,
}

impl Default for ProfilerOptions {
    fn default() -> Self {
        Self {
            track_allocations: true,
            sample_interval: Duration::from_secs(1),
        }
    }
}

/// Live footprint of one object type as seen by the allocation sampler.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AllocationSummary {
    pub type_name: String,
    pub count: u64,
    pub total_bytes: u64,
    pub average_bytes: f64,
    /// Synthetic frames; see [`crate::census::ObjectCensus`].
    pub sample_stacks: Vec<String>,
}

/// Who retains one object type, derived from the final census pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetentionAnalysis {
    pub type_name: String,
    pub size: u64,
    pub retained_size: u64,
    pub retainers: Vec<String>,
}

/// Final report returned by [`MemoryProfiler::stop`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemoryAnalysis {
    pub leaks: Vec<MemoryLeak>,
    pub allocations: Vec<AllocationSummary>,
    pub retention: Vec<RetentionAnalysis>,
    /// `1 − heap_used / heap_total`, zero when the total is unknown.
    pub fragmentation_index: f64,
    pub recommendations: Vec<String>,
}

struct ProfilerShared {
    census: Mutex<Box<dyn ObjectCensus>>,
    detector: Mutex<LeakDetector>,
    allocations: Mutex<BTreeMap<String, AllocationSummary>>,
    /// Types already announced via `LeakDetected` this session.
    reported: Mutex<HashSet<String>>,
    snapshots: Mutex<HashMap<Uuid, MemorySnapshot>>,
    events: EventBus<ProfilerEvent>,
}

impl ProfilerShared {
    fn capture_census(&self) -> CensusReport {
        self.census
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .capture()
    }

    /// One leak-detector pass: census, per-type observation, promotion of
    /// newly confident candidates.
    fn leak_tick(&self) {
        let report = self.capture_census();
        let now = Instant::now();

        let leaks = {
            let mut detector = self.detector.lock().unwrap_or_else(PoisonError::into_inner);
            for (type_name, entry) in &report.objects {
                detector.observe(type_name, entry.total_bytes, now);
            }
            detector.detect_leaks()
        };

        let mut reported = self.reported.lock().unwrap_or_else(PoisonError::into_inner);
        for leak in leaks {
            if reported.insert(leak.type_name.clone()) {
                info!(
                    type_name = %leak.type_name,
                    growth_rate = leak.growth_rate,
                    confidence = leak.confidence,
                    "memory leak detected"
                );
                self.events.emit(ProfilerEvent::LeakDetected { leak });
            }
        }
    }

    /// One allocation-sampler pass: refresh per-type live summaries.
    fn allocation_tick(&self) {
        let report = self.capture_census();
        let mut allocations = self
            .allocations
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        for (type_name, entry) in &report.objects {
            allocations.insert(
                type_name.clone(),
                AllocationSummary {
                    type_name: type_name.clone(),
                    count: entry.count,
                    total_bytes: entry.total_bytes,
                    average_bytes: entry.average_bytes(),
                    sample_stacks: vec![
                        format!("<{type_name} constructor>"),
                        "<allocation sampler>".to_string(),
                    ],
                },
            );
        }
        debug!(types = allocations.len(), "allocation summaries refreshed");
    }
}

/// Session-scoped memory profiler.
///
/// `start` spawns the leak-detector tick (always) and the allocation
/// sampler (optional); `stop` aborts both and folds everything observed
/// into a [`MemoryAnalysis`]. Snapshots can be taken and compared at any
/// time, with or without an active session.
pub struct MemoryProfiler {
    shared: Arc<ProfilerShared>,
    tasks: Vec<JoinHandle<()>>,
    options: ProfilerOptions,
}

impl MemoryProfiler {
    /// Profiler over the default [`SimulatedCensus`].
    pub fn new() -> Self {
        Self::with_census(Box::new(SimulatedCensus::new()))
    }

    /// Profiler over a caller-supplied census implementation.
    pub fn with_census(census: Box<dyn ObjectCensus>) -> Self {
        Self {
            shared: Arc::new(ProfilerShared {
                census: Mutex::new(census),
                detector: Mutex::new(LeakDetector::new()),
                allocations: Mutex::new(BTreeMap::new()),
                reported: Mutex::new(HashSet::new()),
                snapshots: Mutex::new(HashMap::new()),
                events: EventBus::new(),
            }),
            tasks: Vec::new(),
            options: ProfilerOptions::default(),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ProfilerEvent> {
        self.shared.events.subscribe()
    }

    pub fn is_profiling(&self) -> bool {
        !self.tasks.is_empty()
    }

    /// Begin a profiling session.
    pub fn start(&mut self, options: ProfilerOptions) -> Result<(), ProfilerError> {
        if self.is_profiling() {
            return Err(ProfilerError::AlreadyProfiling);
        }
        self.options = options;

        self.shared
            .detector
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.shared
            .reported
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.shared
            .allocations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();

        let shared = self.shared.clone();
        let interval = options.sample_interval;
        self.tasks.push(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                shared.leak_tick();
            }
        }));

        if options.track_allocations {
            let shared = self.shared.clone();
            self.tasks.push(tokio::spawn(async move {
                let mut ticker = tokio::time::interval(interval);
                ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
                loop {
                    ticker.tick().await;
                    shared.allocation_tick();
                }
            }));
        }

        info!(
            track_allocations = options.track_allocations,
            interval_ms = interval.as_millis() as u64,
            "profiling session started"
        );
        self.shared.events.emit(ProfilerEvent::ProfilingStarted {
            track_allocations: options.track_allocations,
            sample_interval_ms: interval.as_millis() as u64,
        });
        Ok(())
    }

    /// End the session and return the final analysis.
    pub fn stop(&mut self) -> Result<MemoryAnalysis, ProfilerError> {
        if !self.is_profiling() {
            return Err(ProfilerError::NotProfiling);
        }
        for task in self.tasks.drain(..) {
            task.abort();
        }

        // One last pass so the analysis reflects the state at stop time.
        let report = self.shared.capture_census();
        let leaks = self
            .shared
            .detector
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .detect_leaks();
        let allocations: Vec<AllocationSummary> = self
            .shared
            .allocations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        let retention: Vec<RetentionAnalysis> = report
            .objects
            .iter()
            .map(|(type_name, entry)| RetentionAnalysis {
                type_name: type_name.clone(),
                size: entry.total_bytes,
                retained_size: entry.total_bytes,
                retainers: vec!["root".to_string()],
            })
            .collect();
        let fragmentation_index = if report.heap_total == 0 {
            0.0
        } else {
            1.0 - report.heap_used as f64 / report.heap_total as f64
        };
        let recommendations =
            Self::recommendations(&leaks, &allocations, fragmentation_index);

        info!(
            leaks = leaks.len(),
            recommendations = recommendations.len(),
            "profiling session stopped"
        );
        self.shared.events.emit(ProfilerEvent::ProfilingStopped);

        Ok(MemoryAnalysis {
            leaks,
            allocations,
            retention,
            fragmentation_index,
            recommendations,
        })
    }

    fn recommendations(
        leaks: &[MemoryLeak],
        allocations: &[AllocationSummary],
        fragmentation_index: f64,
    ) -> Vec<String> {
        let mut out = Vec::new();
        for summary in allocations {
            if summary.total_bytes > POOLING_THRESHOLD_BYTES {
                out.push(format!(
                    "consider pooling {} allocations ({} bytes live)",
                    summary.type_name, summary.total_bytes
                ));
            }
        }
        for leak in leaks {
            if leak.confidence > PRIORITY_LEAK_CONFIDENCE {
                out.push(format!(
                    "prioritize fixing the {} leak (confidence {:.2}, {:.0} B/s)",
                    leak.type_name, leak.confidence, leak.growth_rate
                ));
            }
        }
        if fragmentation_index > FRAGMENTATION_THRESHOLD {
            out.push(format!(
                "heap fragmentation is high ({fragmentation_index:.2}); schedule periodic collection"
            ));
        }
        out
    }

    /// Force a census pass and store the resulting snapshot.
    pub fn take_snapshot(&self) -> MemorySnapshot {
        let report = self.shared.capture_census();
        let snapshot = MemorySnapshot::from_census(&report);
        self.shared.events.emit(ProfilerEvent::SnapshotTaken {
            snapshot_id: snapshot.id,
            total_size: snapshot.total_size,
        });
        self.shared
            .snapshots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(snapshot.id, snapshot.clone());
        snapshot
    }

    pub fn snapshot(&self, id: Uuid) -> Option<MemorySnapshot> {
        self.shared
            .snapshots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
    }

    /// Diff two stored snapshots.
    pub fn compare_snapshots(&self, first: Uuid, second: Uuid) -> Result<SnapshotDiff, ProfilerError> {
        let snapshots = self
            .shared
            .snapshots
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let a = snapshots
            .get(&first)
            .ok_or(ProfilerError::UnknownSnapshot(first))?;
        let b = snapshots
            .get(&second)
            .ok_or(ProfilerError::UnknownSnapshot(second))?;
        Ok(SnapshotDiff::between(a, b))
    }

    /// Current promoted leaks, usable mid-session.
    pub fn detect_leaks(&self) -> Vec<MemoryLeak> {
        self.shared
            .detector
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .detect_leaks()
    }
}

impl Default for MemoryProfiler {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for MemoryProfiler {
    fn drop(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}
