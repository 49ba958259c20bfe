//! Runner lifecycle events.

use serde::Serialize;
use uuid::Uuid;

/// Events emitted over the runner's bus. Consumers (dashboards, loggers)
/// treat these as data; none of them implies a runner-level failure.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum BenchEvent {
    TestRegistered {
        test_id: String,
    },
    RunStarted {
        test_id: String,
        iterations: usize,
        warmup: usize,
    },
    WarmupStarted {
        test_id: String,
        iterations: usize,
    },
    WarmupCompleted {
        test_id: String,
    },
    IterationCompleted {
        test_id: String,
        iteration: usize,
        success: bool,
        duration_ms: f64,
        error: Option<String>,
    },
    /// The trailing failure rate crossed the early-stop threshold.
    EarlyStop {
        test_id: String,
        completed_iterations: usize,
        trailing_failure_rate: f64,
    },
    TeardownFailed {
        test_id: String,
        reason: String,
    },
    RunCompleted {
        test_id: String,
        benchmark_id: Uuid,
        success_rate: f64,
    },
    ValidationPassed {
        benchmark_id: Uuid,
    },
    ValidationFailed {
        benchmark_id: Uuid,
        violations: Vec<String>,
    },
}
