//! Registered test cases.

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Outcome of one lifecycle hook invocation.
pub type CaseOutcome = Result<(), String>;

/// Boxed async lifecycle hook. Hooks are expected to be cooperative: a hook
/// that outlives the case timeout loses the deadline race and its eventual
/// completion is ignored.
pub type CaseHook = Arc<dyn Fn() -> BoxFuture<'static, CaseOutcome> + Send + Sync>;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Expected aggregate metrics a completed benchmark is validated against.
/// Unset fields are not checked.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExpectedMetrics {
    pub max_frame_time_ms: Option<f64>,
    pub min_frame_rate: Option<f64>,
    pub max_heap_used_bytes: Option<u64>,
    pub max_cpu_percent: Option<f64>,
    /// Named custom metric to maximum acceptable mean value.
    pub custom: BTreeMap<String, f64>,
}

/// A registered, runnable unit of work.
#[derive(Clone)]
pub struct TestCase {
    pub id: String,
    pub name: String,
    pub description: String,
    pub category: String,
    pub expected: ExpectedMetrics,
    pub timeout: Duration,
    setup: Option<CaseHook>,
    execute: CaseHook,
    teardown: Option<CaseHook>,
}

impl TestCase {
    /// Build a case around its execute hook; setup and teardown default to
    /// no-ops and the timeout to five seconds.
    pub fn new<F>(id: impl Into<String>, name: impl Into<String>, execute: F) -> Self
    where
        F: Fn() -> BoxFuture<'static, CaseOutcome> + Send + Sync + 'static,
    {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            category: "general".to_string(),
            expected: ExpectedMetrics::default(),
            timeout: DEFAULT_TIMEOUT,
            setup: None,
            execute: Arc::new(execute),
            teardown: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn with_setup<F>(mut self, setup: F) -> Self
    where
        F: Fn() -> BoxFuture<'static, CaseOutcome> + Send + Sync + 'static,
    {
        self.setup = Some(Arc::new(setup));
        self
    }

    pub fn with_teardown<F>(mut self, teardown: F) -> Self
    where
        F: Fn() -> BoxFuture<'static, CaseOutcome> + Send + Sync + 'static,
    {
        self.teardown = Some(Arc::new(teardown));
        self
    }

    pub fn with_expected(mut self, expected: ExpectedMetrics) -> Self {
        self.expected = expected;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Invoke the setup hook, `Ok` when none is registered.
    pub async fn run_setup(&self) -> CaseOutcome {
        match &self.setup {
            Some(hook) => hook().await,
            None => Ok(()),
        }
    }

    /// Invoke the execute hook.
    pub async fn run_execute(&self) -> CaseOutcome {
        (self.execute)().await
    }

    /// Invoke the teardown hook, `Ok` when none is registered.
    pub async fn run_teardown(&self) -> CaseOutcome {
        match &self.teardown {
            Some(hook) => hook().await,
            None => Ok(()),
        }
    }
}

impl fmt::Debug for TestCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestCase")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("category", &self.category)
            .field("timeout", &self.timeout)
            .field("has_setup", &self.setup.is_some())
            .field("has_teardown", &self.teardown.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn hooks_default_to_noops() {
        let case = TestCase::new("t", "noop hooks", || Box::pin(async { Ok(()) }));
        assert!(case.run_setup().await.is_ok());
        assert!(case.run_execute().await.is_ok());
        assert!(case.run_teardown().await.is_ok());
        assert_eq!(case.timeout, DEFAULT_TIMEOUT);
    }

    #[tokio::test]
    async fn builder_wires_all_hooks() {
        let case = TestCase::new("t", "wired", || Box::pin(async { Ok(()) }))
            .with_setup(|| Box::pin(async { Err("setup down".to_string()) }))
            .with_category("io")
            .with_timeout(Duration::from_millis(250));

        assert_eq!(case.category, "io");
        assert_eq!(case.timeout, Duration::from_millis(250));
        assert_eq!(case.run_setup().await, Err("setup down".to_string()));
    }
}
