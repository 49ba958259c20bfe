//! End-to-end exercises of the full engine surface through the umbrella
//! crate: benchmark runs with comparison, monitor alerting over a scripted
//! metric source, and a profiler session over a scripted census.

use perfgauge::profiler::{CensusEntry, CensusReport, ObjectCensus};
use perfgauge::{
    AlertType, BenchError, BenchmarkRunner, CollectorError, MetricCollector, MetricSource,
    MonitorConfig, MonitorEvent, PerformanceMetrics, PerformanceMonitor, ProfilerOptions,
    TestCase,
};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

struct ZeroSource;

impl MetricSource for ZeroSource {
    fn collect(&mut self) -> Result<PerformanceMetrics, CollectorError> {
        Ok(PerformanceMetrics::empty_now())
    }
}

/// Healthy frames, hot CPU. Only the CPU rule should fire.
struct HotCpuSource;

impl MetricSource for HotCpuSource {
    fn collect(&mut self) -> Result<PerformanceMetrics, CollectorError> {
        let mut metrics = PerformanceMetrics::empty_now();
        metrics.frame.frame_time_ms = 10.0;
        metrics.frame.frame_rate = 60.0;
        metrics.cpu.percent = 95.0;
        Ok(metrics)
    }
}

struct GrowingCensus {
    tick: u64,
}

impl ObjectCensus for GrowingCensus {
    fn capture(&mut self) -> CensusReport {
        self.tick += 1;
        let mut objects = BTreeMap::new();
        objects.insert(
            "EntityCache".to_string(),
            CensusEntry {
                count: 50 + self.tick,
                total_bytes: 500_000 + self.tick * 2_000_000,
            },
        );
        let heap_used: u64 = objects.values().map(|e| e.total_bytes).sum();
        CensusReport {
            objects,
            heap_used,
            heap_total: heap_used + 1_000_000,
        }
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn busy_case(id: &str, work: u64) -> TestCase {
    TestCase::new(id, id, move || {
        Box::pin(async move {
            let mut acc = 0u64;
            for i in 0..work {
                acc = acc.wrapping_add(i * i);
            }
            std::hint::black_box(acc);
            Ok(())
        })
    })
}

#[tokio::test]
async fn benchmark_run_compare_and_export() {
    init_tracing();
    let runner = BenchmarkRunner::with_collector(MetricCollector::new(Box::new(ZeroSource)));
    runner.register_case(busy_case("light", 1_000));
    runner.register_case(busy_case("heavy", 2_000_000));

    let light = runner.run("light", 15, 3).await.unwrap();
    let heavy = runner.run("heavy", 15, 3).await.unwrap();

    assert_eq!(light.results.len(), 15);
    assert_eq!(light.success_count(), 15);
    assert_eq!(light.statistics.sample_count, 15);

    let comparison = runner.compare(light.id, heavy.id).unwrap();
    assert!(comparison.mean_delta_ms >= 0.0);

    let document = runner.export_document();
    assert_eq!(document["count"], 2);
    let rows = runner.export_rows();
    assert_eq!(rows.rows.len(), 2);

    let missing = uuid::Uuid::new_v4();
    assert_eq!(
        runner.compare(light.id, missing).unwrap_err(),
        BenchError::UnknownBenchmark(missing)
    );
}

#[tokio::test]
async fn monitor_alerts_once_within_cooldown() {
    init_tracing();
    let monitor = PerformanceMonitor::with_collector(
        MonitorConfig::default(),
        MetricCollector::new(Box::new(HotCpuSource)),
    )
    .unwrap();
    let mut events = monitor.subscribe();

    for _ in 0..5 {
        monitor.sample_once();
    }

    let mut cpu_alerts = 0;
    let mut samples = 0;
    while let Ok(event) = events.try_recv() {
        match event {
            MonitorEvent::Alert { alert } if alert.alert_type == AlertType::CpuUsage => {
                cpu_alerts += 1;
            }
            MonitorEvent::MetricsCollected { .. } => samples += 1,
            _ => {}
        }
    }
    // Repeat breaches inside the cooldown window are suppressed.
    assert_eq!(cpu_alerts, 1);
    assert_eq!(samples, 5);
    assert_eq!(monitor.history().len(), 5);
    assert!(monitor.latest().is_some());
}

#[tokio::test]
async fn profiler_session_promotes_scripted_leak() {
    init_tracing();
    let mut profiler =
        perfgauge::MemoryProfiler::with_census(Box::new(GrowingCensus { tick: 0 }));
    profiler
        .start(ProfilerOptions {
            track_allocations: true,
            sample_interval: Duration::from_millis(25),
        })
        .unwrap();

    tokio::time::sleep(Duration::from_millis(600)).await;
    let analysis = profiler.stop().unwrap();

    assert_eq!(analysis.leaks.len(), 1);
    assert_eq!(analysis.leaks[0].type_name, "EntityCache");
    assert!(analysis.leaks[0].growth_rate > 1024.0);
    assert!(analysis
        .recommendations
        .iter()
        .any(|r| r.contains("EntityCache")));
}

#[tokio::test]
async fn overlapping_runs_respect_the_active_flag() {
    init_tracing();
    let runner = Arc::new(BenchmarkRunner::with_collector(MetricCollector::new(
        Box::new(ZeroSource),
    )));
    let gate = Arc::new(AtomicUsize::new(0));
    {
        let gate = Arc::clone(&gate);
        runner.register_case(TestCase::new("slow", "slow", move || {
            let gate = Arc::clone(&gate);
            Box::pin(async move {
                gate.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                Ok(())
            })
        }));
    }

    let first = runner.clone();
    let second = runner.clone();
    let (a, b) = tokio::join!(first.run("slow", 3, 0), second.run("slow", 3, 0));

    let failures = [&a, &b]
        .iter()
        .filter(|r| matches!(r, Err(BenchError::AlreadyRunning)))
        .count();
    assert_eq!(failures, 1);
    assert!(a.is_ok() != b.is_ok());
    // Only the winning run ever executed the case.
    assert_eq!(gate.load(Ordering::SeqCst), 3);
}
