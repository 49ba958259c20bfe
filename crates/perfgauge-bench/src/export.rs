//! Benchmark export for handoff to external storage or analysis.

use crate::result::Benchmark;
use perfgauge_core::export::TabularExport;
use serde_json::{Value, json};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Fixed columns of the flattened benchmark table; discovered custom-metric
/// columns are appended after these.
const FIXED_COLUMNS: [&str; 12] = [
    "id",
    "test_id",
    "name",
    "category",
    "total_ms",
    "iterations",
    "warmup_iterations",
    "success_count",
    "mean_ms",
    "median_ms",
    "std_dev_ms",
    "p95_ms",
];

/// Serialize completed benchmarks into a structured document.
pub fn benchmarks_document(benchmarks: &[Arc<Benchmark>]) -> Value {
    json!({
        "kind": "benchmarks",
        "count": benchmarks.len(),
        "benchmarks": benchmarks.iter().map(|b| b.as_ref()).collect::<Vec<_>>(),
    })
}

/// Flatten completed benchmarks into a fixed-column table plus one column
/// per discovered custom metric (mean of that metric's per-iteration delta
/// over successful results).
pub fn benchmarks_rows(benchmarks: &[Arc<Benchmark>]) -> TabularExport {
    let custom_columns: BTreeSet<String> = benchmarks
        .iter()
        .flat_map(|b| b.results.iter())
        .flat_map(|r| r.metrics_delta.custom.keys().cloned())
        .collect();

    let mut header: Vec<String> = FIXED_COLUMNS.iter().map(|c| c.to_string()).collect();
    header.extend(custom_columns.iter().map(|c| format!("custom_{c}")));

    let mut table = TabularExport::new(header);
    for benchmark in benchmarks {
        let mut row = vec![
            benchmark.id.to_string(),
            benchmark.test_id.clone(),
            benchmark.name.clone(),
            benchmark.category.clone(),
            format!("{:.3}", benchmark.total_duration.as_secs_f64() * 1000.0),
            benchmark.iterations.to_string(),
            benchmark.warmup_iterations.to_string(),
            benchmark.success_count().to_string(),
            format!("{:.3}", benchmark.statistics.mean_ms),
            format!("{:.3}", benchmark.statistics.median_ms),
            format!("{:.3}", benchmark.statistics.std_dev_ms),
            format!(
                "{:.3}",
                benchmark.statistics.percentiles.get(&95).copied().unwrap_or(0.0)
            ),
        ];

        for column in &custom_columns {
            row.push(format!("{:.3}", mean_custom(benchmark, column)));
        }
        table.push_row(row);
    }

    table
}

fn mean_custom(benchmark: &Benchmark, key: &str) -> f64 {
    let values: Vec<f64> = benchmark
        .results
        .iter()
        .filter(|r| r.success)
        .filter_map(|r| r.metrics_delta.custom.get(key).copied())
        .collect();
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}
