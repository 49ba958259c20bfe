//! Metrics history export.

use perfgauge_core::export::TabularExport;
use perfgauge_core::metrics::PerformanceMetrics;
use serde_json::{Value, json};
use std::collections::BTreeSet;

/// Fixed columns of the flattened history table; discovered custom-metric
/// columns are appended after these.
const FIXED_COLUMNS: [&str; 9] = [
    "timestamp",
    "heap_used",
    "heap_total",
    "rss",
    "cpu_percent",
    "load_1m",
    "frame_time_ms",
    "frame_rate",
    "gc_pause_ms",
];

/// Serialize the history into a structured document.
pub fn history_document(history: &[PerformanceMetrics]) -> Value {
    json!({
        "kind": "metrics_history",
        "count": history.len(),
        "samples": history,
    })
}

/// Flatten the history into a fixed-column table plus one column per
/// discovered custom metric.
pub fn history_rows(history: &[PerformanceMetrics]) -> TabularExport {
    let custom_columns: BTreeSet<String> = history
        .iter()
        .flat_map(|m| m.custom.keys().cloned())
        .collect();

    let mut header: Vec<String> = FIXED_COLUMNS.iter().map(|c| c.to_string()).collect();
    header.extend(custom_columns.iter().map(|c| format!("custom_{c}")));

    let mut table = TabularExport::new(header);
    for sample in history {
        let mut row = vec![
            sample.timestamp.to_rfc3339(),
            sample.memory.heap_used.to_string(),
            sample.memory.heap_total.to_string(),
            sample.memory.rss.to_string(),
            format!("{:.2}", sample.cpu.percent),
            format!("{:.2}", sample.cpu.load_average[0]),
            format!("{:.2}", sample.frame.frame_time_ms),
            format!("{:.2}", sample.frame.frame_rate),
            format!("{:.2}", sample.gc.pause_time_ms),
        ];
        for column in &custom_columns {
            match sample.custom.get(column) {
                Some(value) => row.push(format!("{value:.3}")),
                None => row.push(String::new()),
            }
        }
        table.push_row(row);
    }

    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample_with_custom(key: &str, value: f64) -> PerformanceMetrics {
        let mut metrics = PerformanceMetrics {
            timestamp: Utc::now(),
            ..PerformanceMetrics::default()
        };
        metrics.custom.insert(key.to_string(), value);
        metrics
    }

    #[test]
    fn document_carries_every_sample() {
        let history = vec![sample_with_custom("a", 1.0), sample_with_custom("a", 2.0)];
        let doc = history_document(&history);
        assert_eq!(doc["kind"], "metrics_history");
        assert_eq!(doc["count"], 2);
    }

    #[test]
    fn rows_union_custom_columns_across_samples() {
        let history = vec![sample_with_custom("a", 1.0), sample_with_custom("b", 2.0)];
        let table = history_rows(&history);

        assert_eq!(table.header.len(), FIXED_COLUMNS.len() + 2);
        // First sample has no "b" reading, so its cell is empty.
        assert_eq!(table.rows[0].last().unwrap(), "");
        assert_eq!(table.rows[1].last().unwrap(), "2.000");
    }
}
