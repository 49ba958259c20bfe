//! Memory snapshots and pairwise diffing.

use crate::census::CensusReport;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Estimated bytes per object when converting a count delta into a size
/// delta. A crude stand-in for per-type sizing the census cannot provide.
pub const PER_OBJECT_SIZE_ESTIMATE: i64 = 64;

/// One node in the (simplified) retention graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionNode {
    pub id: String,
    pub node_type: String,
    pub size: u64,
    pub retained_size: u64,
}

/// One retaining edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionEdge {
    pub from: String,
    pub to: String,
    pub property: String,
    pub edge_type: String,
}

/// Who-retains-what. Simplified: the profiler synthesizes a one-level graph
/// from the census since no real object graph is available.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionGraph {
    pub nodes: Vec<RetentionNode>,
    pub edges: Vec<RetentionEdge>,
}

/// A stored point-in-time object census, comparable pairwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemorySnapshot {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub total_size: u64,
    /// Object-type name to live count.
    pub objects: BTreeMap<String, u64>,
    pub retention_graph: RetentionGraph,
}

impl MemorySnapshot {
    /// Build a snapshot from a census pass, synthesizing the one-level
    /// retention graph.
    pub fn from_census(report: &CensusReport) -> Self {
        let mut nodes = vec![RetentionNode {
            id: "root".to_string(),
            node_type: "root".to_string(),
            size: 0,
            retained_size: report.total_bytes(),
        }];
        let mut edges = Vec::new();

        for (type_name, entry) in &report.objects {
            let node_id = format!("type:{type_name}");
            nodes.push(RetentionNode {
                id: node_id.clone(),
                node_type: type_name.clone(),
                size: entry.total_bytes,
                retained_size: entry.total_bytes,
            });
            edges.push(RetentionEdge {
                from: "root".to_string(),
                to: node_id,
                property: type_name.clone(),
                edge_type: "retains".to_string(),
            });
        }

        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            total_size: report.total_bytes(),
            objects: report
                .objects
                .iter()
                .map(|(name, entry)| (name.clone(), entry.count))
                .collect(),
            retention_graph: RetentionGraph { nodes, edges },
        }
    }
}

/// Count movement of one object type between two snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypeChange {
    pub type_name: String,
    pub count_before: u64,
    pub count_after: u64,
    pub count_delta: i64,
    /// `count_delta` × [`PER_OBJECT_SIZE_ESTIMATE`].
    pub estimated_size_delta: i64,
}

impl TypeChange {
    fn new(type_name: &str, count_before: u64, count_after: u64) -> Self {
        let count_delta = count_after as i64 - count_before as i64;
        Self {
            type_name: type_name.to_string(),
            count_before,
            count_after,
            count_delta,
            estimated_size_delta: count_delta * PER_OBJECT_SIZE_ESTIMATE,
        }
    }
}

/// Diff between two snapshots, bucketed by how each type moved.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SnapshotDiff {
    pub first: Uuid,
    pub second: Uuid,
    /// Types absent in the first snapshot.
    pub added: Vec<TypeChange>,
    /// Types absent in the second snapshot.
    pub removed: Vec<TypeChange>,
    /// Types present in both with a different count.
    pub changed: Vec<TypeChange>,
    pub total_size_delta: i64,
    pub total_count_delta: i64,
    /// Largest estimated growth, if anything grew.
    pub largest_growth: Option<TypeChange>,
    /// Largest estimated shrinkage, if anything shrank.
    pub largest_shrinkage: Option<TypeChange>,
}

impl SnapshotDiff {
    pub fn between(first: &MemorySnapshot, second: &MemorySnapshot) -> Self {
        let mut added = Vec::new();
        let mut removed = Vec::new();
        let mut changed = Vec::new();

        for (type_name, &count_after) in &second.objects {
            match first.objects.get(type_name) {
                None => added.push(TypeChange::new(type_name, 0, count_after)),
                Some(&count_before) if count_before != count_after => {
                    changed.push(TypeChange::new(type_name, count_before, count_after));
                }
                Some(_) => {}
            }
        }
        for (type_name, &count_before) in &first.objects {
            if !second.objects.contains_key(type_name) {
                removed.push(TypeChange::new(type_name, count_before, 0));
            }
        }

        let all_changes = added.iter().chain(removed.iter()).chain(changed.iter());
        let mut largest_growth: Option<TypeChange> = None;
        let mut largest_shrinkage: Option<TypeChange> = None;
        let mut total_count_delta = 0i64;
        for change in all_changes {
            total_count_delta += change.count_delta;
            if change.estimated_size_delta > 0
                && largest_growth
                    .as_ref()
                    .is_none_or(|g| change.estimated_size_delta > g.estimated_size_delta)
            {
                largest_growth = Some(change.clone());
            }
            if change.estimated_size_delta < 0
                && largest_shrinkage
                    .as_ref()
                    .is_none_or(|s| change.estimated_size_delta < s.estimated_size_delta)
            {
                largest_shrinkage = Some(change.clone());
            }
        }

        Self {
            first: first.id,
            second: second.id,
            added,
            removed,
            changed,
            total_size_delta: second.total_size as i64 - first.total_size as i64,
            total_count_delta,
            largest_growth,
            largest_shrinkage,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::census::CensusEntry;

    fn snapshot(entries: &[(&str, u64)]) -> MemorySnapshot {
        let report = CensusReport {
            objects: entries
                .iter()
                .map(|&(name, count)| {
                    (
                        name.to_string(),
                        CensusEntry {
                            count,
                            total_bytes: count * 64,
                        },
                    )
                })
                .collect(),
            heap_used: 0,
            heap_total: 0,
        };
        MemorySnapshot::from_census(&report)
    }

    #[test]
    fn snapshot_synthesizes_retention_graph() {
        let snap = snapshot(&[("String", 10), ("Array", 5)]);
        // Root plus one node per type, one retaining edge each.
        assert_eq!(snap.retention_graph.nodes.len(), 3);
        assert_eq!(snap.retention_graph.edges.len(), 2);
        assert_eq!(snap.objects["String"], 10);
    }

    #[test]
    fn diff_buckets_added_removed_changed() {
        let first = snapshot(&[("String", 10), ("Array", 5), ("Map", 2)]);
        let second = snapshot(&[("String", 10), ("Array", 9), ("Buffer", 3)]);

        let diff = SnapshotDiff::between(&first, &second);
        assert_eq!(diff.added.len(), 1);
        assert_eq!(diff.added[0].type_name, "Buffer");
        assert_eq!(diff.removed.len(), 1);
        assert_eq!(diff.removed[0].type_name, "Map");
        assert_eq!(diff.changed.len(), 1);
        assert_eq!(diff.changed[0].count_delta, 4);
    }

    #[test]
    fn diff_reports_largest_movers() {
        let first = snapshot(&[("String", 100), ("Array", 50)]);
        let second = snapshot(&[("String", 20), ("Array", 300)]);

        let diff = SnapshotDiff::between(&first, &second);
        let growth = diff.largest_growth.unwrap();
        assert_eq!(growth.type_name, "Array");
        assert_eq!(growth.estimated_size_delta, 250 * PER_OBJECT_SIZE_ESTIMATE);

        let shrinkage = diff.largest_shrinkage.unwrap();
        assert_eq!(shrinkage.type_name, "String");
        assert_eq!(diff.total_count_delta, 250 - 80);
    }

    #[test]
    fn identical_snapshots_diff_to_nothing() {
        let first = snapshot(&[("String", 10)]);
        let second = snapshot(&[("String", 10)]);

        let diff = SnapshotDiff::between(&first, &second);
        assert!(diff.added.is_empty());
        assert!(diff.removed.is_empty());
        assert!(diff.changed.is_empty());
        assert!(diff.largest_growth.is_none());
        assert!(diff.largest_shrinkage.is_none());
    }
}
