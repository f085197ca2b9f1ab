use serde::{Deserialize, Serialize};
use std::fmt;

use crate::latency::LatencySummary;

/// Which of the two structurally identical tables a measurement targets.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum SchemaTag {
    Baseline,
    Candidate,
}

impl SchemaTag {
    pub const ALL: [SchemaTag; 2] = [SchemaTag::Baseline, SchemaTag::Candidate];

    pub fn table_name(self) -> &'static str {
        match self {
            SchemaTag::Baseline => "orders_baseline",
            SchemaTag::Candidate => "orders_candidate",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SchemaTag::Baseline => "baseline",
            SchemaTag::Candidate => "candidate",
        }
    }
}

impl fmt::Display for SchemaTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One scenario measured against one table.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ComparisonRecord {
    pub scenario: String,
    pub tag: SchemaTag,
    pub summary: LatencySummary,
}

/// Outcome of one multi-worker load run.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ConcurrentRunResult {
    pub tag: SchemaTag,
    pub worker_count: usize,
    pub ops_per_worker: usize,
    pub total_operations: usize,
    pub wall_clock_seconds: f64,
    pub ops_per_second: f64,
    pub mean_op_latency_ms: f64,
}

/// Size and row-count snapshot of one table, in bytes.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TableStats {
    pub tag: SchemaTag,
    pub table: String,
    /// Table plus indexes (and TOAST on PostgreSQL).
    pub total_bytes: i64,
    pub table_bytes: i64,
    pub index_bytes: i64,
    pub live_rows: i64,
}

/// Result of one attempted change from the optimizer catalog.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct IndexApplicationResult {
    pub description: String,
    pub applied: bool,
    pub note: Option<String>,
}

impl IndexApplicationResult {
    pub fn applied(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            applied: true,
            note: None,
        }
    }

    pub fn skipped(description: impl Into<String>, note: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            applied: false,
            note: Some(note.into()),
        }
    }
}

/// One entry of the engine's index catalog.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct IndexInfo {
    pub table: String,
    pub name: String,
    pub definition: String,
}

/// Cumulative scan counters of one index since statistics were last reset.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct IndexUsage {
    pub table: String,
    pub index: String,
    pub scans: i64,
    pub tuples_read: i64,
    pub tuples_fetched: i64,
}

/// Index usage for the orders tables, or why it could not be collected.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct IndexUsageAudit {
    pub available: bool,
    pub note: Option<String>,
    pub indexes: Vec<IndexUsage>,
}

impl IndexUsageAudit {
    pub fn collected(indexes: Vec<IndexUsage>) -> Self {
        Self {
            available: true,
            note: None,
            indexes,
        }
    }

    pub fn unavailable(note: impl Into<String>) -> Self {
        Self {
            available: false,
            note: Some(note.into()),
            indexes: Vec::new(),
        }
    }

    /// Indexes of `table` that were never scanned.
    pub fn unused_on<'a>(&'a self, table: &'a str) -> impl Iterator<Item = &'a IndexUsage> + 'a {
        self.indexes
            .iter()
            .filter(move |usage| usage.table == table && usage.scans == 0)
    }
}

/// Execution plan text for one representative statement.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct QueryPlan {
    pub label: String,
    pub plan: String,
}

/// Render a byte count the way `pg_size_pretty` does.
pub fn pretty_bytes(bytes: i64) -> String {
    const UNITS: [&str; 5] = ["bytes", "kB", "MB", "GB", "TB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value.abs() >= 10.0 * 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} {}", UNITS[0])
    } else {
        format!("{:.0} {}", value, UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_map_to_distinct_tables() {
        assert_eq!(SchemaTag::Baseline.table_name(), "orders_baseline");
        assert_eq!(SchemaTag::Candidate.table_name(), "orders_candidate");
        assert_eq!(SchemaTag::Candidate.to_string(), "candidate");
    }

    #[test]
    fn tag_serializes_lowercase() {
        let json = serde_json::to_string(&SchemaTag::Baseline).unwrap();
        assert_eq!(json, "\"baseline\"");
    }

    #[test]
    fn pretty_bytes_switches_units_like_postgres() {
        assert_eq!(pretty_bytes(8192), "8192 bytes");
        assert_eq!(pretty_bytes(10 * 1024), "10 kB");
        assert_eq!(pretty_bytes(42 * 1024 * 1024), "42 MB");
    }

    #[test]
    fn skipped_result_carries_note() {
        let result = IndexApplicationResult::skipped("partitioning", "syntax error");
        assert!(!result.applied);
        assert_eq!(result.note.as_deref(), Some("syntax error"));
    }

    #[test]
    fn unused_indexes_are_filtered_per_table() {
        let usage = |table: &str, index: &str, scans| IndexUsage {
            table: table.to_string(),
            index: index.to_string(),
            scans,
            tuples_read: 0,
            tuples_fetched: 0,
        };
        let audit = IndexUsageAudit::collected(vec![
            usage("orders_candidate", "idx_a", 0),
            usage("orders_candidate", "idx_b", 12),
            usage("orders_baseline", "orders_baseline_pkey", 0),
        ]);

        let unused: Vec<_> = audit
            .unused_on("orders_candidate")
            .map(|u| u.index.as_str())
            .collect();
        assert_eq!(unused, ["idx_a"]);
        assert!(!IndexUsageAudit::unavailable("no statistics").available);
    }
}
