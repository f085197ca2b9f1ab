//! Report module: pairs baseline and candidate measurements, prints the
//! comparison and persists it as JSON.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use bench_core::config::{ConcurrencySettings, ScenarioIterations};
use bench_core::latency::LatencySummary;
use bench_core::types::{
    pretty_bytes, ComparisonRecord, ConcurrentRunResult, IndexApplicationResult, IndexInfo,
    IndexUsageAudit, QueryPlan, SchemaTag, TableStats,
};
use serde::Serialize;

use crate::dialect::Engine;

/// One scenario measured on both tables.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ScenarioComparison {
    pub scenario: String,
    pub baseline: LatencySummary,
    pub candidate: LatencySummary,
    /// Positive when the candidate is faster.
    pub speedup_percent: f64,
}

/// How the run was set up.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct RunInfo {
    pub generated_at: String,
    pub engine: Engine,
    pub rows: u64,
    pub iterations: ScenarioIterations,
    pub concurrency: ConcurrencySettings,
}

#[derive(Serialize, Debug, Clone, PartialEq, Default)]
pub struct ReportDocument {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run: Option<RunInfo>,
    pub records: Vec<ComparisonRecord>,
    pub comparisons: Vec<ScenarioComparison>,
    pub concurrent: Vec<ConcurrentRunResult>,
    pub table_stats: Vec<TableStats>,
    pub optimizations: Vec<IndexApplicationResult>,
    pub indexes: Vec<IndexInfo>,
    pub plans: Vec<QueryPlan>,
    pub index_usage: IndexUsageAudit,
}

impl ReportDocument {
    pub fn with_audit(
        mut self,
        optimizations: Vec<IndexApplicationResult>,
        indexes: Vec<IndexInfo>,
        plans: Vec<QueryPlan>,
    ) -> Self {
        self.optimizations = optimizations;
        self.indexes = indexes;
        self.plans = plans;
        self
    }

    pub fn with_index_usage(mut self, index_usage: IndexUsageAudit) -> Self {
        self.index_usage = index_usage;
        self
    }

    pub fn with_run_info(mut self, run: RunInfo) -> Self {
        self.run = Some(run);
        self
    }
}

/// Relative improvement of the candidate mean over the baseline mean, in
/// percent. Negative when the candidate is slower, `0.0` for a zero baseline.
pub fn speedup_percent(baseline: &LatencySummary, candidate: &LatencySummary) -> f64 {
    if baseline.mean == 0.0 {
        return 0.0;
    }
    (baseline.mean - candidate.mean) / baseline.mean * 100.0
}

pub fn build_comparison(
    scenario: &str,
    baseline: LatencySummary,
    candidate: LatencySummary,
) -> ScenarioComparison {
    ScenarioComparison {
        scenario: scenario.to_string(),
        speedup_percent: speedup_percent(&baseline, &candidate),
        baseline,
        candidate,
    }
}

/// Assemble the report. Records are paired by scenario name in first-seen
/// order; a scenario measured on only one table stays in `records` without a
/// comparison.
pub fn build_report(
    records: &[ComparisonRecord],
    concurrent: &[ConcurrentRunResult],
    table_stats: &[TableStats],
) -> ReportDocument {
    let mut scenario_order: Vec<&str> = Vec::new();
    for record in records {
        if !scenario_order.contains(&record.scenario.as_str()) {
            scenario_order.push(&record.scenario);
        }
    }

    let find = |scenario: &str, tag: SchemaTag| {
        records
            .iter()
            .find(|r| r.scenario == scenario && r.tag == tag)
            .map(|r| r.summary)
    };
    let comparisons = scenario_order
        .into_iter()
        .filter_map(|scenario| {
            let baseline = find(scenario, SchemaTag::Baseline)?;
            let candidate = find(scenario, SchemaTag::Candidate)?;
            Some(build_comparison(scenario, baseline, candidate))
        })
        .collect();

    ReportDocument {
        run: None,
        records: records.to_vec(),
        comparisons,
        concurrent: concurrent.to_vec(),
        table_stats: table_stats.to_vec(),
        ..ReportDocument::default()
    }
}

/// Print a formatted report of the comparison.
pub fn print_report(doc: &ReportDocument) {
    println!("\n{}", "=".repeat(80));
    println!("  Index Benchmark Report");
    if let Some(run) = &doc.run {
        println!(
            "  Engine: {} | Rows: {} | Generated: {}",
            run.engine, run.rows, run.generated_at
        );
    }
    println!("{}", "=".repeat(80));

    if !doc.optimizations.is_empty() {
        println!("\n  Candidate optimizations:");
        println!("  {}", "-".repeat(60));
        for step in &doc.optimizations {
            let mark = if step.applied { "applied" } else { "skipped" };
            match &step.note {
                Some(note) => println!("  [{mark}] {} ({note})", step.description),
                None => println!("  [{mark}] {}", step.description),
            }
        }
    }

    for cmp in &doc.comparisons {
        println!("\n  Scenario: {}", cmp.scenario);
        println!("  {}", "-".repeat(60));
        println!(
            "  {:12} {:>10} {:>10} {:>10} {:>10} {:>10}",
            "Table", "Mean (ms)", "p50 (ms)", "p95 (ms)", "Max (ms)", "Stddev"
        );
        for (label, s) in [("baseline", &cmp.baseline), ("candidate", &cmp.candidate)] {
            println!(
                "  {:12} {:>10.3} {:>10.3} {:>10.3} {:>10.3} {:>10.3}",
                label, s.mean, s.p50, s.p95, s.max, s.stddev
            );
        }
        println!("  Speedup:     {:>+10.2}%", cmp.speedup_percent);
    }

    println!("\n{}", "=".repeat(80));

    if !doc.comparisons.is_empty() {
        println!("\n  Comparison Summary:");
        println!(
            "  {:22} {:>14} {:>14} {:>10}",
            "Scenario", "Baseline (ms)", "Candidate (ms)", "Speedup"
        );
        println!("  {}", "-".repeat(64));
        for cmp in &doc.comparisons {
            println!(
                "  {:22} {:>14.3} {:>14.3} {:>+9.1}%",
                cmp.scenario, cmp.baseline.mean, cmp.candidate.mean, cmp.speedup_percent
            );
        }
    }

    if !doc.concurrent.is_empty() {
        println!("\n  Concurrent load:");
        println!(
            "  {:12} {:>8} {:>8} {:>10} {:>12} {:>14}",
            "Table", "Workers", "Ops", "Wall (s)", "Ops/s", "Mean op (ms)"
        );
        println!("  {}", "-".repeat(70));
        for run in &doc.concurrent {
            println!(
                "  {:12} {:>8} {:>8} {:>10.2} {:>12.1} {:>14.3}",
                run.tag.as_str(),
                run.worker_count,
                run.total_operations,
                run.wall_clock_seconds,
                run.ops_per_second,
                run.mean_op_latency_ms
            );
        }
    }

    if !doc.table_stats.is_empty() {
        println!("\n  Table sizes:");
        println!(
            "  {:18} {:>12} {:>12} {:>12} {:>12}",
            "Table", "Total", "Data", "Indexes", "Rows"
        );
        println!("  {}", "-".repeat(70));
        for stats in &doc.table_stats {
            println!(
                "  {:18} {:>12} {:>12} {:>12} {:>12}",
                stats.table,
                pretty_bytes(stats.total_bytes),
                pretty_bytes(stats.table_bytes),
                pretty_bytes(stats.index_bytes),
                stats.live_rows
            );
        }
    }

    if !doc.indexes.is_empty() {
        println!("\n  Indexes:");
        for index in &doc.indexes {
            println!("  {:18} {}", index.table, index.name);
        }
    }

    if doc.index_usage.available {
        println!("\n  Index usage:");
        println!(
            "  {:18} {:32} {:>10} {:>12} {:>12}",
            "Table", "Index", "Scans", "Tup read", "Tup fetched"
        );
        println!("  {}", "-".repeat(88));
        for usage in &doc.index_usage.indexes {
            println!(
                "  {:18} {:32} {:>10} {:>12} {:>12}",
                usage.table, usage.index, usage.scans, usage.tuples_read, usage.tuples_fetched
            );
        }
        let candidate = SchemaTag::Candidate.table_name();
        for unused in doc.index_usage.unused_on(candidate) {
            println!("  Never scanned: {}", unused.index);
        }
    } else if let Some(note) = &doc.index_usage.note {
        println!("\n  Index usage: {note}");
    }

    for plan in &doc.plans {
        println!("\n  Plan: {}", plan.label);
        for line in plan.plan.lines() {
            println!("    {line}");
        }
    }

    println!();
}

/// Write the document as pretty JSON into `dir`, creating it if needed.
/// Returns the path of the new file.
pub fn write_json_report(doc: &ReportDocument, dir: impl AsRef<Path>) -> io::Result<PathBuf> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir)?;

    let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
    let path = dir.join(format!("index-bench-{stamp}.json"));
    let json = serde_json::to_string_pretty(doc)?;
    fs::write(&path, json)?;

    log::info!("Report written to {}", path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(mean: f64) -> LatencySummary {
        LatencySummary::from_samples(&[mean]).unwrap()
    }

    fn record(scenario: &str, tag: SchemaTag, mean: f64) -> ComparisonRecord {
        ComparisonRecord {
            scenario: scenario.to_string(),
            tag,
            summary: summary(mean),
        }
    }

    #[test]
    fn faster_candidate_is_a_positive_speedup() {
        assert!((speedup_percent(&summary(10.0), &summary(6.0)) - 40.0).abs() < 1e-9);
        assert!((speedup_percent(&summary(12.4), &summary(3.2)) - 74.1935).abs() < 1e-3);
    }

    #[test]
    fn slower_candidate_is_negative() {
        assert!((speedup_percent(&summary(5.0), &summary(7.5)) + 50.0).abs() < 1e-9);
    }

    #[test]
    fn zero_baseline_gives_zero() {
        assert_eq!(speedup_percent(&summary(0.0), &summary(3.0)), 0.0);
    }

    #[test]
    fn records_pair_in_first_seen_order() {
        let records = vec![
            record("insert", SchemaTag::Baseline, 2.0),
            record("point_lookup", SchemaTag::Baseline, 1.0),
            record("point_lookup", SchemaTag::Candidate, 0.5),
            record("insert", SchemaTag::Candidate, 2.0),
        ];

        let doc = build_report(&records, &[], &[]);

        let names: Vec<_> = doc.comparisons.iter().map(|c| c.scenario.as_str()).collect();
        assert_eq!(names, ["insert", "point_lookup"]);
        assert_eq!(doc.comparisons[0].speedup_percent, 0.0);
        assert!((doc.comparisons[1].speedup_percent - 50.0).abs() < 1e-9);
        assert_eq!(doc.records.len(), 4);
    }

    #[test]
    fn unpaired_records_stay_uncompared() {
        let records = vec![
            record("range_aggregation", SchemaTag::Baseline, 4.0),
            record("point_lookup", SchemaTag::Baseline, 1.0),
            record("point_lookup", SchemaTag::Candidate, 1.0),
        ];

        let doc = build_report(&records, &[], &[]);

        assert_eq!(doc.comparisons.len(), 1);
        assert_eq!(doc.comparisons[0].scenario, "point_lookup");
        assert_eq!(doc.records.len(), 3);
    }

    #[test]
    fn json_report_lands_in_output_dir() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("results");
        let doc = build_report(
            &[
                record("point_lookup", SchemaTag::Baseline, 12.4),
                record("point_lookup", SchemaTag::Candidate, 3.2),
            ],
            &[],
            &[],
        )
        .with_audit(
            vec![IndexApplicationResult::skipped("fill factor 90%", "not supported by sqlite")],
            vec![],
            vec![],
        )
        .with_index_usage(IndexUsageAudit::unavailable("not available on sqlite"));

        let path = write_json_report(&doc, &out).unwrap();

        assert!(path.starts_with(&out));
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("index-bench-") && name.ends_with(".json"));

        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        let speedup = value["comparisons"][0]["speedup_percent"].as_f64().unwrap();
        assert!((speedup - 74.19).abs() < 0.01);
        assert_eq!(value["optimizations"][0]["applied"], false);
        assert_eq!(value["records"][0]["tag"], "baseline");
        assert!(value.get("run").is_none());
        assert_eq!(value["index_usage"]["available"], false);
    }
}
