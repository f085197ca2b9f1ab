//! Sequential latency sampling: run a scenario N times on one connection and
//! reduce the per-call wall-clock times to a [`LatencySummary`].

use std::time::Instant;

use bench_core::latency::LatencySummary;
use bench_core::types::ComparisonRecord;

use crate::error::{BenchError, Result};
use crate::executor::Executor;
use crate::scenario::Scenario;

/// Call `op` `iterations` times and return each call's duration in
/// milliseconds. Stops at the first error.
pub fn time_calls<F>(iterations: usize, mut op: F) -> Result<Vec<f64>>
where
    F: FnMut() -> Result<()>,
{
    let mut samples = Vec::with_capacity(iterations);
    for _ in 0..iterations {
        let start = Instant::now();
        op()?;
        samples.push(start.elapsed().as_secs_f64() * 1000.0);
    }
    Ok(samples)
}

pub struct LatencySampler<'a> {
    executor: &'a mut Executor,
}

impl<'a> LatencySampler<'a> {
    pub fn new(executor: &'a mut Executor) -> Self {
        Self { executor }
    }

    /// Execute `scenario` `iterations` times and summarize.
    ///
    /// Writes are committed per call, so insert and update scenarios leave
    /// their effects behind.
    pub fn measure(&mut self, scenario: &Scenario, iterations: usize) -> Result<LatencySummary> {
        if iterations == 0 {
            return Err(BenchError::InvalidConfig(format!(
                "scenario {} needs at least one iteration",
                scenario.name
            )));
        }

        let executor = &mut *self.executor;
        let samples = time_calls(iterations, || {
            executor
                .execute(&scenario.statement, &scenario.params)
                .map(drop)
        })?;

        LatencySummary::from_samples(&samples).ok_or_else(|| {
            BenchError::InvalidConfig(format!("scenario {} produced no samples", scenario.name))
        })
    }

    /// Measure one scenario with its configured iteration count.
    pub fn measure_scenario(&mut self, scenario: &Scenario) -> Result<ComparisonRecord> {
        log::debug!(
            "Measuring {} on {} ({} iterations)",
            scenario.name,
            scenario.tag.table_name(),
            scenario.iterations
        );
        let summary = self.measure(scenario, scenario.iterations)?;
        log::info!(
            "{} {}: mean {:.3} ms, p95 {:.3} ms",
            scenario.name,
            scenario.tag,
            summary.mean,
            summary.p95
        );
        Ok(ComparisonRecord {
            scenario: scenario.name.to_string(),
            tag: scenario.tag,
            summary,
        })
    }

    /// Measure every scenario in order, stopping at the first failure.
    pub fn run_scenarios(&mut self, scenarios: &[Scenario]) -> Result<Vec<ComparisonRecord>> {
        scenarios
            .iter()
            .map(|scenario| self.measure_scenario(scenario))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bench_core::config::{ConnectionConfig, ScenarioIterations};
    use bench_core::types::SchemaTag;
    use chrono::NaiveDate;

    use crate::scenario::{catalog_for, ParamContext};
    use crate::schema;

    fn seeded_executor(rows: u64) -> (tempfile::TempDir, Executor) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sampler.db");
        let mut executor =
            Executor::connect(&ConnectionConfig::sqlite(path.to_string_lossy())).unwrap();
        schema::create_test_tables(&mut executor).unwrap();
        schema::generate_test_data(&mut executor, rows).unwrap();
        (dir, executor)
    }

    fn scenario(name: &str, tag: SchemaTag, rows: u64) -> Scenario {
        let ctx = ParamContext::new(rows, NaiveDate::from_ymd_opt(2026, 10, 19).unwrap());
        catalog_for(tag, &ScenarioIterations::default(), &ctx)
            .into_iter()
            .find(|s| s.name == name)
            .unwrap()
    }

    #[test]
    fn time_calls_collects_one_sample_per_call() {
        let mut calls = 0;
        let samples = time_calls(7, || {
            calls += 1;
            Ok(())
        })
        .unwrap();

        assert_eq!(calls, 7);
        assert_eq!(samples.len(), 7);
        assert!(samples.iter().all(|s| *s >= 0.0));
    }

    #[test]
    fn summary_is_ordered() {
        let (_dir, mut executor) = seeded_executor(200);
        let lookup = scenario("point_lookup", SchemaTag::Baseline, 200);

        let summary = LatencySampler::new(&mut executor)
            .measure(&lookup, 25)
            .unwrap();

        assert_eq!(summary.samples, 25);
        assert!(summary.min <= summary.mean && summary.mean <= summary.max);
        assert!(summary.min <= summary.p50 && summary.p95 <= summary.max);
        assert!(summary.stddev >= 0.0);
    }

    #[test]
    fn single_iteration_has_zero_spread() {
        let (_dir, mut executor) = seeded_executor(50);
        let lookup = scenario("filtered_lookup", SchemaTag::Candidate, 50);

        let summary = LatencySampler::new(&mut executor)
            .measure(&lookup, 1)
            .unwrap();

        assert_eq!(summary.samples, 1);
        assert_eq!(summary.min, summary.max);
        assert_eq!(summary.stddev, 0.0);
    }

    #[test]
    fn zero_iterations_are_rejected() {
        let (_dir, mut executor) = seeded_executor(10);
        let lookup = scenario("point_lookup", SchemaTag::Baseline, 10);

        let err = LatencySampler::new(&mut executor)
            .measure(&lookup, 0)
            .unwrap_err();
        assert!(matches!(err, BenchError::InvalidConfig(_)));
    }

    #[test]
    fn inserts_are_committed_per_iteration() {
        let (_dir, mut executor) = seeded_executor(100);
        let insert = scenario("insert", SchemaTag::Candidate, 100);

        LatencySampler::new(&mut executor)
            .measure(&insert, 12)
            .unwrap();

        let rows = executor
            .query("SELECT COUNT(*) FROM orders_candidate", &[])
            .unwrap();
        assert_eq!(rows[0].get_i64(0), 112);
    }

    #[test]
    fn missing_table_fails_the_measurement() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.db");
        let mut executor =
            Executor::connect(&ConnectionConfig::sqlite(path.to_string_lossy())).unwrap();
        let lookup = scenario("point_lookup", SchemaTag::Baseline, 10);

        let err = LatencySampler::new(&mut executor)
            .measure(&lookup, 5)
            .unwrap_err();
        assert!(matches!(err, BenchError::Query { .. }));
    }

    #[test]
    fn run_scenarios_keeps_catalog_order() {
        let (_dir, mut executor) = seeded_executor(100);
        let ctx = ParamContext::new(100, NaiveDate::from_ymd_opt(2026, 10, 19).unwrap());
        let iterations = ScenarioIterations {
            point_lookup: 3,
            filtered_lookup: 3,
            range_aggregation: 3,
            insert: 3,
            conditional_update: 3,
        };
        let scenarios = crate::scenario::catalog(&iterations, &ctx);

        let records = LatencySampler::new(&mut executor)
            .run_scenarios(&scenarios)
            .unwrap();

        assert_eq!(records.len(), 10);
        assert_eq!(records[0].scenario, "point_lookup");
        assert_eq!(records[0].tag, SchemaTag::Baseline);
        assert_eq!(records[9].scenario, "conditional_update");
        assert_eq!(records[9].tag, SchemaTag::Candidate);
        assert!(records.iter().all(|r| r.summary.samples == 3));
    }
}
