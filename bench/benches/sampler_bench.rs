//! Criterion benchmark harness: per-statement latency of the serial
//! scenarios on both tables, with the candidate indexes in place.

use bench_core::config::{ConnectionConfig, ScenarioIterations};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use index_bench::executor::Executor;
use index_bench::optimizer::SchemaOptimizer;
use index_bench::scenario::{self, ParamContext};
use index_bench::schema;
use std::time::Duration;

const ROWS: u64 = 50_000;

/// Create a populated database file with the candidate indexes applied.
fn setup_db(dir: &tempfile::TempDir) -> Executor {
    let path = dir.path().join("criterion.db");
    let mut executor = Executor::connect(&ConnectionConfig::sqlite(path.to_string_lossy()))
        .expect("Failed to open SQLite database");
    schema::create_test_tables(&mut executor).expect("Failed to create tables");
    schema::generate_test_data(&mut executor, ROWS).expect("Failed to populate");
    SchemaOptimizer::new(&mut executor)
        .apply_indexes()
        .expect("Failed to create indexes");
    executor
}

fn bench_read_scenarios(c: &mut Criterion) {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut executor = setup_db(&dir);
    let ctx = ParamContext::today(ROWS);

    let mut group = c.benchmark_group("scenario");
    group.measurement_time(Duration::from_secs(10));
    group.sample_size(50);

    // Writes grow the table with every iteration, so only reads are
    // benchmarked here.
    for scenario in scenario::catalog(&ScenarioIterations::default(), &ctx)
        .into_iter()
        .filter(|s| s.statement.trim_start().starts_with("SELECT"))
    {
        let id = BenchmarkId::new(scenario.name, scenario.tag);
        group.bench_function(id, |b| {
            b.iter(|| {
                executor
                    .execute(&scenario.statement, &scenario.params)
                    .expect("scenario failed");
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_read_scenarios);
criterion_main!(benches);
