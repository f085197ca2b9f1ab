//! Standalone benchmark runner that prints the formatted report and writes
//! it as JSON.
//!
//! Configuration comes from `INDEX_BENCH_*` environment variables, with a
//! `.env` file in the working directory read first when present.
//!
//! Usage:
//!   cargo run --release
//!   INDEX_BENCH_BACKEND=sqlite INDEX_BENCH_ROWS=100000 cargo run --release
//!   INDEX_BENCH_WORKERS=10,20,50 cargo run --release

use anyhow::Context;
use bench_core::config::BenchConfig;
use bench_core::types::{ComparisonRecord, SchemaTag};
use index_bench::concurrent::ConcurrentRunner;
use index_bench::executor::Executor;
use index_bench::optimizer::SchemaOptimizer;
use index_bench::report::{self, RunInfo};
use index_bench::sampler::LatencySampler;
use index_bench::scenario::{self, ParamContext};
use index_bench::schema;

fn main() -> anyhow::Result<()> {
    let config = BenchConfig::load().context("invalid configuration")?;
    bench_core::initialize_logger(config.log_level, config.log_file.as_deref())?;

    log::info!(
        "Index benchmark starting (target={}, rows={})",
        config.connection.describe(),
        config.rows
    );

    let mut executor = Executor::connect(&config.connection)?;
    let engine = executor.engine();

    schema::create_test_tables(&mut executor).context("creating test tables")?;
    schema::generate_test_data(&mut executor, config.rows).context("generating test data")?;

    let (optimizations, indexes, plans) = {
        let mut optimizer = SchemaOptimizer::new(&mut executor);
        let mut optimizations = optimizer
            .apply_indexes()
            .context("creating candidate indexes")?;
        optimizations.extend(
            optimizer
                .apply_storage_changes()
                .context("applying candidate storage changes")?,
        );
        let indexes = optimizer.analyze().context("refreshing statistics")?;
        let plans = optimizer.explain().context("collecting query plans")?;
        (optimizations, indexes, plans)
    };

    let ctx = ParamContext::today(config.rows);
    let scenarios = scenario::catalog(&config.iterations, &ctx);
    let mut sampler = LatencySampler::new(&mut executor);
    let records: Vec<ComparisonRecord> = scenarios
        .iter()
        .filter_map(|scenario| match sampler.measure_scenario(scenario) {
            Ok(record) => Some(record),
            Err(e) => {
                log::error!("Scenario {} on {} failed: {e}", scenario.name, scenario.tag);
                None
            }
        })
        .collect();

    let mut concurrent = Vec::new();
    for &workers in &config.concurrency.worker_counts {
        for tag in SchemaTag::ALL {
            let run = ConcurrentRunner::new(&config.connection, tag)
                .run(workers, config.concurrency.ops_per_worker)
                .with_context(|| {
                    format!("concurrent run on {} with {workers} workers", tag.table_name())
                })?;
            concurrent.push(run);
        }
    }

    let index_usage = SchemaOptimizer::new(&mut executor)
        .index_usage()
        .context("reading index usage statistics")?;

    let table_stats = SchemaTag::ALL
        .into_iter()
        .map(|tag| schema::table_stats(&mut executor, tag))
        .collect::<Result<Vec<_>, _>>()
        .context("reading table sizes")?;

    let doc = report::build_report(&records, &concurrent, &table_stats)
        .with_audit(optimizations, indexes, plans)
        .with_index_usage(index_usage)
        .with_run_info(RunInfo {
            generated_at: chrono::Local::now().to_rfc3339(),
            engine,
            rows: config.rows,
            iterations: config.iterations,
            concurrency: config.concurrency.clone(),
        });

    report::print_report(&doc);
    let path = report::write_json_report(&doc, &config.output_dir)
        .with_context(|| format!("writing report to {}", config.output_dir))?;
    println!("Report saved to {}", path.display());

    Ok(())
}
