//! Test tables: two structurally identical `orders` tables filled with the
//! same rows, plus on-demand size/row-count snapshots.
//!
//! The baseline table is generated server-side and then copied verbatim into
//! the candidate table, so both sides of every comparison see identical data.

use bench_core::types::{SchemaTag, TableStats};

use crate::error::{BenchError, Result};
use crate::executor::{Executor, SqlValue};

/// Target of the best-effort partitioning migration; dropped on setup so a
/// rerun starts clean.
pub const PARTITIONED_TABLE: &str = "orders_partitioned";

/// Drop and recreate both orders tables.
pub fn create_test_tables(executor: &mut Executor) -> Result<()> {
    let engine = executor.engine();

    executor.execute(&engine.drop_table(PARTITIONED_TABLE), &[])?;
    for tag in SchemaTag::ALL {
        executor.execute(&engine.drop_table(tag.table_name()), &[])?;
    }
    for tag in SchemaTag::ALL {
        executor.execute(&engine.create_orders_table(tag.table_name()), &[])?;
    }

    log::info!("Created test tables on {engine}");
    Ok(())
}

/// Fill the baseline table with `rows` generated orders and copy them into
/// the candidate table.
pub fn generate_test_data(executor: &mut Executor, rows: u64) -> Result<()> {
    let engine = executor.engine();
    let baseline = SchemaTag::Baseline.table_name();
    let candidate = SchemaTag::Candidate.table_name();

    log::info!("Generating {rows} test rows...");
    if rows > 0 {
        let count = i64::try_from(rows)
            .map_err(|_| BenchError::InvalidConfig(format!("row count {rows} too large")))?;
        executor.execute(&engine.generate_orders(baseline), &[SqlValue::Int(count)])?;
    }

    executor.execute(
        &format!("INSERT INTO {candidate} SELECT * FROM {baseline}"),
        &[],
    )?;
    if let Some(resync) = engine.resync_id_sequence(candidate) {
        executor.execute(&resync, &[])?;
    }

    log::info!("Test data generated");
    Ok(())
}

/// Snapshot of one table's sizes and live row count. Not cached.
pub fn table_stats(executor: &mut Executor, tag: SchemaTag) -> Result<TableStats> {
    let engine = executor.engine();
    let table = tag.table_name();

    let (size_query, binds) = engine.table_size_query();
    let params = vec![SqlValue::from(table); binds];
    let sizes = executor.query(size_query, &params)?;
    let Some(sizes) = sizes.first() else {
        return Err(BenchError::MissingTable(table.to_string()));
    };

    let live = executor.query(&format!("SELECT COUNT(*) FROM {table}"), &[])?;
    let live_rows = live.first().map(|row| row.get_i64(0)).unwrap_or(0);

    Ok(TableStats {
        tag,
        table: table.to_string(),
        total_bytes: sizes.get_i64(0),
        table_bytes: sizes.get_i64(1),
        index_bytes: sizes.get_i64(2),
        live_rows,
    })
}
