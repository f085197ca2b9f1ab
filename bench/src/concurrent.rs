//! Multi-worker mixed load against one table.
//!
//! Every worker is an OS thread with its own connection. Workers connect
//! first, then wait with the coordinator at a start line, so connection
//! setup is excluded from the wall clock. A failure in any worker aborts the
//! whole run.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Barrier, Mutex, PoisonError};
use std::thread;
use std::time::Instant;

use bench_core::latency;
use bench_core::types::{ConcurrentRunResult, SchemaTag};

use crate::dialect::INSERT_COLUMNS;
use crate::error::{BenchError, Result};
use crate::executor::{Connect, Executor, SqlValue};

/// Operation mix of one worker, chosen by `op_index % 3`.
struct Workload {
    worker_id: usize,
    read: String,
    write: String,
    read_modify_write: String,
}

impl Workload {
    fn new(table: &str, worker_id: usize) -> Self {
        Self {
            worker_id,
            read: format!("SELECT * FROM {table} WHERE customer_id = ? LIMIT 5"),
            write: format!(
                "INSERT INTO {table} ({INSERT_COLUMNS}) VALUES (?, CURRENT_DATE, 'pending', ?, ?, ?)"
            ),
            read_modify_write: format!(
                "UPDATE {table} SET total_amount = total_amount + 1
                  WHERE id = (SELECT id FROM {table} WHERE customer_id = ? LIMIT 1)"
            ),
        }
    }

    fn operation(&self, op_index: usize) -> (&str, Vec<SqlValue>) {
        let w = self.worker_id as i64;
        match op_index % 3 {
            0 => (self.read.as_str(), vec![SqlValue::Int(w % 1000)]),
            1 => (
                self.write.as_str(),
                vec![
                    SqlValue::Int(w),
                    SqlValue::Real(100.0),
                    SqlValue::Int(1),
                    SqlValue::Int(1),
                ],
            ),
            _ => (self.read_modify_write.as_str(), vec![SqlValue::Int(w % 1000)]),
        }
    }
}

/// A finished run plus every operation latency, in milliseconds.
#[derive(Debug, Clone)]
pub struct ConcurrentRun {
    pub result: ConcurrentRunResult,
    pub latencies_ms: Vec<f64>,
}

pub struct ConcurrentRunner<'c, C: Connect + ?Sized> {
    connector: &'c C,
    tag: SchemaTag,
}

impl<'c, C: Connect + ?Sized> ConcurrentRunner<'c, C> {
    pub fn new(connector: &'c C, tag: SchemaTag) -> Self {
        Self { connector, tag }
    }

    pub fn run(&self, worker_count: usize, ops_per_worker: usize) -> Result<ConcurrentRunResult> {
        self.run_with_samples(worker_count, ops_per_worker)
            .map(|run| run.result)
    }

    /// Like [`ConcurrentRunner::run`], keeping the merged per-operation
    /// latencies.
    pub fn run_with_samples(
        &self,
        worker_count: usize,
        ops_per_worker: usize,
    ) -> Result<ConcurrentRun> {
        if worker_count == 0 || ops_per_worker == 0 {
            return Err(BenchError::InvalidConfig(format!(
                "concurrent run needs workers and operations, got {worker_count} x {ops_per_worker}"
            )));
        }

        let table = self.tag.table_name();
        let total_operations = worker_count * ops_per_worker;
        log::info!(
            "Concurrent run on {table}: {worker_count} workers x {ops_per_worker} operations"
        );

        let merged = Mutex::new(Vec::with_capacity(total_operations));
        let aborted = AtomicBool::new(false);
        let start_line = Barrier::new(worker_count + 1);

        let (elapsed, outcomes) = thread::scope(|scope| {
            let handles: Vec<_> = (0..worker_count)
                .map(|worker_id| {
                    let worker = Worker {
                        id: worker_id,
                        table,
                        ops: ops_per_worker,
                        start_line: &start_line,
                        aborted: &aborted,
                        merged: &merged,
                    };
                    let connector = self.connector;
                    scope.spawn(move || worker.run(connector))
                })
                .collect();

            start_line.wait();
            let started = Instant::now();
            let outcomes: Vec<Result<()>> = handles
                .into_iter()
                .enumerate()
                .map(|(worker_id, handle)| {
                    handle
                        .join()
                        .map_err(|_| BenchError::WorkerPanicked(worker_id))
                        .and_then(|outcome| {
                            outcome.map_err(|source| BenchError::Worker {
                                worker: worker_id,
                                source: Box::new(source),
                            })
                        })
                })
                .collect();
            (started.elapsed(), outcomes)
        });

        if let Some(err) = outcomes.into_iter().find_map(|outcome| outcome.err()) {
            log::error!("Concurrent run on {table} aborted: {err}");
            return Err(err);
        }

        let latencies_ms = merged.into_inner().unwrap_or_else(PoisonError::into_inner);
        debug_assert_eq!(latencies_ms.len(), total_operations);

        let wall_clock_seconds = elapsed.as_secs_f64();
        let ops_per_second = if wall_clock_seconds > 0.0 {
            total_operations as f64 / wall_clock_seconds
        } else {
            0.0
        };
        let mean_op_latency_ms = latency::mean(&latencies_ms).unwrap_or(0.0);

        log::info!(
            "{table}: {total_operations} operations in {wall_clock_seconds:.2}s ({ops_per_second:.1} ops/s)"
        );

        Ok(ConcurrentRun {
            result: ConcurrentRunResult {
                tag: self.tag,
                worker_count,
                ops_per_worker,
                total_operations,
                wall_clock_seconds,
                ops_per_second,
                mean_op_latency_ms,
            },
            latencies_ms,
        })
    }
}

struct Worker<'s> {
    id: usize,
    table: &'static str,
    ops: usize,
    start_line: &'s Barrier,
    aborted: &'s AtomicBool,
    merged: &'s Mutex<Vec<f64>>,
}

/// A worker's place at the start line. Dropping it before arrival, e.g.
/// while unwinding from a panic in `connect`, aborts the run and still
/// arrives, so the coordinator is never left waiting.
struct StartLine<'s> {
    barrier: &'s Barrier,
    aborted: &'s AtomicBool,
    arrived: bool,
}

impl StartLine<'_> {
    fn arrive(mut self) {
        self.arrived = true;
        self.barrier.wait();
    }
}

impl Drop for StartLine<'_> {
    fn drop(&mut self) {
        if !self.arrived {
            self.aborted.store(true, Ordering::Relaxed);
            self.barrier.wait();
        }
    }
}

impl Worker<'_> {
    fn run<C: Connect + ?Sized>(self, connector: &C) -> Result<()> {
        let start_line = StartLine {
            barrier: self.start_line,
            aborted: self.aborted,
            arrived: false,
        };
        let connection = connector.connect();
        if connection.is_err() {
            self.aborted.store(true, Ordering::Relaxed);
        }
        start_line.arrive();
        let mut executor = connection?;
        log::debug!("Worker {} started", self.id);

        let local = self.drive(&mut executor)?;
        log::debug!("Worker {} finished {} operations", self.id, local.len());
        self.merged
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(local);
        Ok(())
    }

    fn drive(&self, executor: &mut Executor) -> Result<Vec<f64>> {
        let workload = Workload::new(self.table, self.id);
        let mut local = Vec::with_capacity(self.ops);

        for op_index in 0..self.ops {
            if self.aborted.load(Ordering::Relaxed) {
                log::debug!("Worker {} stopping after {op_index} operations", self.id);
                break;
            }

            let (statement, params) = workload.operation(op_index);
            let start = Instant::now();
            if let Err(err) = executor.execute(statement, &params) {
                self.aborted.store(true, Ordering::Relaxed);
                return Err(err);
            }
            local.push(start.elapsed().as_secs_f64() * 1000.0);
        }
        Ok(local)
    }
}
