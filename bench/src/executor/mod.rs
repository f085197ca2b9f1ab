//! Query execution over a single, exclusively owned connection.
//!
//! An [`Executor`] owns one [`Session`] for its whole lifetime. There is no
//! pooling: callers that need concurrency build one executor per unit of
//! work. Both backends run in autocommit mode, so every `execute` call is its
//! own transaction and is committed when it returns successfully.

pub mod pg;
pub mod sqlite;

use bench_core::config::ConnectionConfig;
use chrono::NaiveDate;

use crate::dialect::Engine;
use crate::error::{BenchError, DbError, Result};

/// A positional statement parameter, or a cell of a fetched row.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Int(i64),
    Real(f64),
    Text(String),
    Date(NaiveDate),
    Null,
}

impl SqlValue {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SqlValue::Int(v) => Some(*v),
            SqlValue::Real(v) => Some(*v as i64),
            SqlValue::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<String> {
        match self {
            SqlValue::Int(v) => Some(v.to_string()),
            SqlValue::Real(v) => Some(v.to_string()),
            SqlValue::Text(s) => Some(s.clone()),
            SqlValue::Date(d) => Some(d.to_string()),
            SqlValue::Null => None,
        }
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::Int(v)
    }
}

impl From<f64> for SqlValue {
    fn from(v: f64) -> Self {
        SqlValue::Real(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl From<NaiveDate> for SqlValue {
    fn from(v: NaiveDate) -> Self {
        SqlValue::Date(v)
    }
}

/// One fetched row: column names and values in select-list order.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub columns: Vec<String>,
    pub values: Vec<SqlValue>,
}

impl Row {
    pub fn get(&self, idx: usize) -> &SqlValue {
        self.values.get(idx).unwrap_or(&SqlValue::Null)
    }

    pub fn get_i64(&self, idx: usize) -> i64 {
        self.get(idx).as_i64().unwrap_or(0)
    }

    pub fn get_text(&self, idx: usize) -> String {
        self.get(idx).as_text().unwrap_or_default()
    }

    /// All cells joined for display, e.g. one line of plan output.
    pub fn display_line(&self) -> String {
        self.values
            .iter()
            .filter_map(SqlValue::as_text)
            .collect::<Vec<_>>()
            .join(" | ")
    }
}

/// One live connection to a database engine.
///
/// Statements use `?` positional placeholders. Implementations are `Send`
/// so a worker thread can own one, but never `Sync`: a session is driven
/// by exactly one caller at a time.
pub trait Session: Send {
    fn engine(&self) -> Engine;

    /// Run a statement, draining any rows it produces. Returns affected rows.
    fn execute(&mut self, sql: &str, params: &[SqlValue]) -> std::result::Result<u64, DbError>;

    /// Run a statement and collect its rows.
    fn query(&mut self, sql: &str, params: &[SqlValue])
        -> std::result::Result<Vec<Row>, DbError>;

    /// Run a multi-statement script without parameters.
    fn execute_batch(&mut self, sql: &str) -> std::result::Result<(), DbError>;
}

pub struct Executor {
    session: Box<dyn Session>,
}

impl Executor {
    /// Open a fresh connection. Failure is a [`BenchError::Connection`].
    pub fn connect(config: &ConnectionConfig) -> Result<Self> {
        let target = config.describe();
        let session: Box<dyn Session> = match config {
            ConnectionConfig::Postgres {
                host,
                port,
                user,
                password,
                dbname,
            } => Box::new(
                pg::PostgresSession::connect(host, *port, user, password.as_deref(), dbname)
                    .map_err(|source| BenchError::Connection { target: target.clone(), source })?,
            ),
            ConnectionConfig::Sqlite { path } => Box::new(
                sqlite::SqliteSession::open(path)
                    .map_err(|source| BenchError::Connection { target: target.clone(), source })?,
            ),
        };
        log::debug!("Connected to {target}");
        Ok(Self { session })
    }

    pub fn engine(&self) -> Engine {
        self.session.engine()
    }

    /// Run a write (or a read whose rows are not needed). Each call commits
    /// on success. Errors are returned unchanged, with the statement attached.
    pub fn execute(&mut self, statement: &str, params: &[SqlValue]) -> Result<u64> {
        self.session
            .execute(statement, params)
            .map_err(|e| BenchError::query(statement, e))
    }

    /// Run a statement and return its rows.
    pub fn query(&mut self, statement: &str, params: &[SqlValue]) -> Result<Vec<Row>> {
        self.session
            .query(statement, params)
            .map_err(|e| BenchError::query(statement, e))
    }

    pub fn execute_batch(&mut self, script: &str) -> Result<()> {
        self.session
            .execute_batch(script)
            .map_err(|e| BenchError::query(script, e))
    }
}

/// Something that can hand out new, independent executors.
///
/// The concurrent runner calls this once per worker, from inside the
/// worker's thread.
pub trait Connect: Sync {
    fn connect(&self) -> Result<Executor>;
}

impl Connect for ConnectionConfig {
    fn connect(&self) -> Result<Executor> {
        Executor::connect(self)
    }
}
