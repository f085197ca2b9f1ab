//! SQLite session over `rusqlite`, backed by a database file so that every
//! worker can open its own connection to the same data.

use rusqlite::types::{Null, ToSqlOutput, ValueRef};
use rusqlite::{params_from_iter, Connection, ToSql};
use std::time::Duration;

use super::{Row, Session, SqlValue};
use crate::dialect::Engine;
use crate::error::DbError;

/// How long a writer waits for the database lock before failing. Concurrent
/// workers contend on the single SQLite write lock.
const BUSY_TIMEOUT: Duration = Duration::from_secs(30);

pub struct SqliteSession {
    conn: Connection,
}

impl SqliteSession {
    pub fn open(path: &str) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        configure_connection(&conn)?;
        Ok(Self { conn })
    }
}

/// WAL lets readers proceed while one worker writes; durability is
/// irrelevant for a throwaway benchmark database.
pub fn configure_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA synchronous = OFF;
         PRAGMA cache_size = -65536;
         PRAGMA temp_store = MEMORY;",
    )
}

impl ToSql for SqlValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            SqlValue::Int(v) => ToSqlOutput::from(*v),
            SqlValue::Real(v) => ToSqlOutput::from(*v),
            SqlValue::Text(s) => ToSqlOutput::from(s.as_str()),
            // Dates are stored as ISO-8601 text, the form `date('now')` produces.
            SqlValue::Date(d) => ToSqlOutput::from(d.format("%Y-%m-%d").to_string()),
            SqlValue::Null => ToSqlOutput::from(Null),
        })
    }
}

fn decode(value: ValueRef<'_>) -> SqlValue {
    match value {
        ValueRef::Null => SqlValue::Null,
        ValueRef::Integer(v) => SqlValue::Int(v),
        ValueRef::Real(v) => SqlValue::Real(v),
        ValueRef::Text(t) => SqlValue::Text(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => SqlValue::Text(format!("<{} byte blob>", b.len())),
    }
}

impl Session for SqliteSession {
    fn engine(&self) -> Engine {
        Engine::Sqlite
    }

    fn execute(&mut self, sql: &str, params: &[SqlValue]) -> Result<u64, DbError> {
        let mut stmt = self.conn.prepare_cached(sql)?;
        let readonly = stmt.readonly();
        let mut rows = stmt.query(params_from_iter(params.iter()))?;
        while rows.next()?.is_some() {}
        drop(rows);

        if readonly {
            Ok(0)
        } else {
            Ok(self.conn.changes() as u64)
        }
    }

    fn query(&mut self, sql: &str, params: &[SqlValue]) -> Result<Vec<Row>, DbError> {
        let mut stmt = self.conn.prepare_cached(sql)?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let mut rows = stmt.query(params_from_iter(params.iter()))?;

        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let mut values = Vec::with_capacity(columns.len());
            for idx in 0..columns.len() {
                values.push(decode(row.get_ref(idx)?));
            }
            out.push(Row {
                columns: columns.clone(),
                values,
            });
        }
        Ok(out)
    }

    fn execute_batch(&mut self, sql: &str) -> Result<(), DbError> {
        self.conn.execute_batch(sql)?;
        Ok(())
    }
}
