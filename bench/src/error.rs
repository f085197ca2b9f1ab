use thiserror::Error;

/// Error raised by a database engine, before the harness attaches context.
#[derive(Debug, Error)]
pub enum DbError {
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
    #[error(transparent)]
    Postgres(#[from] postgres::Error),
}

#[derive(Debug, Error)]
pub enum BenchError {
    /// A connection could not be established. Fatal to whatever needed it.
    #[error("failed to connect to {target}: {source}")]
    Connection {
        target: String,
        #[source]
        source: DbError,
    },

    /// A statement failed. Never retried by the harness.
    #[error("query failed: {source}\n  statement: {statement}")]
    Query {
        statement: String,
        #[source]
        source: DbError,
    },

    /// A concurrent worker failed; the whole run is aborted.
    #[error("worker {worker} failed: {source}")]
    Worker {
        worker: usize,
        #[source]
        source: Box<BenchError>,
    },

    #[error("table {0} does not exist")]
    MissingTable(String),

    #[error("worker {0} panicked")]
    WorkerPanicked(usize),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl BenchError {
    pub(crate) fn query(statement: &str, source: impl Into<DbError>) -> Self {
        BenchError::Query {
            statement: compact_statement(statement),
            source: source.into(),
        }
    }
}

/// Collapse the whitespace of an indented SQL literal onto one line.
pub fn compact_statement(statement: &str) -> String {
    statement.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub type Result<T> = std::result::Result<T, BenchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statement_is_compacted_for_messages() {
        assert_eq!(
            compact_statement("\n    SELECT *\n      FROM orders_baseline\n     WHERE id = ?"),
            "SELECT * FROM orders_baseline WHERE id = ?"
        );
    }
}
