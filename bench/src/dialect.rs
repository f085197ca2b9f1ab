//! Engine-specific statement text.
//!
//! Scenario and workload statements are plain SQL that both engines accept.
//! What differs is DDL, the catalog/statistics queries and the EXPLAIN form;
//! those live here so the rest of the harness stays engine-agnostic.

use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Engine {
    Postgres,
    Sqlite,
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Engine::Postgres => f.write_str("postgres"),
            Engine::Sqlite => f.write_str("sqlite"),
        }
    }
}

/// Columns filled by the data generator and the insert workloads.
pub const INSERT_COLUMNS: &str =
    "customer_id, order_date, status, total_amount, product_id, region_id";

impl Engine {
    pub fn create_orders_table(self, table: &str) -> String {
        let id_column = match self {
            Engine::Postgres => "id BIGSERIAL PRIMARY KEY",
            // Only INTEGER PRIMARY KEY aliases the rowid and auto-assigns ids.
            Engine::Sqlite => "id INTEGER PRIMARY KEY",
        };
        format!(
            "CREATE TABLE {table} (
                {id_column},
                customer_id INT NOT NULL,
                order_date DATE NOT NULL,
                status VARCHAR(20) NOT NULL,
                total_amount DECIMAL(10,2),
                product_id INT,
                region_id INT,
                created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
            )"
        )
    }

    pub fn drop_table(self, table: &str) -> String {
        match self {
            Engine::Postgres => format!("DROP TABLE IF EXISTS {table} CASCADE"),
            Engine::Sqlite => format!("DROP TABLE IF EXISTS {table}"),
        }
    }

    /// Server-side generation of `?` rows: customer 1..=10000, an order date
    /// in the last year, 30% pending, amount 1..1001 with cents, product
    /// 1..=100, region 1..=10.
    pub fn generate_orders(self, table: &str) -> String {
        match self {
            Engine::Postgres => format!(
                "INSERT INTO {table} ({INSERT_COLUMNS})
                 SELECT
                     floor(random() * 10000 + 1)::int,
                     CURRENT_DATE - (random() * 365)::int,
                     CASE WHEN random() < 0.3 THEN 'pending'
                          WHEN random() < 0.6 THEN 'completed'
                          ELSE 'cancelled' END,
                     round((random() * 1000 + 1)::numeric, 2),
                     floor(random() * 100 + 1)::int,
                     floor(random() * 10 + 1)::int
                 FROM generate_series(1, ?)"
            ),
            Engine::Sqlite => format!(
                "WITH RECURSIVE seq(n) AS (
                     SELECT 1 UNION ALL SELECT n + 1 FROM seq WHERE n < ?
                 )
                 INSERT INTO {table} ({INSERT_COLUMNS})
                 SELECT
                     abs(random()) % 10000 + 1,
                     date('now', '-' || (abs(random()) % 366) || ' days'),
                     CASE WHEN abs(random()) % 100 < 30 THEN 'pending'
                          WHEN abs(random()) % 100 < 60 THEN 'completed'
                          ELSE 'cancelled' END,
                     round((abs(random()) % 100000) / 100.0 + 1, 2),
                     abs(random()) % 100 + 1,
                     abs(random()) % 10 + 1
                 FROM seq"
            ),
        }
    }

    /// Advance the id sequence past copied rows. SQLite assigns
    /// `max(rowid) + 1` on its own.
    pub fn resync_id_sequence(self, table: &str) -> Option<String> {
        match self {
            Engine::Postgres => Some(format!(
                "SELECT setval(pg_get_serial_sequence('{table}', 'id'),
                               COALESCE((SELECT MAX(id) FROM {table}), 1))"
            )),
            Engine::Sqlite => None,
        }
    }

    /// `ALTER TABLE ... SET (param = value)`, where the engine has per-table
    /// storage parameters at all.
    pub fn storage_parameter(self, table: &str, param: &str, value: u32) -> Option<String> {
        match self {
            Engine::Postgres => Some(format!("ALTER TABLE {table} SET ({param} = {value})")),
            Engine::Sqlite => None,
        }
    }

    /// Index catalog rows `(table, index, definition)` for the orders tables.
    pub fn index_catalog_query(self) -> &'static str {
        match self {
            Engine::Postgres => {
                "SELECT tablename, indexname, indexdef
                   FROM pg_indexes
                  WHERE tablename LIKE 'orders_%'
                  ORDER BY tablename, indexname"
            }
            Engine::Sqlite => {
                "SELECT tbl_name, name, COALESCE(sql, '(automatic)')
                   FROM sqlite_master
                  WHERE type = 'index' AND tbl_name LIKE 'orders_%'
                  ORDER BY tbl_name, name"
            }
        }
    }

    /// Per-index scan counters `(table, index, scans, tuples read, tuples
    /// fetched)` for the orders tables, where the engine keeps them.
    pub fn index_usage_query(self) -> Option<&'static str> {
        match self {
            Engine::Postgres => Some(
                "SELECT relname, indexrelname, idx_scan, idx_tup_read, idx_tup_fetch
                   FROM pg_stat_user_indexes
                  WHERE relname LIKE 'orders_%'
                  ORDER BY relname, indexrelname",
            ),
            Engine::Sqlite => None,
        }
    }

    /// Prefix a statement so it returns its plan. On PostgreSQL the statement
    /// is executed for real timings and buffer counts.
    pub fn explain(self, statement: &str) -> String {
        match self {
            Engine::Postgres => format!("EXPLAIN (ANALYZE, BUFFERS) {statement}"),
            Engine::Sqlite => format!("EXPLAIN QUERY PLAN {statement}"),
        }
    }

    /// Size query for one table, every placeholder bound with the table name.
    /// Returns one row `(total_bytes, table_bytes, index_bytes)`, or none when
    /// the table does not exist.
    pub fn table_size_query(self) -> (&'static str, usize) {
        match self {
            Engine::Postgres => (
                "SELECT pg_total_relation_size(c.oid),
                        pg_relation_size(c.oid),
                        pg_indexes_size(c.oid)
                   FROM pg_class c
                  WHERE c.relname = ? AND c.relkind = 'r'",
                1,
            ),
            // The join with the table's own catalog row yields no row when the
            // table does not exist.
            Engine::Sqlite => (
                "SELECT t.bytes + i.bytes, t.bytes, i.bytes
                   FROM (SELECT COALESCE(SUM(pgsize), 0) AS bytes
                           FROM dbstat WHERE name = ?) t,
                        (SELECT COALESCE(SUM(d.pgsize), 0) AS bytes
                           FROM dbstat d JOIN sqlite_master m ON m.name = d.name
                          WHERE m.type = 'index' AND m.tbl_name = ?) i,
                        sqlite_master s
                  WHERE s.type = 'table' AND s.name = ?",
                3,
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sqlite_id_column_aliases_rowid() {
        let ddl = Engine::Sqlite.create_orders_table("orders_baseline");
        assert!(ddl.contains("id INTEGER PRIMARY KEY"));
        assert!(!ddl.contains("BIGSERIAL"));
    }

    #[test]
    fn storage_parameters_exist_only_on_postgres() {
        assert_eq!(
            Engine::Postgres
                .storage_parameter("orders_candidate", "fillfactor", 90)
                .as_deref(),
            Some("ALTER TABLE orders_candidate SET (fillfactor = 90)")
        );
        assert!(Engine::Sqlite
            .storage_parameter("orders_candidate", "fillfactor", 90)
            .is_none());
    }

    #[test]
    fn explain_forms() {
        assert_eq!(
            Engine::Postgres.explain("SELECT 1"),
            "EXPLAIN (ANALYZE, BUFFERS) SELECT 1"
        );
        assert_eq!(
            Engine::Sqlite.explain("SELECT 1"),
            "EXPLAIN QUERY PLAN SELECT 1"
        );
    }

    #[test]
    fn index_usage_comes_from_postgres_statistics() {
        let query = Engine::Postgres.index_usage_query().unwrap();
        assert!(query.contains("pg_stat_user_indexes"));
        assert!(query.contains("idx_tup_fetch"));
        assert!(Engine::Sqlite.index_usage_query().is_none());
    }
}
