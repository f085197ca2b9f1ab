//! PostgreSQL session over the blocking `postgres` client.
//!
//! Statements arrive with `?` placeholders; they are rewritten to `$n` with an
//! explicit cast taken from the bound value, since the server otherwise infers
//! `int4`/`numeric` column types that a Rust `i64`/`f64` will not bind to.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use postgres::types::{FromSql, ToSql, Type};
use postgres::{Client, Config, NoTls};
use std::error::Error;

use super::{Row, Session, SqlValue};
use crate::dialect::Engine;
use crate::error::DbError;

pub struct PostgresSession {
    client: Client,
}

impl PostgresSession {
    pub fn connect(
        host: &str,
        port: u16,
        user: &str,
        password: Option<&str>,
        dbname: &str,
    ) -> Result<Self, DbError> {
        let mut config = Config::new();
        config.host(host).port(port).user(user).dbname(dbname);
        if let Some(password) = password {
            config.password(password);
        }
        let client = config.connect(NoTls)?;
        Ok(Self { client })
    }
}

fn cast_for(value: &SqlValue) -> &'static str {
    match value {
        SqlValue::Int(_) => "int8",
        SqlValue::Real(_) => "float8",
        SqlValue::Text(_) | SqlValue::Null => "text",
        SqlValue::Date(_) => "date",
    }
}

/// Rewrite `?` placeholders into numbered, typed Postgres parameters.
/// Question marks inside single-quoted literals are left alone.
pub fn number_placeholders(sql: &str, params: &[SqlValue]) -> String {
    let mut out = String::with_capacity(sql.len() + params.len() * 8);
    let mut in_literal = false;
    let mut n = 0;
    for ch in sql.chars() {
        match ch {
            '\'' => {
                in_literal = !in_literal;
                out.push(ch);
            }
            '?' if !in_literal => {
                n += 1;
                out.push('$');
                out.push_str(&n.to_string());
                if let Some(value) = params.get(n - 1) {
                    out.push_str("::");
                    out.push_str(cast_for(value));
                }
            }
            _ => out.push(ch),
        }
    }
    out
}

fn to_boxed(value: &SqlValue) -> Box<dyn ToSql + Sync> {
    match value {
        SqlValue::Int(v) => Box::new(*v),
        SqlValue::Real(v) => Box::new(*v),
        SqlValue::Text(s) => Box::new(s.clone()),
        SqlValue::Date(d) => Box::new(*d),
        SqlValue::Null => Box::new(None::<String>),
    }
}

/// `NUMERIC` read from its binary wire form. The client has no native
/// decimal type, and the harness only needs the value as a float.
struct Numeric(f64);

impl<'a> FromSql<'a> for Numeric {
    fn from_sql(_: &Type, raw: &'a [u8]) -> Result<Self, Box<dyn Error + Sync + Send>> {
        numeric_from_wire(raw).map(Numeric)
    }

    fn accepts(ty: &Type) -> bool {
        *ty == Type::NUMERIC
    }
}

const NUMERIC_NEG: u16 = 0x4000;
const NUMERIC_NAN: u16 = 0xC000;
const NUMERIC_PINF: u16 = 0xD000;
const NUMERIC_NINF: u16 = 0xF000;

/// Header is `ndigits, weight, sign, dscale` as 16-bit big-endian values,
/// followed by `ndigits` base-10000 digits. The first digit is scaled by
/// `10000^weight`.
fn numeric_from_wire(raw: &[u8]) -> Result<f64, Box<dyn Error + Sync + Send>> {
    let word = |idx: usize| -> Result<u16, Box<dyn Error + Sync + Send>> {
        raw.get(idx * 2..idx * 2 + 2)
            .map(|b| u16::from_be_bytes([b[0], b[1]]))
            .ok_or_else(|| "truncated numeric value".into())
    };

    let ndigits = word(0)? as usize;
    let weight = word(1)? as i16 as i32;
    let sign = word(2)?;

    match sign {
        NUMERIC_NAN => return Ok(f64::NAN),
        NUMERIC_PINF => return Ok(f64::INFINITY),
        NUMERIC_NINF => return Ok(f64::NEG_INFINITY),
        _ => {}
    }

    let mut value = 0.0;
    for i in 0..ndigits {
        let digit = f64::from(word(4 + i)?);
        value += digit * 10_000f64.powi(weight - i as i32);
    }
    Ok(if sign == NUMERIC_NEG { -value } else { value })
}

fn decode(row: &postgres::Row, idx: usize) -> Result<SqlValue, postgres::Error> {
    let ty = row.columns()[idx].type_();
    let value = if *ty == Type::INT2 {
        row.try_get::<_, Option<i16>>(idx)?
            .map(|v| SqlValue::Int(v.into()))
    } else if *ty == Type::INT4 {
        row.try_get::<_, Option<i32>>(idx)?
            .map(|v| SqlValue::Int(v.into()))
    } else if *ty == Type::INT8 {
        row.try_get::<_, Option<i64>>(idx)?.map(SqlValue::Int)
    } else if *ty == Type::OID {
        row.try_get::<_, Option<u32>>(idx)?
            .map(|v| SqlValue::Int(v.into()))
    } else if *ty == Type::FLOAT4 {
        row.try_get::<_, Option<f32>>(idx)?
            .map(|v| SqlValue::Real(v.into()))
    } else if *ty == Type::FLOAT8 {
        row.try_get::<_, Option<f64>>(idx)?.map(SqlValue::Real)
    } else if *ty == Type::NUMERIC {
        row.try_get::<_, Option<Numeric>>(idx)?
            .map(|Numeric(v)| SqlValue::Real(v))
    } else if *ty == Type::BOOL {
        row.try_get::<_, Option<bool>>(idx)?
            .map(|v| SqlValue::Int(v.into()))
    } else if *ty == Type::DATE {
        row.try_get::<_, Option<NaiveDate>>(idx)?.map(SqlValue::Date)
    } else if *ty == Type::TIMESTAMP {
        row.try_get::<_, Option<NaiveDateTime>>(idx)?
            .map(|v| SqlValue::Text(v.format("%Y-%m-%d %H:%M:%S%.f").to_string()))
    } else if *ty == Type::TIMESTAMPTZ {
        row.try_get::<_, Option<DateTime<Utc>>>(idx)?
            .map(|v| SqlValue::Text(v.to_rfc3339()))
    } else {
        // text, varchar, name; any other type is a decode error
        row.try_get::<_, Option<String>>(idx)?.map(SqlValue::Text)
    };
    Ok(value.unwrap_or(SqlValue::Null))
}

impl Session for PostgresSession {
    fn engine(&self) -> Engine {
        Engine::Postgres
    }

    fn execute(&mut self, sql: &str, params: &[SqlValue]) -> Result<u64, DbError> {
        let sql = number_placeholders(sql, params);
        let boxed: Vec<Box<dyn ToSql + Sync>> = params.iter().map(to_boxed).collect();
        let refs: Vec<&(dyn ToSql + Sync)> = boxed.iter().map(|b| b.as_ref()).collect();
        Ok(self.client.execute(sql.as_str(), &refs)?)
    }

    fn query(&mut self, sql: &str, params: &[SqlValue]) -> Result<Vec<Row>, DbError> {
        let sql = number_placeholders(sql, params);
        let boxed: Vec<Box<dyn ToSql + Sync>> = params.iter().map(to_boxed).collect();
        let refs: Vec<&(dyn ToSql + Sync)> = boxed.iter().map(|b| b.as_ref()).collect();
        let rows = self.client.query(sql.as_str(), &refs)?;

        let mut decoded = Vec::with_capacity(rows.len());
        for row in &rows {
            decoded.push(Row {
                columns: row.columns().iter().map(|c| c.name().to_string()).collect(),
                values: (0..row.len())
                    .map(|idx| decode(row, idx))
                    .collect::<Result<_, _>>()?,
            });
        }
        Ok(decoded)
    }

    fn execute_batch(&mut self, sql: &str) -> Result<(), DbError> {
        self.client.batch_execute(sql)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholders_are_numbered_and_typed() {
        let sql = number_placeholders(
            "INSERT INTO t (a, b, c) VALUES (?, ?, ?)",
            &[SqlValue::Int(1), SqlValue::Real(2.5), "x".into()],
        );
        assert_eq!(sql, "INSERT INTO t (a, b, c) VALUES ($1::int8, $2::float8, $3::text)");
    }

    #[test]
    fn question_marks_in_literals_are_kept() {
        let sql = number_placeholders(
            "SELECT '?' AS q FROM t WHERE d BETWEEN ? AND ?",
            &[
                SqlValue::Date(chrono::NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()),
                SqlValue::Date(chrono::NaiveDate::from_ymd_opt(2024, 12, 31).unwrap()),
            ],
        );
        assert_eq!(
            sql,
            "SELECT '?' AS q FROM t WHERE d BETWEEN $1::date AND $2::date"
        );
    }

    #[test]
    fn statements_without_parameters_are_unchanged() {
        let sql = "SELECT status, COUNT(*) FROM orders_baseline GROUP BY status";
        assert_eq!(number_placeholders(sql, &[]), sql);
    }

    #[test]
    fn numeric_wire_form_decodes() {
        // 1234.56: digits [1234, 5600], weight 0, dscale 2
        let raw = [0, 2, 0, 0, 0, 0, 0, 2, 0x04, 0xD2, 0x15, 0xE0];
        assert!((numeric_from_wire(&raw).unwrap() - 1234.56).abs() < 1e-9);

        // -0.5: digits [5000], weight -1
        let raw = [0, 1, 0xFF, 0xFF, 0x40, 0x00, 0, 1, 0x13, 0x88];
        assert!((numeric_from_wire(&raw).unwrap() + 0.5).abs() < 1e-12);

        // zero has no digits
        assert_eq!(numeric_from_wire(&[0, 0, 0, 0, 0, 0, 0, 0]).unwrap(), 0.0);
        assert!(numeric_from_wire(&[0, 0, 0, 0, 0xC0, 0x00, 0, 0]).unwrap().is_nan());
    }

    #[test]
    fn truncated_numeric_is_an_error() {
        assert!(numeric_from_wire(&[0, 2, 0, 0, 0, 0, 0, 2, 0x04]).is_err());
    }

    /// Session against the server named by `INDEX_BENCH_TEST_PG_HOST`, if set.
    fn live_session() -> Option<PostgresSession> {
        let var = |name: &str| std::env::var(format!("INDEX_BENCH_TEST_PG_{name}")).ok();
        let host = var("HOST")?;
        let port = var("PORT").and_then(|p| p.parse().ok()).unwrap_or(5432);
        let user = var("USER").unwrap_or_else(|| "postgres".to_string());
        let dbname = var("DBNAME").unwrap_or_else(|| "postgres".to_string());
        let password = var("PASSWORD");
        Some(
            PostgresSession::connect(&host, port, &user, password.as_deref(), &dbname)
                .expect("connect to test database"),
        )
    }

    #[test]
    fn live_numeric_and_timestamp_cells_keep_their_values() {
        let Some(mut session) = live_session() else {
            eprintln!("INDEX_BENCH_TEST_PG_HOST not set, skipping");
            return;
        };

        let rows = session
            .query(
                "SELECT 1234.56::numeric(10,2),
                        TIMESTAMP '2026-10-19 12:34:56',
                        (SELECT SUM(x) FROM (VALUES (1.25::numeric), (2.50)) v(x)),
                        NULL::numeric",
                &[],
            )
            .unwrap();

        let values = &rows[0].values;
        assert!(matches!(values[0], SqlValue::Real(v) if (v - 1234.56).abs() < 1e-9));
        assert_eq!(values[1], SqlValue::Text("2026-10-19 12:34:56".into()));
        assert!(matches!(values[2], SqlValue::Real(v) if (v - 3.75).abs() < 1e-9));
        assert_eq!(values[3], SqlValue::Null);
    }

    #[test]
    fn live_undecodable_cell_is_an_error() {
        let Some(mut session) = live_session() else {
            eprintln!("INDEX_BENCH_TEST_PG_HOST not set, skipping");
            return;
        };

        assert!(session.query("SELECT ARRAY[1, 2]", &[]).is_err());
    }
}
