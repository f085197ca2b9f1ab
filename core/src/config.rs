//! Run configuration.
//!
//! Everything the harness needs from its caller (where the database lives,
//! how many times each scenario runs, how wide the concurrent load is) is
//! collected here and handed to the components at construction time.
//! [`BenchConfig::load`] reads it from `INDEX_BENCH_*` environment variables,
//! after loading an optional `.env` file.

use log::LevelFilter;
use serde::Serialize;
use std::env;
use std::str::FromStr;
use thiserror::Error;

pub const ENV_PREFIX: &str = "INDEX_BENCH_";

const DEFAULT_PG_HOST: &str = "localhost";
const DEFAULT_PG_PORT: u16 = 5432;
const DEFAULT_PG_USER: &str = "postgres";
const DEFAULT_PG_DBNAME: &str = "index_bench";
const DEFAULT_SQLITE_PATH: &str = "index_bench.sqlite3";
const DEFAULT_ROWS: u64 = 1_000_000;
const DEFAULT_OUTPUT_DIR: &str = "results";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{key}: expected {expected}, got {value:?}")]
    Invalid {
        key: String,
        value: String,
        expected: &'static str,
    },
}

/// Where the benchmark database lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionConfig {
    Postgres {
        host: String,
        port: u16,
        user: String,
        password: Option<String>,
        dbname: String,
    },
    Sqlite {
        path: String,
    },
}

impl ConnectionConfig {
    pub fn sqlite(path: impl Into<String>) -> Self {
        ConnectionConfig::Sqlite { path: path.into() }
    }

    /// Human-readable target without credentials, for logs and errors.
    pub fn describe(&self) -> String {
        match self {
            ConnectionConfig::Postgres {
                host,
                port,
                user,
                dbname,
                ..
            } => format!("postgres://{user}@{host}:{port}/{dbname}"),
            ConnectionConfig::Sqlite { path } => format!("sqlite:{path}"),
        }
    }
}

/// Per-scenario repetition counts. Cheap point lookups need more repetitions
/// than aggregations to reach a stable mean.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScenarioIterations {
    pub point_lookup: usize,
    pub filtered_lookup: usize,
    pub range_aggregation: usize,
    pub insert: usize,
    pub conditional_update: usize,
}

impl Default for ScenarioIterations {
    fn default() -> Self {
        Self {
            point_lookup: 50,
            filtered_lookup: 30,
            range_aggregation: 20,
            insert: 100,
            conditional_update: 50,
        }
    }
}

/// Concurrent load shape. One run per entry of `worker_counts` and table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConcurrencySettings {
    pub worker_counts: Vec<usize>,
    pub ops_per_worker: usize,
}

impl Default for ConcurrencySettings {
    fn default() -> Self {
        Self {
            worker_counts: vec![10],
            ops_per_worker: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BenchConfig {
    pub connection: ConnectionConfig,
    /// Rows generated into each table before measuring.
    pub rows: u64,
    pub iterations: ScenarioIterations,
    pub concurrency: ConcurrencySettings,
    pub output_dir: String,
    pub log_level: LevelFilter,
    pub log_file: Option<String>,
}

impl BenchConfig {
    /// Load `.env` (if present) and read the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        if let Ok(path) = dotenvy::dotenv() {
            log::debug!("Loaded environment overrides from {}", path.display());
        }
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup. Keys are the full
    /// variable names, e.g. `INDEX_BENCH_ROWS`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(&format!("{ENV_PREFIX}{name}"));

        let backend = var("BACKEND").unwrap_or_else(|| "postgres".to_string());
        let connection = match backend.to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => ConnectionConfig::Postgres {
                host: var("PG_HOST").unwrap_or_else(|| DEFAULT_PG_HOST.to_string()),
                port: parse_or(&lookup, "PG_PORT", DEFAULT_PG_PORT)?,
                user: var("PG_USER").unwrap_or_else(|| DEFAULT_PG_USER.to_string()),
                password: var("PG_PASSWORD").filter(|p| !p.is_empty()),
                dbname: var("PG_DBNAME").unwrap_or_else(|| DEFAULT_PG_DBNAME.to_string()),
            },
            "sqlite" => ConnectionConfig::Sqlite {
                path: var("SQLITE_PATH").unwrap_or_else(|| DEFAULT_SQLITE_PATH.to_string()),
            },
            _ => {
                return Err(ConfigError::Invalid {
                    key: format!("{ENV_PREFIX}BACKEND"),
                    value: backend,
                    expected: "postgres or sqlite",
                })
            }
        };

        let defaults = ScenarioIterations::default();
        let iterations = ScenarioIterations {
            point_lookup: parse_or(&lookup, "ITER_POINT_LOOKUP", defaults.point_lookup)?,
            filtered_lookup: parse_or(&lookup, "ITER_FILTERED_LOOKUP", defaults.filtered_lookup)?,
            range_aggregation: parse_or(
                &lookup,
                "ITER_RANGE_AGGREGATION",
                defaults.range_aggregation,
            )?,
            insert: parse_or(&lookup, "ITER_INSERT", defaults.insert)?,
            conditional_update: parse_or(
                &lookup,
                "ITER_CONDITIONAL_UPDATE",
                defaults.conditional_update,
            )?,
        };

        let defaults = ConcurrencySettings::default();
        let concurrency = ConcurrencySettings {
            worker_counts: parse_list_or(&lookup, "WORKERS", defaults.worker_counts)?,
            ops_per_worker: parse_or(&lookup, "OPS_PER_WORKER", defaults.ops_per_worker)?,
        };

        Ok(Self {
            connection,
            rows: parse_or(&lookup, "ROWS", DEFAULT_ROWS)?,
            iterations,
            concurrency,
            output_dir: var("OUTPUT_DIR").unwrap_or_else(|| DEFAULT_OUTPUT_DIR.to_string()),
            log_level: parse_or(&lookup, "LOG_LEVEL", LevelFilter::Info)?,
            log_file: var("LOG_FILE").filter(|p| !p.is_empty()),
        })
    }
}

fn parse_or<F, T>(lookup: &F, name: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    let key = format!("{ENV_PREFIX}{name}");
    match lookup(&key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid {
            key,
            value: raw,
            expected: std::any::type_name::<T>(),
        }),
    }
}

/// Comma-separated list, e.g. `10,20,50`. Empty entries are an error.
fn parse_list_or<F, T>(lookup: &F, name: &str, default: Vec<T>) -> Result<Vec<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    let key = format!("{ENV_PREFIX}{name}");
    let Some(raw) = lookup(&key) else {
        return Ok(default);
    };
    raw.split(',')
        .map(|item| item.trim().parse())
        .collect::<Result<Vec<T>, _>>()
        .map_err(|_| ConfigError::Invalid {
            key,
            value: raw.clone(),
            expected: "a comma-separated list of numbers",
        })
}
