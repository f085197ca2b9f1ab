//! Baseline vs candidate index benchmark.
//!
//! Two structurally identical `orders` tables are filled with the same rows.
//! The candidate table then receives extra indexes and storage changes, and
//! both tables are measured with:
//! - **Serial scenarios**: five OLTP statements timed on one connection
//! - **Concurrent load**: a read/write/update mix from many workers at once
//!
//! Runs against PostgreSQL or a SQLite database file.
//!
//! Run benchmark: `cargo run --release`
//! Run tests: `cargo test`

pub mod concurrent;
pub mod dialect;
pub mod error;
pub mod executor;
pub mod optimizer;
pub mod report;
pub mod sampler;
pub mod scenario;
pub mod schema;
