//! Database layer for the Hearth hub.
//!
//! Provides SQLite connection pooling (via `r2d2`), WAL-mode initialization,
//! embedded SQL migrations, and schema provisioning. Every table Hearth
//! persists to is created through versioned migrations managed by this crate,
//! and provisioning is idempotent: running the server against an existing
//! database applies only what is missing.
//!
//! # Design decisions
//!
//! - **SQLite with WAL mode**: a single-process hub needs no external
//!   database server. WAL allows concurrent readers with a single writer,
//!   which matches the ingest-heavy, query-light access pattern.
//! - **`r2d2` connection pool**: bounded connection reuse without manual
//!   lifetime management; ingest persistence and HTTP queries share the pool.
//! - **Embedded migrations**: SQL files are compiled into the binary via
//!   `include_str!`, ensuring migrations ship with the server and cannot
//!   drift from the code that depends on them.

mod migrations;
mod pool;

pub use migrations::{run_migrations, MigrationError};
pub use pool::{create_pool, DbPool, DbRuntimeSettings, PoolError};
