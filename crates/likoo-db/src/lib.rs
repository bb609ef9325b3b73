//! Database layer for Likoo.
//!
//! Provides the SQLite connection pool (via `r2d2`) and the embedded,
//! versioned schema migrations. Every table owned by the persistence
//! collaborator is created here.
//!
//! SQLite runs in WAL mode so history reads do not block message inserts.
//! Migrations are compiled into the binary with `include_str!` and applied
//! in order at startup.

mod migrations;
mod pool;

pub use migrations::{run_migrations, MigrationError};
pub use pool::{create_pool, DbPool, DbRuntimeSettings, PoolError};
