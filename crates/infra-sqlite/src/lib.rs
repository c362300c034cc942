// Pulse Infrastructure - SQLite Adapter
// Implements: KeyValueStore

mod connection;
mod error;
mod kv_store;
mod migration;

pub use connection::create_pool;
pub use kv_store::SqliteKeyValueStore;
pub use migration::run_migrations;

// Note: sqlx::Error conversion is handled by error::map_sqlx_error
// due to Rust's orphan rules (cannot implement From<sqlx::Error> for AppError here)
