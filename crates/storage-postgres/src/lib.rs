//! Postgres sink for the inbound change processor: connection pool, per-table
//! schema descriptors, parameterized statement synthesis, and the writer.

pub mod error;
pub mod plan;
pub mod pool;
pub mod schema;
pub mod sink;

pub use error::{ErrorClass, StorageError};
pub use plan::{build_delete, build_upsert, SqlStatement, SqlValue, UpsertPlan};
pub use pool::{connect, PgStoreConfig};
pub use schema::{schema_for, TableSchema};
pub use sink::PgSink;
