//! Indexed store tier: a transactional SQLite table keyed by an autoincrement id.

pub mod executor;
pub mod indexed_part_store;
pub mod models;
pub mod pool;
pub mod schema;

pub use executor::{DbExecutor, DieselSqliteExecutor};
pub use indexed_part_store::DieselIndexedPartStore;
pub use pool::{init_db_pool, DbPool};
