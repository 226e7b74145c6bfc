//! `db` crate — pure persistence layer.
//!
//! Owns the Postgres side of the execution store: the connection pool and
//! embedded migrations, one row struct per table, and the repository
//! functions the engine's `PgStore` calls. Rows carry no domain behaviour.

pub mod error;
pub mod pool;
pub mod repository;
pub mod models;

pub use error::DbError;
pub use pool::{DbPool, PoolSettings};
