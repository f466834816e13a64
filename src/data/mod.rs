//! Data layer module
//!
//! All persistence goes through [`Database`], a thin wrapper over a
//! SQLite connection pool.

mod database;
mod models;

pub use database::Database;
pub use models::*;
