//! Data models
//!
//! Rust structs representing database rows.

use serde::{Deserialize, Serialize};

/// A local user, created on first login through the identity provider
///
/// Rows are never updated or deleted by the login flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    /// Local primary key
    pub id: i64,
    /// User id assigned by the identity provider
    pub external_id: String,
}
