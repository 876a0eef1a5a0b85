//! Database row models.
//!
//! Each submodule contains a `FromRow` struct matching the database row and
//! its conversion into the core domain record.

pub mod scenario;
