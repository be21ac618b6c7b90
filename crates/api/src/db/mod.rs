//! Shared database schema, migrations, and query builders.
//!
//! Builders return `(sql, values)` pairs; the server binds the values to
//! rusqlite statements.

pub mod invites;
pub mod marketplaces;
pub mod migrations;
pub mod sales;
pub mod sessions;
pub mod tables;
pub mod users;

// Re-export tables for convenience
pub use tables::*;

/// A built statement: SQL text plus its positional values.
pub type Built = (String, sea_query::Values);
