//! Database layer for aria-pool
//!
//! Handles SQLite persistence for tasks and categories.
//!
//! ## Submodules
//!
//! Methods on [`Database`] are organized by domain:
//! - [`migrations`] — Database lifecycle, schema migrations
//! - [`tasks`] — Task CRUD
//! - [`categories`] — Category CRUD

use sqlx::{FromRow, sqlite::SqlitePool};

mod categories;
mod migrations;
mod tasks;

/// Task record from database
///
/// URIs and options are stored as JSON text.
#[derive(Debug, Clone, FromRow)]
pub struct TaskRow {
    /// Unique database ID
    pub id: i64,
    /// Display name
    pub name: String,
    /// Kind code (0=plain, 1=bittorrent, 2=metalink)
    pub kind: i32,
    /// Status code (see [`Status::to_i32`](crate::types::Status::to_i32))
    pub status: i32,
    /// JSON array of source URIs
    pub uris: String,
    /// Bytes downloaded so far
    pub completed_length: i64,
    /// Total size in bytes
    pub total_length: i64,
    /// Engine identifier, if submitted
    pub gid: Option<String>,
    /// Torrent or metalink content
    pub metafile: Option<Vec<u8>>,
    /// JSON object of engine options
    pub options: String,
    /// Engine session the download was added in
    pub session_id: Option<String>,
    /// Owning category
    pub category_id: i64,
    /// Whether the name was taken from an engine report (0 = no, 1 = yes)
    pub renamed: i32,
    /// Unix timestamp when the task was created
    pub created_at: i64,
    /// Unix timestamp of the last write
    pub updated_at: i64,
}

/// Category record from database
#[derive(Debug, Clone, FromRow)]
pub struct CategoryRow {
    /// Unique database ID
    pub id: i64,
    /// Display name
    pub name: String,
    /// Directory completed downloads are saved to
    pub directory: Option<String>,
    /// Unix timestamp when the category was created
    pub created_at: i64,
}

/// Database handle for aria-pool
pub struct Database {
    pool: SqlitePool,
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
