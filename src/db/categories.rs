//! Category CRUD operations.

use std::path::Path;

use crate::error::DatabaseError;
use crate::types::CategoryKey;
use crate::{Error, Result};

use super::{CategoryRow, Database};

impl Database {
    /// Insert a new category
    pub async fn insert_category(&self, name: &str, directory: Option<&Path>) -> Result<CategoryKey> {
        let now = chrono::Utc::now().timestamp();
        let directory = directory.map(|d| d.to_string_lossy().into_owned());

        let result = sqlx::query("INSERT INTO categories (name, directory, created_at) VALUES (?, ?, ?)")
            .bind(name)
            .bind(directory)
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to insert category: {}",
                    e
                )))
            })?;

        Ok(CategoryKey(result.last_insert_rowid()))
    }

    /// List all categories, oldest first
    pub async fn list_categories(&self) -> Result<Vec<CategoryRow>> {
        let rows = sqlx::query_as::<_, CategoryRow>(
            "SELECT id, name, directory, created_at FROM categories ORDER BY id ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to list categories: {}",
                e
            )))
        })?;

        Ok(rows)
    }

    /// Rename a category
    pub async fn rename_category(&self, key: CategoryKey, name: &str) -> Result<()> {
        let result = sqlx::query("UPDATE categories SET name = ? WHERE id = ?")
            .bind(name)
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to rename category: {}",
                    e
                )))
            })?;

        if result.rows_affected() == 0 {
            return Err(Error::Database(DatabaseError::NotFound(format!(
                "category {}",
                key
            ))));
        }

        Ok(())
    }
}
