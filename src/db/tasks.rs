//! Task CRUD operations.

use std::collections::BTreeMap;

use crate::error::DatabaseError;
use crate::task::Task;
use crate::types::{CategoryKey, Status, TaskKey, TaskKind};
use crate::{Error, Result};

use super::{Database, TaskRow};

impl Database {
    /// Insert a new task record
    ///
    /// The task's own key is ignored; the key assigned by the database is
    /// returned.
    pub async fn insert_task(&self, task: &Task) -> Result<TaskKey> {
        let now = chrono::Utc::now().timestamp();
        let uris = serde_json::to_string(&task.uris)?;
        let options = serde_json::to_string(&task.options)?;

        let result = sqlx::query(
            r#"
            INSERT INTO tasks (
                name, kind, status, uris, completed_length, total_length,
                gid, metafile, options, session_id, category_id, renamed,
                created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&task.name)
        .bind(task.kind.to_i32())
        .bind(task.status.to_i32())
        .bind(uris)
        .bind(to_db_length(task.completed_length))
        .bind(to_db_length(task.total_length))
        .bind(&task.gid)
        .bind(&task.metafile)
        .bind(options)
        .bind(&task.session_id)
        .bind(task.category)
        .bind(task.renamed as i32)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to insert task: {}",
                e
            )))
        })?;

        Ok(TaskKey(result.last_insert_rowid()))
    }

    /// Get a task by key
    pub async fn get_task(&self, key: TaskKey) -> Result<Option<TaskRow>> {
        let row = sqlx::query_as::<_, TaskRow>(
            r#"
            SELECT
                id, name, kind, status, uris, completed_length, total_length,
                gid, metafile, options, session_id, category_id, renamed,
                created_at, updated_at
            FROM tasks
            WHERE id = ?
            "#,
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to get task: {}",
                e
            )))
        })?;

        Ok(row)
    }

    /// List all tasks, oldest first
    pub async fn list_tasks(&self) -> Result<Vec<TaskRow>> {
        let rows = sqlx::query_as::<_, TaskRow>(
            r#"
            SELECT
                id, name, kind, status, uris, completed_length, total_length,
                gid, metafile, options, session_id, category_id, renamed,
                created_at, updated_at
            FROM tasks
            ORDER BY id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to list tasks: {}",
                e
            )))
        })?;

        Ok(rows)
    }

    /// Write the mutable state of a task
    pub async fn update_task(&self, task: &Task) -> Result<()> {
        let now = chrono::Utc::now().timestamp();

        sqlx::query(
            r#"
            UPDATE tasks SET
                name = ?, status = ?, completed_length = ?, total_length = ?,
                gid = ?, session_id = ?, renamed = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&task.name)
        .bind(task.status.to_i32())
        .bind(to_db_length(task.completed_length))
        .bind(to_db_length(task.total_length))
        .bind(&task.gid)
        .bind(&task.session_id)
        .bind(task.renamed as i32)
        .bind(now)
        .bind(task.key)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to update task: {}",
                e
            )))
        })?;

        Ok(())
    }

    /// Delete a task
    pub async fn delete_task(&self, key: TaskKey) -> Result<()> {
        sqlx::query("DELETE FROM tasks WHERE id = ?")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to delete task: {}",
                    e
                )))
            })?;

        Ok(())
    }
}

impl TryFrom<TaskRow> for Task {
    type Error = Error;

    fn try_from(row: TaskRow) -> Result<Self> {
        let kind = TaskKind::from_i32(row.kind).ok_or_else(|| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "task {} has unknown kind code {}",
                row.id, row.kind
            )))
        })?;
        let uris: Vec<String> = serde_json::from_str(&row.uris)?;
        let options: BTreeMap<String, String> = serde_json::from_str(&row.options)?;

        Ok(Task {
            key: TaskKey(row.id),
            name: row.name,
            kind,
            status: Status::from_i32(row.status),
            uris,
            completed_length: from_db_length(row.completed_length),
            total_length: from_db_length(row.total_length),
            download_speed: 0,
            upload_speed: 0,
            connections: 0,
            gid: row.gid.filter(|gid| !gid.is_empty()),
            metafile: row.metafile,
            options,
            session_id: row.session_id,
            category: CategoryKey(row.category_id),
            renamed: row.renamed != 0,
            revision: 0,
        })
    }
}

fn to_db_length(length: u64) -> i64 {
    i64::try_from(length).unwrap_or(i64::MAX)
}

fn from_db_length(length: i64) -> u64 {
    u64::try_from(length).unwrap_or(0)
}
