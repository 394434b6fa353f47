//! Startup loading and shutdown coordination.

use std::path::PathBuf;
use std::sync::atomic::Ordering;

use crate::Result;
use crate::task::Task;
use crate::types::TaskKey;

use super::{Pool, PoolState};

impl Pool {
    /// Load categories and tasks from the database
    ///
    /// Seeds the configured categories into an empty database, places every
    /// task in the grouping its status calls for and resumes polling of the
    /// tasks the engine was holding.
    pub(crate) async fn load(&self) -> Result<()> {
        let mut categories = self.db.list_categories().await?;
        if categories.is_empty() {
            for category in self.config.seed_categories() {
                let key = self
                    .db
                    .insert_category(&category.name, category.directory.as_deref())
                    .await?;
                tracing::info!(category = %key, name = %category.name, "category created");
            }
            categories = self.db.list_categories().await?;
        }

        let mut tasks = Vec::new();
        for row in self.db.list_tasks().await? {
            let id = row.id;
            match Task::try_from(row) {
                Ok(task) => tasks.push(task),
                Err(e) => tracing::error!(task = id, error = %e, "skipping unreadable task"),
            }
        }

        let tracked: Vec<TaskKey> = {
            let mut state = self.lock_state();
            let PoolState {
                tasks: table,
                groups,
            } = &mut *state;
            // Nobody can be subscribed yet
            let mut events = Vec::new();
            for row in categories {
                groups.add_category(
                    row.id.into(),
                    row.name,
                    row.directory.map(PathBuf::from),
                    &mut events,
                );
            }
            for task in tasks {
                groups.add_task(task.group(), task.key(), &mut events);
                table.insert(task);
            }
            table.tracked()
        };

        tracing::info!(
            tasks = self.lock_state().tasks.len(),
            resumed = tracked.len(),
            "pool loaded"
        );

        for key in tracked {
            self.begin_update_status(key);
        }

        Ok(())
    }

    /// Gracefully shut down the pool
    ///
    /// Stops accepting new work, cancels every polling schedule and writes
    /// the final state of every task. Tasks keep running on the engine and
    /// are polled again the next time the pool is opened.
    pub async fn shutdown(&self) -> Result<()> {
        tracing::info!("Initiating graceful shutdown");

        self.accepting_new.store(false, Ordering::SeqCst);

        let pollers: Vec<_> = self.lock_pollers().drain().collect();
        for (key, poller) in &pollers {
            poller.token.cancel();
            tracing::debug!(task = %key, poller = poller.id, "status polling stopped for shutdown");
        }
        tracing::info!(stopped = pollers.len(), "Stopped all status polling");

        let keys: Vec<TaskKey> = self.lock_state().tasks.iter().map(Task::key).collect();
        for key in keys {
            self.persist(key).await;
        }
        tracing::info!("Final state persisted to database");

        tracing::info!("Graceful shutdown complete");
        Ok(())
    }
}
