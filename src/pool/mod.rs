//! Pool implementation split into focused submodules.
//!
//! The [`Pool`] struct and its methods are organized by domain:
//! - [`control`] - Task creation and start/pause/trash/restore/remove
//! - [`status`] - Applying status reports, committing transitions, persistence
//! - [`poller`] - Per-task polling schedules
//! - [`lifecycle`] - Startup loading and shutdown coordination
//!
//! All task and grouping state sits behind one [`std::sync::Mutex`] that is
//! never held across an `.await`. Remote calls are made with the lock
//! released, and their results are re-validated against the current state
//! before being applied.

mod control;
mod lifecycle;
mod poller;
mod status;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, MutexGuard, PoisonError};

use crate::config::Config;
use crate::db::Database;
use crate::error::Result;
use crate::events::{Event, EventBus, EventKind, SubscriptionId};
use crate::groups::{Group, Groups};
use crate::rpc::{Aria2Client, Engine, EngineClient};
use crate::task::{Task, TaskTable};
use crate::types::{GroupKey, TaskKey};

/// Title of the notification raised when a remote call fails
pub const NETWORK_ERROR_TITLE: &str = "Network Error";

/// Tasks and groupings, guarded together
pub(crate) struct PoolState {
    pub(crate) tasks: TaskTable,
    pub(crate) groups: Groups,
}

/// Handle of a running polling schedule
pub(crate) struct Poller {
    /// Distinguishes this schedule from later ones for the same task
    pub(crate) id: u64,
    pub(crate) token: tokio_util::sync::CancellationToken,
}

/// One connection to a download engine, with its tasks and groupings
/// (cloneable - all fields are Arc-wrapped)
#[derive(Clone)]
pub struct Pool {
    /// Database instance for persistence
    /// Public for integration tests to inspect stored tasks
    pub db: Arc<Database>,
    /// Typed engine calls
    pub(crate) engine: Engine,
    /// Configuration
    pub(crate) config: Arc<Config>,
    /// Observer registry and broadcast stream
    pub(crate) events: Arc<EventBus>,
    /// Task table and groupings
    pub(crate) state: Arc<std::sync::Mutex<PoolState>>,
    /// Running polling schedules by task
    pub(crate) pollers: Arc<std::sync::Mutex<HashMap<TaskKey, Poller>>>,
    /// Next poller id
    pub(crate) next_poller_id: Arc<AtomicU64>,
    /// Serializes database writes of task snapshots
    pub(crate) persist_lock: Arc<tokio::sync::Mutex<()>>,
    /// Set by status replies, cleared by failed polls
    pub(crate) connected: Arc<AtomicBool>,
    /// Cleared during shutdown
    pub(crate) accepting_new: Arc<AtomicBool>,
}

impl Pool {
    /// Open a pool talking JSON-RPC to the configured aria2 endpoint
    ///
    /// This initializes all core components:
    /// - Validates the configuration
    /// - Opens/creates the SQLite database and runs migrations
    /// - Seeds the configured categories into an empty database
    /// - Restores tasks into their groupings and resumes polling of tasks
    ///   the engine was holding
    pub async fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let client = Aria2Client::new(&config.engine)?;
        tracing::info!(name = %config.name, endpoint = %client.endpoint(), "opening pool");
        Self::with_engine(config, Arc::new(client)).await
    }

    /// Open a pool over any engine transport
    pub async fn with_engine(config: Config, client: Arc<dyn EngineClient>) -> Result<Self> {
        config.validate()?;
        let db = Database::new(&config.persistence.database_path).await?;

        let pool = Self {
            db: Arc::new(db),
            engine: Engine::new(client),
            state: Arc::new(std::sync::Mutex::new(PoolState {
                tasks: TaskTable::new(),
                groups: Groups::new(&config.name),
            })),
            config: Arc::new(config),
            events: Arc::new(EventBus::new()),
            pollers: Arc::new(std::sync::Mutex::new(HashMap::new())),
            next_poller_id: Arc::new(AtomicU64::new(1)),
            persist_lock: Arc::new(tokio::sync::Mutex::new(())),
            connected: Arc::new(AtomicBool::new(false)),
            accepting_new: Arc::new(AtomicBool::new(true)),
        };

        pool.load().await?;

        Ok(pool)
    }

    /// Display name of the pool (and of its queue)
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Get the current configuration
    pub fn config(&self) -> Arc<Config> {
        Arc::clone(&self.config)
    }

    /// Register a synchronous handler for one event kind
    ///
    /// Handlers run in subscription order after the pool has released its
    /// state lock, so they may call back into the pool's query methods.
    pub fn subscribe<F>(&self, kind: EventKind, handler: F) -> SubscriptionId
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.events.subscribe(kind, handler)
    }

    /// Remove a handler registered with [`Pool::subscribe`]
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.events.unsubscribe(id)
    }

    /// Async stream of every event
    ///
    /// A receiver that falls more than 1000 events behind gets
    /// `RecvError::Lagged`.
    pub fn event_receiver(&self) -> tokio::sync::broadcast::Receiver<Event> {
        self.events.receiver()
    }

    /// Snapshot of one task
    pub fn task(&self, key: TaskKey) -> Option<Task> {
        self.lock_state().tasks.get(key).cloned()
    }

    /// Snapshot of every task, ordered by key
    pub fn tasks(&self) -> Vec<Task> {
        let state = self.lock_state();
        let mut tasks: Vec<Task> = state.tasks.iter().cloned().collect();
        tasks.sort_by_key(Task::key);
        tasks
    }

    /// Tasks listed by a grouping, filtered by what the grouping admits
    pub fn tasks_in(&self, group: GroupKey) -> Vec<Task> {
        let state = self.lock_state();
        let Some(listing) = state.groups.get(group) else {
            return Vec::new();
        };
        listing
            .members()
            .filter_map(|key| state.tasks.get(key))
            .filter(|task| group.admits(task.status()))
            .cloned()
            .collect()
    }

    /// Queue, categories and dustbin, in display order
    pub fn groups(&self) -> Vec<Group> {
        self.lock_state().groups.iter().cloned().collect()
    }

    /// One grouping
    pub fn group(&self, key: GroupKey) -> Option<Group> {
        self.lock_state().groups.get(key).cloned()
    }

    /// Grouping currently listing a task
    pub fn group_of(&self, key: TaskKey) -> Option<GroupKey> {
        self.lock_state().groups.locate(key)
    }

    /// Whether a polling schedule is running for a task
    pub fn is_polling(&self, key: TaskKey) -> bool {
        self.lock_pollers().contains_key(&key)
    }

    /// Whether the last status poll reached the engine
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    pub(crate) fn lock_state(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn lock_pollers(&self) -> MutexGuard<'_, HashMap<TaskKey, Poller>> {
        self.pollers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
