//! Task control: create, start, pause, trash, restore and remove.
//!
//! Remote failures never surface from these methods. They turn the task's
//! status into [`Status::Error`] and raise a notification instead; the only
//! errors returned are unknown task keys, a pool that is shutting down, and
//! (for creation) invalid requests or a failed insert.

use std::sync::atomic::Ordering;

use crate::error::{Error, Result, TaskError};
use crate::rpc::AddRequest;
use crate::task::{NewTask, Task};
use crate::types::{CategoryKey, GroupKey, Status, TaskKey};

use super::{Pool, PoolState};

/// What `start` has to do for the task's current status
enum StartPlan {
    Unpause(String),
    Add(Result<AddRequest>),
}

impl Pool {
    /// Create an inactive task in the queue
    ///
    /// A task filed under a category with a directory gets the engine's
    /// `dir` option defaulted to that directory.
    ///
    /// # Errors
    ///
    /// Invalid request, unknown category, pool shutting down, or the task
    /// could not be stored.
    pub async fn create_task(&self, mut new: NewTask) -> Result<TaskKey> {
        if !self.accepting_new.load(Ordering::SeqCst) {
            return Err(Error::ShuttingDown);
        }
        new.validate()?;

        let category = {
            let state = self.lock_state();
            let category = match new.category {
                Some(category) if state.groups.has_category(category) => category,
                Some(category) => return Err(TaskError::UnknownCategory(category).into()),
                None => state
                    .groups
                    .default_category()
                    .ok_or_else(|| Error::Other("pool has no categories".to_string()))?,
            };
            if let Some(directory) = state
                .groups
                .get(GroupKey::Category(category))
                .and_then(|group| group.directory())
            {
                new.options
                    .entry("dir".to_string())
                    .or_insert_with(|| directory.display().to_string());
            }
            category
        };

        let mut task = Task::create(TaskKey(0), new, category);
        task.key = {
            let _guard = self.persist_lock.lock().await;
            self.db.insert_task(&task).await?
        };
        let key = task.key;

        tracing::info!(task = %key, name = %task.name(), kind = ?task.kind(), category = %category, "task added");

        {
            let mut state = self.lock_state();
            let PoolState { tasks, groups } = &mut *state;
            tasks.insert(task);
            let mut events = Vec::new();
            groups.add_task(GroupKey::Queue, key, &mut events);
            self.events.queue(events);
        }
        self.events.deliver();

        Ok(key)
    }

    /// Submit or resume a task
    ///
    /// - Paused: `unpause` on the engine, then Active.
    /// - Inactive or Error: kind-specific add; the returned identifier is
    ///   tracked, status becomes Active, polling begins and the engine
    ///   session is fetched.
    /// - Any other status: no-op.
    pub async fn start(&self, key: TaskKey) -> Result<()> {
        if !self.accepting_new.load(Ordering::SeqCst) {
            return Err(Error::ShuttingDown);
        }

        let plan = {
            let state = self.lock_state();
            let task = state.tasks.get(key).ok_or(Error::NotFound(key))?;
            match (task.status, task.gid.clone()) {
                (Status::Paused, Some(gid)) => StartPlan::Unpause(gid),
                (Status::Paused | Status::Inactive | Status::Error, _) => {
                    StartPlan::Add(task.add_request())
                }
                (status, _) => {
                    tracing::debug!(task = %key, %status, "start ignored");
                    return Ok(());
                }
            }
        };

        match plan {
            StartPlan::Unpause(gid) => self.unpause(key, gid).await,
            StartPlan::Add(request) => self.add(key, request).await,
        }
        Ok(())
    }

    async fn unpause(&self, key: TaskKey, gid: String) {
        let paused = |task: &Task| task.status == Status::Paused && task.gid.as_deref() == Some(gid.as_str());

        match self.engine.unpause(&gid).await {
            Ok(()) => {
                let applied = self
                    .commit(key, |task| {
                        if !paused(task) {
                            return false;
                        }
                        task.status = Status::Active;
                        true
                    })
                    .await;
                if applied.is_none() {
                    tracing::debug!(task = %key, "task changed while resuming; ignoring reply");
                }
            }
            Err(e) => self.fail(key, paused, &e, "unpause").await,
        }
    }

    async fn add(&self, key: TaskKey, request: Result<AddRequest>) {
        let addable = |task: &Task| matches!(task.status, Status::Inactive | Status::Error | Status::Paused);

        let result = match request {
            Ok(request) => self.engine.add(request).await,
            Err(e) => Err(e),
        };

        let gid = match result {
            Ok(gid) => gid,
            Err(e) => {
                self.fail(key, addable, &e, "add").await;
                return;
            }
        };

        let applied = self
            .commit(key, |task| {
                if !addable(task) {
                    return false;
                }
                task.gid = Some(gid.clone());
                task.session_id = None;
                task.status = Status::Active;
                true
            })
            .await;

        if applied.is_none() {
            // Trashed or removed while the add was in flight: the engine
            // download has no task left to track it
            tracing::warn!(task = %key, gid = %gid, "task changed while adding; removing engine download");
            if let Err(e) = self.engine.remove(&gid).await {
                tracing::warn!(task = %key, gid = %gid, error = %e, "failed to remove orphaned engine download");
            }
            return;
        }

        tracing::info!(task = %key, gid = %gid, "task submitted to engine");
        self.fetch_session(key, &gid).await;
    }

    /// Pause an active or waiting task; any other status is a no-op
    pub async fn pause(&self, key: TaskKey) -> Result<()> {
        let gid = {
            let state = self.lock_state();
            let task = state.tasks.get(key).ok_or(Error::NotFound(key))?;
            match (task.status, task.gid.clone()) {
                (Status::Active | Status::Waiting, Some(gid)) => gid,
                (status, _) => {
                    tracing::debug!(task = %key, %status, "pause ignored");
                    return Ok(());
                }
            }
        };

        let pausable = |task: &Task| {
            matches!(task.status, Status::Active | Status::Waiting) && task.gid.as_deref() == Some(gid.as_str())
        };

        match self.engine.pause(&gid).await {
            Ok(()) => {
                self.commit(key, |task| {
                    if !pausable(task) {
                        return false;
                    }
                    task.status = Status::Paused;
                    true
                })
                .await;
            }
            Err(e) => self.fail(key, pausable, &e, "pause").await,
        }
        Ok(())
    }

    /// Move a task to the dustbin
    ///
    /// Tasks the engine holds are removed from it first; complete, failed
    /// and inactive tasks move immediately. Trashing a trashed task is a
    /// no-op.
    pub async fn trash(&self, key: TaskKey) -> Result<()> {
        let gid = {
            let state = self.lock_state();
            let task = state.tasks.get(key).ok_or(Error::NotFound(key))?;
            match task.status {
                Status::Trashed => {
                    tracing::debug!(task = %key, "already trashed");
                    return Ok(());
                }
                Status::Active | Status::Waiting | Status::Paused => task.gid.clone(),
                Status::Complete | Status::Error | Status::Inactive => None,
            }
        };

        let Some(gid) = gid else {
            self.commit(key, |task| {
                if matches!(task.status, Status::Trashed) || task.status.is_tracked() {
                    return false;
                }
                task.status = Status::Trashed;
                true
            })
            .await;
            return Ok(());
        };

        let held = |task: &Task| task.status.is_tracked() && task.gid.as_deref() == Some(gid.as_str());

        match self.engine.remove(&gid).await {
            Ok(()) => {
                let applied = self
                    .commit(key, |task| {
                        if !held(task) {
                            return false;
                        }
                        task.status = Status::Trashed;
                        true
                    })
                    .await;
                if applied.is_none() {
                    tracing::debug!(task = %key, "task already left the engine; nothing to trash");
                }
            }
            Err(e) => self.fail(key, held, &e, "remove").await,
        }
        Ok(())
    }

    /// Bring a trashed task back
    ///
    /// A fully downloaded task returns to its category as Complete; anything
    /// else returns to the queue as Inactive, ready to be started again.
    pub async fn restore(&self, key: TaskKey) -> Result<()> {
        if self.lock_state().tasks.get(key).is_none() {
            return Err(Error::NotFound(key));
        }

        let restored = self
            .commit(key, |task| {
                if task.status != Status::Trashed {
                    return false;
                }
                if task.is_complete() {
                    task.status = Status::Complete;
                } else {
                    task.status = Status::Inactive;
                    task.detach();
                }
                true
            })
            .await;

        match restored {
            Some(status) => tracing::info!(task = %key, %status, "task restored"),
            None => tracing::debug!(task = %key, "restore ignored; task is not trashed"),
        }
        Ok(())
    }

    /// Delete a trashed task permanently; any other status is a no-op
    pub async fn remove(&self, key: TaskKey) -> Result<()> {
        {
            let mut state = self.lock_state();
            let PoolState { tasks, groups } = &mut *state;
            let task = tasks.get(key).ok_or(Error::NotFound(key))?;
            if task.status != Status::Trashed {
                tracing::debug!(task = %key, status = %task.status, "remove ignored");
                return Ok(());
            }
            tasks.remove(key);
            let mut events = Vec::new();
            groups.forget(key, &mut events);
            self.events.queue(events);
        }

        self.end_update_status(key);
        self.events.deliver();

        let _guard = self.persist_lock.lock().await;
        if let Err(e) = self.db.delete_task(key).await {
            tracing::error!(task = %key, error = %e, "failed to delete task");
        }
        tracing::info!(task = %key, "task removed");
        Ok(())
    }

    /// Register a category at runtime
    pub async fn add_category(&self, name: &str, directory: Option<&std::path::Path>) -> Result<CategoryKey> {
        let key = self.db.insert_category(name, directory).await?;
        {
            let mut state = self.lock_state();
            let mut events = Vec::new();
            state.groups.add_category(
                key,
                name.to_string(),
                directory.map(std::path::Path::to_path_buf),
                &mut events,
            );
            self.events.queue(events);
        }
        self.events.deliver();
        Ok(key)
    }

    /// Rename a category
    pub async fn rename_category(&self, key: CategoryKey, name: &str) -> Result<()> {
        if !self.lock_state().groups.has_category(key) {
            return Err(TaskError::UnknownCategory(key).into());
        }
        self.db.rename_category(key, name).await?;
        {
            let mut state = self.lock_state();
            let mut events = Vec::new();
            state.groups.rename_category(key, name.to_string(), &mut events);
            self.events.queue(events);
        }
        self.events.deliver();
        Ok(())
    }
}
