//! Committing task changes, status polls and persistence.

use std::sync::atomic::Ordering;

use crate::error::Error;
use crate::events::Event;
use crate::task::Task;
use crate::types::{Status, TaskKey};

use super::{NETWORK_ERROR_TITLE, Pool, PoolState};

/// Whether a polling schedule keeps running after a tick
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum PollOutcome {
    Continue,
    Stop,
}

impl Pool {
    /// Apply `change` to a task and commit the result
    ///
    /// `change` runs under the state lock and returns false to leave the
    /// task untouched (e.g. when the task moved on while a remote call was
    /// in flight). When it returns true the task is moved to the grouping its
    /// status calls for and a `TaskChanged` event is emitted. Entering a
    /// tracked status starts polling and leaving one stops it. Status and
    /// identity changes are written to the database.
    ///
    /// The events are queued before the state lock is released, so
    /// observers see transitions in the order they were applied.
    ///
    /// Returns the committed status, or `None` if nothing was applied.
    pub(crate) async fn commit<F>(&self, key: TaskKey, change: F) -> Option<Status>
    where
        F: FnOnce(&mut Task) -> bool,
    {
        let (previous, status, changed_record) = {
            let mut state = self.lock_state();
            let PoolState { tasks, groups } = &mut *state;
            let task = tasks.get_mut(key)?;

            let before = (task.status, task.gid.clone(), task.renamed);
            if !change(task) {
                return None;
            }
            if !task.status.is_tracked() {
                task.clear_rates();
            }

            let changed_record = before != (task.status, task.gid.clone(), task.renamed);
            if before.0 != task.status || before.1 != task.gid {
                task.revision = task.revision.wrapping_add(1);
            }
            if before.0 != task.status {
                tracing::debug!(task = %key, from = %before.0, to = %task.status, "task status changed");
            }

            let group = task.group();
            let mut events = Vec::new();
            groups.move_task(key, group, &mut events);
            events.push(Event::TaskChanged { group, task: key });
            self.events.queue(events);

            (before.0, task.status, changed_record)
        };

        self.events.deliver();

        // A reply applied after `end_update_status` must not restart polling
        if !status.is_tracked() {
            self.end_update_status(key);
        } else if !previous.is_tracked() {
            self.begin_update_status(key);
        }

        if changed_record {
            self.persist(key).await;
        }

        Some(status)
    }

    /// Turn a failed remote call into the Error status plus a notification
    ///
    /// Nothing happens when `still_valid` rejects the task's current state.
    pub(crate) async fn fail<G>(&self, key: TaskKey, still_valid: G, error: &Error, action: &str)
    where
        G: FnOnce(&Task) -> bool,
    {
        tracing::warn!(task = %key, action, error = %error, "remote call failed");

        let applied = self
            .commit(key, |task| {
                if !still_valid(task) {
                    return false;
                }
                task.status = Status::Error;
                true
            })
            .await;

        match applied {
            Some(_) => self.notify(Some(key), error),
            None => {
                tracing::debug!(task = %key, action, "task moved on before failure arrived; ignoring")
            }
        }
    }

    /// Emit a one-shot network error notification
    pub(crate) fn notify(&self, task: Option<TaskKey>, error: &Error) {
        self.events.emit(Event::Notification {
            task,
            title: NETWORK_ERROR_TITLE.to_string(),
            message: error.notification_message(),
        });
    }

    /// One status poll for a task
    ///
    /// `poller` identifies the schedule running the poll; a task found in a
    /// state that is not polled only ends that schedule.
    ///
    /// The reply is applied only if the task has not changed status or
    /// engine identifier since the request went out. A pause, trash or
    /// resubmission committed meanwhile wins over whatever the engine said
    /// before it.
    pub(crate) async fn poll_once(&self, key: TaskKey, poller: Option<u64>) -> PollOutcome {
        let issued = {
            let state = self.lock_state();
            state
                .tasks
                .get(key)
                .filter(|task| task.status.is_tracked())
                .and_then(|task| task.gid.clone().map(|gid| (gid, task.revision)))
        };
        let Some((gid, revision)) = issued else {
            self.end_poller(key, poller);
            return PollOutcome::Stop;
        };
        let unchanged = |task: &Task| task.revision == revision && task.gid.as_deref() == Some(gid.as_str());

        match self.engine.tell_status(&gid).await {
            Ok(report) => {
                self.connected.store(true, Ordering::SeqCst);

                if report.gid.as_deref().is_some_and(|reported| reported != gid) {
                    tracing::warn!(task = %key, gid = %gid, reported = ?report.gid, "status report names another download; ignoring");
                    return self.continue_if_tracked(key);
                }

                let applied = self
                    .commit(key, |task| {
                        if !unchanged(task) {
                            return false;
                        }
                        match task.apply_report(&report) {
                            Some(status) => task.status = status,
                            None => tracing::debug!(
                                task = %key,
                                status = %report.status,
                                "unknown engine status; keeping current status"
                            ),
                        }
                        true
                    })
                    .await;

                if applied == Some(Status::Error) {
                    tracing::warn!(
                        task = %key,
                        gid = %gid,
                        error = report.error_message.as_deref().unwrap_or("unknown"),
                        "engine reported download error"
                    );
                }

                match applied {
                    Some(status) if status.is_tracked() => PollOutcome::Continue,
                    Some(_) => PollOutcome::Stop,
                    None => {
                        tracing::debug!(task = %key, gid = %gid, "discarding stale status report");
                        self.continue_if_tracked(key)
                    }
                }
            }
            Err(e) => {
                self.connected.store(false, Ordering::SeqCst);
                self.fail(key, unchanged, &e, "tellStatus").await;
                self.continue_if_tracked(key)
            }
        }
    }

    fn continue_if_tracked(&self, key: TaskKey) -> PollOutcome {
        let tracked = self
            .lock_state()
            .tasks
            .get(key)
            .is_some_and(|task| task.status.is_tracked());
        if tracked {
            PollOutcome::Continue
        } else {
            PollOutcome::Stop
        }
    }

    /// Periodic write of a tracked task's byte counters
    pub(crate) async fn sync_task(&self, key: TaskKey) {
        tracing::trace!(task = %key, "periodic task sync");
        self.persist(key).await;
    }

    /// Write the current snapshot of a task
    ///
    /// Writes are serialized and the snapshot is taken after acquiring the
    /// write lock, so the last write always carries the latest state.
    /// Failures are logged and never change the task.
    pub(crate) async fn persist(&self, key: TaskKey) {
        let _guard = self.persist_lock.lock().await;
        let snapshot = {
            let state = self.lock_state();
            state.tasks.get(key).cloned()
        };
        let Some(snapshot) = snapshot else {
            return;
        };
        if let Err(e) = self.db.update_task(&snapshot).await {
            tracing::error!(task = %key, error = %e, "failed to persist task");
        }
    }

    /// Fetch and store the engine session of a freshly added download
    ///
    /// Best effort: a failure raises a notification but leaves the status
    /// alone.
    pub(crate) async fn fetch_session(&self, key: TaskKey, gid: &str) {
        match self.engine.session_info(gid).await {
            Ok(info) => {
                let stored = {
                    let mut state = self.lock_state();
                    match state.tasks.get_mut(key) {
                        Some(task) if task.gid.as_deref() == Some(gid) => {
                            task.session_id = Some(info.session_id);
                            true
                        }
                        _ => false,
                    }
                };
                if stored {
                    self.persist(key).await;
                }
            }
            Err(e) => {
                tracing::warn!(task = %key, gid, error = %e, "failed to fetch session id");
                self.notify(Some(key), &e);
            }
        }
    }
}
