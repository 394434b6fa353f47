//! Per-task status polling schedules.

use std::sync::atomic::Ordering;

use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;

use crate::types::TaskKey;

use super::status::PollOutcome;
use super::{Pool, Poller};

impl Pool {
    /// Start polling a task's status
    ///
    /// Spawns one schedule that polls every `update_interval` and writes the
    /// task's counters every `sync_interval`. Calling it while a schedule is
    /// already running for the task has no effect. Returns whether a new
    /// schedule was started.
    pub fn begin_update_status(&self, key: TaskKey) -> bool {
        if !self.accepting_new.load(Ordering::SeqCst) {
            return false;
        }

        let (id, token) = {
            let mut pollers = self.lock_pollers();
            if pollers.contains_key(&key) {
                return false;
            }
            let id = self.next_poller_id.fetch_add(1, Ordering::Relaxed);
            let token = CancellationToken::new();
            pollers.insert(
                key,
                Poller {
                    id,
                    token: token.clone(),
                },
            );
            (id, token)
        };

        tracing::info!(task = %key, poller = id, "status polling started");

        let pool = self.clone();
        tokio::spawn(async move {
            pool.run_poller(key, id, token).await;
        });
        true
    }

    /// Stop polling a task's status
    ///
    /// Cancels both periodic activities; safe to call when nothing is
    /// running. A poll already in flight completes, but its reply is checked
    /// against the task's current state before being applied. Returns
    /// whether a schedule was stopped.
    pub fn end_update_status(&self, key: TaskKey) -> bool {
        self.end_poller(key, None)
    }

    /// Stop the schedule of `key`, but only if it is `poller` (any when None)
    pub(crate) fn end_poller(&self, key: TaskKey, poller: Option<u64>) -> bool {
        let removed = {
            let mut pollers = self.lock_pollers();
            match pollers.get(&key) {
                Some(running) if poller.is_none_or(|id| id == running.id) => pollers.remove(&key),
                _ => None,
            }
        };
        match removed {
            Some(running) => {
                running.token.cancel();
                tracing::info!(task = %key, poller = running.id, "status polling stopped");
                true
            }
            None => false,
        }
    }

    async fn run_poller(&self, key: TaskKey, id: u64, token: CancellationToken) {
        let update = self.config.polling.update_interval;
        let sync = self.config.polling.sync_interval;

        let mut poll = interval_at(Instant::now() + update, update);
        poll.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut sync_timer = interval_at(Instant::now() + sync, sync);
        sync_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = poll.tick() => {
                    if self.poll_once(key, Some(id)).await == PollOutcome::Stop {
                        break;
                    }
                }
                _ = sync_timer.tick() => {
                    self.sync_task(key).await;
                }
            }
        }

        self.end_poller(key, Some(id));
        tracing::debug!(task = %key, poller = id, "poller exited");
    }
}
