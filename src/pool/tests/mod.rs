use super::status::PollOutcome;
use super::test_helpers::*;
use super::*;
use crate::error::{Error, TaskError};
use crate::rpc::methods;
use crate::task::NewTask;
use crate::types::{CategoryKey, Status};
use serde_json::json;
use std::time::Duration;

mod status;

const SAMPLE_URI: &str = "http://example.com/files/ubuntu.iso";

/// The category seeded into a fresh database
const DEFAULT_CATEGORY: CategoryKey = CategoryKey(1);

/// Create a plain task and submit it; the engine answers with `gid`
async fn started_task(pool: &Pool, engine: &MockEngine, gid: &str) -> TaskKey {
    let key = pool.create_task(NewTask::uri([SAMPLE_URI])).await.unwrap();
    engine.push(methods::ADD_URI, json!(gid));
    pool.start(key).await.unwrap();
    assert_eq!(pool.task(key).unwrap().status(), Status::Active);
    key
}

/// Drive one manual poll answered with `reply`
async fn poll_with(pool: &Pool, engine: &MockEngine, key: TaskKey, reply: serde_json::Value) -> PollOutcome {
    engine.push(methods::TELL_STATUS, reply);
    pool.poll_once(key, None).await
}

fn count_events(events: &std::sync::Mutex<Vec<Event>>, wanted: &Event) -> usize {
    events.lock().unwrap().iter().filter(|e| *e == wanted).count()
}

fn notifications(events: &std::sync::Mutex<Vec<Event>>) -> Vec<Event> {
    events
        .lock()
        .unwrap()
        .iter()
        .filter(|e| e.kind() == EventKind::Notification)
        .cloned()
        .collect()
}
