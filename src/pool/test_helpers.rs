//! Shared test helpers: a scripted engine and pools backed by a temp database.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tempfile::tempdir;
use tokio::sync::Notify;

use crate::config::Config;
use crate::error::{Result, RpcError};
use crate::events::{Event, EventKind};
use crate::pool::Pool;
use crate::rpc::{EngineClient, methods};

/// One scripted reply
#[derive(Clone, Debug)]
pub(crate) enum Reply {
    Ok(Value),
    Fault(String),
}

/// Engine double: replies are scripted per method, every call is recorded
#[derive(Default)]
pub(crate) struct MockEngine {
    scripted: Mutex<HashMap<String, VecDeque<Reply>>>,
    defaults: Mutex<HashMap<String, Reply>>,
    gates: Mutex<HashMap<String, Arc<Notify>>>,
    calls: Mutex<Vec<(String, Vec<Value>)>>,
}

impl MockEngine {
    /// Engine answering control calls with "OK" and session queries with a
    /// fixed session id; adds and status queries must be scripted
    pub(crate) fn new() -> Arc<Self> {
        let engine = Arc::new(Self::default());
        for method in [methods::PAUSE, methods::UNPAUSE, methods::REMOVE] {
            engine.set_default(method, json!("OK"));
        }
        engine.set_default(methods::GET_SESSION_INFO, json!({"sessionId": "session-1"}));
        engine
    }

    /// Answer the next call of `method` with `value`
    pub(crate) fn push(&self, method: &str, value: Value) {
        self.push_reply(method, Reply::Ok(value));
    }

    /// Fail the next call of `method` with an engine fault
    pub(crate) fn push_fault(&self, method: &str, message: &str) {
        self.push_reply(method, Reply::Fault(message.to_string()));
    }

    fn push_reply(&self, method: &str, reply: Reply) {
        self.scripted
            .lock()
            .unwrap()
            .entry(method.to_string())
            .or_default()
            .push_back(reply);
    }

    /// Answer every unscripted call of `method` with `value`
    pub(crate) fn set_default(&self, method: &str, value: Value) {
        self.defaults
            .lock()
            .unwrap()
            .insert(method.to_string(), Reply::Ok(value));
    }

    /// Fail every unscripted call of `method`
    pub(crate) fn set_default_fault(&self, method: &str, message: &str) {
        self.defaults
            .lock()
            .unwrap()
            .insert(method.to_string(), Reply::Fault(message.to_string()));
    }

    /// Hold calls of `method` (after recording them) until the returned
    /// gate is notified
    pub(crate) fn gate(&self, method: &str) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.gates
            .lock()
            .unwrap()
            .insert(method.to_string(), Arc::clone(&gate));
        gate
    }

    /// Every call so far
    pub(crate) fn calls(&self) -> Vec<(String, Vec<Value>)> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of calls of `method` so far
    pub(crate) fn calls_to(&self, method: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(m, _)| m == method)
            .count()
    }
}

#[async_trait]
impl EngineClient for MockEngine {
    async fn call(&self, method: &str, params: Vec<Value>) -> Result<Value> {
        self.calls
            .lock()
            .unwrap()
            .push((method.to_string(), params));

        let gate = self.gates.lock().unwrap().remove(method);
        if let Some(gate) = gate {
            gate.notified().await;
        }

        let scripted = self
            .scripted
            .lock()
            .unwrap()
            .get_mut(method)
            .and_then(VecDeque::pop_front);
        let reply = scripted.or_else(|| self.defaults.lock().unwrap().get(method).cloned());

        match reply {
            Some(Reply::Ok(value)) => Ok(value),
            Some(Reply::Fault(message)) => Err(RpcError::Fault { code: 1, message }.into()),
            None => Err(RpcError::Fault {
                code: 1,
                message: format!("no reply scripted for {method}"),
            }
            .into()),
        }
    }
}

/// tellStatus reply with the given status and lengths
pub(crate) fn status_reply(status: &str, completed: u64, total: u64) -> Value {
    json!({
        "status": status,
        "totalLength": total.to_string(),
        "completedLength": completed.to_string(),
        "downloadSpeed": "1024",
        "uploadSpeed": "0",
        "connections": "1",
        "files": []
    })
}

/// Config for tests: temp database, 20ms polls, 1h syncs
pub(crate) fn test_config(dir: &tempfile::TempDir) -> Config {
    let mut config = Config::default();
    config.persistence.database_path = dir.path().join("test.db");
    config.polling.update_interval = Duration::from_millis(20);
    config.polling.sync_interval = Duration::from_secs(3600);
    config
}

/// Helper to create a test Pool over a scripted engine, polling every 20ms.
/// Returns the pool, the engine and the tempdir (which must be kept alive).
pub(crate) async fn create_test_pool() -> (Pool, Arc<MockEngine>, tempfile::TempDir) {
    create_test_pool_polling_every(Duration::from_millis(20)).await
}

/// Pool whose schedules never tick during a test; polls are driven by
/// calling `poll_once` directly
pub(crate) async fn create_manual_test_pool() -> (Pool, Arc<MockEngine>, tempfile::TempDir) {
    create_test_pool_polling_every(Duration::from_secs(3600)).await
}

async fn create_test_pool_polling_every(
    update_interval: Duration,
) -> (Pool, Arc<MockEngine>, tempfile::TempDir) {
    let temp_dir = tempdir().unwrap();
    let mut config = test_config(&temp_dir);
    config.polling.update_interval = update_interval;
    let engine = MockEngine::new();
    let pool = Pool::with_engine(config, engine.clone()).await.unwrap();
    (pool, engine, temp_dir)
}

/// Collect every event a pool emits, in delivery order
pub(crate) fn record_events(pool: &Pool) -> Arc<Mutex<Vec<Event>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    for kind in [
        EventKind::Changed,
        EventKind::TaskAdded,
        EventKind::TaskRemoved,
        EventKind::TaskChanged,
        EventKind::Notification,
    ] {
        let sink = Arc::clone(&seen);
        pool.subscribe(kind, move |event| sink.lock().unwrap().push(event.clone()));
    }
    seen
}

/// Poll `condition` until it holds, failing the test after two seconds
pub(crate) async fn wait_until<F>(what: &str, mut condition: F)
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for {what}"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
