use crate::db::*;
use crate::task::{NewTask, Task};
use crate::types::TaskKey;
use tempfile::NamedTempFile;

/// Querying after the pool is closed returns an error rather than hanging
#[tokio::test]
async fn test_get_task_after_pool_close_returns_error() {
    let temp_file = NamedTempFile::new().unwrap();
    let db = Database::new(temp_file.path()).await.unwrap();

    let category = db.insert_category("Downloads", None).await.unwrap();
    let task = Task::create(TaskKey(0), NewTask::uri(["http://example.com/a"]), category);
    let key = db.insert_task(&task).await.unwrap();
    assert!(db.get_task(key).await.unwrap().is_some());

    db.pool().close().await;

    let result = db.get_task(key).await;
    assert!(
        result.is_err(),
        "get_task after pool close should return an error, got: {:?}",
        result
    );
}
