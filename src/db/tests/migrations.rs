use crate::db::*;
use tempfile::NamedTempFile;

#[tokio::test]
async fn test_database_creation() {
    let temp_file = NamedTempFile::new().unwrap();
    let db_path = temp_file.path();

    let db = Database::new(db_path).await.unwrap();

    let mut conn = db.pool.acquire().await.unwrap();

    let tables: Vec<String> =
        sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .fetch_all(&mut *conn)
            .await
            .unwrap();

    assert!(tables.contains(&"categories".to_string()));
    assert!(tables.contains(&"tasks".to_string()));
    assert!(tables.contains(&"schema_version".to_string()));

    drop(conn);
    db.pool().close().await;
}

#[tokio::test]
async fn test_reopen_does_not_reapply_migrations() {
    let temp_dir = tempfile::tempdir().unwrap();
    let db_path = temp_dir.path().join("nested").join("pool.db");

    let db = Database::new(&db_path).await.unwrap();
    db.insert_category("Downloads", None).await.unwrap();
    db.pool().close().await;

    let db = Database::new(&db_path).await.unwrap();
    let versions: Vec<i64> = sqlx::query_scalar("SELECT version FROM schema_version")
        .fetch_all(db.pool())
        .await
        .unwrap();
    assert_eq!(versions, vec![1]);
    assert_eq!(db.list_categories().await.unwrap().len(), 1);

    db.pool().close().await;
}
