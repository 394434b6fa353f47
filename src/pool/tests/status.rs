use super::*;

#[tokio::test]
async fn test_poll_applies_progress() {
    let (pool, engine, _temp_dir) = create_manual_test_pool().await;
    let key = started_task(&pool, &engine, "gid-1").await;
    let events = record_events(&pool);

    let outcome = poll_with(&pool, &engine, key, status_reply("active", 50, 100)).await;

    assert_eq!(outcome, PollOutcome::Continue);
    assert!(pool.is_connected());
    let task = pool.task(key).unwrap();
    assert_eq!(task.status(), Status::Active);
    assert_eq!(task.completed_length(), 50);
    assert_eq!(task.total_length(), 100);
    assert_eq!(task.download_speed(), 1024);
    assert_eq!(task.connections(), 1);
    assert!((task.progress() - 0.5).abs() < f64::EPSILON);

    // Progress only: no grouping changes
    assert_eq!(
        *events.lock().unwrap(),
        vec![Event::TaskChanged {
            group: GroupKey::Queue,
            task: key
        }]
    );
}

#[tokio::test]
async fn test_poll_complete_moves_task_to_category() {
    let (pool, engine, _temp_dir) = create_manual_test_pool().await;
    let key = started_task(&pool, &engine, "gid-1").await;

    let outcome = poll_with(&pool, &engine, key, status_reply("complete", 100, 100)).await;

    assert_eq!(outcome, PollOutcome::Stop);
    let task = pool.task(key).unwrap();
    assert_eq!(task.status(), Status::Complete);
    assert!(task.is_complete());
    assert_eq!(task.download_speed(), 0);
    assert_eq!(pool.group_of(key), Some(GroupKey::Category(DEFAULT_CATEGORY)));
    assert!(pool.tasks_in(GroupKey::Queue).is_empty());
    assert!(!pool.is_polling(key));

    let row = pool.db.get_task(key).await.unwrap().unwrap();
    assert_eq!(row.status, Status::Complete.to_i32());
    assert_eq!(row.completed_length, 100);
}

#[tokio::test]
async fn test_poll_clamps_completed_to_total() {
    let (pool, engine, _temp_dir) = create_manual_test_pool().await;
    let key = started_task(&pool, &engine, "gid-1").await;

    poll_with(&pool, &engine, key, status_reply("active", 150, 100)).await;

    assert_eq!(pool.task(key).unwrap().completed_length(), 100);
}

#[tokio::test]
async fn test_poll_engine_error_status() {
    let (pool, engine, _temp_dir) = create_manual_test_pool().await;
    let key = started_task(&pool, &engine, "gid-1").await;
    let events = record_events(&pool);

    let mut reply = status_reply("error", 10, 100);
    reply["errorMessage"] = json!("Resource not found");
    let outcome = poll_with(&pool, &engine, key, reply).await;

    assert_eq!(outcome, PollOutcome::Stop);
    assert_eq!(pool.task(key).unwrap().status(), Status::Error);
    assert_eq!(pool.group_of(key), Some(GroupKey::Queue));
    // An engine-reported error is a status, not a failed call
    assert!(notifications(&events).is_empty());
}

#[tokio::test]
async fn test_poll_waiting_and_paused_keep_polling() {
    let (pool, engine, _temp_dir) = create_manual_test_pool().await;
    let key = started_task(&pool, &engine, "gid-1").await;

    let outcome = poll_with(&pool, &engine, key, status_reply("waiting", 0, 0)).await;
    assert_eq!(outcome, PollOutcome::Continue);
    assert_eq!(pool.task(key).unwrap().status(), Status::Waiting);

    let outcome = poll_with(&pool, &engine, key, status_reply("paused", 0, 0)).await;
    assert_eq!(outcome, PollOutcome::Continue);
    assert_eq!(pool.task(key).unwrap().status(), Status::Paused);
    assert!(pool.is_polling(key));
}

#[tokio::test]
async fn test_poll_unknown_status_keeps_current_status() {
    let (pool, engine, _temp_dir) = create_manual_test_pool().await;
    let key = started_task(&pool, &engine, "gid-1").await;

    let outcome = poll_with(&pool, &engine, key, status_reply("seeding", 30, 100)).await;

    assert_eq!(outcome, PollOutcome::Continue);
    let task = pool.task(key).unwrap();
    assert_eq!(task.status(), Status::Active);
    assert_eq!(task.completed_length(), 30);
}

#[tokio::test]
async fn test_poll_failure_marks_error_and_notifies() {
    let (pool, engine, _temp_dir) = create_manual_test_pool().await;
    let key = started_task(&pool, &engine, "gid-1").await;
    poll_with(&pool, &engine, key, status_reply("active", 10, 100)).await;
    let events = record_events(&pool);
    engine.push_fault(methods::TELL_STATUS, "GID gid-1 is not found");

    let outcome = pool.poll_once(key, None).await;

    assert_eq!(outcome, PollOutcome::Stop);
    assert!(!pool.is_connected());
    assert!(!pool.is_polling(key));
    let task = pool.task(key).unwrap();
    assert_eq!(task.status(), Status::Error);
    assert_eq!(task.download_speed(), 0);
    assert_eq!(
        notifications(&events),
        vec![Event::Notification {
            task: Some(key),
            title: NETWORK_ERROR_TITLE.to_string(),
            message: "GID gid-1 is not found".to_string(),
        }]
    );
}

#[tokio::test]
async fn test_poll_untracked_task_stops() {
    let (pool, engine, _temp_dir) = create_manual_test_pool().await;
    let key = pool.create_task(NewTask::uri([SAMPLE_URI])).await.unwrap();

    assert_eq!(pool.poll_once(key, None).await, PollOutcome::Stop);
    assert_eq!(pool.poll_once(TaskKey(404), None).await, PollOutcome::Stop);
    assert!(engine.calls().is_empty());
}

#[tokio::test]
async fn test_plain_task_renamed_once_from_single_file() {
    let (pool, engine, _temp_dir) = create_manual_test_pool().await;
    let key = pool
        .create_task(NewTask::uri(["http://example.com/download.php?id=7"]))
        .await
        .unwrap();
    assert_eq!(pool.task(key).unwrap().name(), "download.php");
    engine.push(methods::ADD_URI, json!("gid-1"));
    pool.start(key).await.unwrap();

    let mut reply = status_reply("active", 10, 100);
    reply["files"] = json!([{"path": "/data/Release%20Notes.pdf", "length": "100", "completedLength": "10"}]);
    poll_with(&pool, &engine, key, reply).await;

    let task = pool.task(key).unwrap();
    assert_eq!(task.name(), "Release Notes.pdf");
    assert!(task.is_renamed());

    // Later reports never rename again
    let mut reply = status_reply("active", 20, 100);
    reply["files"] = json!([{"path": "/data/other.pdf", "length": "100", "completedLength": "20"}]);
    poll_with(&pool, &engine, key, reply).await;
    assert_eq!(pool.task(key).unwrap().name(), "Release Notes.pdf");

    let row = pool.db.get_task(key).await.unwrap().unwrap();
    assert_eq!(row.name, "Release Notes.pdf");
    assert_eq!(row.renamed, 1);
}

#[tokio::test]
async fn test_plain_task_waits_for_file_path_before_renaming() {
    let (pool, engine, _temp_dir) = create_manual_test_pool().await;
    let key = started_task(&pool, &engine, "gid-1").await;

    // The engine reports an empty path until it knows the file name
    let mut reply = status_reply("active", 0, 0);
    reply["files"] = json!([{"path": "", "length": "0", "completedLength": "0"}]);
    poll_with(&pool, &engine, key, reply).await;

    let task = pool.task(key).unwrap();
    assert_eq!(task.name(), "ubuntu.iso");
    assert!(!task.is_renamed());
}

#[tokio::test]
async fn test_torrent_renamed_from_info_name() {
    let (pool, engine, _temp_dir) = create_manual_test_pool().await;
    let key = pool
        .create_task(NewTask::torrent(b"d4:infoe".to_vec()))
        .await
        .unwrap();
    assert_eq!(pool.task(key).unwrap().name(), "New torrent");
    engine.push(methods::ADD_TORRENT, json!("gid-bt"));
    pool.start(key).await.unwrap();

    let mut reply = status_reply("active", 0, 4096);
    reply["bittorrent"] = json!({"info": {"name": "debian-12-netinst"}});
    poll_with(&pool, &engine, key, reply).await;

    assert_eq!(pool.task(key).unwrap().name(), "debian-12-netinst");
}

#[tokio::test]
async fn test_stale_reply_for_previous_submission_is_discarded() {
    let (pool, engine, _temp_dir) = create_manual_test_pool().await;
    let key = started_task(&pool, &engine, "gid-1").await;
    engine.push(methods::TELL_STATUS, status_reply("complete", 100, 100));
    let gate = engine.gate(methods::TELL_STATUS);

    let polling = {
        let pool = pool.clone();
        tokio::spawn(async move { pool.poll_once(key, None).await })
    };
    wait_until("status call", || engine.calls_to(methods::TELL_STATUS) == 1).await;

    // Resubmit under a new identifier while the old poll is in flight
    pool.trash(key).await.unwrap();
    pool.restore(key).await.unwrap();
    engine.push(methods::ADD_URI, json!("gid-2"));
    pool.start(key).await.unwrap();

    gate.notify_one();
    let outcome = polling.await.unwrap();

    assert_eq!(outcome, PollOutcome::Continue);
    let task = pool.task(key).unwrap();
    assert_eq!(task.status(), Status::Active);
    assert_eq!(task.gid(), Some("gid-2"));
    assert_eq!(task.completed_length(), 0);
    assert_eq!(pool.group_of(key), Some(GroupKey::Queue));
}

#[tokio::test]
async fn test_failed_poll_after_trash_is_ignored() {
    let (pool, engine, _temp_dir) = create_manual_test_pool().await;
    let key = started_task(&pool, &engine, "gid-1").await;
    let events = record_events(&pool);
    engine.push_fault(methods::TELL_STATUS, "connection reset");
    let gate = engine.gate(methods::TELL_STATUS);

    let polling = {
        let pool = pool.clone();
        tokio::spawn(async move { pool.poll_once(key, None).await })
    };
    wait_until("status call", || engine.calls_to(methods::TELL_STATUS) == 1).await;
    pool.trash(key).await.unwrap();

    gate.notify_one();
    assert_eq!(polling.await.unwrap(), PollOutcome::Stop);

    assert_eq!(pool.task(key).unwrap().status(), Status::Trashed);
    assert!(notifications(&events).is_empty());
}

#[tokio::test]
async fn test_session_failure_leaves_status_untouched() {
    let (pool, engine, _temp_dir) = create_manual_test_pool().await;
    let events = record_events(&pool);
    engine.set_default_fault(methods::GET_SESSION_INFO, "Unauthorized");
    let key = pool.create_task(NewTask::uri([SAMPLE_URI])).await.unwrap();
    engine.push(methods::ADD_URI, json!("gid-1"));

    pool.start(key).await.unwrap();

    let task = pool.task(key).unwrap();
    assert_eq!(task.status(), Status::Active);
    assert_eq!(task.gid(), Some("gid-1"));
    assert_eq!(task.session_id(), None);
    assert!(pool.is_polling(key));
    assert_eq!(notifications(&events).len(), 1);
}

#[tokio::test]
async fn test_progress_is_written_by_sync() {
    let (pool, engine, _temp_dir) = create_manual_test_pool().await;
    let key = started_task(&pool, &engine, "gid-1").await;

    poll_with(&pool, &engine, key, status_reply("active", 50, 100)).await;

    // Progress alone is not written on every poll
    let row = pool.db.get_task(key).await.unwrap().unwrap();
    assert_eq!(row.completed_length, 0);

    pool.sync_task(key).await;

    let row = pool.db.get_task(key).await.unwrap().unwrap();
    assert_eq!(row.completed_length, 50);
    assert_eq!(row.total_length, 100);
}

#[tokio::test]
async fn test_handlers_can_query_pool_while_notified() {
    let (pool, engine, _temp_dir) = create_manual_test_pool().await;
    let key = started_task(&pool, &engine, "gid-1").await;
    let seen = Arc::new(std::sync::Mutex::new(Vec::new()));

    let observer = pool.clone();
    let sink = Arc::clone(&seen);
    pool.subscribe(EventKind::TaskChanged, move |event| {
        if let Event::TaskChanged { task, .. } = event {
            let status = observer.task(*task).map(|t| t.status());
            sink.lock().unwrap().push(status);
        }
    });

    poll_with(&pool, &engine, key, status_reply("complete", 100, 100)).await;

    assert_eq!(*seen.lock().unwrap(), vec![Some(Status::Complete)]);
}

#[tokio::test]
async fn test_pause_during_poll_wins_over_earlier_reply() {
    let (pool, engine, _temp_dir) = create_manual_test_pool().await;
    let key = started_task(&pool, &engine, "gid-1").await;
    engine.push(methods::TELL_STATUS, status_reply("active", 40, 100));
    let gate = engine.gate(methods::TELL_STATUS);

    let polling = {
        let pool = pool.clone();
        tokio::spawn(async move { pool.poll_once(key, None).await })
    };
    wait_until("status call", || engine.calls_to(methods::TELL_STATUS) == 1).await;

    pool.pause(key).await.unwrap();
    assert_eq!(pool.task(key).unwrap().status(), Status::Paused);
    let events = record_events(&pool);

    // The engine answered before it saw the pause
    gate.notify_one();
    assert_eq!(polling.await.unwrap(), PollOutcome::Continue);

    let task = pool.task(key).unwrap();
    assert_eq!(task.status(), Status::Paused);
    assert_eq!(task.completed_length(), 0);
    assert!(events.lock().unwrap().is_empty());
    let row = pool.db.get_task(key).await.unwrap().unwrap();
    assert_eq!(row.status, Status::Paused.to_i32());

    // The next poll is taken at face value again
    poll_with(&pool, &engine, key, status_reply("paused", 40, 100)).await;
    assert_eq!(pool.task(key).unwrap().completed_length(), 40);
}

#[tokio::test]
async fn test_failed_poll_after_pause_is_ignored() {
    let (pool, engine, _temp_dir) = create_manual_test_pool().await;
    let key = started_task(&pool, &engine, "gid-1").await;
    let events = record_events(&pool);
    engine.push_fault(methods::TELL_STATUS, "connection reset");
    let gate = engine.gate(methods::TELL_STATUS);

    let polling = {
        let pool = pool.clone();
        tokio::spawn(async move { pool.poll_once(key, None).await })
    };
    wait_until("status call", || engine.calls_to(methods::TELL_STATUS) == 1).await;
    pool.pause(key).await.unwrap();

    gate.notify_one();
    assert_eq!(polling.await.unwrap(), PollOutcome::Continue);

    assert_eq!(pool.task(key).unwrap().status(), Status::Paused);
    assert!(notifications(&events).is_empty());
    assert!(pool.is_polling(key));
}

#[tokio::test]
async fn test_report_for_another_download_is_ignored() {
    let (pool, engine, _temp_dir) = create_manual_test_pool().await;
    let key = started_task(&pool, &engine, "gid-1").await;
    let events = record_events(&pool);

    let mut reply = status_reply("complete", 100, 100);
    reply["gid"] = json!("gid-9");
    let outcome = poll_with(&pool, &engine, key, reply).await;

    assert_eq!(outcome, PollOutcome::Continue);
    let task = pool.task(key).unwrap();
    assert_eq!(task.status(), Status::Active);
    assert_eq!(task.completed_length(), 0);
    assert!(events.lock().unwrap().is_empty());

    // A report naming the tracked download is applied
    let mut reply = status_reply("active", 30, 100);
    reply["gid"] = json!("gid-1");
    poll_with(&pool, &engine, key, reply).await;
    assert_eq!(pool.task(key).unwrap().completed_length(), 30);
}
