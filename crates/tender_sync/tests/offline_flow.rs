//! End-to-end offline editing flow: edit while disconnected, reconnect,
//! replay the queue, converge.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tender_sync::{
    ChangeType, ChannelSignal, ConnectionStatus, SyncError, SyncResponse, SyncService,
};
use tender_test_helpers::{content, logging, TempWorkspace};

async fn start_service(ws: &TempWorkspace) -> SyncService {
    logging::init();
    SyncService::start(ws.config()).await.unwrap()
}

#[tokio::test]
async fn test_offline_edit_then_reconnect() {
    let ws = TempWorkspace::new();
    let svc = start_service(&ws).await;

    // Startup state
    assert_eq!(svc.status(), ConnectionStatus::Disconnected);

    svc.handle_signal(ChannelSignal::Subscribed);
    assert_eq!(svc.status(), ConnectionStatus::Connected);

    // Connection drops; the edit lands in cache and queue
    svc.handle_signal(ChannelSignal::Closed);
    svc.record_edit("d1", ChangeType::Edit, content::doc("v1"))
        .await
        .unwrap();
    assert!(svc.has_pending_changes("d1").await);
    assert!(!svc.is_document_synced("d1").await);

    // Reconnect and flush
    svc.handle_signal(ChannelSignal::Subscribed);
    let outcome = svc
        .sync("d1", |changes| async move {
            assert_eq!(changes.len(), 1);
            assert_eq!(changes[0].document_id, "d1");
            Ok(SyncResponse::ok())
        })
        .await
        .unwrap();

    assert!(outcome.is_clean());
    assert!(!svc.has_pending_changes("d1").await);
    assert!(svc.is_document_synced("d1").await);
    assert_eq!(svc.status(), ConnectionStatus::Connected);
    svc.shutdown();
}

#[tokio::test]
async fn test_sync_is_idempotent() {
    let ws = TempWorkspace::new();
    let svc = start_service(&ws).await;

    svc.record_edit("d1", ChangeType::Edit, content::doc("v1"))
        .await
        .unwrap();
    svc.handle_signal(ChannelSignal::Subscribed);

    let invocations = Arc::new(AtomicUsize::new(0));

    for _ in 0..2 {
        let counter = Arc::clone(&invocations);
        let outcome = svc
            .sync("d1", move |_changes| async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(SyncResponse::ok())
            })
            .await
            .unwrap();
        assert!(outcome.success);
    }

    // The second call had nothing to replay
    assert_eq!(invocations.load(Ordering::SeqCst), 1);
    assert!(!svc.has_pending_changes("d1").await);
    svc.shutdown();
}

#[tokio::test]
async fn test_concurrent_syncs_coalesce() {
    let ws = TempWorkspace::new();
    let svc = start_service(&ws).await;

    svc.record_edit("d1", ChangeType::Edit, content::doc("v1"))
        .await
        .unwrap();
    svc.handle_signal(ChannelSignal::Subscribed);

    let invocations = Arc::new(AtomicUsize::new(0));
    let slow_counter = Arc::clone(&invocations);
    let fast_counter = Arc::clone(&invocations);

    let slow = svc.sync("d1", move |_changes| async move {
        slow_counter.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        Ok(SyncResponse::ok())
    });
    let fast = svc.sync("d1", move |_changes| async move {
        fast_counter.fetch_add(1, Ordering::SeqCst);
        Ok(SyncResponse::ok())
    });

    let (first, second) = tokio::join!(slow, fast);
    assert!(first.unwrap().success);
    assert!(second.unwrap().success);

    // Only one replay ran; the overlapping call was a no-op
    assert_eq!(invocations.load(Ordering::SeqCst), 1);
    assert!(!svc.has_pending_changes("d1").await);
    svc.shutdown();
}

#[tokio::test]
async fn test_failed_replay_keeps_changes_for_retry() {
    let ws = TempWorkspace::new();
    let svc = start_service(&ws).await;

    svc.record_edit("d1", ChangeType::Edit, content::doc("v1"))
        .await
        .unwrap();
    svc.record_edit("d1", ChangeType::Metadata, content::doc("v2"))
        .await
        .unwrap();
    svc.handle_signal(ChannelSignal::Subscribed);

    let outcome = svc
        .sync("d1", |_changes| async move {
            Err::<SyncResponse, _>(SyncError::Replay("gateway timeout".into()))
        })
        .await
        .unwrap();

    assert!(!outcome.success);
    assert_eq!(svc.pending_count("d1").await, 2);
    assert_eq!(svc.status(), ConnectionStatus::Disconnected);

    // Backoff path owns the retry; a later sync drains the queue
    svc.handle_signal(ChannelSignal::Subscribed);
    let outcome = svc
        .sync("d1", |changes| async move {
            assert_eq!(changes.len(), 2);
            assert!(changes.iter().all(|c| c.retry_count == 1));
            Ok(SyncResponse::ok())
        })
        .await
        .unwrap();
    assert!(outcome.is_clean());
    assert!(svc.is_document_synced("d1").await);
    svc.shutdown();
}

#[tokio::test]
async fn test_queue_survives_restart() {
    let ws = TempWorkspace::new();

    {
        let svc = start_service(&ws).await;
        for i in 0..3 {
            svc.record_edit("d1", ChangeType::Edit, content::doc(&format!("rev {}", i)))
                .await
                .unwrap();
        }
        svc.shutdown();
    }

    // Relaunch on the same workspace
    let svc = start_service(&ws).await;
    assert_eq!(svc.pending_count("d1").await, 3);

    let cached = svc.cached_document("d1").await.unwrap().unwrap();
    assert_eq!(cached.content, content::doc("rev 2"));

    svc.handle_signal(ChannelSignal::Subscribed);
    let outcome = svc
        .sync("d1", |changes| async move {
            // Replay order matches enqueue order across the restart
            let texts: Vec<String> = changes
                .iter()
                .map(|c| c.content["content"][0]["content"][0]["text"]
                    .as_str()
                    .unwrap()
                    .to_string())
                .collect();
            assert_eq!(texts, vec!["rev 0", "rev 1", "rev 2"]);
            Ok(SyncResponse::ok())
        })
        .await
        .unwrap();
    assert!(outcome.is_clean());
    svc.shutdown();
}

#[tokio::test]
async fn test_documents_sync_independently() {
    let ws = TempWorkspace::new();
    let svc = start_service(&ws).await;

    svc.record_edit("d1", ChangeType::Edit, content::doc("one"))
        .await
        .unwrap();
    svc.record_edit("d2", ChangeType::Edit, content::doc("two"))
        .await
        .unwrap();
    svc.handle_signal(ChannelSignal::Subscribed);

    let outcome = svc
        .sync("d1", |_changes| async move { Ok(SyncResponse::ok()) })
        .await
        .unwrap();
    assert!(outcome.is_clean());

    assert!(svc.is_document_synced("d1").await);
    assert!(!svc.is_document_synced("d2").await);
    assert_eq!(svc.total_pending().await, 1);
    svc.shutdown();
}
