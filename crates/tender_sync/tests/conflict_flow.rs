//! Conflicting reconnect flow: local and server versions diverge, the
//! user resolves, the document becomes re-syncable.

use serde_json::json;
use tender_sync::{
    ChangeType, ChannelSignal, ConnectionStatus, Resolution, SyncResponse, SyncService,
};
use tender_test_helpers::{content, logging, TempWorkspace};

async fn start_service(ws: &TempWorkspace) -> SyncService {
    logging::init();
    SyncService::start(ws.config()).await.unwrap()
}

#[tokio::test]
async fn test_conflicting_reconnect_requires_resolution() {
    let ws = TempWorkspace::new();
    let svc = start_service(&ws).await;

    let local = content::doc("local");
    let server = content::doc("server");

    svc.record_edit("d1", ChangeType::Edit, local.clone())
        .await
        .unwrap();
    svc.handle_signal(ChannelSignal::Subscribed);

    // Server delivers a diverged version on reconnect
    let conflict = svc
        .apply_server_content("d1", server.clone())
        .await
        .unwrap()
        .expect("divergence must surface a conflict");
    assert_eq!(conflict.local_content, local);
    assert_eq!(conflict.server_content, server);
    assert!(!svc.is_document_synced("d1").await);

    // A replay attempt is blocked while the conflict is open
    let outcome = svc
        .sync("d1", |_changes| async move {
            panic!("must not replay over an open conflict")
        })
        .await
        .unwrap();
    assert!(!outcome.success);
    assert_eq!(outcome.conflicts[0].id, conflict.id);

    // User merges both versions
    let merged = content::doc_with_paragraphs(&["local", "server"]);
    let entry = svc
        .resolve_conflict(&conflict.id, Resolution::Merged(merged.clone()))
        .await
        .unwrap();
    assert_eq!(entry.content, merged);
    assert!(svc.open_conflict("d1").is_none());

    // Pending changes remain queued until an explicit sync confirms them
    assert!(svc.has_pending_changes("d1").await);
    let outcome = svc
        .sync("d1", |_changes| async move { Ok(SyncResponse::ok()) })
        .await
        .unwrap();
    assert!(outcome.is_clean());
    assert!(svc.is_document_synced("d1").await);
    svc.shutdown();
}

#[tokio::test]
async fn test_repeated_detection_is_deduplicated() {
    let ws = TempWorkspace::new();
    let svc = start_service(&ws).await;

    svc.cache_document("d1", content::doc("local"))
        .await
        .unwrap();

    let first = svc
        .apply_server_content("d1", content::doc("server"))
        .await
        .unwrap()
        .unwrap();

    // A second reconnect cycle sees the same divergence
    let second = svc
        .apply_server_content("d1", content::doc("server revised"))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(svc.all_conflicts().len(), 1);
    svc.shutdown();
}

#[tokio::test]
async fn test_matching_server_content_is_not_a_conflict() {
    let ws = TempWorkspace::new();
    let svc = start_service(&ws).await;

    let local = content::doc("same everywhere");
    svc.cache_document("d1", local.clone()).await.unwrap();

    let conflict = svc.apply_server_content("d1", local).await.unwrap();
    assert!(conflict.is_none());
    assert!(svc.is_document_synced("d1").await);
    svc.shutdown();
}

#[tokio::test]
async fn test_keep_local_and_keep_server_choices() {
    let ws = TempWorkspace::new();
    let svc = start_service(&ws).await;

    let local = content::doc("ours");
    let server = content::doc("theirs");

    svc.cache_document("d1", local.clone()).await.unwrap();
    let conflict = svc
        .apply_server_content("d1", server.clone())
        .await
        .unwrap()
        .unwrap();

    let entry = svc
        .resolve_conflict(&conflict.id, Resolution::KeepServer)
        .await
        .unwrap();
    assert_eq!(entry.content, server);

    // Diverge again, this time keep the local side
    svc.cache_document("d1", local.clone()).await.unwrap();
    let conflict = svc
        .apply_server_content("d1", content::doc("newer theirs"))
        .await
        .unwrap()
        .unwrap();
    let entry = svc
        .resolve_conflict(&conflict.id, Resolution::KeepLocal)
        .await
        .unwrap();
    assert_eq!(entry.content, local);
    svc.shutdown();
}

#[tokio::test]
async fn test_server_reported_conflicts_keep_queue() {
    let ws = TempWorkspace::new();
    let svc = start_service(&ws).await;

    svc.record_edit("d1", ChangeType::Edit, content::doc("local"))
        .await
        .unwrap();
    svc.handle_signal(ChannelSignal::Subscribed);

    let outcome = svc
        .sync("d1", |changes| async move {
            // The server applied the batch but found divergence
            let conflict = tender_sync::detect_conflict(
                &changes[0].document_id,
                &changes[0].content,
                &content::doc("server"),
            )
            .unwrap();
            Ok(SyncResponse::with_conflicts(vec![conflict]))
        })
        .await
        .unwrap();

    assert!(outcome.success);
    assert_eq!(outcome.conflicts.len(), 1);

    // Unconfirmed local edits stay queued; status reflects the open cycle
    assert!(svc.has_pending_changes("d1").await);
    assert_eq!(svc.status(), ConnectionStatus::Syncing);
    assert!(!svc.is_document_synced("d1").await);

    // Resolve, then the queue drains on the next sync
    let conflict = svc.open_conflict("d1").unwrap();
    svc.resolve_conflict_content(&conflict.id, json!({"type": "doc", "content": []}))
        .await
        .unwrap();
    let outcome = svc
        .sync("d1", |_changes| async move { Ok(SyncResponse::ok()) })
        .await
        .unwrap();
    assert!(outcome.is_clean());
    assert!(svc.is_document_synced("d1").await);
    svc.shutdown();
}
