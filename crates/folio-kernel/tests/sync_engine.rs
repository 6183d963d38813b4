//! End-to-end tests for the sync engine against a temp directory.
//!
//! # Tiers
//!
//! - **Tier 1:** synthetic watch events fed through the running watcher loop
//! - **Tier 2:** real filesystem notifications from the OS watcher
//! - **Tier 3:** adaptor failure paths and reopening a directory

use std::sync::Arc;
use std::time::Duration;

use folio_kernel::{
    ChangeKind, EntryStore, MemoryEntryStore, NotificationChannel, StoreEvent, SyncConfig,
    SyncEngine, SyncError, TidRenderer, WatchEvent, WatchState, shared_entry_flow_bus,
};
use folio_types::Entry;
use tempfile::TempDir;
use tokio::sync::broadcast;

// ============================================================================
// Shared test setup
// ============================================================================

const WAIT: Duration = Duration::from_secs(10);

async fn open(dir: &TempDir) -> (SyncEngine, Arc<MemoryEntryStore>) {
    let store = Arc::new(MemoryEntryStore::new());
    let engine = SyncEngine::open(SyncConfig::new(dir.path()), store.clone())
        .await
        .expect("open engine");
    (engine, store)
}

/// Wait until `title` is upserted, collecting every title upserted before it.
async fn wait_for_upsert(rx: &mut broadcast::Receiver<StoreEvent>, title: &str) -> Vec<String> {
    let mut seen = Vec::new();
    tokio::time::timeout(WAIT, async {
        loop {
            match rx.recv().await {
                Ok(StoreEvent::Upserted { title: t, .. }) if t == title => return,
                Ok(StoreEvent::Upserted { title: t, .. }) => seen.push(t),
                Ok(_) => {}
                Err(e) => panic!("store events closed: {e}"),
            }
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for {title}"));
    seen
}

// ============================================================================
// Tier 1: synthetic events
// ============================================================================

#[tokio::test]
async fn test_save_then_synthetic_event_is_suppressed() {
    let dir = TempDir::new().unwrap();
    let (engine, store) = open(&dir).await;
    let handle = engine.start_watching().await.unwrap();
    let mut events = store.subscribe();
    let tx = engine.watcher().event_sender();

    let saved = engine
        .save(&Entry::new("Note").with_text("from the engine"))
        .await
        .unwrap();
    tx.send(WatchEvent::new(ChangeKind::Modified, &saved.record.path))
        .await
        .unwrap();

    // A genuine external file queued behind it marks the end of processing.
    let marker = engine.root().join("marker.tid");
    std::fs::write(&marker, "title: Marker\n\nexternal").unwrap();
    tx.send(WatchEvent::new(ChangeKind::Created, &marker)).await.unwrap();

    let before = wait_for_upsert(&mut events, "Marker").await;
    assert!(!before.contains(&"Note".to_string()));
    assert!(store.get("Note").is_none());
    handle.stop();
}

#[tokio::test]
async fn test_events_before_ready_are_discarded() {
    let dir = TempDir::new().unwrap();
    let (engine, store) = open(&dir).await;
    assert_eq!(engine.watcher().state(), WatchState::Scanning);

    let early = engine.root().join("early.tid");
    std::fs::write(&early, "title: Early\n\nx").unwrap();
    let tx = engine.watcher().event_sender();
    tx.send(WatchEvent::new(ChangeKind::Created, &early)).await.unwrap();

    let mut events = store.subscribe();
    let handle = engine.start_watching().await.unwrap();
    assert_eq!(engine.watcher().state(), WatchState::Ready);

    let late = engine.root().join("late.tid");
    std::fs::write(&late, "title: Late\n\ny").unwrap();
    tx.send(WatchEvent::new(ChangeKind::Created, &late)).await.unwrap();

    let before = wait_for_upsert(&mut events, "Late").await;
    assert!(!before.contains(&"Early".to_string()));
    handle.stop();
}

#[tokio::test]
async fn test_drafts_and_foreign_extensions_never_reach_the_store() {
    let dir = TempDir::new().unwrap();
    let (engine, store) = open(&dir).await;
    let handle = engine.start_watching().await.unwrap();
    let mut events = store.subscribe();
    let tx = engine.watcher().event_sender();

    for name in ["Draft_of_Note.tid", "readme.md"] {
        let path = engine.root().join(name);
        std::fs::write(&path, "title: Sneaky\n\nx").unwrap();
        tx.send(WatchEvent::new(ChangeKind::Created, &path)).await.unwrap();
    }
    let marker = engine.root().join("marker.tid");
    std::fs::write(&marker, "title: Marker\n\nx").unwrap();
    tx.send(WatchEvent::new(ChangeKind::Created, &marker)).await.unwrap();

    let before = wait_for_upsert(&mut events, "Marker").await;
    assert!(before.is_empty());
    assert!(store.get("Sneaky").is_none());
    handle.stop();
}

#[tokio::test]
async fn test_start_twice_fails() {
    let dir = TempDir::new().unwrap();
    let (engine, _) = open(&dir).await;
    let handle = engine.start_watching().await.unwrap();
    let err = engine.start_watching().await.err().unwrap();
    assert!(matches!(err, SyncError::Watch(_)));
    handle.stop();
}

// ============================================================================
// Tier 2: OS notifications
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_external_edit_is_loaded_and_announced() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(MemoryEntryStore::new());
    let bus = shared_entry_flow_bus(64);
    let mut updates = bus.subscribe("entry.updated");
    let engine = SyncEngine::open_with(
        SyncConfig::new(dir.path()),
        store.clone(),
        Arc::new(TidRenderer),
        Some(NotificationChannel::new(bus)),
    )
    .await
    .unwrap();
    let handle = engine.start_watching().await.unwrap();
    let mut events = store.subscribe();

    std::fs::write(engine.root().join("Edited.tid"), "title: Edited\n\nby hand").unwrap();
    // The create and the write may arrive as separate events.
    loop {
        wait_for_upsert(&mut events, "Edited").await;
        if store.get("Edited").is_some_and(|e| e.text == "by hand") {
            break;
        }
    }

    let msg = tokio::time::timeout(WAIT, updates.recv())
        .await
        .expect("update announced")
        .expect("bus open");
    assert_eq!(msg.payload.title(), "Edited");
    handle.stop();
}

// ============================================================================
// Tier 3: adaptor failures and reopening
// ============================================================================

#[tokio::test]
async fn test_failed_primary_delete_keeps_sidecar() {
    let dir = TempDir::new().unwrap();
    let (engine, _) = open(&dir).await;
    let saved = engine
        .save(&Entry::new("pic").with_type("image/gif").with_text("R0lG"))
        .await
        .unwrap();
    std::fs::remove_file(&saved.record.path).unwrap();

    let err = engine.delete("pic").await.unwrap_err();
    assert!(matches!(err, SyncError::Delete { .. }));
    assert!(saved.record.meta_path(".meta").exists());
}

#[tokio::test]
async fn test_delete_without_record_touches_nothing() {
    let dir = TempDir::new().unwrap();
    let (engine, _) = open(&dir).await;
    std::fs::write(engine.root().join("ghost.tid"), "title: other\n\n").unwrap();

    engine.delete("ghost").await.unwrap();
    assert!(engine.root().join("ghost.tid").exists());
}

#[tokio::test]
async fn test_reopen_restores_saved_entries() {
    let dir = TempDir::new().unwrap();
    {
        let (engine, _) = open(&dir).await;
        engine
            .save(&Entry::new("Hello There").with_field("tags", "greeting").with_text("Hi"))
            .await
            .unwrap();
        engine
            .save(&Entry::new("dots").with_type("image/png").with_text("AQID"))
            .await
            .unwrap();
    }

    let (engine, store) = open(&dir).await;
    assert_eq!(engine.boot_report().loaded.len(), 2);
    let hello = store.get("Hello There").unwrap();
    assert_eq!(hello.field("tags"), Some("greeting"));
    assert_eq!(store.get("dots").unwrap().text, "AQID");

    // Saving again reuses the files found at boot.
    let again = engine.save(&Entry::new("Hello There")).await.unwrap();
    assert_eq!(again.record.file_name().as_deref(), Some("Hello_There.tid"));
    assert_eq!(engine.load("Hello There").await.unwrap(), None);
}

#[tokio::test]
async fn test_dot_titles_survive_reopen() {
    let dir = TempDir::new().unwrap();
    {
        let (engine, _) = open(&dir).await;
        let saved = engine.save(&Entry::new(".profile").with_text("export A=1")).await.unwrap();
        assert_eq!(saved.record.file_name().as_deref(), Some("_profile.tid"));
        engine.save(&Entry::new("..").with_text("up")).await.unwrap();

        let err = engine.save(&Entry::new("")).await.unwrap_err();
        assert!(matches!(err, SyncError::Untitled));
    }

    let (engine, store) = open(&dir).await;
    assert_eq!(engine.boot_report().loaded.len(), 2);
    assert_eq!(store.get(".profile").unwrap().text, "export A=1");
    assert_eq!(store.get("..").unwrap().text, "up");
}
